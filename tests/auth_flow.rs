mod common;

use anyhow::Result;
use axum::http::StatusCode;
use common::{acquire_db_lock, body_to_vec, TestApp};
use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
struct AuthenticatedUser {
    username: String,
    role: String,
}

#[derive(Serialize)]
struct LoginPayload<'a> {
    username: &'a str,
    password: &'a str,
}

#[tokio::test]
async fn login_and_me_roundtrip() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = TestApp::new().await? else {
        return Ok(());
    };

    let password = "s3cret";
    app.insert_user("alice", password, "admin").await?;

    let token = app.login_token("alice", password).await?;

    let response = app.get("/api/auth/me", Some(&token)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_to_vec(response.into_body()).await?;
    let user: AuthenticatedUser = serde_json::from_slice(&body)?;

    assert_eq!(user.username, "alice");
    assert_eq!(user.role, "admin");

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn rejects_bad_credentials_and_missing_tokens() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = TestApp::new().await? else {
        return Ok(());
    };

    app.insert_user("bob", "right", "user").await?;

    let wrong = app
        .post_json(
            "/api/auth/login",
            &LoginPayload {
                username: "bob",
                password: "wrong",
            },
            None,
        )
        .await?;
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

    let unknown = app
        .post_json(
            "/api/auth/login",
            &LoginPayload {
                username: "nobody",
                password: "right",
            },
            None,
        )
        .await?;
    assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);

    let anonymous = app.get("/api/tags", None).await?;
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    let health = app.get("/api/health", None).await?;
    assert_eq!(health.status(), StatusCode::OK);

    app.cleanup().await?;
    Ok(())
}
