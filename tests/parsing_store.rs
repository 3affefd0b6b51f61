mod common;

use anyhow::Result;
use chrono::{Duration, Utc};
use common::{acquire_db_lock, TestApp};
use diesel::prelude::*;
use diesel::PgConnection;
use papertext::{
    jobs,
    literals::{TimeDelta, TimeDeltaUnit},
    models::{NewDocument, NewDocumentVersion},
    parsing,
    schema::{document_version_parse_errors, document_versions, documents},
};
use uuid::Uuid;

/// Creates a document type, a document and its first version.
fn seed_version(conn: &mut PgConnection, type_label: &str) -> Result<(Uuid, Uuid)> {
    let (document_type, _) = parsing::create_document_type(conn, type_label, None)?;
    let document_id = Uuid::new_v4();
    diesel::insert_into(documents::table)
        .values(&NewDocument {
            id: document_id,
            document_type_id: document_type.id,
            label: "seed".to_string(),
            original_name: "seed.txt".to_string(),
            content_type: Some("text/plain".to_string()),
        })
        .execute(conn)?;
    let version_id = Uuid::new_v4();
    diesel::insert_into(document_versions::table)
        .values(&NewDocumentVersion {
            id: version_id,
            document_id,
            version_number: 1,
            s3_key: format!("documents/{document_id}/v1/seed"),
            size_bytes: 4,
            checksum: "0".repeat(64),
        })
        .execute(conn)?;
    Ok((document_id, version_id))
}

#[tokio::test]
async fn page_content_is_one_to_one() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = TestApp::new().await? else {
        return Ok(());
    };

    let pool = app.state.pool.clone();
    tokio::task::spawn_blocking(move || -> Result<()> {
        let mut conn = pool.get()?;
        let (_, version_id) = seed_version(&mut conn, "Contracts")?;
        let pages = parsing::ensure_pages(&mut conn, version_id, 2)?;
        let first = pages[0].id;

        let created = parsing::create_page_content(&mut conn, first, "")?;
        assert_eq!(created.content, "");
        assert!(parsing::create_page_content(&mut conn, first, "again").is_err());

        let replaced = parsing::upsert_page_content(&mut conn, first, "signed")?;
        assert_eq!(replaced.id, created.id);
        let stored = parsing::page_content(&mut conn, first)?;
        assert_eq!(stored.map(|c| c.content).as_deref(), Some("signed"));
        assert!(parsing::page_content(&mut conn, pages[1].id)?.is_none());

        let stored = parsing::store_parsed_pages(&mut conn, version_id, &["only".to_string()])?;
        assert_eq!(stored.len(), 1);
        assert_eq!(parsing::page_contents_for_version(&mut conn, version_id)?.len(), 1);

        assert_eq!(parsing::delete_page_content(&mut conn, first)?, 1);
        assert!(parsing::page_content(&mut conn, first)?.is_none());

        let many = parsing::ensure_pages(&mut conn, version_id, 30_000)?;
        assert_eq!(many.len(), 30_000);
        assert_eq!(many.last().map(|page| page.page_number), Some(30_000));
        Ok(())
    })
    .await??;

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn settings_resolve_through_their_natural_key() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = TestApp::new().await? else {
        return Ok(());
    };

    let pool = app.state.pool.clone();
    tokio::task::spawn_blocking(move || -> Result<()> {
        let mut conn = pool.get()?;
        let (document_type, settings) =
            parsing::create_document_type(&mut conn, "Receipts", Some(false))?;
        assert!(!settings.auto_parsing);
        assert!(!parsing::auto_parsing_enabled(&mut conn, document_type.id)?);
        assert!(parsing::auto_parsing_enabled(&mut conn, Uuid::new_v4())?);

        let key = parsing::settings_natural_key(&mut conn, &settings)?;
        assert_eq!(key, ("Receipts".to_string(),));
        let found = parsing::settings_by_natural_key(&mut conn, (key.0.as_str(),))?;
        assert_eq!(found.id, settings.id);

        assert!(parsing::settings_by_natural_key(&mut conn, ("Missing",)).is_err());
        Ok(())
    })
    .await??;

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn parse_errors_list_oldest_first() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = TestApp::new().await? else {
        return Ok(());
    };

    let pool = app.state.pool.clone();
    tokio::task::spawn_blocking(move || -> Result<()> {
        use document_version_parse_errors::dsl as errors;

        let mut conn = pool.get()?;
        let (document_id, version_id) = seed_version(&mut conn, "Faxes")?;
        let now = Utc::now().naive_utc();

        for (offset, result) in [(-10, "late"), (-30, "early"), (-20, "middle")] {
            diesel::insert_into(errors::document_version_parse_errors)
                .values((
                    errors::id.eq(Uuid::new_v4()),
                    errors::document_version_id.eq(version_id),
                    errors::datetime_submitted.eq(now + Duration::seconds(offset)),
                    errors::result.eq(Some(result)),
                ))
                .execute(&mut conn)?;
        }
        parsing::record_parse_error(&mut conn, version_id, None)?;

        let listed: Vec<Option<String>> = parsing::parse_errors_for_version(&mut conn, version_id)?
            .into_iter()
            .map(|error| error.result)
            .collect();
        assert_eq!(
            listed,
            vec![
                Some("early".to_string()),
                Some("middle".to_string()),
                Some("late".to_string()),
                None,
            ]
        );
        assert_eq!(parsing::all_parse_errors(&mut conn)?.len(), 4);

        assert_eq!(parsing::clear_parse_errors(&mut conn, Some(version_id))?, 4);
        assert!(parsing::all_parse_errors(&mut conn)?.is_empty());

        let delay = TimeDelta::new(2, TimeDeltaUnit::Hours);
        let job = parsing::enqueue_parsing(&mut conn, document_id, version_id, Some(delay))?;
        assert!(job.run_after > now + Duration::minutes(119));
        let pending = jobs::pending_jobs(&mut conn, jobs::JOB_PARSE_DOCUMENT_VERSION)?;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, job.id);
        Ok(())
    })
    .await??;

    app.cleanup().await?;
    Ok(())
}
