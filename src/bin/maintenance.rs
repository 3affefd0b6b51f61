use std::env;

use anyhow::{bail, Context, Result};
use diesel::prelude::*;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use papertext::{
    auth::{password::hash_password, ROLE_ADMIN},
    config::AppConfig,
    db::{self, PgPool},
    jobs::{self, JOB_PARSE_DOCUMENT_VERSION},
    models::NewUser,
    parsing,
    schema::{document_page_contents, users},
};

const USAGE: &str = "Usage: maintenance <command>

Commands:
  delete-page-content [VERSION_ID]   remove stored page text, for one version or all
  clear-parse-errors [VERSION_ID]    remove recorded parse errors, for one version or all
  requeue-parsing                    put failed parse jobs back in the queue
  create-user USERNAME PASSWORD [ROLE]";

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let args: Vec<String> = env::args().skip(1).collect();
    let Some(command) = args.first() else {
        eprintln!("{USAGE}");
        std::process::exit(1);
    };
    let rest = &args[1..];

    match command.as_str() {
        "delete-page-content" => delete_page_content(optional_uuid(rest.first())?)?,
        "clear-parse-errors" => clear_parse_errors(optional_uuid(rest.first())?)?,
        "requeue-parsing" => requeue_parsing()?,
        "create-user" => match rest {
            [username, password] => create_user(username, password, ROLE_ADMIN)?,
            [username, password, role] => create_user(username, password, role)?,
            _ => {
                eprintln!("{USAGE}");
                std::process::exit(1);
            }
        },
        cmd => {
            eprintln!("Unknown command: {cmd}\n{USAGE}");
            std::process::exit(1);
        }
    }

    Ok(())
}

fn connect() -> Result<PgPool> {
    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "maintenance",
        database_url = %config.redacted_database_url(),
        pool_size = 1,
        "loaded backend configuration"
    );
    db::warn_on_unsupported_backend(&config);
    db::init_pool_with_size(&config.database_url, 1)
}

fn optional_uuid(value: Option<&String>) -> Result<Option<Uuid>> {
    value
        .map(|raw| Uuid::parse_str(raw).with_context(|| format!("invalid version id: {raw}")))
        .transpose()
}

fn delete_page_content(version_id: Option<Uuid>) -> Result<()> {
    let pool = connect()?;
    let mut conn = pool.get().context("failed to get database connection")?;

    let deleted = match version_id {
        Some(version_id) => parsing::delete_version_content(&mut conn, version_id)
            .context("failed to delete version content")?,
        None => diesel::delete(document_page_contents::table)
            .execute(&mut conn)
            .context("failed to delete page content")?,
    };

    println!("Deleted {deleted} page content records.");
    Ok(())
}

fn clear_parse_errors(version_id: Option<Uuid>) -> Result<()> {
    let pool = connect()?;
    let mut conn = pool.get().context("failed to get database connection")?;

    let deleted = parsing::clear_parse_errors(&mut conn, version_id)
        .context("failed to clear parse errors")?;

    println!("Cleared {deleted} parse errors.");
    Ok(())
}

fn requeue_parsing() -> Result<()> {
    let pool = connect()?;
    let mut conn = pool.get().context("failed to get database connection")?;

    let requeued = jobs::requeue_failed_jobs(&mut conn, JOB_PARSE_DOCUMENT_VERSION)
        .context("failed to requeue parse jobs")?;

    println!("Requeued {requeued} parse jobs.");
    Ok(())
}

fn create_user(username: &str, password: &str, role: &str) -> Result<()> {
    let username = username.trim();
    if username.is_empty() {
        bail!("username must not be empty");
    }

    let pool = connect()?;
    let mut conn = pool.get().context("failed to get database connection")?;

    let user = NewUser {
        id: Uuid::new_v4(),
        username: username.to_string(),
        password_hash: hash_password(password)?,
        role: role.to_string(),
    };
    diesel::insert_into(users::table)
        .values(&user)
        .execute(&mut conn)
        .context("failed to insert user")?;

    println!("Created user {} ({}) with role {}.", user.username, user.id, user.role);
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
