//! Storage for parsing results: page text, per-type settings and the
//! parse error log.

pub mod parser;

use chrono::{NaiveDateTime, Utc};
use diesel::pg::upsert::excluded;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use serde_json::json;
use uuid::Uuid;

use crate::{
    jobs::{enqueue_job, JobQueueResult, JOB_PARSE_DOCUMENT_VERSION},
    literals::TimeDelta,
    models::{
        DocumentPage, DocumentPageContent, DocumentType, DocumentTypeSettings,
        DocumentVersionParseError, Job, NewDocumentPage, NewDocumentPageContent,
        NewDocumentType, NewDocumentTypeSettings, NewDocumentVersionParseError,
    },
    schema::{
        document_page_contents, document_pages, document_type_settings, document_types,
        document_version_parse_errors,
    },
};

pub const DEFAULT_AUTO_PARSING: bool = true;

/// Page rows per insert statement; three binds each keeps a batch under the
/// Postgres limit of 65535 parameters.
const PAGE_INSERT_CHUNK: usize = 10_000;

// Page content

/// Inserts content for a page that has none yet; a second insert for the same
/// page fails with a unique violation.
pub fn create_page_content(
    conn: &mut PgConnection,
    document_page_id: Uuid,
    content: &str,
) -> QueryResult<DocumentPageContent> {
    diesel::insert_into(document_page_contents::table)
        .values(&NewDocumentPageContent {
            id: Uuid::new_v4(),
            document_page_id,
            content: content.to_string(),
        })
        .get_result(conn)
}

pub fn upsert_page_content(
    conn: &mut PgConnection,
    document_page_id: Uuid,
    content: &str,
) -> QueryResult<DocumentPageContent> {
    diesel::insert_into(document_page_contents::table)
        .values(&NewDocumentPageContent {
            id: Uuid::new_v4(),
            document_page_id,
            content: content.to_string(),
        })
        .on_conflict(document_page_contents::document_page_id)
        .do_update()
        .set(document_page_contents::content.eq(excluded(document_page_contents::content)))
        .get_result(conn)
}

pub fn page_content(
    conn: &mut PgConnection,
    document_page_id: Uuid,
) -> QueryResult<Option<DocumentPageContent>> {
    document_page_contents::table
        .filter(document_page_contents::document_page_id.eq(document_page_id))
        .first(conn)
        .optional()
}

pub fn delete_page_content(conn: &mut PgConnection, document_page_id: Uuid) -> QueryResult<usize> {
    diesel::delete(
        document_page_contents::table
            .filter(document_page_contents::document_page_id.eq(document_page_id)),
    )
    .execute(conn)
}

/// Every page of a version with its content, if parsed, in page order.
pub fn page_contents_for_version(
    conn: &mut PgConnection,
    document_version_id: Uuid,
) -> QueryResult<Vec<(DocumentPage, Option<DocumentPageContent>)>> {
    document_pages::table
        .left_join(document_page_contents::table)
        .filter(document_pages::document_version_id.eq(document_version_id))
        .order(document_pages::page_number.asc())
        .select((
            document_pages::all_columns,
            document_page_contents::all_columns.nullable(),
        ))
        .load(conn)
}

/// The whole text of a version, pages separated by a blank line.
pub fn version_content(conn: &mut PgConnection, document_version_id: Uuid) -> QueryResult<String> {
    let pages = page_contents_for_version(conn, document_version_id)?;
    Ok(join_page_text(
        pages
            .iter()
            .map(|(_, content)| content.as_ref().map(|c| c.content.as_str())),
    ))
}

fn join_page_text<'a>(pages: impl Iterator<Item = Option<&'a str>>) -> String {
    pages
        .map(|content| content.unwrap_or_default().trim_end())
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn find_page(
    conn: &mut PgConnection,
    document_version_id: Uuid,
    page_number: i32,
) -> QueryResult<DocumentPage> {
    document_pages::table
        .filter(document_pages::document_version_id.eq(document_version_id))
        .filter(document_pages::page_number.eq(page_number))
        .first(conn)
}

/// Makes sure pages `1..=count` exist for the version and returns them in order.
pub fn ensure_pages(
    conn: &mut PgConnection,
    document_version_id: Uuid,
    count: usize,
) -> QueryResult<Vec<DocumentPage>> {
    let new_pages: Vec<NewDocumentPage> = (1..=count as i32)
        .map(|page_number| NewDocumentPage {
            id: Uuid::new_v4(),
            document_version_id,
            page_number,
        })
        .collect();

    for chunk in new_pages.chunks(PAGE_INSERT_CHUNK) {
        diesel::insert_into(document_pages::table)
            .values(chunk)
            .on_conflict((
                document_pages::document_version_id,
                document_pages::page_number,
            ))
            .do_nothing()
            .execute(conn)?;
    }

    document_pages::table
        .filter(document_pages::document_version_id.eq(document_version_id))
        .filter(document_pages::page_number.le(count as i32))
        .order(document_pages::page_number.asc())
        .load(conn)
}

/// Writes the parser output for a version in a single transaction. Pages past
/// the new page count are dropped along with their content.
pub fn store_parsed_pages(
    conn: &mut PgConnection,
    document_version_id: Uuid,
    texts: &[String],
) -> QueryResult<Vec<DocumentPageContent>> {
    conn.transaction(|conn| {
        diesel::delete(
            document_pages::table
                .filter(document_pages::document_version_id.eq(document_version_id))
                .filter(document_pages::page_number.gt(texts.len() as i32)),
        )
        .execute(conn)?;

        let pages = ensure_pages(conn, document_version_id, texts.len())?;
        pages
            .iter()
            .zip(texts)
            .map(|(page, text)| upsert_page_content(conn, page.id, text))
            .collect()
    })
}

pub fn delete_version_content(
    conn: &mut PgConnection,
    document_version_id: Uuid,
) -> QueryResult<usize> {
    let page_ids = document_pages::table
        .filter(document_pages::document_version_id.eq(document_version_id))
        .select(document_pages::id);
    diesel::delete(
        document_page_contents::table.filter(document_page_contents::document_page_id.eq_any(page_ids)),
    )
    .execute(conn)
}

// Document type settings

/// Creates a document type together with its parsing settings.
pub fn create_document_type(
    conn: &mut PgConnection,
    label: &str,
    auto_parsing: Option<bool>,
) -> QueryResult<(DocumentType, DocumentTypeSettings)> {
    conn.transaction(|conn| {
        let document_type: DocumentType = diesel::insert_into(document_types::table)
            .values(&NewDocumentType {
                id: Uuid::new_v4(),
                label: label.to_string(),
            })
            .get_result(conn)?;
        let settings = create_type_settings(
            conn,
            document_type.id,
            auto_parsing.unwrap_or(DEFAULT_AUTO_PARSING),
        )?;
        Ok((document_type, settings))
    })
}

pub fn create_type_settings(
    conn: &mut PgConnection,
    document_type_id: Uuid,
    auto_parsing: bool,
) -> QueryResult<DocumentTypeSettings> {
    diesel::insert_into(document_type_settings::table)
        .values(&NewDocumentTypeSettings {
            id: Uuid::new_v4(),
            document_type_id,
            auto_parsing,
        })
        .get_result(conn)
}

pub fn settings_for_type(
    conn: &mut PgConnection,
    document_type_id: Uuid,
) -> QueryResult<DocumentTypeSettings> {
    document_type_settings::table
        .filter(document_type_settings::document_type_id.eq(document_type_id))
        .first(conn)
}

pub fn set_auto_parsing(
    conn: &mut PgConnection,
    document_type_id: Uuid,
    auto_parsing: bool,
) -> QueryResult<DocumentTypeSettings> {
    diesel::update(
        document_type_settings::table
            .filter(document_type_settings::document_type_id.eq(document_type_id)),
    )
    .set(document_type_settings::auto_parsing.eq(auto_parsing))
    .get_result(conn)
}

/// Types created before their settings row existed fall back to the default.
pub fn auto_parsing_enabled(conn: &mut PgConnection, document_type_id: Uuid) -> QueryResult<bool> {
    Ok(document_type_settings::table
        .filter(document_type_settings::document_type_id.eq(document_type_id))
        .select(document_type_settings::auto_parsing)
        .first(conn)
        .optional()?
        .unwrap_or(DEFAULT_AUTO_PARSING))
}

/// Settings share the natural key of their document type.
pub fn settings_natural_key(
    conn: &mut PgConnection,
    settings: &DocumentTypeSettings,
) -> QueryResult<(String,)> {
    let document_type: DocumentType = document_types::table
        .find(settings.document_type_id)
        .first(conn)?;
    Ok(document_type.natural_key())
}

pub fn settings_by_natural_key(
    conn: &mut PgConnection,
    natural_key: (&str,),
) -> QueryResult<DocumentTypeSettings> {
    document_type_settings::table
        .inner_join(document_types::table)
        .filter(document_types::label.eq(natural_key.0))
        .select(document_type_settings::all_columns)
        .first(conn)
}

// Parse errors

pub fn record_parse_error(
    conn: &mut PgConnection,
    document_version_id: Uuid,
    result: Option<&str>,
) -> QueryResult<DocumentVersionParseError> {
    diesel::insert_into(document_version_parse_errors::table)
        .values(&NewDocumentVersionParseError {
            id: Uuid::new_v4(),
            document_version_id,
            result: result.map(str::to_string),
        })
        .get_result(conn)
}

/// Oldest first.
pub fn parse_errors_for_version(
    conn: &mut PgConnection,
    document_version_id: Uuid,
) -> QueryResult<Vec<DocumentVersionParseError>> {
    document_version_parse_errors::table
        .filter(document_version_parse_errors::document_version_id.eq(document_version_id))
        .order((
            document_version_parse_errors::datetime_submitted.asc(),
            document_version_parse_errors::id.asc(),
        ))
        .load(conn)
}

pub fn all_parse_errors(conn: &mut PgConnection) -> QueryResult<Vec<DocumentVersionParseError>> {
    document_version_parse_errors::table
        .order((
            document_version_parse_errors::datetime_submitted.asc(),
            document_version_parse_errors::id.asc(),
        ))
        .load(conn)
}

pub fn clear_parse_errors(
    conn: &mut PgConnection,
    document_version_id: Option<Uuid>,
) -> QueryResult<usize> {
    match document_version_id {
        Some(version_id) => diesel::delete(
            document_version_parse_errors::table
                .filter(document_version_parse_errors::document_version_id.eq(version_id)),
        )
        .execute(conn),
        None => diesel::delete(document_version_parse_errors::table).execute(conn),
    }
}

// Queueing

pub fn enqueue_parsing(
    conn: &mut PgConnection,
    document_id: Uuid,
    document_version_id: Uuid,
    delay: Option<TimeDelta>,
) -> JobQueueResult<Job> {
    let run_after = delay.map(|delta| run_after(Utc::now().naive_utc(), delta));
    enqueue_job(
        conn,
        JOB_PARSE_DOCUMENT_VERSION,
        json!({
            "document_id": document_id,
            "document_version_id": document_version_id,
        }),
        run_after,
    )
}

fn run_after(now: NaiveDateTime, delta: TimeDelta) -> NaiveDateTime {
    i64::try_from(delta.as_duration().as_secs())
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .and_then(|offset| now.checked_add_signed(offset))
        .unwrap_or(NaiveDateTime::MAX)
}
