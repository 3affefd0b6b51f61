use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse},
    Json,
};
use chrono::NaiveDateTime;
use diesel::{pg::PgConnection, prelude::*};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    auth::AuthenticatedUser,
    error::{AppError, AppResult},
    literals::{ListMode, MAX_PAGE_NUMBER},
    models::{
        Document, DocumentType, DocumentVersion, DocumentVersionParseError, NewDocument,
        NewDocumentTag, NewDocumentVersion, Tag,
    },
    parsing,
    schema::{document_tags, document_types, document_versions, documents, tags},
    state::AppState,
    tags::{attached_tags, widgets::widget_document_tags},
};

#[derive(Serialize)]
pub struct DocumentResponse {
    pub id: Uuid,
    pub document_type_id: Uuid,
    pub label: String,
    pub original_name: String,
    pub content_type: Option<String>,
    pub uploaded_at: NaiveDateTime,
    pub versions: Vec<DocumentVersionResponse>,
}

#[derive(Serialize)]
pub struct DocumentVersionResponse {
    pub id: Uuid,
    pub version_number: i32,
    pub size_bytes: i64,
    pub checksum: String,
    pub created_at: NaiveDateTime,
    pub parsing_queued: bool,
}

#[derive(Serialize)]
pub struct PageContentResponse {
    pub page_id: Uuid,
    pub page_number: i32,
    pub content: Option<String>,
}

#[derive(Serialize)]
#[serde(untagged)]
pub enum VersionContentResponse {
    Items { pages: Vec<PageContentResponse> },
    List { content: String },
}

#[derive(Serialize)]
pub struct ParseErrorResponse {
    pub id: Uuid,
    pub document_version_id: Uuid,
    pub datetime_submitted: NaiveDateTime,
    pub result: Option<String>,
}

impl From<DocumentVersionParseError> for ParseErrorResponse {
    fn from(value: DocumentVersionParseError) -> Self {
        Self {
            id: value.id,
            document_version_id: value.document_version_id,
            datetime_submitted: value.datetime_submitted,
            result: value.result,
        }
    }
}

#[derive(Serialize)]
pub struct ParseQueuedResponse {
    pub job_id: Uuid,
    pub document_version_id: Uuid,
}

#[derive(Deserialize)]
pub struct ContentQuery {
    #[serde(rename = "_list_mode")]
    pub list_mode: Option<String>,
}

#[derive(Deserialize)]
pub struct PageContentRequest {
    #[serde(default)]
    pub content: String,
}

#[derive(Deserialize)]
pub struct AssignTagsRequest {
    pub tag_ids: Vec<Uuid>,
}

struct UploadedFile {
    bytes: Vec<u8>,
    original_name: String,
    content_type: Option<String>,
}

#[derive(Default)]
struct UploadForm {
    file: Option<UploadedFile>,
    document_type_id: Option<Uuid>,
    label: Option<String>,
}

async fn read_upload_form(mut multipart: Multipart) -> AppResult<UploadForm> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await.map_err(|err| {
        error!(error = %err, "invalid multipart data");
        AppError::bad_request(format!("invalid multipart data: {err}"))
    })? {
        let name = field.name().map(|n| n.to_string());
        match name.as_deref() {
            Some("file") => {
                let original_name = field
                    .file_name()
                    .map(|n| n.to_string())
                    .ok_or_else(|| AppError::bad_request("filename is required"))?;
                let content_type = field
                    .content_type()
                    .map(|mime| mime.to_string())
                    .or_else(|| {
                        mime_guess::from_path(&original_name)
                            .first()
                            .map(|mime| mime.essence_str().to_string())
                    });
                let data = field.bytes().await.map_err(|err| {
                    error!(error = %err, "failed to read file bytes");
                    AppError::bad_request(format!("failed to read file bytes: {err}"))
                })?;
                form.file = Some(UploadedFile {
                    bytes: data.to_vec(),
                    original_name,
                    content_type,
                });
            }
            Some("document_type_id") => {
                let value = field
                    .text()
                    .await
                    .map_err(|err| AppError::bad_request(format!("invalid document type: {err}")))?;
                let parsed = Uuid::parse_str(value.trim())
                    .map_err(|_| AppError::bad_request("document_type_id must be a valid UUID"))?;
                form.document_type_id = Some(parsed);
            }
            Some("label") => {
                let value = field
                    .text()
                    .await
                    .map_err(|err| AppError::bad_request(format!("invalid label: {err}")))?;
                let trimmed = value.trim();
                if !trimmed.is_empty() {
                    form.label = Some(trimmed.to_string());
                }
            }
            _ => {}
        }
    }

    Ok(form)
}

fn require_file(file: Option<UploadedFile>) -> AppResult<UploadedFile> {
    let file = file.ok_or_else(|| {
        error!("upload rejected: missing file field");
        AppError::bad_request("file field is required")
    })?;
    if file.bytes.is_empty() {
        error!("upload rejected: empty file payload");
        return Err(AppError::bad_request("file field must not be empty"));
    }
    Ok(file)
}

pub async fn upload_document(
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<DocumentResponse>)> {
    let form = read_upload_form(multipart).await?;
    let file = require_file(form.file)?;
    let document_type_id = form
        .document_type_id
        .ok_or_else(|| AppError::bad_request("document_type_id is required"))?;

    {
        let mut conn = state.db()?;
        document_types::table
            .find(document_type_id)
            .first::<DocumentType>(&mut conn)
            .optional()?
            .ok_or_else(|| AppError::bad_request("document type does not exist"))?;
    }

    let document_id = Uuid::new_v4();
    let new_document = NewDocument {
        id: document_id,
        document_type_id,
        label: form
            .label
            .unwrap_or_else(|| derive_document_label(&file.original_name)),
        original_name: file.original_name.clone(),
        content_type: file.content_type.clone(),
    };

    let s3_key = format!("documents/{document_id}/v1/{}", Uuid::new_v4());
    store_bytes(&state, &s3_key, &file).await?;

    let inserted = state.db().and_then(|mut conn| {
        conn.transaction(|conn| {
            let document: Document = diesel::insert_into(documents::table)
                .values(&new_document)
                .get_result(conn)?;
            let version = insert_version(conn, document_id, 1, &s3_key, &file.bytes)?;
            Ok::<_, diesel::result::Error>((document, version))
        })
        .map_err(AppError::from)
    });
    let (document, version) = match inserted {
        Ok(rows) => rows,
        Err(err) => {
            discard_object(&state, &s3_key).await;
            return Err(err);
        }
    };

    let parsing_queued = queue_auto_parsing(&state, &document, &version);
    info!(
        document_id = %document.id,
        document_version_id = %version.id,
        original_name = %document.original_name,
        parsing_queued,
        "document upload succeeded"
    );

    let versions = vec![to_version_response(version, parsing_queued)];
    Ok((StatusCode::CREATED, Json(to_document_response(document, versions))))
}

pub async fn upload_version(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<DocumentVersionResponse>)> {
    let form = read_upload_form(multipart).await?;
    let file = require_file(form.file)?;

    let (document, next_number) = {
        let mut conn = state.db()?;
        let document: Document = documents::table.find(document_id).first(&mut conn)?;
        let current: Option<i32> = document_versions::table
            .filter(document_versions::document_id.eq(document_id))
            .select(diesel::dsl::max(document_versions::version_number))
            .first(&mut conn)?;
        (document, current.unwrap_or(0) + 1)
    };

    let s3_key = format!("documents/{document_id}/v{next_number}/{}", Uuid::new_v4());
    store_bytes(&state, &s3_key, &file).await?;

    let inserted = state.db().and_then(|mut conn| {
        insert_version(&mut conn, document_id, next_number, &s3_key, &file.bytes)
            .map_err(AppError::from)
    });
    let version = match inserted {
        Ok(version) => version,
        Err(err) => {
            discard_object(&state, &s3_key).await;
            return Err(err);
        }
    };

    let parsing_queued = queue_auto_parsing(&state, &document, &version);
    info!(
        document_id = %document_id,
        document_version_id = %version.id,
        version_number = version.version_number,
        parsing_queued,
        "document version uploaded"
    );

    Ok((
        StatusCode::CREATED,
        Json(to_version_response(version, parsing_queued)),
    ))
}

pub async fn get_document(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
) -> AppResult<Json<DocumentResponse>> {
    let mut conn = state.db()?;
    let document: Document = documents::table.find(document_id).first(&mut conn)?;
    let versions: Vec<DocumentVersion> = document_versions::table
        .filter(document_versions::document_id.eq(document_id))
        .order(document_versions::version_number.asc())
        .load(&mut conn)?;

    let versions = versions
        .into_iter()
        .map(|version| to_version_response(version, false))
        .collect();
    Ok(Json(to_document_response(document, versions)))
}

pub async fn version_content(
    State(state): State<AppState>,
    Path((document_id, version_id)): Path<(Uuid, Uuid)>,
    Query(query): Query<ContentQuery>,
) -> AppResult<Json<VersionContentResponse>> {
    let mut conn = state.db()?;
    load_version(&mut conn, document_id, version_id)?;

    let response = match ListMode::from_param(query.list_mode.as_deref()) {
        ListMode::Items => VersionContentResponse::Items {
            pages: parsing::page_contents_for_version(&mut conn, version_id)?
                .into_iter()
                .map(|(page, content)| PageContentResponse {
                    page_id: page.id,
                    page_number: page.page_number,
                    content: content.map(|c| c.content),
                })
                .collect(),
        },
        ListMode::List => VersionContentResponse::List {
            content: parsing::version_content(&mut conn, version_id)?,
        },
    };

    Ok(Json(response))
}

/// Lets an external parser write page text directly; the page row is created
/// when it does not exist yet.
pub async fn put_page_content(
    State(state): State<AppState>,
    Path((document_id, version_id, page_number)): Path<(Uuid, Uuid, i32)>,
    Json(payload): Json<PageContentRequest>,
) -> AppResult<Json<PageContentResponse>> {
    if page_number < 1 {
        return Err(AppError::bad_request("page numbers start at 1"));
    }
    if page_number > MAX_PAGE_NUMBER {
        return Err(AppError::bad_request(format!(
            "page numbers stop at {MAX_PAGE_NUMBER}"
        )));
    }

    let mut conn = state.db()?;
    load_version(&mut conn, document_id, version_id)?;

    let content = conn.transaction(|conn| {
        let page = match parsing::find_page(conn, version_id, page_number).optional()? {
            Some(page) => page,
            None => {
                let pages = parsing::ensure_pages(conn, version_id, page_number as usize)?;
                pages
                    .into_iter()
                    .find(|page| page.page_number == page_number)
                    .ok_or(diesel::result::Error::NotFound)?
            }
        };
        let content = parsing::upsert_page_content(conn, page.id, &payload.content)?;
        Ok::<_, diesel::result::Error>(PageContentResponse {
            page_id: page.id,
            page_number: page.page_number,
            content: Some(content.content),
        })
    })?;

    Ok(Json(content))
}

pub async fn list_parse_errors(
    State(state): State<AppState>,
    Path((document_id, version_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<Vec<ParseErrorResponse>>> {
    let mut conn = state.db()?;
    load_version(&mut conn, document_id, version_id)?;

    let errors = parsing::parse_errors_for_version(&mut conn, version_id)?;
    Ok(Json(errors.into_iter().map(ParseErrorResponse::from).collect()))
}

pub async fn submit_parsing(
    State(state): State<AppState>,
    Path((document_id, version_id)): Path<(Uuid, Uuid)>,
) -> AppResult<(StatusCode, Json<ParseQueuedResponse>)> {
    let mut conn = state.db()?;
    load_version(&mut conn, document_id, version_id)?;

    let job = parsing::enqueue_parsing(&mut conn, document_id, version_id, None)
        .map_err(AppError::internal)?;
    info!(document_id = %document_id, document_version_id = %version_id, job_id = %job.id, "parsing submitted");

    Ok((
        StatusCode::ACCEPTED,
        Json(ParseQueuedResponse {
            job_id: job.id,
            document_version_id: version_id,
        }),
    ))
}

pub async fn assign_tags(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
    user: AuthenticatedUser,
    Json(payload): Json<AssignTagsRequest>,
) -> AppResult<impl IntoResponse> {
    if payload.tag_ids.is_empty() {
        return Err(AppError::bad_request("tag_ids must not be empty"));
    }

    let mut conn = state.db()?;

    documents::table
        .find(document_id)
        .first::<Document>(&mut conn)?;

    let existing_tags: Vec<Tag> = tags::table
        .filter(tags::id.eq_any(&payload.tag_ids))
        .load(&mut conn)?;
    if existing_tags.len() != payload.tag_ids.len() {
        return Err(AppError::bad_request("one or more tags do not exist"));
    }

    let new_tags: Vec<NewDocumentTag> = payload
        .tag_ids
        .iter()
        .map(|tag_id| NewDocumentTag {
            document_id,
            tag_id: *tag_id,
            assigned_by: Some(user.user_id),
        })
        .collect();

    diesel::insert_into(document_tags::table)
        .values(&new_tags)
        .on_conflict_do_nothing()
        .execute(&mut conn)?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn remove_tag(
    State(state): State<AppState>,
    Path((document_id, tag_id)): Path<(Uuid, Uuid)>,
) -> AppResult<impl IntoResponse> {
    let mut conn = state.db()?;
    diesel::delete(
        document_tags::table
            .filter(document_tags::document_id.eq(document_id))
            .filter(document_tags::tag_id.eq(tag_id)),
    )
    .execute(&mut conn)?;

    Ok(StatusCode::NO_CONTENT)
}

/// HTML list of the document's tags the caller may view.
pub async fn document_tags_widget(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<Html<String>> {
    let attached = {
        let mut conn = state.db()?;
        documents::table
            .find(document_id)
            .first::<Document>(&mut conn)?;
        attached_tags(&mut conn, document_id)?
    };

    Ok(Html(widget_document_tags(
        state.acl.as_ref(),
        &user,
        attached,
    )?))
}

fn load_version(
    conn: &mut PgConnection,
    document_id: Uuid,
    version_id: Uuid,
) -> AppResult<DocumentVersion> {
    let version: DocumentVersion = document_versions::table
        .find(version_id)
        .first(conn)?;
    if version.document_id != document_id {
        return Err(AppError::not_found());
    }
    Ok(version)
}

fn insert_version(
    conn: &mut PgConnection,
    document_id: Uuid,
    version_number: i32,
    s3_key: &str,
    bytes: &[u8],
) -> QueryResult<DocumentVersion> {
    diesel::insert_into(document_versions::table)
        .values(&NewDocumentVersion {
            id: Uuid::new_v4(),
            document_id,
            version_number,
            s3_key: s3_key.to_string(),
            size_bytes: bytes.len() as i64,
            checksum: hex::encode(Sha256::digest(bytes)),
        })
        .get_result(conn)
}

async fn store_bytes(state: &AppState, s3_key: &str, file: &UploadedFile) -> AppResult<()> {
    state
        .storage
        .put_object(s3_key, file.bytes.clone(), file.content_type.clone())
        .await
        .map_err(|err| {
            error!(error = %err, key = %s3_key, "failed to store document");
            AppError::internal(format!("failed to store document: {err}"))
        })
}

/// Removes an object whose database rows could not be written.
async fn discard_object(state: &AppState, s3_key: &str) {
    if let Err(err) = state.storage.delete_object(s3_key).await {
        warn!(key = %s3_key, error = %err, "failed to remove orphaned object");
    }
}

/// Queues parsing when the document type asks for it. Failures only log: the
/// upload itself already succeeded.
fn queue_auto_parsing(state: &AppState, document: &Document, version: &DocumentVersion) -> bool {
    let mut conn = match state.db() {
        Ok(conn) => conn,
        Err(err) => {
            warn!(document_id = %document.id, error = %err, "failed to queue parsing due to pool error");
            return false;
        }
    };

    match parsing::auto_parsing_enabled(&mut conn, document.document_type_id) {
        Ok(true) => {}
        Ok(false) => return false,
        Err(err) => {
            warn!(document_id = %document.id, error = %err, "failed to read parsing settings");
            return false;
        }
    }

    let delay = Some(state.config.auto_parsing_delay);
    match parsing::enqueue_parsing(&mut conn, document.id, version.id, delay) {
        Ok(_) => true,
        Err(err) => {
            warn!(document_id = %document.id, error = %err, "failed to enqueue parse job");
            false
        }
    }
}

fn to_document_response(
    document: Document,
    versions: Vec<DocumentVersionResponse>,
) -> DocumentResponse {
    DocumentResponse {
        id: document.id,
        document_type_id: document.document_type_id,
        label: document.label,
        original_name: document.original_name,
        content_type: document.content_type,
        uploaded_at: document.uploaded_at,
        versions,
    }
}

fn to_version_response(version: DocumentVersion, parsing_queued: bool) -> DocumentVersionResponse {
    DocumentVersionResponse {
        id: version.id,
        version_number: version.version_number,
        size_bytes: version.size_bytes,
        checksum: version.checksum,
        created_at: version.created_at,
        parsing_queued,
    }
}

fn derive_document_label(original: &str) -> String {
    let trimmed = original.trim();
    let stem = match trimmed.rfind('.') {
        Some(idx) if idx > 0 => &trimmed[..idx],
        _ => trimmed,
    };
    if stem.is_empty() {
        "Untitled".to_string()
    } else {
        stem.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::derive_document_label;

    #[test]
    fn label_drops_the_extension() {
        assert_eq!(derive_document_label("invoice-2024.pdf"), "invoice-2024");
        assert_eq!(derive_document_label("archive.tar.gz"), "archive.tar");
        assert_eq!(derive_document_label(".env"), ".env");
        assert_eq!(derive_document_label("  "), "Untitled");
    }
}
