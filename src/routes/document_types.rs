use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{DocumentType, DocumentTypeSettings},
    parsing,
    schema::{document_type_settings, document_types},
    state::AppState,
};

#[derive(Deserialize)]
pub struct CreateDocumentTypeRequest {
    pub label: String,
    pub auto_parsing: Option<bool>,
}

#[derive(Serialize)]
pub struct DocumentTypeResponse {
    pub id: Uuid,
    pub label: String,
    pub auto_parsing: bool,
}

#[derive(Serialize)]
pub struct ParsingSettingsResponse {
    pub id: Uuid,
    pub document_type_id: Uuid,
    pub auto_parsing: bool,
    pub natural_key: (String,),
}

impl ParsingSettingsResponse {
    fn new(settings: DocumentTypeSettings, document_type: &DocumentType) -> Self {
        Self {
            id: settings.id,
            document_type_id: settings.document_type_id,
            auto_parsing: settings.auto_parsing,
            natural_key: document_type.natural_key(),
        }
    }
}

pub async fn list_document_types(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<DocumentTypeResponse>>> {
    let mut conn = state.db()?;

    let rows: Vec<(DocumentType, Option<bool>)> = document_types::table
        .left_join(document_type_settings::table)
        .select((
            document_types::all_columns,
            document_type_settings::auto_parsing.nullable(),
        ))
        .order(document_types::label.asc())
        .load(&mut conn)?;

    let response = rows
        .into_iter()
        .map(|(document_type, auto_parsing)| DocumentTypeResponse {
            id: document_type.id,
            label: document_type.label,
            auto_parsing: auto_parsing.unwrap_or(parsing::DEFAULT_AUTO_PARSING),
        })
        .collect();

    Ok(Json(response))
}

pub async fn create_document_type(
    State(state): State<AppState>,
    Json(payload): Json<CreateDocumentTypeRequest>,
) -> AppResult<(StatusCode, Json<DocumentTypeResponse>)> {
    let label = payload.label.trim();
    if label.is_empty() {
        return Err(AppError::bad_request("label must not be empty"));
    }

    let mut conn = state.db()?;
    let (document_type, settings) =
        parsing::create_document_type(&mut conn, label, payload.auto_parsing)?;

    info!(
        document_type_id = %document_type.id,
        label = %document_type.label,
        auto_parsing = settings.auto_parsing,
        "document type created"
    );

    Ok((
        StatusCode::CREATED,
        Json(DocumentTypeResponse {
            id: document_type.id,
            label: document_type.label,
            auto_parsing: settings.auto_parsing,
        }),
    ))
}

pub async fn get_parsing_settings(
    State(state): State<AppState>,
    Path(document_type_id): Path<Uuid>,
) -> AppResult<Json<ParsingSettingsResponse>> {
    let mut conn = state.db()?;
    let document_type: DocumentType = document_types::table
        .find(document_type_id)
        .first(&mut conn)?;
    let settings = parsing::settings_for_type(&mut conn, document_type_id)?;

    Ok(Json(ParsingSettingsResponse::new(settings, &document_type)))
}

/// Only `auto_parsing` is editable; it cannot be nulled.
pub async fn update_parsing_settings(
    State(state): State<AppState>,
    Path(document_type_id): Path<Uuid>,
    Json(body): Json<Value>,
) -> AppResult<Json<ParsingSettingsResponse>> {
    let auto_parsing = match body.get("auto_parsing") {
        Some(Value::Bool(value)) => *value,
        Some(Value::Null) => return Err(AppError::bad_request("auto_parsing cannot be null")),
        Some(other) => {
            return Err(AppError::bad_request(format!(
                "auto_parsing must be a boolean, got {other}"
            )))
        }
        None => return Err(AppError::bad_request("auto_parsing is required")),
    };

    let mut conn = state.db()?;
    let document_type: DocumentType = document_types::table
        .find(document_type_id)
        .first(&mut conn)?;
    let settings = parsing::set_auto_parsing(&mut conn, document_type_id, auto_parsing)?;

    info!(
        document_type_id = %document_type_id,
        auto_parsing,
        "parsing settings updated"
    );

    Ok(Json(ParsingSettingsResponse::new(settings, &document_type)))
}
