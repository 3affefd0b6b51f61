use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Html,
    Json,
};
use diesel::{dsl::count_star, pg::PgConnection, prelude::*};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{NewTag, Tag};
use crate::schema::{document_tags, tags};
use crate::state::AppState;
use crate::tags::widgets::TagFormWidget;
use crate::utils::json::{classify_nullable, is_hex_color, NullableValue};

#[derive(Deserialize)]
pub struct CreateTagRequest {
    pub label: String,
    pub color: Option<String>,
}

#[derive(Deserialize)]
pub struct SelectWidgetQuery {
    pub name: Option<String>,
    /// Comma separated tag ids to pre-select.
    pub selected: Option<String>,
}

#[derive(AsChangeset, Default)]
#[diesel(table_name = tags)]
struct UpdateTagChangeset<'a> {
    label: Option<&'a str>,
    color: Option<Option<&'a str>>,
}

#[derive(Serialize)]
pub struct TagCatalogEntry {
    pub id: Uuid,
    pub label: String,
    pub color: Option<String>,
    pub usage_count: i64,
}

impl TagCatalogEntry {
    fn new(tag: Tag, usage_count: i64) -> Self {
        Self {
            id: tag.id,
            label: tag.label,
            color: tag.color,
            usage_count,
        }
    }
}

fn usage_count(conn: &mut PgConnection, tag_id: Uuid) -> QueryResult<i64> {
    document_tags::table
        .filter(document_tags::tag_id.eq(tag_id))
        .select(count_star())
        .first(conn)
}

fn validate_color(color: &str) -> AppResult<()> {
    if is_hex_color(color) {
        Ok(())
    } else {
        Err(AppError::bad_request("color must look like #rrggbb"))
    }
}

pub async fn list_tags(State(state): State<AppState>) -> AppResult<Json<Vec<TagCatalogEntry>>> {
    let mut conn = state.db()?;

    let tag_list: Vec<Tag> = tags::table.order(tags::label.asc()).load(&mut conn)?;

    let usage_rows: Vec<(Uuid, i64)> = document_tags::table
        .group_by(document_tags::tag_id)
        .select((document_tags::tag_id, count_star()))
        .load(&mut conn)?;

    let usage_map: HashMap<Uuid, i64> = usage_rows.into_iter().collect();

    let response = tag_list
        .into_iter()
        .map(|tag| {
            let count = usage_map.get(&tag.id).copied().unwrap_or(0);
            TagCatalogEntry::new(tag, count)
        })
        .collect();

    Ok(Json(response))
}

pub async fn create_tag(
    State(state): State<AppState>,
    Json(payload): Json<CreateTagRequest>,
) -> AppResult<Json<TagCatalogEntry>> {
    let label = payload.label.trim();
    if label.is_empty() {
        return Err(AppError::bad_request("label must not be empty"));
    }
    let color = payload
        .color
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if let Some(color) = color {
        validate_color(color)?;
    }

    let mut conn = state.db()?;
    let new_tag = NewTag {
        id: Uuid::new_v4(),
        label: label.to_string(),
        color: color.map(str::to_string),
    };

    let tag: Tag = match diesel::insert_into(tags::table)
        .values(&new_tag)
        .get_result(&mut conn)
    {
        Ok(tag) => tag,
        Err(diesel::result::Error::DatabaseError(
            diesel::result::DatabaseErrorKind::UniqueViolation,
            _,
        )) => {
            return Err(AppError::bad_request("tag label already exists"));
        }
        Err(err) => return Err(AppError::from(err)),
    };

    info!(tag_id = %tag.id, label = %tag.label, "tag created");
    Ok(Json(TagCatalogEntry::new(tag, 0)))
}

pub async fn update_tag(
    State(state): State<AppState>,
    Path(tag_id): Path<Uuid>,
    Json(body): Json<Value>,
) -> AppResult<Json<TagCatalogEntry>> {
    let mut conn = state.db()?;
    let existing: Tag = tags::table.find(tag_id).first(&mut conn)?;
    let label_class = classify_nullable(body.get("label")).map_err(AppError::bad_request)?;
    let color_class = classify_nullable(body.get("color")).map_err(AppError::bad_request)?;

    let mut new_label: Option<String> = None;
    match label_class {
        NullableValue::Omitted => {}
        NullableValue::Null => {
            return Err(AppError::bad_request("label cannot be null"));
        }
        NullableValue::String(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                return Err(AppError::bad_request("label must not be empty"));
            }
            if trimmed != existing.label {
                let duplicate = tags::table
                    .filter(tags::label.eq(trimmed))
                    .filter(tags::id.ne(tag_id))
                    .first::<Tag>(&mut conn)
                    .optional()?;
                if duplicate.is_some() {
                    return Err(AppError::bad_request("tag label already exists"));
                }
                new_label = Some(trimmed.to_string());
            }
        }
    }

    let mut color_change: Option<Option<String>> = None;
    match color_class {
        NullableValue::Omitted => {}
        NullableValue::Null => {
            if existing.color.is_some() {
                color_change = Some(None);
            }
        }
        NullableValue::String(value) => {
            let trimmed = value.trim();
            validate_color(trimmed)?;
            if existing.color.as_deref() != Some(trimmed) {
                color_change = Some(Some(trimmed.to_string()));
            }
        }
    }

    let tag = if new_label.is_none() && color_change.is_none() {
        existing
    } else {
        let changeset = UpdateTagChangeset {
            label: new_label.as_deref(),
            color: color_change.as_ref().map(|opt| opt.as_deref()),
        };
        diesel::update(tags::table.find(tag_id))
            .set(&changeset)
            .get_result(&mut conn)?
    };

    let count = usage_count(&mut conn, tag_id)?;
    Ok(Json(TagCatalogEntry::new(tag, count)))
}

pub async fn delete_tag(
    State(state): State<AppState>,
    Path(tag_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let mut conn = state.db()?;

    if usage_count(&mut conn, tag_id)? > 0 {
        return Err(AppError::bad_request(
            "cannot delete tag that is still assigned to documents",
        ));
    }

    let deleted = diesel::delete(tags::table.find(tag_id)).execute(&mut conn)?;
    if deleted == 0 {
        return Err(AppError::not_found());
    }

    Ok(StatusCode::NO_CONTENT)
}

/// The tag multi-select form control, every option tagged with its colour.
pub async fn select_widget(
    State(state): State<AppState>,
    Query(query): Query<SelectWidgetQuery>,
) -> AppResult<Html<String>> {
    let selected = parse_id_list(query.selected.as_deref())?;
    let mut conn = state.db()?;

    let tag_list: Vec<Tag> = tags::table.order(tags::label.asc()).load(&mut conn)?;
    let widget = TagFormWidget::from_tags(query.name.as_deref().unwrap_or("tags"), &tag_list);

    Ok(Html(widget.render(&mut *conn, &selected)?))
}

fn parse_id_list(raw: Option<&str>) -> AppResult<Vec<Uuid>> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| {
            Uuid::parse_str(value)
                .map_err(|_| AppError::bad_request(format!("invalid tag id: {value}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_comma_separated_ids() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let parsed = parse_id_list(Some(&format!("{a}, {b},"))).unwrap();
        assert_eq!(parsed, vec![a, b]);
        assert!(parse_id_list(None).unwrap().is_empty());
        assert!(parse_id_list(Some("nope")).is_err());
    }
}
