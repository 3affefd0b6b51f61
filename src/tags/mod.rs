//! Tag lookups shared by the HTTP routes and the HTML widgets.

pub mod widgets;

use std::collections::HashMap;

use diesel::pg::PgConnection;
use diesel::prelude::*;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::Tag,
    schema::{document_tags, tags},
};

/// Resolves a tag by primary key.
pub trait TagLookup {
    fn get_tag(&mut self, tag_id: Uuid) -> AppResult<Tag>;
}

impl TagLookup for PgConnection {
    fn get_tag(&mut self, tag_id: Uuid) -> AppResult<Tag> {
        Ok(tags::table.find(tag_id).first(self)?)
    }
}

impl TagLookup for HashMap<Uuid, Tag> {
    fn get_tag(&mut self, tag_id: Uuid) -> AppResult<Tag> {
        self.get(&tag_id).cloned().ok_or_else(AppError::not_found)
    }
}

/// Tags attached to a document, ordered by label.
pub fn attached_tags(conn: &mut PgConnection, document_id: Uuid) -> QueryResult<Vec<Tag>> {
    tags::table
        .inner_join(document_tags::table)
        .filter(document_tags::document_id.eq(document_id))
        .order(tags::label.asc())
        .select(tags::all_columns)
        .load(conn)
}
