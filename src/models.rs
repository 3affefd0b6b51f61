use chrono::NaiveDateTime;
use diesel::prelude::*;
use uuid::Uuid;

use crate::schema::*;

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = users)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub role: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub role: String,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = document_types)]
pub struct DocumentType {
    pub id: Uuid,
    pub label: String,
    pub created_at: NaiveDateTime,
}

impl DocumentType {
    /// Labels are unique, so the label doubles as the natural key.
    pub fn natural_key(&self) -> (String,) {
        (self.label.clone(),)
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = document_types)]
pub struct NewDocumentType {
    pub id: Uuid,
    pub label: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = documents)]
#[diesel(belongs_to(DocumentType))]
pub struct Document {
    pub id: Uuid,
    pub document_type_id: Uuid,
    pub label: String,
    pub original_name: String,
    pub content_type: Option<String>,
    pub uploaded_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = documents)]
pub struct NewDocument {
    pub id: Uuid,
    pub document_type_id: Uuid,
    pub label: String,
    pub original_name: String,
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = document_versions)]
#[diesel(belongs_to(Document))]
pub struct DocumentVersion {
    pub id: Uuid,
    pub document_id: Uuid,
    pub version_number: i32,
    pub s3_key: String,
    pub size_bytes: i64,
    pub checksum: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = document_versions)]
pub struct NewDocumentVersion {
    pub id: Uuid,
    pub document_id: Uuid,
    pub version_number: i32,
    pub s3_key: String,
    pub size_bytes: i64,
    pub checksum: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = document_pages)]
#[diesel(belongs_to(DocumentVersion, foreign_key = document_version_id))]
pub struct DocumentPage {
    pub id: Uuid,
    pub document_version_id: Uuid,
    pub page_number: i32,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = document_pages)]
pub struct NewDocumentPage {
    pub id: Uuid,
    pub document_version_id: Uuid,
    pub page_number: i32,
}

/// Text extracted by the parser for a single page.
#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = document_page_contents)]
#[diesel(belongs_to(DocumentPage, foreign_key = document_page_id))]
pub struct DocumentPageContent {
    pub id: Uuid,
    pub document_page_id: Uuid,
    pub content: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = document_page_contents)]
pub struct NewDocumentPageContent {
    pub id: Uuid,
    pub document_page_id: Uuid,
    pub content: String,
}

/// Parsing settings for a document type.
#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = document_type_settings)]
#[diesel(belongs_to(DocumentType))]
pub struct DocumentTypeSettings {
    pub id: Uuid,
    pub document_type_id: Uuid,
    pub auto_parsing: bool,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = document_type_settings)]
pub struct NewDocumentTypeSettings {
    pub id: Uuid,
    pub document_type_id: Uuid,
    pub auto_parsing: bool,
}

/// A failure captured while parsing a document version.
#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = document_version_parse_errors)]
#[diesel(belongs_to(DocumentVersion, foreign_key = document_version_id))]
pub struct DocumentVersionParseError {
    pub id: Uuid,
    pub document_version_id: Uuid,
    pub datetime_submitted: NaiveDateTime,
    pub result: Option<String>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = document_version_parse_errors)]
pub struct NewDocumentVersionParseError {
    pub id: Uuid,
    pub document_version_id: Uuid,
    pub result: Option<String>,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = jobs)]
pub struct Job {
    pub id: Uuid,
    pub job_type: String,
    pub payload: serde_json::Value,
    pub status: String,
    pub attempts: i32,
    pub run_after: NaiveDateTime,
    pub last_error: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = jobs)]
pub struct NewJob {
    pub id: Uuid,
    pub job_type: String,
    pub payload: serde_json::Value,
    pub status: String,
    pub run_after: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Identifiable)]
#[diesel(table_name = tags)]
pub struct Tag {
    pub id: Uuid,
    pub label: String,
    pub color: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = tags)]
pub struct NewTag {
    pub id: Uuid,
    pub label: String,
    pub color: Option<String>,
}

#[allow(dead_code)]
#[derive(Debug, Clone, Queryable, Associations)]
#[diesel(table_name = document_tags)]
#[diesel(belongs_to(Document))]
#[diesel(belongs_to(Tag))]
#[diesel(primary_key(document_id, tag_id))]
pub struct DocumentTag {
    pub document_id: Uuid,
    pub tag_id: Uuid,
    pub assigned_at: NaiveDateTime,
    pub assigned_by: Option<Uuid>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = document_tags)]
pub struct NewDocumentTag {
    pub document_id: Uuid,
    pub tag_id: Uuid,
    pub assigned_by: Option<Uuid>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = acl_grants)]
#[diesel(belongs_to(User))]
pub struct AclGrant {
    pub id: Uuid,
    pub user_id: Uuid,
    pub permission: String,
    pub object_id: Option<Uuid>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = acl_grants)]
pub struct NewAclGrant {
    pub id: Uuid,
    pub user_id: Uuid,
    pub permission: String,
    pub object_id: Option<Uuid>,
}
