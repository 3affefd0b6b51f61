use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use diesel::prelude::*;
use serde::Deserialize;
use tokio::task;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    jobs::JOB_PARSE_DOCUMENT_VERSION,
    models::{Document, DocumentVersion, Job},
    parsing::{self, parser},
    schema::{document_versions, documents},
    state::AppState,
};

use super::{JobExecution, JobHandler};

#[derive(Clone, Debug, Deserialize)]
struct ParsePayload {
    document_id: Uuid,
    document_version_id: Uuid,
}

pub struct ParseDocumentVersionJob;

impl ParseDocumentVersionJob {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ParseDocumentVersionJob {
    fn default() -> Self {
        Self::new()
    }
}

struct ParseContext {
    document: Document,
    version: DocumentVersion,
}

#[async_trait]
impl JobHandler for ParseDocumentVersionJob {
    fn job_type(&self) -> &'static str {
        JOB_PARSE_DOCUMENT_VERSION
    }

    async fn handle(&self, state: Arc<AppState>, job: Job) -> JobExecution {
        let payload: ParsePayload = match serde_json::from_value(job.payload.clone()) {
            Ok(payload) => payload,
            Err(err) => {
                return JobExecution::Failed {
                    error: format!("invalid parse payload: {err}"),
                }
            }
        };

        let state_clone = state.clone();
        let payload_clone = payload.clone();
        let context =
            match task::spawn_blocking(move || load_parse_context(&state_clone, &payload_clone))
                .await
            {
                Ok(Ok(Some(context))) => context,
                Ok(Ok(None)) => {
                    info!(job_id = %job.id, document_version_id = %payload.document_version_id, "document version is gone; nothing to parse");
                    return JobExecution::Success;
                }
                Ok(Err(err)) => {
                    warn!(job_id = %job.id, error = %err, "parse job will retry");
                    return JobExecution::Retry {
                        delay: Duration::from_secs(30),
                        error: err,
                    };
                }
                Err(join_err) => {
                    error!(job_id = %job.id, error = %join_err, "parse context task panicked");
                    return JobExecution::Retry {
                        delay: Duration::from_secs(60),
                        error: format!("worker panicked: {join_err}"),
                    };
                }
            };

        let bytes = match state.storage.get_object(&context.version.s3_key).await {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(job_id = %job.id, error = %err, "failed to fetch document version for parsing");
                return JobExecution::Retry {
                    delay: Duration::from_secs(30),
                    error: err.to_string(),
                };
            }
        };

        let content_type = context.document.content_type.clone();
        let original_name = context.document.original_name.clone();
        let parsed = match task::spawn_blocking(move || {
            parser::parse_document(content_type.as_deref(), &original_name, &bytes)
        })
        .await
        {
            Ok(parsed) => parsed,
            Err(join_err) => {
                error!(job_id = %job.id, error = %join_err, "parser panicked");
                return JobExecution::Retry {
                    delay: Duration::from_secs(60),
                    error: format!("parser panicked: {join_err}"),
                };
            }
        };

        let version_id = context.version.id;
        let state_clone = state.clone();
        let outcome = task::spawn_blocking(move || -> Result<JobExecution, String> {
            let mut conn = state_clone.db().map_err(|err| err.to_string())?;
            match parsed {
                Ok(pages) => {
                    let stored = parsing::store_parsed_pages(&mut conn, version_id, &pages)
                        .map_err(|err| format!("{err:?}"))?;
                    info!(document_version_id = %version_id, pages = stored.len(), "stored parsed page content");
                    Ok(JobExecution::Success)
                }
                Err(failure) => {
                    let message = failure.to_string();
                    parsing::record_parse_error(&mut conn, version_id, Some(&message))
                        .map_err(|err| format!("{err:?}"))?;
                    warn!(document_version_id = %version_id, error = %message, "document version failed to parse");
                    Ok(JobExecution::Failed { error: message })
                }
            }
        })
        .await;

        match outcome {
            Ok(Ok(execution)) => execution,
            Ok(Err(err)) => {
                warn!(job_id = %job.id, error = %err, "failed to persist parse result");
                JobExecution::Retry {
                    delay: Duration::from_secs(30),
                    error: err,
                }
            }
            Err(join_err) => {
                error!(job_id = %job.id, error = %join_err, "parse result task panicked");
                JobExecution::Retry {
                    delay: Duration::from_secs(30),
                    error: format!("persist panic: {join_err}"),
                }
            }
        }
    }
}

fn load_parse_context(
    state: &AppState,
    payload: &ParsePayload,
) -> Result<Option<ParseContext>, String> {
    let mut conn = state.db().map_err(|err| err.to_string())?;

    let version: Option<DocumentVersion> = document_versions::table
        .find(payload.document_version_id)
        .first(&mut conn)
        .optional()
        .map_err(|err| format!("{err:?}"))?;
    let Some(version) = version else {
        return Ok(None);
    };

    if version.document_id != payload.document_id {
        return Err("document/version mismatch".into());
    }

    let document: Document = documents::table
        .find(payload.document_id)
        .first(&mut conn)
        .map_err(|err| format!("{err:?}"))?;

    Ok(Some(ParseContext { document, version }))
}
