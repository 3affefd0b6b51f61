//! Postgres-backed work queue. Workers reserve rows with `SKIP LOCKED`, so any
//! number of worker processes can share one table.

use std::time::Duration;

use chrono::{Duration as ChronoDuration, NaiveDateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Job, NewJob};
use crate::schema::jobs;

pub const STATUS_QUEUED: &str = "queued";
pub const STATUS_PROCESSING: &str = "processing";
pub const STATUS_SUCCEEDED: &str = "succeeded";
pub const STATUS_FAILED: &str = "failed";

pub const JOB_PARSE_DOCUMENT_VERSION: &str = "parse-document-version";

/// Retries stop once a job has been reserved this many times.
pub const MAX_ATTEMPTS: i32 = 5;

#[derive(Debug, Error)]
pub enum JobQueueError {
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
}

pub type JobQueueResult<T> = Result<T, JobQueueError>;

pub fn enqueue_job(
    conn: &mut PgConnection,
    job_type: &str,
    payload: Value,
    run_after: Option<NaiveDateTime>,
) -> JobQueueResult<Job> {
    let new_job = NewJob {
        id: Uuid::new_v4(),
        job_type: job_type.to_string(),
        payload,
        status: STATUS_QUEUED.to_string(),
        run_after: run_after.unwrap_or_else(|| Utc::now().naive_utc()),
    };

    Ok(diesel::insert_into(jobs::table)
        .values(&new_job)
        .get_result(conn)?)
}

pub fn reserve_job(conn: &mut PgConnection, job_types: &[&str]) -> JobQueueResult<Option<Job>> {
    let now = Utc::now().naive_utc();

    conn.transaction(|conn| {
        let job_opt = jobs::table
            .filter(jobs::status.eq(STATUS_QUEUED))
            .filter(jobs::run_after.le(now))
            .filter(jobs::job_type.eq_any(job_types))
            .order(jobs::run_after.asc())
            .for_update()
            .skip_locked()
            .first::<Job>(conn)
            .optional()?;

        match job_opt {
            Some(job) => diesel::update(jobs::table.find(job.id))
                .set((
                    jobs::status.eq(STATUS_PROCESSING),
                    jobs::attempts.eq(job.attempts + 1),
                    jobs::updated_at.eq(now),
                ))
                .get_result::<Job>(conn)
                .map(Some),
            None => Ok(None),
        }
    })
    .map_err(JobQueueError::from)
}

/// Jobs of `job_type` that have not finished yet, oldest first.
pub fn pending_jobs(conn: &mut PgConnection, job_type: &str) -> JobQueueResult<Vec<Job>> {
    Ok(jobs::table
        .filter(jobs::job_type.eq(job_type))
        .filter(jobs::status.eq_any([STATUS_QUEUED, STATUS_PROCESSING]))
        .order(jobs::created_at.asc())
        .load(conn)?)
}

pub fn mark_job_succeeded(conn: &mut PgConnection, job_id: Uuid) -> JobQueueResult<()> {
    diesel::update(jobs::table.find(job_id))
        .set((
            jobs::status.eq(STATUS_SUCCEEDED),
            jobs::last_error.eq::<Option<String>>(None),
            jobs::updated_at.eq(Utc::now().naive_utc()),
        ))
        .execute(conn)?;
    Ok(())
}

pub fn retry_job_after(
    conn: &mut PgConnection,
    job_id: Uuid,
    delay: Duration,
    error_message: &str,
) -> JobQueueResult<()> {
    let now = Utc::now().naive_utc();
    diesel::update(jobs::table.find(job_id))
        .set((
            jobs::status.eq(STATUS_QUEUED),
            jobs::run_after.eq(next_run_at(now, delay)),
            jobs::last_error.eq(Some(error_message.to_string())),
            jobs::updated_at.eq(now),
        ))
        .execute(conn)?;
    Ok(())
}

pub fn mark_job_failed(
    conn: &mut PgConnection,
    job_id: Uuid,
    error_message: &str,
) -> JobQueueResult<()> {
    diesel::update(jobs::table.find(job_id))
        .set((
            jobs::status.eq(STATUS_FAILED),
            jobs::last_error.eq(Some(error_message.to_string())),
            jobs::updated_at.eq(Utc::now().naive_utc()),
        ))
        .execute(conn)?;
    Ok(())
}

/// Puts failed jobs of `job_type` back in the queue with a fresh attempt count.
pub fn requeue_failed_jobs(conn: &mut PgConnection, job_type: &str) -> JobQueueResult<usize> {
    let now = Utc::now().naive_utc();
    Ok(diesel::update(
        jobs::table
            .filter(jobs::job_type.eq(job_type))
            .filter(jobs::status.eq(STATUS_FAILED)),
    )
    .set((
        jobs::status.eq(STATUS_QUEUED),
        jobs::attempts.eq(0),
        jobs::run_after.eq(now),
        jobs::updated_at.eq(now),
    ))
    .execute(conn)?)
}

fn next_run_at(now: NaiveDateTime, delay: Duration) -> NaiveDateTime {
    now + ChronoDuration::from_std(delay).unwrap_or_else(|_| ChronoDuration::seconds(30))
}
