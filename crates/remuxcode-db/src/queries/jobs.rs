//! Job store operations.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microseconds, `Z`
//! suffix) so lexical comparison in SQL matches chronological order.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use remuxcode_common::{Error, JobId, JobStatus, Result};
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use crate::models::{JobCounts, JobRecord};

const SELECT_COLUMNS: &str = "SELECT id, file_path, kind, status, source, progress, error, result,
        created_at, updated_at, started_at, completed_at,
        video_converted, audio_converted, streams_cleaned
 FROM jobs";

fn ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn conversion_error(idx: usize, msg: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, msg.into())
}

fn parse_ts(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e.to_string()))
}

fn parse_opt_ts(idx: usize, s: Option<String>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    s.map(|s| parse_ts(idx, &s)).transpose()
}

fn row_to_job(row: &Row) -> rusqlite::Result<JobRecord> {
    let result: String = row.get(7)?;
    Ok(JobRecord {
        id: JobId::from(row.get::<_, String>(0)?),
        file_path: row.get(1)?,
        kind: row
            .get::<_, String>(2)?
            .parse()
            .map_err(|e| conversion_error(2, e))?,
        status: row
            .get::<_, String>(3)?
            .parse()
            .map_err(|e| conversion_error(3, e))?,
        source: row
            .get::<_, String>(4)?
            .parse()
            .map_err(|e| conversion_error(4, e))?,
        progress: row.get(5)?,
        error: row.get(6)?,
        result: serde_json::from_str(&result).map_err(|e| conversion_error(7, e.to_string()))?,
        created_at: parse_ts(8, &row.get::<_, String>(8)?)?,
        updated_at: parse_ts(9, &row.get::<_, String>(9)?)?,
        started_at: parse_opt_ts(10, row.get(10)?)?,
        completed_at: parse_opt_ts(11, row.get(11)?)?,
        video_converted: row.get(12)?,
        audio_converted: row.get(13)?,
        streams_cleaned: row.get(14)?,
    })
}

/// Insert or update a job.
///
/// Every field is last-write-wins except `file_path`, which never changes
/// after insert, and `started_at`, which is never cleared once set.
pub fn save_job(conn: &Connection, job: &JobRecord) -> Result<()> {
    conn.execute(
        "INSERT INTO jobs (id, file_path, kind, status, source, progress, error, result,
                           created_at, updated_at, started_at, completed_at,
                           video_converted, audio_converted, streams_cleaned)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
         ON CONFLICT(id) DO UPDATE SET
             kind = excluded.kind,
             status = excluded.status,
             source = excluded.source,
             progress = excluded.progress,
             error = excluded.error,
             result = excluded.result,
             created_at = excluded.created_at,
             updated_at = excluded.updated_at,
             started_at = COALESCE(excluded.started_at, jobs.started_at),
             completed_at = excluded.completed_at,
             video_converted = excluded.video_converted,
             audio_converted = excluded.audio_converted,
             streams_cleaned = excluded.streams_cleaned",
        params![
            job.id.as_str(),
            job.file_path,
            job.kind.as_str(),
            job.status.as_str(),
            job.source.as_str(),
            job.progress,
            job.error,
            job.result.to_string(),
            ts(&job.created_at),
            ts(&Utc::now()),
            job.started_at.as_ref().map(ts),
            job.completed_at.as_ref().map(ts),
            job.video_converted,
            job.audio_converted,
            job.streams_cleaned,
        ],
    )
    .map_err(|e| Error::database(e.to_string()))?;

    Ok(())
}

/// Get a job by id.
pub fn get_job(conn: &Connection, id: &str) -> Result<JobRecord> {
    conn.query_row(&format!("{SELECT_COLUMNS} WHERE id = ?"), [id], row_to_job)
        .optional()
        .map_err(|e| Error::database(e.to_string()))?
        .ok_or_else(|| Error::not_found(format!("job {}", id)))
}

/// List jobs newest-first, optionally limited.
pub fn list_jobs(conn: &Connection, limit: Option<usize>) -> Result<Vec<JobRecord>> {
    let limit = limit.map(|l| l as i64).unwrap_or(-1);
    let mut stmt = conn
        .prepare(&format!(
            "{SELECT_COLUMNS} ORDER BY created_at DESC, rowid DESC LIMIT ?"
        ))
        .map_err(|e| Error::database(e.to_string()))?;

    let jobs = stmt
        .query_map([limit], row_to_job)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(jobs)
}

/// Jobs that were pending or running when the process last stopped, oldest-first.
pub fn list_resumable_jobs(conn: &Connection) -> Result<Vec<JobRecord>> {
    let mut stmt = conn
        .prepare(&format!(
            "{SELECT_COLUMNS} WHERE status IN ('pending', 'running')
             ORDER BY created_at ASC, rowid ASC"
        ))
        .map_err(|e| Error::database(e.to_string()))?;

    let jobs = stmt
        .query_map([], row_to_job)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(jobs)
}

/// Delete a job. Returns whether a row was removed.
pub fn delete_job(conn: &Connection, id: &str) -> Result<bool> {
    let affected = conn
        .execute("DELETE FROM jobs WHERE id = ?", [id])
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(affected > 0)
}

/// Delete jobs in one of `statuses` whose `completed_at` is more than `days`
/// days in the past. Rows without a completion time are never touched.
pub fn purge_jobs_older_than(
    conn: &Connection,
    days: i64,
    statuses: &[JobStatus],
) -> Result<usize> {
    if statuses.is_empty() {
        return Ok(0);
    }

    let cutoff = ts(&(Utc::now() - Duration::days(days)));
    let placeholders = vec!["?"; statuses.len()].join(", ");
    let sql = format!(
        "DELETE FROM jobs WHERE completed_at IS NOT NULL AND completed_at < ?
         AND status IN ({placeholders})"
    );

    let values = std::iter::once(cutoff).chain(statuses.iter().map(|s| s.to_string()));
    let affected = conn
        .execute(&sql, params_from_iter(values))
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(affected)
}

/// Count jobs per status.
pub fn count_jobs(conn: &Connection) -> Result<JobCounts> {
    let mut stmt = conn
        .prepare("SELECT status, COUNT(*) FROM jobs GROUP BY status")
        .map_err(|e| Error::database(e.to_string()))?;

    let rows = stmt
        .query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;

    let mut counts = JobCounts::default();
    for (status, count) in rows {
        match status.parse::<JobStatus>() {
            Ok(status) => counts.add(status, count as usize),
            Err(e) => tracing::warn!("Skipping unknown status in job counts: {}", e),
        }
    }
    Ok(counts)
}
