//! Grade ledger: one row per (student, discipline, session) triple.
//!
//! Writes go through [`upsert`], which inserts first and lets the UNIQUE
//! constraint on the triple decide whether the row already exists. A
//! constraint hit becomes [`ServiceError::Conflict`] internally and is retried
//! as an in-place update, so two writers racing on the same triple never both
//! create a row and neither write is lost. The later writer wins.

use chrono::{SecondsFormat, Utc};
use rusqlite::Connection;
use uuid::Uuid;

use crate::error::{Result, ServiceError};
use crate::model::GradeValue;

/// Key of a ledger row.
#[derive(Debug, Clone, Copy)]
pub struct Triple<'a> {
    pub enrollment_id: &'a str,
    pub discipline_id: &'a str,
    pub session_id: &'a str,
}

#[derive(Debug, Clone)]
pub struct UpsertOutcome {
    pub created: bool,
    pub recorded_at: String,
}

fn now_stamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn try_insert(
    conn: &Connection,
    key: Triple<'_>,
    value: GradeValue,
    recorded_by: &str,
    recorded_at: &str,
) -> Result<()> {
    conn.execute(
        "INSERT INTO grades(id, student_id, discipline_id, session_id, grade, recorded_by, recorded_at)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        (
            Uuid::new_v4().to_string(),
            key.enrollment_id,
            key.discipline_id,
            key.session_id,
            value,
            recorded_by,
            recorded_at,
        ),
    )
    .map_err(|e| {
        if ServiceError::is_unique_violation(&e) {
            ServiceError::Conflict("grade already recorded for this triple".into())
        } else {
            e.into()
        }
    })?;
    Ok(())
}

fn overwrite(
    conn: &Connection,
    key: Triple<'_>,
    value: GradeValue,
    recorded_by: &str,
    recorded_at: &str,
) -> Result<usize> {
    Ok(conn.execute(
        "UPDATE grades SET grade = ?, recorded_by = ?, recorded_at = ?
         WHERE student_id = ? AND discipline_id = ? AND session_id = ?",
        (
            value,
            recorded_by,
            recorded_at,
            key.enrollment_id,
            key.discipline_id,
            key.session_id,
        ),
    )?)
}

/// Creates the grade for `key` or overwrites value, recorder and timestamp.
pub fn upsert(
    conn: &Connection,
    key: Triple<'_>,
    value: GradeValue,
    recorded_by: &str,
) -> Result<UpsertOutcome> {
    let recorded_at = now_stamp();
    match try_insert(conn, key, value, recorded_by, &recorded_at) {
        Ok(()) => Ok(UpsertOutcome {
            created: true,
            recorded_at,
        }),
        Err(ServiceError::Conflict(_)) => {
            let updated = overwrite(conn, key, value, recorded_by, &recorded_at)?;
            if updated != 1 {
                // Row vanished between the conflict and the update.
                return Err(ServiceError::Internal(format!(
                    "grade upsert updated {updated} rows"
                )));
            }
            Ok(UpsertOutcome {
                created: false,
                recorded_at,
            })
        }
        Err(e) => Err(e),
    }
}
