//! Academic catalog: groups, disciplines and session periods.

use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::error::{EntityKind, Result, ServiceError};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    #[serde(skip)]
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSummary {
    pub name: String,
    pub student_count: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Discipline {
    #[serde(skip)]
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPeriod {
    #[serde(skip)]
    pub id: String,
    pub name: String,
    pub start_date: String,
    pub end_date: String,
    pub active: bool,
}

impl SessionPeriod {
    const COLUMNS: &'static str = "id, name, start_date, end_date, is_active";

    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(SessionPeriod {
            id: row.get(0)?,
            name: row.get(1)?,
            start_date: row.get(2)?,
            end_date: row.get(3)?,
            active: row.get::<_, i64>(4)? != 0,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisciplineRemoval {
    pub name: String,
    pub grades_removed: usize,
    pub assignments_removed: usize,
}

fn required_name(raw: &str, what: &str) -> Result<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(ServiceError::invalid(format!("{what} name must not be empty")));
    }
    Ok(name.to_string())
}

fn insert_or_exists(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
    exists_message: impl FnOnce() -> String,
) -> Result<()> {
    match conn.execute(sql, params) {
        Ok(_) => Ok(()),
        Err(e) if ServiceError::is_unique_violation(&e) => {
            Err(ServiceError::AlreadyExists(exists_message()))
        }
        Err(e) => Err(e.into()),
    }
}

pub fn group_by_name(conn: &Connection, name: &str) -> Result<Group> {
    conn.query_row(
        "SELECT id, name FROM study_groups WHERE name = ?",
        [name.trim()],
        |r| {
            Ok(Group {
                id: r.get(0)?,
                name: r.get(1)?,
            })
        },
    )
    .optional()?
    .ok_or_else(|| ServiceError::not_found(EntityKind::Group, format!("group {name} not found")))
}

pub fn create_group(conn: &Connection, name: &str) -> Result<Group> {
    let name = required_name(name, "group")?;
    let id = Uuid::new_v4().to_string();
    insert_or_exists(
        conn,
        "INSERT INTO study_groups(id, name) VALUES(?, ?)",
        (&id, &name),
        || format!("group {name} already exists"),
    )?;
    info!(group = %name, "group created");
    Ok(Group { id, name })
}

pub fn list_groups(conn: &Connection) -> Result<Vec<GroupSummary>> {
    let mut stmt = conn.prepare(
        "SELECT
           g.name,
           (SELECT COUNT(*) FROM students s WHERE s.group_id = g.id) AS student_count
         FROM study_groups g
         ORDER BY g.name",
    )?;
    let rows = stmt
        .query_map([], |r| {
            Ok(GroupSummary {
                name: r.get(0)?,
                student_count: r.get(1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Every group, ordered by name.
pub fn all_groups(conn: &Connection) -> Result<Vec<Group>> {
    let mut stmt = conn.prepare("SELECT id, name FROM study_groups ORDER BY name")?;
    let rows = stmt
        .query_map([], |r| {
            Ok(Group {
                id: r.get(0)?,
                name: r.get(1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn discipline_by_name(conn: &Connection, name: &str) -> Result<Discipline> {
    conn.query_row(
        "SELECT id, name FROM disciplines WHERE name = ?",
        [name.trim()],
        |r| {
            Ok(Discipline {
                id: r.get(0)?,
                name: r.get(1)?,
            })
        },
    )
    .optional()?
    .ok_or_else(|| {
        ServiceError::not_found(EntityKind::Discipline, format!("discipline {name} not found"))
    })
}

/// Creates every name or none of them. Caller supplies the transaction.
pub fn create_disciplines(conn: &Connection, names: &[String]) -> Result<Vec<Discipline>> {
    if names.is_empty() {
        return Err(ServiceError::invalid("provide at least one discipline name"));
    }
    let mut created = Vec::with_capacity(names.len());
    for raw in names {
        let name = required_name(raw, "discipline")?;
        let id = Uuid::new_v4().to_string();
        insert_or_exists(
            conn,
            "INSERT INTO disciplines(id, name) VALUES(?, ?)",
            (&id, &name),
            || format!("discipline {name} already exists"),
        )?;
        created.push(Discipline { id, name });
    }
    info!(count = created.len(), "disciplines created");
    Ok(created)
}

pub fn list_disciplines(conn: &Connection) -> Result<Vec<Discipline>> {
    let mut stmt = conn.prepare("SELECT id, name FROM disciplines ORDER BY name")?;
    let rows = stmt
        .query_map([], |r| {
            Ok(Discipline {
                id: r.get(0)?,
                name: r.get(1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Removes a discipline with its grades and teacher assignments.
/// Caller supplies the transaction.
pub fn delete_discipline(conn: &Connection, name: &str) -> Result<DisciplineRemoval> {
    let discipline = discipline_by_name(conn, name)?;

    // No ON DELETE CASCADE; delete in dependency order.
    let grades_removed = conn.execute(
        "DELETE FROM grades WHERE discipline_id = ?",
        [&discipline.id],
    )?;
    let assignments_removed = conn.execute(
        "DELETE FROM teacher_assignments WHERE discipline_id = ?",
        [&discipline.id],
    )?;
    conn.execute("DELETE FROM disciplines WHERE id = ?", [&discipline.id])?;

    info!(
        discipline = %discipline.name,
        grades_removed,
        assignments_removed,
        "discipline deleted"
    );
    Ok(DisciplineRemoval {
        name: discipline.name,
        grades_removed,
        assignments_removed,
    })
}

pub fn session_by_name(conn: &Connection, name: &str) -> Result<SessionPeriod> {
    let sql = format!(
        "SELECT {} FROM session_periods WHERE name = ?",
        SessionPeriod::COLUMNS
    );
    conn.query_row(&sql, [name.trim()], SessionPeriod::from_row)
        .optional()?
        .ok_or_else(|| {
            ServiceError::not_found(EntityKind::Session, format!("session {name} not found"))
        })
}

/// The single session currently accepting grade writes.
pub fn active_session(conn: &Connection) -> Result<SessionPeriod> {
    let sql = format!(
        "SELECT {} FROM session_periods WHERE is_active = 1 LIMIT 2",
        SessionPeriod::COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut active = stmt
        .query_map([], SessionPeriod::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    match active.len() {
        0 => Err(ServiceError::Unavailable("no active session".into())),
        1 => Ok(active.remove(0)),
        _ => Err(ServiceError::Unavailable(
            "more than one active session; fix the session configuration".into(),
        )),
    }
}

fn parse_date(raw: &str, field: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
        ServiceError::invalid_with(
            format!("{field} must be a YYYY-MM-DD date"),
            serde_json::json!({ field: raw }),
        )
    })
}

pub struct NewSession<'a> {
    pub name: &'a str,
    pub start_date: &'a str,
    pub end_date: &'a str,
    pub active: bool,
}

/// Caller supplies the transaction; activating deactivates the previous one.
pub fn create_session(conn: &Connection, new: &NewSession<'_>) -> Result<SessionPeriod> {
    let name = required_name(new.name, "session")?;
    let start = parse_date(new.start_date, "startDate")?;
    let end = parse_date(new.end_date, "endDate")?;
    if start > end {
        return Err(ServiceError::invalid_with(
            "startDate must not be after endDate",
            serde_json::json!({ "startDate": new.start_date, "endDate": new.end_date }),
        ));
    }

    if new.active {
        conn.execute("UPDATE session_periods SET is_active = 0 WHERE is_active = 1", [])?;
    }
    let id = Uuid::new_v4().to_string();
    let session = SessionPeriod {
        id,
        name,
        start_date: start.format("%Y-%m-%d").to_string(),
        end_date: end.format("%Y-%m-%d").to_string(),
        active: new.active,
    };
    insert_or_exists(
        conn,
        "INSERT INTO session_periods(id, name, start_date, end_date, is_active)
         VALUES(?, ?, ?, ?, ?)",
        (
            &session.id,
            &session.name,
            &session.start_date,
            &session.end_date,
            session.active as i64,
        ),
        || format!("session {} already exists", session.name),
    )?;
    info!(session = %session.name, active = session.active, "session created");
    Ok(session)
}

/// Caller supplies the transaction.
pub fn activate_session(conn: &Connection, name: &str) -> Result<SessionPeriod> {
    let mut session = session_by_name(conn, name)?;
    conn.execute(
        "UPDATE session_periods SET is_active = 0 WHERE is_active = 1 AND id <> ?",
        [&session.id],
    )?;
    conn.execute(
        "UPDATE session_periods SET is_active = 1 WHERE id = ?",
        [&session.id],
    )?;
    session.active = true;
    info!(session = %session.name, "session activated");
    Ok(session)
}

pub fn list_sessions(conn: &Connection) -> Result<Vec<SessionPeriod>> {
    let sql = format!(
        "SELECT {} FROM session_periods ORDER BY start_date, name",
        SessionPeriod::COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], SessionPeriod::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}
