use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;

use crate::model::Role;

pub const DB_FILE_NAME: &str = "gradebook.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(db_path)?;
    conn.busy_timeout(Duration::from_secs(5))?;
    init_schema(&conn)?;
    Ok(conn)
}

#[cfg(test)]
pub fn open_memory() -> Connection {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    init_schema(&conn).expect("init schema");
    conn
}

pub fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS roles(
            name TEXT PRIMARY KEY
        )",
        [],
    )?;
    seed_roles(conn)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS users(
            id TEXT PRIMARY KEY,
            last_name TEXT NOT NULL,
            first_name TEXT NOT NULL,
            middle_name TEXT NOT NULL,
            username TEXT UNIQUE,
            password_hash TEXT NOT NULL,
            role TEXT NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY(role) REFERENCES roles(name),
            UNIQUE(last_name, first_name, middle_name, role)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_users_full_name ON users(last_name, first_name, middle_name)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS disciplines(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE
        )",
        [],
    )?;

    // "groups" collides with the window-frame keyword.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS study_groups(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL UNIQUE,
            group_id TEXT NOT NULL,
            FOREIGN KEY(user_id) REFERENCES users(id),
            FOREIGN KEY(group_id) REFERENCES study_groups(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_group ON students(group_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS teacher_assignments(
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            discipline_id TEXT NOT NULL,
            FOREIGN KEY(user_id) REFERENCES users(id),
            FOREIGN KEY(discipline_id) REFERENCES disciplines(id),
            UNIQUE(user_id, discipline_id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_teacher_assignments_discipline ON teacher_assignments(discipline_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS admin_assignments(
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL UNIQUE,
            FOREIGN KEY(user_id) REFERENCES users(id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS session_periods(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            start_date TEXT NOT NULL,
            end_date TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 0
        )",
        [],
    )?;
    // At most one active session; the store rejects a second one.
    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_session_periods_single_active
         ON session_periods(is_active) WHERE is_active = 1",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS grades(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            discipline_id TEXT NOT NULL,
            session_id TEXT NOT NULL,
            grade INTEGER NOT NULL CHECK(grade BETWEEN 2 AND 5),
            recorded_by TEXT NOT NULL,
            recorded_at TEXT NOT NULL,
            FOREIGN KEY(student_id) REFERENCES students(id),
            FOREIGN KEY(discipline_id) REFERENCES disciplines(id),
            FOREIGN KEY(session_id) REFERENCES session_periods(id),
            FOREIGN KEY(recorded_by) REFERENCES users(id),
            UNIQUE(student_id, discipline_id, session_id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_grades_student ON grades(student_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_grades_discipline ON grades(discipline_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS auth_tokens(
            token_hash TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            issued_at TEXT NOT NULL,
            expires_at TEXT NOT NULL,
            FOREIGN KEY(user_id) REFERENCES users(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_auth_tokens_user ON auth_tokens(user_id)",
        [],
    )?;

    Ok(())
}

fn seed_roles(conn: &Connection) -> anyhow::Result<()> {
    for role in Role::ALL {
        conn.execute(
            "INSERT OR IGNORE INTO roles(name) VALUES(?)",
            [role.as_str()],
        )?;
    }
    Ok(())
}
