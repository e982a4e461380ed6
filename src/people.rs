//! Identity store writes and membership lookups: users, enrollment, and
//! teacher/admin assignments.

use chrono::{SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::catalog::{Discipline, Group};
use crate::error::{EntityKind, Result, ServiceError};
use crate::model::{FullName, Role, User};

pub struct NewUser {
    pub name: FullName,
    pub username: Option<String>,
    pub password_hash: String,
    pub role: Role,
}

/// A student's membership row. `id` is what grade rows point at.
#[derive(Debug, Clone)]
pub struct Enrollment {
    pub id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrolledStudent {
    #[serde(skip)]
    pub enrollment_id: String,
    pub name: String,
}

pub fn create_user(conn: &Connection, new: NewUser) -> Result<User> {
    let username = new
        .username
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty());
    let id = Uuid::new_v4().to_string();
    let created_at = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);

    let inserted = conn.execute(
        "INSERT INTO users(id, last_name, first_name, middle_name, username, password_hash, role, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &id,
            &new.name.last_name,
            &new.name.first_name,
            &new.name.middle_name,
            &username,
            &new.password_hash,
            new.role,
            &created_at,
        ),
    );
    match inserted {
        Ok(_) => {}
        Err(e) if ServiceError::is_unique_violation(&e) => {
            return Err(ServiceError::AlreadyExists(format!(
                "{} {} already exists",
                new.role, new.name
            )));
        }
        Err(e) => return Err(e.into()),
    }

    info!(user_id = %id, role = %new.role, "user created");
    Ok(User {
        id,
        name: new.name,
        username,
        password_hash: new.password_hash,
        role: new.role,
    })
}

pub fn set_password_hash(conn: &Connection, user_id: &str, password_hash: &str) -> Result<()> {
    let n = conn.execute(
        "UPDATE users SET password_hash = ? WHERE id = ?",
        (password_hash, user_id),
    )?;
    if n == 0 {
        return Err(ServiceError::not_found(EntityKind::User, "user not found"));
    }
    Ok(())
}

/// Enrollment of `user_id` in exactly `group`; anything else is not found.
pub fn enrollment_in_group(conn: &Connection, user: &User, group: &Group) -> Result<Enrollment> {
    conn.query_row(
        "SELECT id FROM students WHERE user_id = ? AND group_id = ?",
        (&user.id, &group.id),
        |r| Ok(Enrollment { id: r.get(0)? }),
    )
    .optional()?
    .ok_or_else(|| {
        ServiceError::not_found(
            EntityKind::Student,
            format!("student {} is not enrolled in group {}", user.name, group.name),
        )
    })
}

/// The student's enrollment together with its group name.
pub fn enrollment_of(conn: &Connection, user_id: &str) -> Result<Option<(Enrollment, String)>> {
    Ok(conn
        .query_row(
            "SELECT s.id, g.name
             FROM students s JOIN study_groups g ON g.id = s.group_id
             WHERE s.user_id = ?",
            [user_id],
            |r| Ok((Enrollment { id: r.get(0)? }, r.get(1)?)),
        )
        .optional()?)
}

/// Creates the enrollment or moves the student to `group`.
/// Returns true when the student was newly enrolled.
pub fn enroll(conn: &Connection, user: &User, group: &Group) -> Result<bool> {
    if user.role != Role::Student {
        return Err(ServiceError::invalid(format!(
            "{} is not a student",
            user.name
        )));
    }
    let existed = enrollment_of(conn, &user.id)?.is_some();
    conn.execute(
        "INSERT INTO students(id, user_id, group_id) VALUES(?, ?, ?)
         ON CONFLICT(user_id) DO UPDATE SET group_id = excluded.group_id",
        (Uuid::new_v4().to_string(), &user.id, &group.id),
    )?;
    info!(user_id = %user.id, group = %group.name, moved = existed, "student enrolled");
    Ok(!existed)
}

/// Students of a group ordered by name.
pub fn students_in_group(conn: &Connection, group: &Group) -> Result<Vec<EnrolledStudent>> {
    let mut stmt = conn.prepare(
        "SELECT s.id, u.last_name, u.first_name, u.middle_name
         FROM students s JOIN users u ON u.id = s.user_id
         WHERE s.group_id = ?
         ORDER BY u.last_name, u.first_name, u.middle_name",
    )?;
    let rows = stmt
        .query_map([&group.id], |r| {
            let name = FullName {
                last_name: r.get(1)?,
                first_name: r.get(2)?,
                middle_name: r.get(3)?,
            };
            Ok(EnrolledStudent {
                enrollment_id: r.get(0)?,
                name: name.to_string(),
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn require_teacher_assignment(
    conn: &Connection,
    user_id: &str,
    discipline: &Discipline,
) -> Result<()> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM teacher_assignments WHERE user_id = ? AND discipline_id = ?",
            (user_id, &discipline.id),
            |r| r.get(0),
        )
        .optional()?;
    found.map(|_| ()).ok_or_else(|| {
        ServiceError::not_found(
            EntityKind::TeacherAssignment,
            format!("you are not assigned to teach {}", discipline.name),
        )
    })
}

pub fn teacher_disciplines(conn: &Connection, user_id: &str) -> Result<Vec<Discipline>> {
    let mut stmt = conn.prepare(
        "SELECT d.id, d.name
         FROM teacher_assignments t JOIN disciplines d ON d.id = t.discipline_id
         WHERE t.user_id = ?
         ORDER BY d.name",
    )?;
    let rows = stmt
        .query_map([user_id], |r| {
            Ok(Discipline {
                id: r.get(0)?,
                name: r.get(1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn assign_teacher(conn: &Connection, user: &User, discipline: &Discipline) -> Result<()> {
    if user.role != Role::Teacher {
        return Err(ServiceError::invalid(format!("{} is not a teacher", user.name)));
    }
    match conn.execute(
        "INSERT INTO teacher_assignments(id, user_id, discipline_id) VALUES(?, ?, ?)",
        (Uuid::new_v4().to_string(), &user.id, &discipline.id),
    ) {
        Ok(_) => {
            info!(user_id = %user.id, discipline = %discipline.name, "teacher assigned");
            Ok(())
        }
        Err(e) if ServiceError::is_unique_violation(&e) => Err(ServiceError::AlreadyExists(
            format!("{} already teaches {}", user.name, discipline.name),
        )),
        Err(e) => Err(e.into()),
    }
}

pub fn require_admin_assignment(conn: &Connection, user_id: &str) -> Result<()> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM admin_assignments WHERE user_id = ?",
            [user_id],
            |r| r.get(0),
        )
        .optional()?;
    found.map(|_| ()).ok_or_else(|| {
        ServiceError::not_found(
            EntityKind::AdminAssignment,
            "academic staff record not found for this account",
        )
    })
}

pub fn assign_admin(conn: &Connection, user: &User) -> Result<()> {
    if user.role != Role::AcademicStaff {
        return Err(ServiceError::invalid(format!(
            "{} is not academic staff",
            user.name
        )));
    }
    conn.execute(
        "INSERT INTO admin_assignments(id, user_id) VALUES(?, ?)",
        (Uuid::new_v4().to_string(), &user.id),
    )?;
    Ok(())
}

pub fn admin_count(conn: &Connection) -> Result<i64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM admin_assignments", [], |r| r.get(0))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;
    use crate::db;

    fn user(conn: &Connection, name: &str, role: Role) -> User {
        create_user(
            conn,
            NewUser {
                name: FullName::parse(name).expect("name"),
                username: None,
                password_hash: "x".into(),
                role,
            },
        )
        .expect("create user")
    }

    #[test]
    fn duplicate_name_and_role_already_exists() {
        let conn = db::open_memory();
        user(&conn, "Doe Jane Ann", Role::Student);
        let err = create_user(
            &conn,
            NewUser {
                name: FullName::parse("Doe Jane Ann").expect("name"),
                username: None,
                password_hash: "x".into(),
                role: Role::Student,
            },
        )
        .expect_err("dup");
        assert_eq!(err.code(), "already_exists");
        // Same name with another role is a different person.
        user(&conn, "Doe Jane Ann", Role::Teacher);
    }

    #[test]
    fn enrollment_is_one_group_per_student() {
        let conn = db::open_memory();
        let g1 = catalog::create_group(&conn, "G1").expect("g1");
        let g2 = catalog::create_group(&conn, "G2").expect("g2");
        let jane = user(&conn, "Doe Jane", Role::Student);

        assert!(enroll(&conn, &jane, &g1).expect("enroll"));
        let in_g1 = enrollment_in_group(&conn, &jane, &g1).expect("in g1");
        let (own, _) = enrollment_of(&conn, &jane.id).expect("q").expect("some");
        assert_eq!(in_g1.id, own.id);

        assert!(!enroll(&conn, &jane, &g2).expect("move"));
        let err = enrollment_in_group(&conn, &jane, &g1).expect_err("moved away");
        assert!(matches!(
            err,
            ServiceError::NotFound {
                entity: EntityKind::Student,
                ..
            }
        ));
        let (moved, group_name) = enrollment_of(&conn, &jane.id).expect("q").expect("some");
        assert_eq!(group_name, "G2");
        // Moving keeps the enrollment row, so recorded grades follow the student.
        assert_eq!(moved.id, own.id);
        assert_eq!(students_in_group(&conn, &g1).expect("g1").len(), 0);
    }

    #[test]
    fn only_students_can_be_enrolled() {
        let conn = db::open_memory();
        let g1 = catalog::create_group(&conn, "G1").expect("g1");
        let t = user(&conn, "Smith Paul", Role::Teacher);
        assert_eq!(enroll(&conn, &t, &g1).expect_err("teacher").code(), "bad_params");
    }

    #[test]
    fn teacher_assignment_is_unique_per_discipline() {
        let conn = db::open_memory();
        let math = catalog::create_disciplines(&conn, &["Math".into()])
            .expect("math")
            .remove(0);
        let t = user(&conn, "Smith Paul", Role::Teacher);

        assert!(require_teacher_assignment(&conn, &t.id, &math).is_err());
        assign_teacher(&conn, &t, &math).expect("assign");
        require_teacher_assignment(&conn, &t.id, &math).expect("assigned");
        assert_eq!(
            assign_teacher(&conn, &t, &math).expect_err("dup").code(),
            "already_exists"
        );
        assert_eq!(teacher_disciplines(&conn, &t.id).expect("list").len(), 1);
    }

    #[test]
    fn admin_assignment_lookup() {
        let conn = db::open_memory();
        let staff = user(&conn, "Admin Ann", Role::AcademicStaff);
        assert_eq!(admin_count(&conn).expect("count"), 0);
        let err = require_admin_assignment(&conn, &staff.id).expect_err("missing");
        assert_eq!(err.code(), "not_found");
        assign_admin(&conn, &staff).expect("assign");
        require_admin_assignment(&conn, &staff.id).expect("present");
        assert_eq!(admin_count(&conn).expect("count"), 1);
    }
}
