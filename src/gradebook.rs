//! Grade service: entity resolution, authorization and ledger writes for
//! single and batch grade submissions, plus the three grade views.

use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde::Serialize;
use tracing::{debug, info};

use crate::auth::gate::{self, Action, Capability};
use crate::catalog::{self, Discipline};
use crate::error::{EntityKind, Result, ServiceError};
use crate::identity::IdentityResolver;
use crate::ledger::{self, Triple};
use crate::model::{Actor, FullName, GradeValue, Role};
use crate::people;

pub struct GradeRequest<'a> {
    pub student: &'a str,
    pub discipline: &'a str,
    pub session: &'a str,
    pub group: &'a str,
    pub value: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeWrite {
    pub student: String,
    pub discipline: String,
    pub session: String,
    pub group: String,
    pub grade: GradeValue,
    pub created: bool,
    pub recorded_at: String,
}

pub struct BatchRequest<'a> {
    pub group: &'a str,
    pub students: &'a [String],
    pub values: &'a [i64],
    /// Required only when the teacher has more than one discipline.
    pub discipline: Option<&'a str>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchEntryWrite {
    pub student: String,
    pub grade: GradeValue,
    pub discipline: String,
    pub session: String,
    pub recorded_at: String,
    pub created: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeEntry {
    pub discipline: String,
    pub session: String,
    pub grade: i64,
    pub recorded_by: String,
    pub recorded_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnGrades {
    pub group: String,
    pub grades: Vec<GradeEntry>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentGrades {
    pub student: String,
    pub grades: Vec<GradeEntry>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupGrades {
    pub group: String,
    pub students: Vec<StudentGrades>,
}

/// One line of the teacher's view. `grade: None` means nothing recorded yet.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisciplineRow {
    pub student: String,
    pub discipline: String,
    pub session: Option<String>,
    pub grade: Option<i64>,
    pub recorded_at: Option<String>,
}

fn begin_write(conn: &Connection) -> Result<Transaction<'_>> {
    Ok(Transaction::new_unchecked(
        conn,
        TransactionBehavior::Immediate,
    )?)
}

/// Confirms the recorder row that backs a role-level grant.
fn require_recorder(
    conn: &Connection,
    actor: &Actor,
    capability: Capability,
    discipline: &Discipline,
) -> Result<()> {
    match capability {
        Capability::AssignedDisciplines => {
            people::require_teacher_assignment(conn, &actor.user_id, discipline)
        }
        Capability::Staff => people::require_admin_assignment(conn, &actor.user_id),
        Capability::OwnGrades => Err(ServiceError::Forbidden(
            "students cannot record grades".into(),
        )),
    }
}

pub fn put_grade(
    conn: &Connection,
    identity: &dyn IdentityResolver,
    actor: &Actor,
    req: &GradeRequest<'_>,
) -> Result<GradeWrite> {
    let value = GradeValue::new(req.value)?;
    let capability = gate::authorize(actor, Action::RecordGrade)?;

    let tx = begin_write(conn)?;
    let student = identity.resolve_user(&tx, req.student, Some(Role::Student))?;
    let group = catalog::group_by_name(&tx, req.group)?;
    let enrollment = people::enrollment_in_group(&tx, &student, &group)?;
    let discipline = catalog::discipline_by_name(&tx, req.discipline)?;
    let session = catalog::session_by_name(&tx, req.session)?;
    require_recorder(&tx, actor, capability, &discipline)?;

    let outcome = ledger::upsert(
        &tx,
        Triple {
            enrollment_id: &enrollment.id,
            discipline_id: &discipline.id,
            session_id: &session.id,
        },
        value,
        &actor.user_id,
    )?;
    tx.commit()?;

    info!(
        recorder = %actor.user_id,
        discipline = %discipline.name,
        session = %session.name,
        grade = value.get(),
        created = outcome.created,
        "grade recorded"
    );
    Ok(GradeWrite {
        student: student.display_name(),
        discipline: discipline.name,
        session: session.name,
        group: group.name,
        grade: value,
        created: outcome.created,
        recorded_at: outcome.recorded_at,
    })
}

/// The discipline a teacher is grading: the named one if given (must be
/// assigned), otherwise their only assignment.
fn teacher_discipline(conn: &Connection, actor: &Actor, named: Option<&str>) -> Result<Discipline> {
    if let Some(name) = named {
        let discipline = catalog::discipline_by_name(conn, name)?;
        people::require_teacher_assignment(conn, &actor.user_id, &discipline)?;
        return Ok(discipline);
    }
    let mut taught = people::teacher_disciplines(conn, &actor.user_id)?;
    match taught.len() {
        0 => Err(ServiceError::not_found(
            EntityKind::TeacherAssignment,
            "you are not assigned to any discipline",
        )),
        1 => Ok(taught.remove(0)),
        _ => {
            let names: Vec<String> = taught.into_iter().map(|d| d.name).collect();
            Err(ServiceError::invalid_with(
                "you teach several disciplines; specify discipline",
                serde_json::json!({ "disciplines": names }),
            ))
        }
    }
}

pub fn put_grades(
    conn: &Connection,
    identity: &dyn IdentityResolver,
    actor: &Actor,
    req: &BatchRequest<'_>,
) -> Result<Vec<BatchEntryWrite>> {
    if req.students.is_empty() || req.values.is_empty() {
        return Err(ServiceError::invalid(
            "students and grades must not be empty",
        ));
    }
    if req.students.len() != req.values.len() {
        return Err(ServiceError::invalid_with(
            "length mismatch: students and grades must have the same length",
            serde_json::json!({
                "students": req.students.len(),
                "grades": req.values.len(),
            }),
        ));
    }
    let values = req
        .values
        .iter()
        .zip(req.students)
        .enumerate()
        .map(|(index, (&v, student))| {
            GradeValue::new(v).map_err(|e| ServiceError::BatchEntry {
                index,
                student: student.clone(),
                source: Box::new(e),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    gate::authorize(actor, Action::RecordGradeBatch)?;

    let tx = begin_write(conn)?;
    let discipline = teacher_discipline(&tx, actor, req.discipline)?;
    let group = catalog::group_by_name(&tx, req.group)?;
    let session = catalog::active_session(&tx)?;

    let mut written = Vec::with_capacity(values.len());
    for (index, (raw, value)) in req.students.iter().zip(values).enumerate() {
        let entry = (|| {
            let student = identity.resolve_user(&tx, raw, Some(Role::Student))?;
            let enrollment = people::enrollment_in_group(&tx, &student, &group)?;
            let outcome = ledger::upsert(
                &tx,
                Triple {
                    enrollment_id: &enrollment.id,
                    discipline_id: &discipline.id,
                    session_id: &session.id,
                },
                value,
                &actor.user_id,
            )?;
            Ok::<_, ServiceError>(BatchEntryWrite {
                student: student.display_name(),
                grade: value,
                discipline: discipline.name.clone(),
                session: session.name.clone(),
                recorded_at: outcome.recorded_at,
                created: outcome.created,
            })
        })()
        .map_err(|e| ServiceError::BatchEntry {
            index,
            student: raw.clone(),
            source: Box::new(e),
        })?;
        written.push(entry);
    }
    tx.commit()?;

    info!(
        recorder = %actor.user_id,
        discipline = %discipline.name,
        session = %session.name,
        group = %group.name,
        count = written.len(),
        "grades recorded in bulk"
    );
    Ok(written)
}

fn grade_entries(
    conn: &Connection,
    enrollment_id: &str,
    discipline_id: Option<&str>,
) -> Result<Vec<GradeEntry>> {
    let mut stmt = conn.prepare(
        "SELECT d.name, p.name, g.grade, u.last_name, u.first_name, u.middle_name, g.recorded_at
         FROM grades g
         JOIN disciplines d ON d.id = g.discipline_id
         JOIN session_periods p ON p.id = g.session_id
         JOIN users u ON u.id = g.recorded_by
         WHERE g.student_id = ?1 AND (?2 IS NULL OR g.discipline_id = ?2)
         ORDER BY p.start_date, p.name, d.name",
    )?;
    let rows = stmt
        .query_map((enrollment_id, discipline_id), |r| {
            let recorder = FullName {
                last_name: r.get(3)?,
                first_name: r.get(4)?,
                middle_name: r.get(5)?,
            };
            Ok(GradeEntry {
                discipline: r.get(0)?,
                session: r.get(1)?,
                grade: r.get(2)?,
                recorded_by: recorder.to_string(),
                recorded_at: r.get(6)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn own_grades(conn: &Connection, actor: &Actor) -> Result<OwnGrades> {
    gate::authorize(actor, Action::ViewOwnGrades)?;
    let Some((enrollment, group)) = people::enrollment_of(conn, &actor.user_id)? else {
        return Err(ServiceError::not_found(
            EntityKind::Student,
            "student profile not found",
        ));
    };
    let grades = grade_entries(conn, &enrollment.id, None)?;
    debug!(user_id = %actor.user_id, count = grades.len(), "own grades viewed");
    Ok(OwnGrades { group, grades })
}

/// Grades of every student in `group`, or in every group when `None`.
pub fn group_grades(
    conn: &Connection,
    actor: &Actor,
    group: Option<&str>,
) -> Result<Vec<GroupGrades>> {
    let capability = gate::authorize(actor, Action::ViewGroupGrades)?;
    if capability == Capability::Staff {
        people::require_admin_assignment(conn, &actor.user_id)?;
    }

    let groups = match group {
        Some(name) => vec![catalog::group_by_name(conn, name)?],
        None => catalog::all_groups(conn)?,
    };

    let mut out = Vec::with_capacity(groups.len());
    for group in groups {
        let mut students = Vec::new();
        for student in people::students_in_group(conn, &group)? {
            let grades = grade_entries(conn, &student.enrollment_id, None)?;
            students.push(StudentGrades {
                student: student.name,
                grades,
            });
        }
        out.push(GroupGrades {
            group: group.name,
            students,
        });
    }
    Ok(out)
}

/// Teacher's view of a group: every student × each assigned discipline
/// (or just `discipline`), with a null row where nothing is recorded yet.
pub fn discipline_grades(
    conn: &Connection,
    actor: &Actor,
    group: &str,
    discipline: Option<&str>,
) -> Result<Vec<DisciplineRow>> {
    gate::authorize(actor, Action::ViewDisciplineGrades)?;

    let disciplines = match discipline {
        Some(name) => {
            let d = catalog::discipline_by_name(conn, name)?;
            people::require_teacher_assignment(conn, &actor.user_id, &d)?;
            vec![d]
        }
        None => people::teacher_disciplines(conn, &actor.user_id)?,
    };
    if disciplines.is_empty() {
        return Err(ServiceError::not_found(
            EntityKind::TeacherAssignment,
            "you are not assigned to any discipline",
        ));
    }
    let group = catalog::group_by_name(conn, group)?;

    let mut rows = Vec::new();
    for student in people::students_in_group(conn, &group)? {
        for d in &disciplines {
            let grades = grade_entries(conn, &student.enrollment_id, Some(&d.id))?;
            if grades.is_empty() {
                rows.push(DisciplineRow {
                    student: student.name.clone(),
                    discipline: d.name.clone(),
                    session: None,
                    grade: None,
                    recorded_at: None,
                });
                continue;
            }
            rows.extend(grades.into_iter().map(|g| DisciplineRow {
                student: student.name.clone(),
                discipline: g.discipline,
                session: Some(g.session),
                grade: Some(g.grade),
                recorded_at: Some(g.recorded_at),
            }));
        }
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::NewSession;
    use crate::identity::FullNameResolver;
    use crate::model::User;
    use crate::people::NewUser;
    use crate::db;

    struct Fixture {
        conn: Connection,
        teacher: Actor,
        staff: Actor,
        student: Actor,
    }

    fn make_user(conn: &Connection, name: &str, role: Role) -> User {
        people::create_user(
            conn,
            NewUser {
                name: FullName::parse(name).expect("name"),
                username: None,
                password_hash: "x".into(),
                role,
            },
        )
        .expect("user")
    }

    /// Teacher T teaches Math, Fall-2024 is active, Jane Doe is in G1.
    fn fixture() -> Fixture {
        let conn = db::open_memory();
        let g1 = catalog::create_group(&conn, "G1").expect("g1");
        catalog::create_group(&conn, "G2").expect("g2");
        let mut ds = catalog::create_disciplines(&conn, &["Math".into(), "Physics".into()])
            .expect("disciplines");
        let math = ds.remove(0);
        catalog::create_session(
            &conn,
            &NewSession {
                name: "Fall-2024",
                start_date: "2024-09-01",
                end_date: "2024-12-31",
                active: true,
            },
        )
        .expect("session");

        let teacher = make_user(&conn, "Teach Tom", Role::Teacher);
        people::assign_teacher(&conn, &teacher, &math).expect("assign");
        let staff = make_user(&conn, "Office Olga", Role::AcademicStaff);
        people::assign_admin(&conn, &staff).expect("admin");
        let jane = make_user(&conn, "Jane Doe", Role::Student);
        people::enroll(&conn, &jane, &g1).expect("enroll");
        let john = make_user(&conn, "John Roe", Role::Student);
        people::enroll(&conn, &john, &g1).expect("enroll john");

        Fixture {
            teacher: Actor::from(&teacher),
            staff: Actor::from(&staff),
            student: Actor::from(&jane),
            conn,
        }
    }

    fn request(value: i64) -> GradeRequest<'static> {
        GradeRequest {
            student: "Jane Doe",
            discipline: "Math",
            session: "Fall-2024",
            group: "G1",
            value,
        }
    }

    fn grade_count(conn: &Connection) -> i64 {
        conn.query_row("SELECT COUNT(*) FROM grades", [], |r| r.get(0))
            .expect("count")
    }

    #[test]
    fn teacher_creates_then_updates_same_triple() {
        let f = fixture();
        let first = put_grade(&f.conn, &FullNameResolver, &f.teacher, &request(5)).expect("create");
        assert!(first.created);
        assert_eq!(first.grade.get(), 5);
        assert_eq!(first.student, "Jane Doe");
        assert_eq!(first.discipline, "Math");

        let second = put_grade(&f.conn, &FullNameResolver, &f.teacher, &request(4)).expect("update");
        assert!(!second.created);
        assert_eq!(second.grade.get(), 4);
        assert_eq!(grade_count(&f.conn), 1);
    }

    #[test]
    fn identical_calls_leave_one_row() {
        let f = fixture();
        put_grade(&f.conn, &FullNameResolver, &f.teacher, &request(3)).expect("first");
        let again = put_grade(&f.conn, &FullNameResolver, &f.teacher, &request(3)).expect("again");
        assert!(!again.created);
        assert_eq!(grade_count(&f.conn), 1);
    }

    #[test]
    fn grade_scale_boundaries() {
        let f = fixture();
        for bad in [1, 6] {
            let err = put_grade(&f.conn, &FullNameResolver, &f.teacher, &request(bad))
                .expect_err("out of range");
            assert_eq!(err.code(), "bad_params");
        }
        for good in [2, 5] {
            put_grade(&f.conn, &FullNameResolver, &f.teacher, &request(good)).expect("in range");
        }
    }

    #[test]
    fn student_actor_is_forbidden_and_writes_nothing() {
        let f = fixture();
        let err = put_grade(&f.conn, &FullNameResolver, &f.student, &request(5)).expect_err("student");
        assert!(matches!(err, ServiceError::Forbidden(_)));
        assert_eq!(grade_count(&f.conn), 0);
    }

    #[test]
    fn teacher_cannot_grade_unassigned_discipline() {
        let f = fixture();
        let req = GradeRequest {
            discipline: "Physics",
            ..request(5)
        };
        let err = put_grade(&f.conn, &FullNameResolver, &f.teacher, &req).expect_err("physics");
        assert!(matches!(
            err,
            ServiceError::NotFound {
                entity: EntityKind::TeacherAssignment,
                ..
            }
        ));
        assert_eq!(grade_count(&f.conn), 0);
    }

    #[test]
    fn staff_can_grade_any_discipline_and_overrides_teacher() {
        let f = fixture();
        put_grade(&f.conn, &FullNameResolver, &f.teacher, &request(3)).expect("teacher");
        let w = put_grade(&f.conn, &FullNameResolver, &f.staff, &request(5)).expect("staff");
        assert!(!w.created);
        let recorder: String = f
            .conn
            .query_row("SELECT recorded_by FROM grades", [], |r| r.get(0))
            .expect("recorder");
        assert_eq!(recorder, f.staff.user_id);

        let physics = GradeRequest {
            discipline: "Physics",
            ..request(4)
        };
        assert!(put_grade(&f.conn, &FullNameResolver, &f.staff, &physics).expect("physics").created);
    }

    #[test]
    fn staff_without_admin_record_is_not_found() {
        let f = fixture();
        let rogue = make_user(&f.conn, "Rogue Rick", Role::AcademicStaff);
        let err = put_grade(&f.conn, &FullNameResolver, &Actor::from(&rogue), &request(5))
            .expect_err("no admin row");
        assert!(matches!(
            err,
            ServiceError::NotFound {
                entity: EntityKind::AdminAssignment,
                ..
            }
        ));
    }

    #[test]
    fn resolution_failures_name_the_entity() {
        let f = fixture();
        let cases = [
            (GradeRequest { student: "Nobody Here", ..request(5) }, EntityKind::User),
            (GradeRequest { group: "G9", ..request(5) }, EntityKind::Group),
            (GradeRequest { group: "G2", ..request(5) }, EntityKind::Student),
            (GradeRequest { discipline: "Art", ..request(5) }, EntityKind::Discipline),
            (GradeRequest { session: "Winter", ..request(5) }, EntityKind::Session),
        ];
        for (req, expected) in cases {
            match put_grade(&f.conn, &FullNameResolver, &f.teacher, &req) {
                Err(ServiceError::NotFound { entity, .. }) => assert_eq!(entity, expected),
                other => panic!("expected not found {expected:?}, got {other:?}"),
            }
        }
    }

    fn batch<'a>(students: &'a [String], values: &'a [i64]) -> BatchRequest<'a> {
        BatchRequest {
            group: "G1",
            students,
            values,
            discipline: None,
        }
    }

    #[test]
    fn batch_length_mismatch_writes_nothing() {
        let f = fixture();
        let students = vec!["Jane Doe".to_string(), "John Roe".to_string()];
        let err = put_grades(&f.conn, &FullNameResolver, &f.teacher, &batch(&students, &[5]))
            .expect_err("mismatch");
        assert_eq!(err.code(), "bad_params");
        assert!(err.to_string().contains("length mismatch"));
        let err = put_grades(&f.conn, &FullNameResolver, &f.teacher, &batch(&[], &[]))
            .expect_err("empty");
        assert_eq!(err.code(), "bad_params");
        assert_eq!(grade_count(&f.conn), 0);
    }

    #[test]
    fn batch_writes_in_input_order_in_active_session() {
        let f = fixture();
        let students = vec!["John Roe".to_string(), "Jane Doe".to_string()];
        let out = put_grades(&f.conn, &FullNameResolver, &f.teacher, &batch(&students, &[4, 5]))
            .expect("batch");
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].student, "John Roe");
        assert_eq!(out[0].grade.get(), 4);
        assert_eq!(out[1].student, "Jane Doe");
        assert!(out.iter().all(|e| e.session == "Fall-2024" && e.discipline == "Math"));
        assert!(out.iter().all(|e| e.created));

        let again = put_grades(&f.conn, &FullNameResolver, &f.teacher, &batch(&students, &[2, 2]))
            .expect("again");
        assert!(again.iter().all(|e| !e.created));
        assert_eq!(grade_count(&f.conn), 2);
    }

    #[test]
    fn batch_fails_fast_without_partial_commit() {
        let f = fixture();
        let students = vec![
            "Jane Doe".to_string(),
            "Ghost Student".to_string(),
            "John Roe".to_string(),
        ];
        let err = put_grades(&f.conn, &FullNameResolver, &f.teacher, &batch(&students, &[5, 5, 5]))
            .expect_err("ghost");
        match &err {
            ServiceError::BatchEntry { index, student, .. } => {
                assert_eq!(*index, 1);
                assert_eq!(student, "Ghost Student");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(err.code(), "not_found");
        assert_eq!(grade_count(&f.conn), 0);
    }

    #[test]
    fn batch_reports_first_out_of_range_value() {
        let f = fixture();
        let students = vec!["Jane Doe".to_string(), "John Roe".to_string()];
        let err = put_grades(&f.conn, &FullNameResolver, &f.teacher, &batch(&students, &[5, 7]))
            .expect_err("range");
        assert!(matches!(err, ServiceError::BatchEntry { index: 1, .. }));
        assert_eq!(err.code(), "bad_params");
    }

    #[test]
    fn batch_is_teacher_only_and_needs_active_session() {
        let f = fixture();
        let students = vec!["Jane Doe".to_string()];
        let err = put_grades(&f.conn, &FullNameResolver, &f.staff, &batch(&students, &[5]))
            .expect_err("staff");
        assert_eq!(err.code(), "forbidden");

        f.conn
            .execute("UPDATE session_periods SET is_active = 0", [])
            .expect("deactivate");
        let err = put_grades(&f.conn, &FullNameResolver, &f.teacher, &batch(&students, &[5]))
            .expect_err("no session");
        assert_eq!(err.code(), "unavailable");
    }

    #[test]
    fn batch_requires_named_discipline_for_multi_discipline_teacher() {
        let f = fixture();
        let physics = catalog::discipline_by_name(&f.conn, "Physics").expect("physics");
        let teacher = crate::identity::user_by_id(&f.conn, &f.teacher.user_id)
            .expect("q")
            .expect("teacher");
        people::assign_teacher(&f.conn, &teacher, &physics).expect("assign physics");

        let students = vec!["Jane Doe".to_string()];
        let err = put_grades(&f.conn, &FullNameResolver, &f.teacher, &batch(&students, &[5]))
            .expect_err("ambiguous");
        assert_eq!(err.code(), "bad_params");

        let named = BatchRequest {
            discipline: Some("Physics"),
            ..batch(&students, &[5])
        };
        let out = put_grades(&f.conn, &FullNameResolver, &f.teacher, &named).expect("physics");
        assert_eq!(out[0].discipline, "Physics");
    }

    #[test]
    fn own_view_lists_only_the_students_grades() {
        let f = fixture();
        put_grade(&f.conn, &FullNameResolver, &f.teacher, &request(5)).expect("jane");
        let john = GradeRequest {
            student: "John Roe",
            ..request(2)
        };
        put_grade(&f.conn, &FullNameResolver, &f.teacher, &john).expect("john");

        let own = own_grades(&f.conn, &f.student).expect("own");
        assert_eq!(own.group, "G1");
        assert_eq!(own.grades.len(), 1);
        assert_eq!(own.grades[0].grade, 5);
        assert_eq!(own.grades[0].recorded_by, "Teach Tom");

        assert_eq!(own_grades(&f.conn, &f.teacher).expect_err("teacher").code(), "forbidden");
    }

    #[test]
    fn discipline_view_marks_missing_grades_as_null() {
        let f = fixture();
        put_grade(&f.conn, &FullNameResolver, &f.teacher, &request(4)).expect("jane");

        let rows = discipline_grades(&f.conn, &f.teacher, "G1", None).expect("view");
        assert_eq!(rows.len(), 2);
        let jane = rows.iter().find(|r| r.student == "Jane Doe").expect("jane row");
        assert_eq!(jane.grade, Some(4));
        assert_eq!(jane.session.as_deref(), Some("Fall-2024"));
        let john = rows.iter().find(|r| r.student == "John Roe").expect("john row");
        assert_eq!(john.grade, None);
        assert_eq!(john.discipline, "Math");

        let err = discipline_grades(&f.conn, &f.student, "G1", None).expect_err("student");
        assert_eq!(err.code(), "forbidden");
        let err = discipline_grades(&f.conn, &f.staff, "G1", None).expect_err("staff");
        assert_eq!(err.code(), "forbidden");
    }

    #[test]
    fn group_view_handles_empty_and_all_groups() {
        let f = fixture();
        put_grade(&f.conn, &FullNameResolver, &f.teacher, &request(5)).expect("jane");

        let empty = group_grades(&f.conn, &f.staff, Some("G2")).expect("g2");
        assert_eq!(empty.len(), 1);
        assert!(empty[0].students.is_empty());

        let all = group_grades(&f.conn, &f.staff, None).expect("all");
        let names: Vec<&str> = all.iter().map(|g| g.group.as_str()).collect();
        assert_eq!(names, vec!["G1", "G2"]);
        let g1 = &all[0];
        assert_eq!(g1.students.len(), 2);
        let jane = g1
            .students
            .iter()
            .find(|s| s.student == "Jane Doe")
            .expect("jane");
        assert_eq!(jane.grades.len(), 1);

        assert_eq!(
            group_grades(&f.conn, &f.teacher, None).expect_err("teacher").code(),
            "forbidden"
        );
        assert_eq!(
            group_grades(&f.conn, &f.staff, Some("G9")).expect_err("missing").code(),
            "not_found"
        );
    }
}
