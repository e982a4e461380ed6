//! Role-based capability check consulted before every grade operation.

use crate::error::ServiceError;
use crate::model::{Actor, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ViewOwnGrades,
    ViewGroupGrades,
    ViewDisciplineGrades,
    RecordGrade,
    RecordGradeBatch,
    ManageCatalog,
    ManagePeople,
}

/// What the caller may act on once the gate lets them through.
///
/// `AssignedDisciplines` and `Staff` are role-level grants only: the service
/// still has to find the matching teacher or admin assignment row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    OwnGrades,
    AssignedDisciplines,
    Staff,
}

pub fn authorize(actor: &Actor, action: Action) -> Result<Capability, ServiceError> {
    use Action::*;

    match (actor.role, action) {
        (Role::Student, ViewOwnGrades) => Ok(Capability::OwnGrades),
        (Role::Student, RecordGrade | RecordGradeBatch) => Err(ServiceError::Forbidden(
            "students cannot record grades".into(),
        )),
        (Role::Student, ViewGroupGrades | ViewDisciplineGrades) => Err(ServiceError::Forbidden(
            "students can only view their own grades".into(),
        )),
        (Role::Student, ManageCatalog | ManagePeople) => Err(ServiceError::Forbidden(
            "only academic staff can manage records".into(),
        )),

        (Role::Teacher, RecordGrade | RecordGradeBatch | ViewDisciplineGrades) => {
            Ok(Capability::AssignedDisciplines)
        }
        (Role::Teacher, ViewOwnGrades) => Err(ServiceError::Forbidden(
            "only students have their own grades to view".into(),
        )),
        (Role::Teacher, ViewGroupGrades) => Err(ServiceError::Forbidden(
            "teachers view grades per discipline; use grades.discipline".into(),
        )),
        (Role::Teacher, ManageCatalog | ManagePeople) => Err(ServiceError::Forbidden(
            "only academic staff can manage records".into(),
        )),

        (Role::AcademicStaff, RecordGrade | ViewGroupGrades | ManageCatalog | ManagePeople) => {
            Ok(Capability::Staff)
        }
        (Role::AcademicStaff, RecordGradeBatch) => Err(ServiceError::Forbidden(
            "only teachers can record grades in bulk".into(),
        )),
        (Role::AcademicStaff, ViewDisciplineGrades) => Err(ServiceError::Forbidden(
            "academic staff view grades per group; use grades.group".into(),
        )),
        (Role::AcademicStaff, ViewOwnGrades) => Err(ServiceError::Forbidden(
            "only students have their own grades to view".into(),
        )),
    }
}
