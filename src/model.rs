use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ServiceError;

pub const GRADE_MIN: i64 = 2;
pub const GRADE_MAX: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Teacher,
    AcademicStaff,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Student, Role::Teacher, Role::AcademicStaff];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Teacher => "teacher",
            Role::AcademicStaff => "academic_staff",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Role::Student),
            "teacher" => Ok(Role::Teacher),
            "academic_staff" => Ok(Role::AcademicStaff),
            other => Err(ServiceError::invalid(format!(
                "unknown role {other:?}; expected student, teacher or academic_staff"
            ))),
        }
    }
}

impl ToSql for Role {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Role {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        s.parse::<Role>()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

/// Grade on the 2..=5 scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct GradeValue(u8);

impl GradeValue {
    pub fn new(value: i64) -> Result<Self, ServiceError> {
        if !(GRADE_MIN..=GRADE_MAX).contains(&value) {
            return Err(ServiceError::invalid_with(
                format!("grade out of range: {value} (allowed {GRADE_MIN}..={GRADE_MAX})"),
                serde_json::json!({ "value": value, "min": GRADE_MIN, "max": GRADE_MAX }),
            ));
        }
        Ok(GradeValue(value as u8))
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl ToSql for GradeValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(i64::from(self.0)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FullName {
    pub last_name: String,
    pub first_name: String,
    pub middle_name: String,
}

impl FullName {
    /// Parses "Last First [Middle]" separated by whitespace.
    pub fn parse(raw: &str) -> Result<Self, ServiceError> {
        let parts: Vec<&str> = raw.split_whitespace().collect();
        let (last, first, middle) = match parts.as_slice() {
            [last, first] => (*last, *first, ""),
            [last, first, middle] => (*last, *first, *middle),
            _ => {
                return Err(ServiceError::invalid_with(
                    "full name must be \"last first middle\" (middle name optional)",
                    serde_json::json!({ "identity": raw }),
                ))
            }
        };
        Ok(FullName {
            last_name: last.to_string(),
            first_name: first.to_string(),
            middle_name: middle.to_string(),
        })
    }

    pub fn from_parts(last: &str, first: &str, middle: &str) -> Result<Self, ServiceError> {
        let name = FullName {
            last_name: last.trim().to_string(),
            first_name: first.trim().to_string(),
            middle_name: middle.trim().to_string(),
        };
        if name.last_name.is_empty() || name.first_name.is_empty() {
            return Err(ServiceError::invalid(
                "lastName and firstName must not be empty",
            ));
        }
        if [&name.last_name, &name.first_name, &name.middle_name]
            .iter()
            .any(|p| p.chars().any(char::is_whitespace))
        {
            return Err(ServiceError::invalid("name parts must not contain spaces"));
        }
        Ok(name)
    }
}

impl fmt::Display for FullName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.middle_name.is_empty() {
            write!(f, "{} {}", self.last_name, self.first_name)
        } else {
            write!(f, "{} {} {}", self.last_name, self.first_name, self.middle_name)
        }
    }
}

#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub name: FullName,
    pub username: Option<String>,
    pub password_hash: String,
    pub role: Role,
}

impl User {
    pub const COLUMNS: &'static str =
        "id, last_name, first_name, middle_name, username, password_hash, role";

    pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(User {
            id: row.get(0)?,
            name: FullName {
                last_name: row.get(1)?,
                first_name: row.get(2)?,
                middle_name: row.get(3)?,
            },
            username: row.get(4)?,
            password_hash: row.get(5)?,
            role: row.get(6)?,
        })
    }

    pub fn display_name(&self) -> String {
        self.name.to_string()
    }
}

/// Authenticated caller of a request.
#[derive(Debug, Clone)]
pub struct Actor {
    pub user_id: String,
    pub role: Role,
    pub display_name: String,
}

impl From<&User> for Actor {
    fn from(user: &User) -> Self {
        Actor {
            user_id: user.id.clone(),
            role: user.role,
            display_name: user.display_name(),
        }
    }
}
