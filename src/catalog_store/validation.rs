//! Validation for genealogy edits.
//!
//! Checks run before relationship or life-date updates are written. The
//! store supplies the set of descendants so that ancestry loops can be
//! rejected without walking the tree here.

use chrono::NaiveDate;
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    SelfReference {
        relation: &'static str,
    },
    SameParents,
    CircularAncestry {
        relation: &'static str,
        person_id: i64,
    },
    InvalidDate {
        field: &'static str,
        value: String,
    },
    DeathBeforeBirth,
    EmptyField {
        field: &'static str,
    },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::SelfReference { relation } => {
                write!(f, "Person cannot be their own {}", relation)
            }
            ValidationError::SameParents => {
                write!(f, "Father and mother cannot be the same person")
            }
            ValidationError::CircularAncestry {
                relation,
                person_id,
            } => write!(
                f,
                "Person {} cannot be {} because they are a descendant",
                person_id, relation
            ),
            ValidationError::InvalidDate { field, value } => {
                write!(f, "Field '{}' is not a valid YYYY-MM-DD date: {}", field, value)
            }
            ValidationError::DeathBeforeBirth => {
                write!(f, "Death date must be after birth date")
            }
            ValidationError::EmptyField { field } => {
                write!(f, "Field '{}' is required but was empty", field)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult<T> = Result<T, ValidationError>;

/// Proposed father/mother/spouse for one person; `None` clears the link.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RelationshipUpdate {
    pub father_id: Option<i64>,
    pub mother_id: Option<i64>,
    pub spouse_id: Option<i64>,
}

/// `descendants` are all persons reachable from `person_id` through
/// father/mother links pointing at it (children, grandchildren, ...).
pub fn validate_relationships(
    person_id: i64,
    update: &RelationshipUpdate,
    descendants: &HashSet<i64>,
) -> ValidationResult<()> {
    for (relation, value) in [
        ("father", update.father_id),
        ("mother", update.mother_id),
        ("spouse", update.spouse_id),
    ] {
        if value == Some(person_id) {
            return Err(ValidationError::SelfReference { relation });
        }
    }

    if let (Some(father), Some(mother)) = (update.father_id, update.mother_id) {
        if father == mother {
            return Err(ValidationError::SameParents);
        }
    }

    for (relation, value) in [("father", update.father_id), ("mother", update.mother_id)] {
        if let Some(parent_id) = value {
            if descendants.contains(&parent_id) {
                return Err(ValidationError::CircularAncestry {
                    relation,
                    person_id: parent_id,
                });
            }
        }
    }
    Ok(())
}

pub fn parse_date(field: &'static str, value: &str) -> ValidationResult<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| ValidationError::InvalidDate {
        field,
        value: value.to_string(),
    })
}

/// Blank dates count as unknown. When both are known, death must be
/// strictly after birth.
pub fn validate_life_dates(birth: Option<&str>, death: Option<&str>) -> ValidationResult<()> {
    let birth = match birth.filter(|s| !s.trim().is_empty()) {
        Some(b) => Some(parse_date("birth_date", b)?),
        None => None,
    };
    let death = match death.filter(|s| !s.trim().is_empty()) {
        Some(d) => Some(parse_date("death_date", d)?),
        None => None,
    };
    if let (Some(birth), Some(death)) = (birth, death) {
        if death <= birth {
            return Err(ValidationError::DeathBeforeBirth);
        }
    }
    Ok(())
}
