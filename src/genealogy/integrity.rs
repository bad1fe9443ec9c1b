//! Relationship integrity checks over the whole people table.

use crate::catalog_store::queries::list_people;
use crate::catalog_store::Person;
use anyhow::Result;
use rusqlite::Connection;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum IntegrityIssue {
    SelfFather,
    SelfMother,
    SelfSpouse,
    SameFatherAndMother,
    SpouseNotMutual { spouse_id: i64, spouse_name: String },
    GrandfatherIsSelf,
    GrandmotherIsSelf,
}

impl fmt::Display for IntegrityIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntegrityIssue::SelfFather => write!(f, "Self-referential father relationship"),
            IntegrityIssue::SelfMother => write!(f, "Self-referential mother relationship"),
            IntegrityIssue::SelfSpouse => write!(f, "Self-referential spouse relationship"),
            IntegrityIssue::SameFatherAndMother => write!(f, "Father and mother are the same person"),
            IntegrityIssue::SpouseNotMutual { spouse_name, .. } => {
                write!(f, "Spouse relationship not mutual with {}", spouse_name)
            }
            IntegrityIssue::GrandfatherIsSelf => write!(f, "Generational loop detected (grandfather is self)"),
            IntegrityIssue::GrandmotherIsSelf => write!(f, "Generational loop detected (grandmother is self)"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PersonIssues {
    pub person_id: i64,
    pub name: String,
    pub issues: Vec<IntegrityIssue>,
}

fn issues_of(person: &Person, by_id: &HashMap<i64, &Person>) -> Vec<IntegrityIssue> {
    let mut issues = Vec::new();
    let lookup = |id: Option<i64>| id.and_then(|id| by_id.get(&id).copied());

    if person.father_id == Some(person.id) {
        issues.push(IntegrityIssue::SelfFather);
    }
    if person.mother_id == Some(person.id) {
        issues.push(IntegrityIssue::SelfMother);
    }
    if person.spouse_id == Some(person.id) {
        issues.push(IntegrityIssue::SelfSpouse);
    }
    if person.father_id.is_some() && person.father_id == person.mother_id {
        issues.push(IntegrityIssue::SameFatherAndMother);
    }
    if let Some(spouse) = lookup(person.spouse_id) {
        if spouse.spouse_id != Some(person.id) {
            issues.push(IntegrityIssue::SpouseNotMutual {
                spouse_id: spouse.id,
                spouse_name: spouse.full_name(),
            });
        }
    }
    if lookup(person.father_id).is_some_and(|father| father.father_id == Some(person.id)) {
        issues.push(IntegrityIssue::GrandfatherIsSelf);
    }
    if lookup(person.mother_id).is_some_and(|mother| mother.mother_id == Some(person.id)) {
        issues.push(IntegrityIssue::GrandmotherIsSelf);
    }
    issues
}

/// People with at least one issue, ordered by id.
pub fn check_integrity(conn: &Connection) -> Result<Vec<PersonIssues>> {
    let mut people = list_people(conn)?;
    people.sort_by_key(|p| p.id);
    let by_id: HashMap<i64, &Person> = people.iter().map(|p| (p.id, p)).collect();

    Ok(people
        .iter()
        .filter_map(|person| {
            let issues = issues_of(person, &by_id);
            (!issues.is_empty()).then(|| PersonIssues {
                person_id: person.id,
                name: person.full_name(),
                issues,
            })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog_store::queries::test_support::*;
    use rusqlite::params;

    #[test]
    fn reports_each_kind_of_issue() {
        let conn = memory_db();
        let a = add_person(&conn, "Ann", "Lee");
        let b = add_person(&conn, "Bob", "Lee");
        let c = add_person(&conn, "Cal", "Lee");
        // One-sided spouse and a two-person father loop written directly.
        conn.execute("UPDATE people SET spouse_id = ?1 WHERE id = ?2", params![b, a]).unwrap();
        conn.execute("UPDATE people SET father_id = ?1 WHERE id = ?2", params![c, b]).unwrap();
        conn.execute("UPDATE people SET father_id = ?1 WHERE id = ?2", params![b, c]).unwrap();
        conn.execute("UPDATE people SET mother_id = ?1, father_id = ?1 WHERE id = ?1", params![a]).unwrap();

        let found = check_integrity(&conn).unwrap();
        let ann = found.iter().find(|p| p.person_id == a).unwrap();
        assert!(ann.issues.contains(&IntegrityIssue::SelfFather));
        assert!(ann.issues.contains(&IntegrityIssue::SelfMother));
        assert!(ann.issues.contains(&IntegrityIssue::SameFatherAndMother));
        assert!(matches!(ann.issues.last(), Some(IntegrityIssue::GrandmotherIsSelf)));
        assert!(ann
            .issues
            .iter()
            .any(|i| i.to_string() == "Spouse relationship not mutual with Bob Lee"));

        let bob = found.iter().find(|p| p.person_id == b).unwrap();
        assert_eq!(bob.issues, vec![IntegrityIssue::GrandfatherIsSelf]);
    }

    #[test]
    fn clean_family_has_no_issues() {
        let conn = memory_db();
        let a = add_person(&conn, "Ann", "Lee");
        let b = add_person(&conn, "Bob", "Lee");
        crate::catalog_store::queries::set_spouse(&conn, a, Some(b)).unwrap();
        assert!(check_integrity(&conn).unwrap().is_empty());
    }
}
