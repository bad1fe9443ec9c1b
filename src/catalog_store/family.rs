//! Family tree views and genealogy edits served over HTTP.

use super::error::{CatalogError, CatalogResult};
use super::models::*;
use super::queries::*;
use super::validation::{validate_life_dates, validate_relationships, RelationshipUpdate};
use anyhow::Result;
use rusqlite::{params, Connection};
use serde::Serialize;

pub const FEATURED_PEOPLE_LIMIT: usize = 10;
pub const RELATIONSHIP_SEARCH_LIMIT: usize = 10;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TreeNode {
    pub id: i64,
    pub name: String,
    pub first_name: String,
    pub last_name: String,
    pub birth_date: Option<String>,
    pub death_date: Option<String>,
    pub hayward_index: Option<i64>,
}

impl From<&Person> for TreeNode {
    fn from(p: &Person) -> Self {
        TreeNode {
            id: p.id,
            name: p.full_name(),
            first_name: p.first_name.clone(),
            last_name: p.last_name.clone(),
            birth_date: p.birth_date.clone(),
            death_date: p.death_date.clone(),
            hayward_index: p.hayward_index,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Grandparents {
    pub father: Option<TreeNode>,
    pub mother: Option<TreeNode>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FamilyTree {
    pub person: TreeNode,
    pub father: Option<TreeNode>,
    pub mother: Option<TreeNode>,
    pub spouse: Option<TreeNode>,
    pub paternal_grandparents: Grandparents,
    pub maternal_grandparents: Grandparents,
    pub children: Vec<TreeNode>,
    pub siblings: Vec<TreeNode>,
}

fn related(conn: &Connection, id: Option<i64>) -> Result<Option<Person>> {
    match id {
        Some(id) => get_person(conn, id),
        None => Ok(None),
    }
}

fn grandparents(conn: &Connection, parent: &Option<Person>) -> Result<Grandparents> {
    let parent = match parent {
        Some(parent) => parent,
        None => return Ok(Grandparents::default()),
    };
    Ok(Grandparents {
        father: related(conn, parent.father_id)?.as_ref().map(TreeNode::from),
        mother: related(conn, parent.mother_id)?.as_ref().map(TreeNode::from),
    })
}

pub fn family_tree(conn: &Connection, person_id: i64) -> Result<Option<FamilyTree>> {
    let person = match get_person(conn, person_id)? {
        Some(person) => person,
        None => return Ok(None),
    };
    let father = related(conn, person.father_id)?;
    let mother = related(conn, person.mother_id)?;
    let spouse = related(conn, person.spouse_id)?;

    Ok(Some(FamilyTree {
        paternal_grandparents: grandparents(conn, &father)?,
        maternal_grandparents: grandparents(conn, &mother)?,
        father: father.as_ref().map(TreeNode::from),
        mother: mother.as_ref().map(TreeNode::from),
        spouse: spouse.as_ref().map(TreeNode::from),
        children: children_of(conn, person.id)?.iter().map(TreeNode::from).collect(),
        siblings: siblings_of(conn, &person)?.iter().map(TreeNode::from).collect(),
        person: TreeNode::from(&person),
    }))
}

/// People with any father, mother or spouse link.
pub fn featured_people(conn: &Connection) -> Result<Vec<Person>> {
    query_list(
        conn,
        &format!(
            "SELECT {} FROM people p
             WHERE p.father_id IS NOT NULL OR p.mother_id IS NOT NULL OR p.spouse_id IS NOT NULL
             ORDER BY {} LIMIT {}",
            PERSON_COLUMNS, PERSON_ORDER, FEATURED_PEOPLE_LIMIT
        ),
        [],
        person_from_row,
    )
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RelationshipCandidate {
    pub id: i64,
    pub text: String,
    pub birth_date: Option<String>,
    pub death_date: Option<String>,
}

/// Person picker for relationship forms. Queries shorter than two
/// characters return nothing.
pub fn search_relationship_candidates(conn: &Connection, query: &str) -> Result<Vec<RelationshipCandidate>> {
    if query.chars().count() < 2 {
        return Ok(vec![]);
    }
    let pattern = format!("%{}%", query);
    let people = query_list(
        conn,
        &format!(
            "SELECT {} FROM people p WHERE p.first_name LIKE ?1 OR p.last_name LIKE ?1
             ORDER BY {} LIMIT {}",
            PERSON_COLUMNS, PERSON_ORDER, RELATIONSHIP_SEARCH_LIMIT
        ),
        params![pattern],
        person_from_row,
    )?;
    Ok(people
        .iter()
        .map(|p| RelationshipCandidate {
            id: p.id,
            text: p.full_name_reversed(),
            birth_date: p.birth_date.clone(),
            death_date: p.death_date.clone(),
        })
        .collect())
}

fn require_person(conn: &Connection, person_id: i64) -> CatalogResult<Person> {
    get_person(conn, person_id)?.ok_or_else(|| CatalogError::NotFound(format!("Person {}", person_id)))
}

/// Validates and writes father, mother and spouse. Referenced persons must
/// exist.
pub fn update_relationships(conn: &Connection, person_id: i64, update: &RelationshipUpdate) -> CatalogResult<()> {
    let person = require_person(conn, person_id)?;
    for (relation, id) in [
        ("Father", update.father_id),
        ("Mother", update.mother_id),
        ("Spouse", update.spouse_id),
    ] {
        if let Some(id) = id {
            if id != person.id && !person_exists(conn, id)? {
                return Err(CatalogError::InvalidInput(format!("{} {} does not exist", relation, id)));
            }
        }
    }
    validate_relationships(person.id, update, &descendants(conn, person.id)?)?;

    set_parents(conn, person.id, update.father_id, update.mother_id)?;
    // Always rewritten so a one-sided link is repaired on re-submit.
    set_spouse(conn, person.id, update.spouse_id)?;
    Ok(())
}

pub fn update_person_details(
    conn: &Connection,
    person_id: i64,
    first_name: &str,
    last_name: &str,
    birth_date: Option<&str>,
    death_date: Option<&str>,
) -> CatalogResult<()> {
    let person = require_person(conn, person_id)?;
    if first_name.trim().is_empty() {
        return Err(super::validation::ValidationError::EmptyField { field: "first_name" }.into());
    }
    validate_life_dates(birth_date, death_date)?;
    let blank_to_none = |d: Option<&str>| d.map(str::trim).filter(|d| !d.is_empty()).map(str::to_string);
    super::queries::update_person_details(
        conn,
        person.id,
        first_name.trim(),
        last_name.trim(),
        blank_to_none(birth_date).as_deref(),
        blank_to_none(death_date).as_deref(),
    )?;
    Ok(())
}

/// Name and life dates as submitted by the person editor.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PersonDetails {
    pub first_name: String,
    pub last_name: String,
    pub birth_date: Option<String>,
    pub death_date: Option<String>,
}

/// Relationship and detail edits of one person. Either both apply or the
/// caller's transaction rolls both back.
pub fn edit_person(
    conn: &Connection,
    person_id: i64,
    update: &RelationshipUpdate,
    details: Option<&PersonDetails>,
) -> CatalogResult<()> {
    update_relationships(conn, person_id, update)?;
    if let Some(details) = details {
        update_person_details(
            conn,
            person_id,
            &details.first_name,
            &details.last_name,
            details.birth_date.as_deref(),
            details.death_date.as_deref(),
        )?;
    }
    Ok(())
}

pub fn update_biography(conn: &Connection, person_id: i64, notes: &str) -> CatalogResult<Person> {
    let person = require_person(conn, person_id)?;
    set_person_notes(conn, person.id, notes)?;
    require_person(conn, person.id)
}

#[cfg(test)]
mod tests {
    use super::super::queries::test_support::*;
    use super::super::validation::ValidationError;
    use super::*;

    #[test]
    fn builds_three_generation_tree() {
        let conn = memory_db();
        let grandpa = add_person(&conn, "Walter", "Hayward");
        let dad = add_person(&conn, "Doug", "Hayward");
        let mom = add_person(&conn, "Ruth", "Smith");
        let me = add_person(&conn, "Ann", "Hayward");
        let sister = add_person(&conn, "Beth", "Hayward");
        let kid = add_person(&conn, "Cal", "Jones");
        set_parents(&conn, dad, Some(grandpa), None).unwrap();
        set_parents(&conn, me, Some(dad), Some(mom)).unwrap();
        set_parents(&conn, sister, None, Some(mom)).unwrap();
        set_parents(&conn, kid, None, Some(me)).unwrap();
        set_spouse(&conn, dad, Some(mom)).unwrap();

        let tree = family_tree(&conn, me).unwrap().unwrap();
        assert_eq!(tree.father.as_ref().unwrap().id, dad);
        assert_eq!(tree.mother.as_ref().unwrap().id, mom);
        assert_eq!(tree.paternal_grandparents.father.as_ref().unwrap().id, grandpa);
        assert!(tree.maternal_grandparents.father.is_none());
        assert_eq!(tree.children.len(), 1);
        assert_eq!(tree.siblings.iter().map(|s| s.id).collect::<Vec<_>>(), vec![sister]);
        assert!(tree.spouse.is_none());

        let dad_tree = family_tree(&conn, dad).unwrap().unwrap();
        assert_eq!(dad_tree.spouse.unwrap().id, mom);
        assert!(family_tree(&conn, 999).unwrap().is_none());
    }

    #[test]
    fn relationship_search_needs_two_characters() {
        let conn = memory_db();
        add_person(&conn, "Doug", "Thompson");
        assert!(search_relationship_candidates(&conn, "d").unwrap().is_empty());
        let found = search_relationship_candidates(&conn, "do").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].text, "Thompson, Doug");
    }

    #[test]
    fn resubmitted_spouse_repairs_one_sided_link() {
        let conn = memory_db();
        let a = add_person(&conn, "Ann", "Hayward");
        let b = add_person(&conn, "Bob", "Hayward");
        let c = add_person(&conn, "Cara", "Jones");
        conn.execute("UPDATE people SET spouse_id = ?2 WHERE id = ?1", rusqlite::params![a, b])
            .unwrap();
        conn.execute("UPDATE people SET spouse_id = ?2 WHERE id = ?1", rusqlite::params![b, c])
            .unwrap();

        update_relationships(
            &conn,
            a,
            &RelationshipUpdate {
                spouse_id: Some(b),
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(get_person(&conn, a).unwrap().unwrap().spouse_id, Some(b));
        assert_eq!(get_person(&conn, b).unwrap().unwrap().spouse_id, Some(a));
        assert_eq!(get_person(&conn, c).unwrap().unwrap().spouse_id, None);
    }

    #[test]
    fn update_relationships_is_symmetric_and_validated() {
        let conn = memory_db();
        let a = add_person(&conn, "Ann", "Hayward");
        let b = add_person(&conn, "Bob", "Hayward");
        let child = add_person(&conn, "Cal", "Hayward");
        set_parents(&conn, child, Some(b), Some(a)).unwrap();

        update_relationships(
            &conn,
            a,
            &RelationshipUpdate {
                spouse_id: Some(b),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(get_person(&conn, b).unwrap().unwrap().spouse_id, Some(a));

        let err = update_relationships(
            &conn,
            a,
            &RelationshipUpdate {
                father_id: Some(child),
                spouse_id: Some(b),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CatalogError::Validation(ValidationError::CircularAncestry { .. })
        ));

        update_relationships(&conn, a, &RelationshipUpdate::default()).unwrap();
        assert_eq!(get_person(&conn, b).unwrap().unwrap().spouse_id, None);
    }

    #[test]
    fn details_reject_death_before_birth() {
        let conn = memory_db();
        let a = add_person(&conn, "Ann", "Hayward");
        let err = update_person_details(&conn, a, "Ann", "Hayward", Some("1950-01-01"), Some("1940-01-01"))
            .unwrap_err();
        assert!(matches!(err, CatalogError::Validation(ValidationError::DeathBeforeBirth)));
        update_person_details(&conn, a, "Ann", "Hayward", Some("1920-01-01"), Some("")).unwrap();
        let p = get_person(&conn, a).unwrap().unwrap();
        assert_eq!(p.birth_date.as_deref(), Some("1920-01-01"));
        assert_eq!(p.death_date, None);
    }
}
