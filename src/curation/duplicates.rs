//! Heuristic duplicate candidates. Nothing here writes; the operator decides
//! which candidates get merged.

use crate::catalog_store::queries::*;
use crate::catalog_store::{Location, Person};
use anyhow::Result;
use rusqlite::Connection;
use serde::Serialize;
use std::collections::BTreeMap;

/// A person with its association row counts, for display next to a candidate.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PersonUsage {
    pub id: i64,
    pub name: String,
    pub film_rows: i64,
    pub chapter_rows: i64,
}

impl PersonUsage {
    fn of(conn: &Connection, person: &Person) -> Result<Self> {
        Ok(PersonUsage {
            id: person.id,
            name: person.full_name().trim().to_string(),
            film_rows: count_target_rows(conn, FILM_PEOPLE, &person.id)?,
            chapter_rows: count_target_rows(conn, CHAPTER_PEOPLE, &person.id)?,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MergeCandidate {
    pub keep: PersonUsage,
    pub remove: PersonUsage,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct IdenticalNameGroup {
    pub keep: PersonUsage,
    pub duplicates: Vec<PersonUsage>,
}

fn group_people<K: Ord>(people: Vec<Person>, key: impl Fn(&Person) -> K) -> BTreeMap<K, Vec<Person>> {
    let mut groups: BTreeMap<K, Vec<Person>> = BTreeMap::new();
    for person in people {
        groups.entry(key(&person)).or_default().push(person);
    }
    for group in groups.values_mut() {
        group.sort_by_key(|p| p.id);
    }
    groups
}

/// Pairs every person with a last name against every person sharing the
/// first name (trimmed, case-insensitive) but without one. People with a
/// blank first name are never paired.
pub fn find_blank_last_name_duplicates(conn: &Connection) -> Result<Vec<MergeCandidate>> {
    let groups = group_people(list_people(conn)?, |p| p.first_name.trim().to_lowercase());
    let mut candidates = Vec::new();
    for (_, group) in groups.iter().filter(|(first_name, _)| !first_name.is_empty()) {
        let (named, blank): (Vec<&Person>, Vec<&Person>) =
            group.iter().partition(|p| !p.last_name.trim().is_empty());
        for keep in &named {
            for remove in &blank {
                candidates.push(MergeCandidate {
                    keep: PersonUsage::of(conn, keep)?,
                    remove: PersonUsage::of(conn, remove)?,
                });
            }
        }
    }
    Ok(candidates)
}

/// Groups of persons whose trimmed, case-insensitive full names are equal.
/// The keeper is the lowest id.
pub fn find_identical_name_duplicates(conn: &Connection) -> Result<Vec<IdenticalNameGroup>> {
    let groups = group_people(list_people(conn)?, |p| {
        (p.first_name.trim().to_lowercase(), p.last_name.trim().to_lowercase())
    });
    let mut found = Vec::new();
    for group in groups.values().filter(|g| g.len() > 1) {
        let keep = PersonUsage::of(conn, &group[0])?;
        let duplicates = group[1..]
            .iter()
            .map(|p| PersonUsage::of(conn, p))
            .collect::<Result<Vec<_>>>()?;
        found.push(IdenticalNameGroup { keep, duplicates });
    }
    Ok(found)
}

/// Location pairs where one name contains the other, ignoring case. Names
/// that are exactly equal are not reported.
pub fn find_similar_locations(conn: &Connection) -> Result<Vec<(Location, Location)>> {
    let locations = list_locations(conn)?;
    let lowered: Vec<String> = locations.iter().map(|l| l.name.to_lowercase()).collect();
    let mut pairs = Vec::new();
    for i in 0..locations.len() {
        for j in i + 1..locations.len() {
            if locations[i].name == locations[j].name {
                continue;
            }
            if lowered[i].contains(&lowered[j]) || lowered[j].contains(&lowered[i]) {
                pairs.push((locations[i].clone(), locations[j].clone()));
            }
        }
    }
    Ok(pairs)
}

/// Locations whose name contains a colon, likely several places in one.
pub fn find_compound_locations(conn: &Connection) -> Result<Vec<Location>> {
    Ok(list_locations(conn)?
        .into_iter()
        .filter(|l| l.name.contains(':'))
        .collect())
}
