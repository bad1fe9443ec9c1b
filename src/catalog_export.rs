//! Whole-catalog JSON export and import.
//!
//! The document holds one array per table, each record an object keyed by
//! column name, plus a `metadata` object. Import upserts records by primary
//! key in dependency order, entities before join rows. People go in two
//! passes so father, mother and spouse references resolve regardless of
//! record order.

use crate::catalog_store::SqliteCatalogStore;
use anyhow::{bail, Context, Result};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::path::Path;
use tracing::{info, warn};

pub const EXPORT_VERSION: &str = "1.0";

/// Tables in import order, with their primary key column.
pub const EXPORT_TABLES: [(&str, &str); 11] = [
    ("people", "id"),
    ("locations", "id"),
    ("tags", "tag"),
    ("films", "id"),
    ("chapters", "id"),
    ("film_people", "id"),
    ("film_locations", "id"),
    ("film_tags", "id"),
    ("chapter_people", "id"),
    ("chapter_locations", "id"),
    ("chapter_tags", "id"),
];

const PERSON_LINK_COLUMNS: [&str; 3] = ["father_id", "mother_id", "spouse_id"];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExportMetadata {
    pub export_version: String,
    pub export_date: String,
    pub total_records: usize,
    pub models_exported: Vec<String>,
}

// =============================================================================
// Value conversion
// =============================================================================

fn sql_to_json(value: SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Integer(i) => Value::from(i),
        SqlValue::Real(f) => serde_json::Number::from_f64(f).map_or(Value::Null, Value::Number),
        SqlValue::Text(s) => Value::String(s),
        SqlValue::Blob(b) => Value::from(b),
    }
}

fn json_to_sql(value: &Value) -> Result<SqlValue> {
    Ok(match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(*b as i64),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => bail!("Unsupported value {}", other),
    })
}

fn table_columns(conn: &Connection, table: &str) -> Result<HashSet<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<Result<HashSet<_>, _>>()?;
    Ok(columns)
}

// =============================================================================
// Export
// =============================================================================

fn export_table(conn: &Connection, table: &str, primary_key: &str) -> Result<Vec<Value>> {
    let mut stmt = conn.prepare(&format!("SELECT * FROM {} ORDER BY {}", table, primary_key))?;
    let names: Vec<String> = stmt.column_names().iter().map(|n| n.to_string()).collect();
    let rows = stmt
        .query_map([], |row| {
            let mut record = Map::new();
            for (index, name) in names.iter().enumerate() {
                record.insert(name.clone(), sql_to_json(row.get::<_, SqlValue>(index)?));
            }
            Ok(Value::Object(record))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Builds the export document from one consistent read.
pub fn export_catalog(conn: &Connection) -> Result<Value> {
    let mut document = Map::new();
    let mut total_records = 0;
    for (table, primary_key) in EXPORT_TABLES {
        let records = export_table(conn, table, primary_key)
            .with_context(|| format!("Failed to export {}", table))?;
        info!("  - {}: {} records", table, records.len());
        total_records += records.len();
        document.insert(table.to_string(), Value::Array(records));
    }
    let metadata = ExportMetadata {
        export_version: EXPORT_VERSION.to_string(),
        export_date: chrono::Utc::now().to_rfc3339(),
        total_records,
        models_exported: EXPORT_TABLES.iter().map(|(t, _)| t.to_string()).collect(),
    };
    document.insert("metadata".to_string(), serde_json::to_value(metadata)?);
    Ok(Value::Object(document))
}

pub fn export_to_file(store: &SqliteCatalogStore, path: &Path) -> Result<usize> {
    let document = store.read(export_catalog)?;
    let total = document["metadata"]["total_records"].as_u64().unwrap_or(0) as usize;
    let json = serde_json::to_string_pretty(&document)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write export {:?}", path))?;
    Ok(total)
}

// =============================================================================
// Import
// =============================================================================

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TableImport {
    pub table: String,
    pub imported: usize,
    pub failed: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub tables: Vec<TableImport>,
    pub missing_keys: Vec<String>,
    pub cleared: bool,
    pub dry_run: bool,
}

impl ImportReport {
    pub fn total_imported(&self) -> usize {
        self.tables.iter().map(|t| t.imported).sum()
    }

    pub fn total_failed(&self) -> usize {
        self.tables.iter().map(|t| t.failed).sum()
    }
}

/// Deletes every catalog row, join tables first.
pub fn clear_catalog(conn: &Connection) -> Result<()> {
    for (table, _) in EXPORT_TABLES.iter().rev() {
        conn.execute(&format!("DELETE FROM {}", table), [])?;
    }
    Ok(())
}

/// Inserts or updates one record by primary key, writing only the columns
/// it carries. Unknown columns are an error for the record.
fn upsert_record(
    conn: &Connection,
    table: &str,
    primary_key: &str,
    columns: &HashSet<String>,
    record: &Map<String, Value>,
    skip: &[&str],
) -> Result<()> {
    let mut names = Vec::new();
    let mut values = Vec::new();
    for (name, value) in record {
        if skip.contains(&name.as_str()) {
            continue;
        }
        if !columns.contains(name) {
            bail!("Unknown column {}.{}", table, name);
        }
        names.push(name.as_str());
        values.push(json_to_sql(value)?);
    }
    if !names.contains(&primary_key) {
        bail!("Record without {}", primary_key);
    }

    let placeholders: Vec<String> = (1..=names.len()).map(|i| format!("?{}", i)).collect();
    let updates: Vec<String> = names
        .iter()
        .filter(|n| **n != primary_key)
        .map(|n| format!("{} = excluded.{}", n, n))
        .collect();
    let sql = if updates.is_empty() {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT({}) DO NOTHING",
            table,
            names.join(", "),
            placeholders.join(", "),
            primary_key
        )
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT({}) DO UPDATE SET {}",
            table,
            names.join(", "),
            placeholders.join(", "),
            primary_key,
            updates.join(", ")
        )
    };
    conn.execute(&sql, params_from_iter(values))?;
    Ok(())
}

fn set_person_links(conn: &Connection, record: &Map<String, Value>) -> Result<()> {
    let id = record.get("id").and_then(Value::as_i64).context("Person record without id")?;
    for column in PERSON_LINK_COLUMNS {
        if let Some(value) = record.get(column) {
            conn.execute(
                &format!("UPDATE people SET {} = ?1 WHERE id = ?2", column),
                rusqlite::params![json_to_sql(value)?, id],
            )?;
        }
    }
    Ok(())
}

/// Imports `document` on `conn`. Per-record failures are logged and
/// counted; they never abort the import.
pub fn import_catalog(conn: &Connection, document: &Value, clear_existing: bool) -> Result<ImportReport> {
    let Some(document) = document.as_object() else {
        bail!("Export document is not a JSON object");
    };
    let mut report = ImportReport::default();

    for key in EXPORT_TABLES.iter().map(|(t, _)| *t).chain(["metadata"]) {
        if !document.contains_key(key) {
            warn!("Missing key in export data: {}", key);
            report.missing_keys.push(key.to_string());
        }
    }
    if let Some(metadata) = document.get("metadata") {
        info!(
            "Export version {}, {} records",
            metadata["export_version"].as_str().unwrap_or("unknown"),
            metadata["total_records"]
        );
    }

    if clear_existing {
        clear_catalog(conn)?;
        report.cleared = true;
        warn!("Existing catalog data cleared");
    }

    for (table, primary_key) in EXPORT_TABLES {
        let mut outcome = TableImport {
            table: table.to_string(),
            ..Default::default()
        };
        let records = document.get(table).and_then(Value::as_array).map(Vec::as_slice).unwrap_or(&[]);
        let columns = table_columns(conn, table)?;
        let skip: &[&str] = if table == "people" { &PERSON_LINK_COLUMNS } else { &[] };

        for record in records {
            let result = match record.as_object() {
                Some(record) => upsert_record(conn, table, primary_key, &columns, record, skip),
                None => Err(anyhow::anyhow!("Record is not an object")),
            };
            match result {
                Ok(()) => outcome.imported += 1,
                Err(e) => {
                    warn!("Error importing {} record: {:#}", table, e);
                    outcome.failed += 1;
                }
            }
        }

        if table == "people" {
            for record in records.iter().filter_map(Value::as_object) {
                if let Err(e) = set_person_links(conn, record) {
                    warn!("Error linking person record: {:#}", e);
                    outcome.failed += 1;
                }
            }
        }
        info!("Imported {}: {} records, {} failed", table, outcome.imported, outcome.failed);
        report.tables.push(outcome);
    }
    Ok(report)
}

/// Reads and imports a JSON export in one transaction; a dry run rolls it
/// back.
pub fn import_from_file(
    store: &SqliteCatalogStore,
    path: &Path,
    clear_existing: bool,
    dry_run: bool,
) -> Result<ImportReport> {
    let text = std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
    let document: Value = serde_json::from_str(&text).with_context(|| format!("Invalid JSON in {:?}", path))?;
    let mut report = store.write_or_rollback(dry_run, |conn| import_catalog(conn, &document, clear_existing))?;
    report.dry_run = dry_run;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog_store::queries::test_support::*;
    use crate::catalog_store::queries::*;
    use serde_json::json;

    fn seeded() -> Connection {
        let conn = memory_db();
        let film = add_film(&conn, "F1", "Film");
        let chapter = add_chapter(&conn, film, "0:10", "Opening", 1);
        let child = add_person(&conn, "Cal", "Hayward");
        let dad = add_person(&conn, "Doug", "Hayward");
        set_parents(&conn, child, Some(dad), None).unwrap();
        link(&conn, CHAPTER_PEOPLE, chapter, &child).unwrap();
        get_or_create_tag(&conn, "birthday", crate::catalog_store::TagCategory::Events).unwrap();
        link(&conn, FILM_TAGS, film, &"birthday").unwrap();
        conn
    }

    #[test]
    fn export_then_import_into_empty_catalog() {
        let source = seeded();
        let document = export_catalog(&source).unwrap();
        assert_eq!(document["metadata"]["export_version"], "1.0");
        assert_eq!(document["metadata"]["models_exported"].as_array().unwrap().len(), 11);
        assert_eq!(document["people"].as_array().unwrap().len(), 2);

        let target = memory_db();
        let report = import_catalog(&target, &document, false).unwrap();
        assert!(report.missing_keys.is_empty());
        assert_eq!(report.total_failed(), 0);
        assert_eq!(report.total_imported(), 7);

        // The child comes before its father in the export, so links resolve
        // only through the second pass.
        let child = find_person_by_name(&target, "Cal", "Hayward").unwrap().unwrap();
        let dad = find_person_by_name(&target, "Doug", "Hayward").unwrap().unwrap();
        assert_eq!(child.father_id, Some(dad.id));
        assert_eq!(chapter_people(&target, 1).unwrap().len(), 1);
        assert_eq!(film_tags(&target, 1).unwrap()[0].tag, "birthday");
    }

    #[test]
    fn bad_records_are_counted_and_missing_keys_reported() {
        let target = memory_db();
        let document = json!({
            "people": [
                {"id": 1, "first_name": "Ann", "last_name": "Lee"},
                {"id": 2, "first_name": "Bob", "bogus": 1},
                "not an object"
            ],
            "film_people": [{"id": 1, "film_id": 99, "person_id": 1}]
        });
        let report = import_catalog(&target, &document, false).unwrap();
        assert!(report.missing_keys.contains(&"films".to_string()));
        assert!(report.missing_keys.contains(&"metadata".to_string()));
        let people = &report.tables[0];
        assert_eq!((people.imported, people.failed), (1, 2));
        // Foreign key to a missing film.
        assert_eq!(report.tables[5].failed, 1);
    }

    #[test]
    fn import_updates_by_primary_key_and_clears_on_request() {
        let target = seeded();
        let document = json!({
            "people": [{"id": 1, "first_name": "Calvin", "last_name": "Hayward"}],
        });
        import_catalog(&target, &document, false).unwrap();
        assert_eq!(get_person(&target, 1).unwrap().unwrap().first_name, "Calvin");
        assert_eq!(list_people(&target).unwrap().len(), 2);

        let report = import_catalog(&target, &document, true).unwrap();
        assert!(report.cleared);
        assert_eq!(list_people(&target).unwrap().len(), 1);
        assert!(list_films(&target).unwrap().is_empty());
    }
}
