//! Talkgroup and geography lookup tables
//!
//! Both tables are loaded from reference CSVs at startup (upsert, so reloads
//! are idempotent). The talkgroup table is also editable through the admin API.

use super::{lock, ReadPool, StoreError};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// Country value marking talkgroups of global interest.
pub const GLOBAL_COUNTRY: &str = "Global";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TalkgroupEntry {
    pub talkgroup: String,
    pub country: String,
    pub name: String,
}

/// Talkgroup entry with its row id, as exposed to admin clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TalkgroupRow {
    pub id: i64,
    pub talkgroup: String,
    pub country: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountryEntry {
    pub country_name: String,
    pub continent_name: String,
    pub continent_code: String,
    pub country_code: String,
}

/// `{label, value}` pair for selection lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabeledOption {
    pub label: String,
    pub value: String,
}

#[derive(Clone)]
pub struct Directory {
    writer: Arc<Mutex<Connection>>,
    readers: Arc<ReadPool>,
}

impl Directory {
    pub(crate) fn new(writer: Arc<Mutex<Connection>>, readers: Arc<ReadPool>) -> Self {
        Self { writer, readers }
    }

    pub fn upsert_talkgroup(&self, entry: &TalkgroupEntry) -> Result<(), StoreError> {
        let conn = lock(&self.writer)?;
        conn.execute(
            r#"
            INSERT INTO talkgroups (talkgroup, country, name)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(talkgroup) DO UPDATE SET
                country = excluded.country,
                name = excluded.name
            "#,
            params![entry.talkgroup, entry.country, entry.name],
        )?;
        Ok(())
    }

    pub fn upsert_country(&self, entry: &CountryEntry) -> Result<(), StoreError> {
        let conn = lock(&self.writer)?;
        conn.execute(
            r#"
            INSERT INTO geography (country_name, continent_name, continent_code, country_code)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(country_name) DO UPDATE SET
                continent_name = excluded.continent_name,
                continent_code = excluded.continent_code,
                country_code = excluded.country_code
            "#,
            params![
                entry.country_name,
                entry.continent_name,
                entry.continent_code,
                entry.country_code
            ],
        )?;
        Ok(())
    }

    pub fn talkgroup(&self, key: &str) -> Result<Option<TalkgroupEntry>, StoreError> {
        self.readers.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT talkgroup, country, name FROM talkgroups WHERE talkgroup = ?1",
                    params![key],
                    entry_from_row,
                )
                .optional()?)
        })
    }

    /// Talkgroups registered for `country`, ordered by name.
    pub fn talkgroups_for_country(&self, country: &str) -> Result<Vec<TalkgroupEntry>, StoreError> {
        self.readers.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT talkgroup, country, name FROM talkgroups WHERE country = ?1 ORDER BY name, talkgroup",
            )?;
            let rows = stmt
                .query_map(params![country], entry_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Numeric destination ids for `country`. Keys that are not integers are skipped.
    pub fn destination_ids_for_country(&self, country: &str) -> Result<Vec<i64>, StoreError> {
        let entries = self.talkgroups_for_country(country)?;
        let mut ids: Vec<i64> = entries
            .iter()
            .filter_map(|entry| entry.talkgroup.trim().parse::<i64>().ok())
            .collect();
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }

    pub fn continents(&self) -> Result<Vec<String>, StoreError> {
        self.readers.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT DISTINCT continent_name FROM geography ORDER BY continent_name")?;
            let rows = stmt
                .query_map([], |row| row.get(0))?
                .collect::<Result<Vec<String>, _>>()?;
            Ok(rows)
        })
    }

    /// Countries on `continent` as `{label: country name, value: country code}`.
    pub fn countries(&self, continent: &str) -> Result<Vec<LabeledOption>, StoreError> {
        self.readers.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT country_name, country_code FROM geography WHERE continent_name = ?1 ORDER BY country_name",
            )?;
            let rows = stmt
                .query_map(params![continent], |row| {
                    Ok(LabeledOption {
                        label: row.get(0)?,
                        value: row.get(1)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn list_talkgroups(&self) -> Result<Vec<TalkgroupRow>, StoreError> {
        self.readers.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT id, talkgroup, country, name FROM talkgroups ORDER BY id")?;
            let rows = stmt
                .query_map([], talkgroup_row_from)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Insert a new talkgroup; an existing key is a `Conflict`.
    pub fn create_talkgroup(&self, entry: &TalkgroupEntry) -> Result<TalkgroupRow, StoreError> {
        let conn = lock(&self.writer)?;
        conn.execute(
            "INSERT INTO talkgroups (talkgroup, country, name) VALUES (?1, ?2, ?3)",
            params![entry.talkgroup, entry.country, entry.name],
        )
        .map_err(|e| conflict_or(e, &entry.talkgroup))?;

        Ok(TalkgroupRow {
            id: conn.last_insert_rowid(),
            talkgroup: entry.talkgroup.clone(),
            country: entry.country.clone(),
            name: entry.name.clone(),
        })
    }

    /// Replace the row with `id`; `None` when no such row exists.
    pub fn update_talkgroup(&self, id: i64, entry: &TalkgroupEntry) -> Result<Option<TalkgroupRow>, StoreError> {
        let conn = lock(&self.writer)?;
        let changed = conn
            .execute(
                "UPDATE talkgroups SET talkgroup = ?1, country = ?2, name = ?3 WHERE id = ?4",
                params![entry.talkgroup, entry.country, entry.name, id],
            )
            .map_err(|e| conflict_or(e, &entry.talkgroup))?;

        if changed == 0 {
            return Ok(None);
        }
        Ok(Some(TalkgroupRow {
            id,
            talkgroup: entry.talkgroup.clone(),
            country: entry.country.clone(),
            name: entry.name.clone(),
        }))
    }

    /// Returns whether a row was deleted.
    pub fn delete_talkgroup(&self, id: i64) -> Result<bool, StoreError> {
        let conn = lock(&self.writer)?;
        let deleted = conn.execute("DELETE FROM talkgroups WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }
}

fn entry_from_row(row: &Row) -> rusqlite::Result<TalkgroupEntry> {
    Ok(TalkgroupEntry {
        talkgroup: row.get(0)?,
        country: row.get(1)?,
        name: row.get(2)?,
    })
}

fn talkgroup_row_from(row: &Row) -> rusqlite::Result<TalkgroupRow> {
    Ok(TalkgroupRow {
        id: row.get(0)?,
        talkgroup: row.get(1)?,
        country: row.get(2)?,
        name: row.get(3)?,
    })
}

fn conflict_or(err: rusqlite::Error, talkgroup: &str) -> StoreError {
    match err {
        rusqlite::Error::SqliteFailure(ref e, _) if e.code == ErrorCode::ConstraintViolation => {
            StoreError::Conflict(format!("talkgroup {} already exists", talkgroup))
        }
        other => StoreError::Database(other),
    }
}
