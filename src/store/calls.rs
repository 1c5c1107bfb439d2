//! Append-only call store with time-based retention

use super::{lock, ReadPool, StoreError};
use crate::feed::CallRecord;
use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub struct CallStore {
    writer: Arc<Mutex<Connection>>,
    readers: Arc<ReadPool>,
}

impl CallStore {
    pub(crate) fn new(writer: Arc<Mutex<Connection>>, readers: Arc<ReadPool>) -> Self {
        Self { writer, readers }
    }

    /// Persist one record; returns the assigned id.
    pub fn append(&self, record: &CallRecord) -> Result<i64, StoreError> {
        let conn = lock(&self.writer)?;

        conn.execute(
            r#"
            INSERT INTO calls (
                timestamp, link_name, slot, source_id, destination_id, route, link_call,
                session_type, source_name, destination_call, destination_name, state,
                start, stop, rssi, ber, reflector_id, link_type, call_types, loss_count,
                total_count, master, talker_alias, flag_set, event, link_type_name,
                context_id, session_id, source_call, duration
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28, ?29, ?30
            )
            "#,
            params![
                record.timestamp.timestamp_millis(),
                record.link_name,
                record.slot,
                record.source_id,
                record.destination_id,
                record.route,
                record.link_call,
                record.session_type,
                record.source_name,
                record.destination_call,
                record.destination_name,
                record.state,
                record.start,
                record.stop,
                record.rssi,
                record.ber,
                record.reflector_id,
                record.link_type,
                record.call_types,
                record.loss_count,
                record.total_count,
                record.master,
                record.talker_alias,
                record.flag_set,
                record.event,
                record.link_type_name,
                record.context_id,
                record.session_id,
                record.source_call,
                record.duration,
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    /// Delete records older than `retention` relative to the wall clock.
    pub fn prune(&self, retention: Duration) -> Result<usize, StoreError> {
        self.prune_at(retention, Utc::now())
    }

    /// Delete records whose timestamp is strictly before `now - retention`.
    pub fn prune_at(&self, retention: Duration, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let cutoff = (now - retention).timestamp_millis();
        let conn = lock(&self.writer)?;
        let deleted = conn.execute("DELETE FROM calls WHERE timestamp < ?1", params![cutoff])?;
        Ok(deleted)
    }

    pub fn count(&self) -> Result<i64, StoreError> {
        self.readers.with_conn(|conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM calls", [], |row| row.get(0))?)
        })
    }
}
