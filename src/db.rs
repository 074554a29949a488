use crate::codes::ServiceKind;
use crate::error::{BillingError, Result};
use crate::export::ExportFile;
use crate::models::{
    BillingEntry, NewRecipient, NewSchedule, RawBillingEntry, Recipient, ScheduleEntry, Weekday,
};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Event for the audit trail (recipient changes, exports, clears)
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

/// Open (or create) the database file and make sure the schema exists
pub fn open_database(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    setup_database(&conn)?;
    info!(path = %path.display(), "Database ready");
    Ok(conn)
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS recipients (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            last_name TEXT NOT NULL,
            first_name TEXT NOT NULL,
            medicaid_id TEXT NOT NULL,
            work_service_code TEXT NOT NULL DEFAULT '',
            trip_service_code TEXT NOT NULL DEFAULT '',
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // recipient_id is a plain reference: rows may outlive their recipient
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schedules (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            recipient_id INTEGER NOT NULL,
            weekday TEXT NOT NULL,
            service_type TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS billing_entries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            recipient_id INTEGER NOT NULL,
            date TEXT NOT NULL,
            work_units INTEGER,
            trip_units INTEGER,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_schedules_recipient ON schedules(recipient_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// RECIPIENTS
// ============================================================================

/// Validate and store a recipient. Nothing is written if validation fails.
pub fn insert_recipient(conn: &Connection, recipient: NewRecipient, actor: &str) -> Result<Recipient> {
    let recipient = recipient.validate()?;
    let tx = conn.unchecked_transaction()?;

    tx.execute(
        "INSERT INTO recipients (
            last_name, first_name, medicaid_id, work_service_code, trip_service_code
        ) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            recipient.last_name,
            recipient.first_name,
            recipient.medicaid_id,
            recipient.work_service_code,
            recipient.trip_service_code,
        ],
    )?;
    let id = tx.last_insert_rowid();

    let event = Event::new(
        "recipient_added",
        "recipient",
        &id.to_string(),
        serde_json::json!({
            "work_service_code": recipient.work_service_code,
            "trip_service_code": recipient.trip_service_code,
        }),
        actor,
    );
    insert_event(&tx, &event)?;
    tx.commit()?;
    info!(recipient_id = id, "Recipient added");

    Ok(Recipient {
        id,
        last_name: recipient.last_name,
        first_name: recipient.first_name,
        medicaid_id: recipient.medicaid_id,
        work_service_code: recipient.work_service_code,
        trip_service_code: recipient.trip_service_code,
    })
}

fn recipient_from_row(row: &Row<'_>) -> rusqlite::Result<Recipient> {
    Ok(Recipient {
        id: row.get(0)?,
        last_name: row.get(1)?,
        first_name: row.get(2)?,
        medicaid_id: row.get(3)?,
        work_service_code: row.get(4)?,
        trip_service_code: row.get(5)?,
    })
}

/// All recipients, alphabetized by last name
pub fn list_recipients(conn: &Connection) -> Result<Vec<Recipient>> {
    let mut stmt = conn.prepare(
        "SELECT id, last_name, first_name, medicaid_id, work_service_code, trip_service_code
         FROM recipients
         ORDER BY last_name COLLATE NOCASE, first_name COLLATE NOCASE, id",
    )?;

    let recipients = stmt
        .query_map([], recipient_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(recipients)
}

pub fn get_recipient(conn: &Connection, id: i64) -> Result<Option<Recipient>> {
    let recipient = conn
        .query_row(
            "SELECT id, last_name, first_name, medicaid_id, work_service_code, trip_service_code
             FROM recipients
             WHERE id = ?1",
            [id],
            recipient_from_row,
        )
        .optional()?;

    Ok(recipient)
}

/// Delete a recipient together with its schedules.
///
/// Billing entries keep their reference; the exporter skips them.
pub fn delete_recipient(conn: &Connection, id: i64, actor: &str) -> Result<()> {
    let tx = conn.unchecked_transaction()?;

    let removed = tx.execute("DELETE FROM recipients WHERE id = ?1", [id])?;
    if removed == 0 {
        return Err(BillingError::NotFound {
            entity: "recipient",
            id,
        });
    }
    let schedules = tx.execute("DELETE FROM schedules WHERE recipient_id = ?1", [id])?;

    let event = Event::new(
        "recipient_deleted",
        "recipient",
        &id.to_string(),
        serde_json::json!({ "schedules_removed": schedules }),
        actor,
    );
    insert_event(&tx, &event)?;
    tx.commit()?;

    info!(recipient_id = id, schedules_removed = schedules, "Recipient deleted");
    Ok(())
}

/// Read recipients from a CSV file with the wire column names
/// (Last_Name, First_Name, Medicaid_ID, Work_Service_Code, Trip_Service_Code).
pub fn load_recipients_csv(csv_path: &Path) -> Result<Vec<NewRecipient>> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_path(csv_path)?;

    let mut recipients = Vec::new();
    for result in rdr.deserialize() {
        let recipient: NewRecipient = result?;
        recipients.push(recipient);
    }

    debug!(path = %csv_path.display(), rows = recipients.len(), "Loaded recipient CSV");
    Ok(recipients)
}

// ============================================================================
// SCHEDULES
// ============================================================================

/// Store a schedule slot for an existing recipient billed for that service.
pub fn insert_schedule(conn: &Connection, schedule: NewSchedule) -> Result<ScheduleEntry> {
    let recipient = get_recipient(conn, schedule.recipient_id)?.ok_or(BillingError::NotFound {
        entity: "recipient",
        id: schedule.recipient_id,
    })?;

    if recipient.service_code(schedule.service_type).is_empty() {
        return Err(BillingError::MissingServiceCode {
            recipient_id: recipient.id,
            kind: schedule.service_type.as_str(),
        });
    }

    conn.execute(
        "INSERT INTO schedules (recipient_id, weekday, service_type) VALUES (?1, ?2, ?3)",
        params![
            schedule.recipient_id,
            schedule.weekday.as_str(),
            schedule.service_type.as_str(),
        ],
    )?;
    let id = conn.last_insert_rowid();
    debug!(schedule_id = id, recipient_id = schedule.recipient_id, "Schedule added");

    Ok(ScheduleEntry {
        id,
        recipient_id: schedule.recipient_id,
        weekday: schedule.weekday,
        service_type: schedule.service_type,
    })
}

fn text_column<T: std::str::FromStr<Err = String>>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let text: String = row.get(idx)?;
    text.parse().map_err(|e: String| {
        rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into())
    })
}

/// All schedule slots, Monday first
pub fn list_schedules(conn: &Connection) -> Result<Vec<ScheduleEntry>> {
    let mut stmt = conn.prepare(
        "SELECT id, recipient_id, weekday, service_type FROM schedules ORDER BY id",
    )?;

    let mut schedules = stmt
        .query_map([], |row| {
            Ok(ScheduleEntry {
                id: row.get(0)?,
                recipient_id: row.get(1)?,
                weekday: text_column::<Weekday>(row, 2)?,
                service_type: text_column::<ServiceKind>(row, 3)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    schedules.sort_by_key(|s| (s.weekday.index(), s.id));
    Ok(schedules)
}

pub fn delete_schedule(conn: &Connection, id: i64) -> Result<()> {
    let removed = conn.execute("DELETE FROM schedules WHERE id = ?1", [id])?;
    if removed == 0 {
        return Err(BillingError::NotFound {
            entity: "schedule",
            id,
        });
    }
    debug!(schedule_id = id, "Schedule deleted");
    Ok(())
}

// ============================================================================
// BILLING ENTRIES
// ============================================================================

/// Store submitted billing entries, returning how many were kept.
///
/// Entries whose units are both absent or zero are dropped silently.
pub fn insert_billing_entries(conn: &Connection, entries: Vec<RawBillingEntry>) -> Result<usize> {
    let submitted = entries.len();
    let tx = conn.unchecked_transaction()?;
    let mut stored = 0;

    {
        let mut stmt = tx.prepare(
            "INSERT INTO billing_entries (recipient_id, date, work_units, trip_units)
             VALUES (?1, ?2, ?3, ?4)",
        )?;
        for entry in entries.into_iter().filter_map(RawBillingEntry::into_billable) {
            stmt.execute(params![
                entry.recipient_id,
                entry.date,
                entry.work_units,
                entry.trip_units,
            ])?;
            stored += 1;
        }
    }

    tx.commit()?;
    info!(submitted, stored, "Billing entries saved");
    Ok(stored)
}

/// All billing entries in the order they were stored
pub fn list_billing_entries(conn: &Connection) -> Result<Vec<BillingEntry>> {
    let mut stmt = conn.prepare(
        "SELECT id, recipient_id, date, work_units, trip_units
         FROM billing_entries
         ORDER BY id",
    )?;

    let entries = stmt
        .query_map([], |row| {
            Ok(BillingEntry {
                id: row.get(0)?,
                recipient_id: row.get(1)?,
                date: row.get(2)?,
                work_units: row.get(3)?,
                trip_units: row.get(4)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(entries)
}

/// Remove every billing entry, returning how many were removed
pub fn clear_billing_entries(conn: &Connection, actor: &str) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let removed = tx.execute("DELETE FROM billing_entries", [])?;

    let event = Event::new(
        "billing_clear",
        "billing_entries",
        "all",
        serde_json::json!({ "removed": removed }),
        actor,
    );
    insert_event(&tx, &event)?;
    tx.commit()?;

    info!(removed, "Billing entries cleared");
    Ok(removed)
}

// ============================================================================
// AUDIT TRAIL
// ============================================================================

/// Insert event into audit trail
pub fn insert_event(conn: &Connection, event: &Event) -> Result<()> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, entity_type, entity_id, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.entity_type,
            event.entity_id,
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

/// Record a produced export (name, size, digest) in the audit trail
pub fn record_export(conn: &Connection, file: &ExportFile, actor: &str) -> Result<Event> {
    let event = Event::new(
        "billing_export",
        "export",
        &file.filename,
        serde_json::json!({
            "lines": file.line_count,
            "skipped": file.skipped.len(),
            "bytes": file.content.len(),
            "sha256": file.sha256(),
        }),
        actor,
    );
    insert_event(conn, &event)?;
    Ok(event)
}

/// Get events for a specific entity, newest first
pub fn get_events_for_entity(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY timestamp DESC, id DESC",
    )?;

    let events = stmt
        .query_map(params![entity_type, entity_id], |row| {
            let timestamp_str: String = row.get(1)?;
            let data_json: String = row.get(5)?;

            Ok(Event {
                event_id: row.get(0)?,
                timestamp: DateTime::parse_from_rfc3339(&timestamp_str)
                    .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, e.into()))?
                    .with_timezone(&Utc),
                event_type: row.get(2)?,
                entity_type: row.get(3)?,
                entity_id: row.get(4)?,
                data: serde_json::from_str(&data_json)
                    .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, e.into()))?,
                actor: row.get(6)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(events)
}
