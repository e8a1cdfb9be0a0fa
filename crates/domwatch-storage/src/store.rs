use crate::error::{Result, StorageError};
use crate::ResultStore;
use chrono::{DateTime, Utc};
use domwatch_common::types::{
    hostname_of, AlertCategory, AlertEvent, CertificateState, CheckResult, Domain, ExpiryState,
    RegisterDomainRequest,
};
use rusqlite::{Connection, Row};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const DOMAINS_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS domains (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    url TEXT NOT NULL,
    owner_id TEXT,
    enabled INTEGER NOT NULL DEFAULT 1,
    check_interval_secs INTEGER,
    last_checked_at INTEGER,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_domains_enabled ON domains(enabled);
";

const CHECK_RESULTS_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS check_results (
    id TEXT PRIMARY KEY,
    domain_id TEXT NOT NULL,
    kind TEXT NOT NULL,
    outcome TEXT NOT NULL,
    status_code INTEGER,
    latency_ms REAL,
    days_remaining INTEGER,
    error TEXT,
    checked_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_check_results_domain ON check_results(domain_id, checked_at);
";

const CERTIFICATE_STATE_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS certificate_state (
    domain_id TEXT PRIMARY KEY,
    issuer TEXT,
    valid_from INTEGER NOT NULL,
    valid_until INTEGER NOT NULL,
    days_remaining INTEGER NOT NULL,
    last_checked INTEGER NOT NULL
);
";

const EXPIRY_STATE_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS expiry_state (
    domain_id TEXT PRIMARY KEY,
    expiration_date INTEGER,
    registrar TEXT,
    last_checked INTEGER NOT NULL
);
";

const ALERT_EVENTS_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS alert_events (
    id TEXT PRIMARY KEY,
    domain_id TEXT NOT NULL,
    domain_name TEXT NOT NULL,
    category TEXT NOT NULL,
    severity TEXT NOT NULL,
    message TEXT NOT NULL,
    value INTEGER,
    fired_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_alert_events_dedup ON alert_events(domain_id, category, fired_at);
";

/// SQLite-backed [`ResultStore`]. A single connection behind a mutex is
/// plenty for the write volume of periodic checks; WAL keeps readers
/// unblocked.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    _db_path: PathBuf,
}

impl SqliteStore {
    pub fn new(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let db_path = data_dir.join("domwatch.db");
        let conn = Connection::open(&db_path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(DOMAINS_SCHEMA)?;
        conn.execute_batch(CHECK_RESULTS_SCHEMA)?;
        conn.execute_batch(CERTIFICATE_STATE_SCHEMA)?;
        conn.execute_batch(EXPIRY_STATE_SCHEMA)?;
        conn.execute_batch(ALERT_EVENTS_SCHEMA)?;

        tracing::info!(path = %db_path.display(), "Initialized result store");
        Ok(Self {
            conn: Mutex::new(conn),
            _db_path: db_path,
        })
    }

    fn row_to_domain(row: &Row<'_>) -> Result<Domain> {
        Ok(Domain {
            id: row.get(0)?,
            name: row.get(1)?,
            url: row.get(2)?,
            owner_id: row.get(3)?,
            enabled: row.get::<_, i64>(4)? != 0,
            check_interval_secs: row.get::<_, Option<i64>>(5)?.map(|v| v as u64),
            last_checked_at: row
                .get::<_, Option<i64>>(6)?
                .and_then(|t| DateTime::from_timestamp(t, 0)),
            created_at: epoch(row.get(7)?),
            updated_at: epoch(row.get(8)?),
        })
    }

    fn row_to_check_result(row: &Row<'_>) -> Result<CheckResult> {
        let kind: String = row.get(2)?;
        let outcome: String = row.get(3)?;
        Ok(CheckResult {
            id: row.get(0)?,
            domain_id: row.get(1)?,
            kind: kind.parse().map_err(|_| StorageError::Corrupt {
                column: "kind",
                value: kind.clone(),
            })?,
            outcome: outcome.parse().map_err(|_| StorageError::Corrupt {
                column: "outcome",
                value: outcome.clone(),
            })?,
            status_code: row.get::<_, Option<i64>>(4)?.map(|v| v as u16),
            latency_ms: row.get(5)?,
            days_remaining: row.get(6)?,
            error: row.get(7)?,
            checked_at: epoch(row.get(8)?),
        })
    }

    fn row_to_alert(row: &Row<'_>) -> Result<AlertEvent> {
        let category: String = row.get(3)?;
        let severity: String = row.get(4)?;
        Ok(AlertEvent {
            id: row.get(0)?,
            domain_id: row.get(1)?,
            domain_name: row.get(2)?,
            category: category.parse().map_err(|_| StorageError::Corrupt {
                column: "category",
                value: category.clone(),
            })?,
            severity: severity.parse().map_err(|_| StorageError::Corrupt {
                column: "severity",
                value: severity.clone(),
            })?,
            message: row.get(5)?,
            value: row.get(6)?,
            fired_at: epoch(row.get(7)?),
        })
    }
}

fn epoch(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

impl ResultStore for SqliteStore {
    fn register_domain(&self, req: &RegisterDomainRequest) -> Result<Domain> {
        let hostname = hostname_of(&req.url).ok_or_else(|| StorageError::InvalidUrl {
            url: req.url.clone(),
        })?;
        let now = Utc::now();
        let domain = Domain {
            id: domwatch_common::id::next_id(),
            name: req.name.clone().unwrap_or(hostname),
            url: req.url.clone(),
            owner_id: req.owner_id.clone(),
            enabled: true,
            check_interval_secs: req.check_interval_secs,
            last_checked_at: None,
            created_at: now,
            updated_at: now,
        };

        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO domains (id, name, url, owner_id, enabled, check_interval_secs, last_checked_at, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL, ?7, ?8)",
            rusqlite::params![
                domain.id,
                domain.name,
                domain.url,
                domain.owner_id,
                domain.enabled as i32,
                domain.check_interval_secs.map(|v| v as i64),
                now.timestamp(),
                now.timestamp(),
            ],
        )?;
        Ok(domain)
    }

    fn get_domain(&self, id: &str) -> Result<Option<Domain>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, name, url, owner_id, enabled, check_interval_secs, last_checked_at, created_at, updated_at
             FROM domains WHERE id = ?1",
        )?;
        let mut rows = stmt.query_map(rusqlite::params![id], |row| Ok(Self::row_to_domain(row)))?;
        match rows.next() {
            Some(row) => Ok(Some(row??)),
            None => Ok(None),
        }
    }

    fn list_domains(&self) -> Result<Vec<Domain>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, name, url, owner_id, enabled, check_interval_secs, last_checked_at, created_at, updated_at
             FROM domains ORDER BY created_at",
        )?;
        let rows = stmt.query_map([], |row| Ok(Self::row_to_domain(row)))?;
        let mut domains = Vec::new();
        for row in rows {
            domains.push(row??);
        }
        Ok(domains)
    }

    fn domains_due_for_check(&self, default_interval_secs: u64) -> Result<Vec<Domain>> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now().timestamp();
        let default_interval = default_interval_secs as i64;

        let mut stmt = conn.prepare(
            "SELECT id, name, url, owner_id, enabled, check_interval_secs, last_checked_at, created_at, updated_at
             FROM domains
             WHERE enabled = 1
               AND (last_checked_at IS NULL
                    OR (?1 - last_checked_at >= COALESCE(check_interval_secs, ?2)))",
        )?;
        let rows = stmt.query_map(rusqlite::params![now, default_interval], |row| {
            Ok(Self::row_to_domain(row))
        })?;

        let mut domains = Vec::new();
        for row in rows {
            domains.push(row??);
        }
        Ok(domains)
    }

    fn update_last_checked_at(&self, domain_id: &str, ts: DateTime<Utc>) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE domains SET last_checked_at = ?1, updated_at = ?1 WHERE id = ?2",
            rusqlite::params![ts.timestamp(), domain_id],
        )?;
        Ok(())
    }

    fn delete_domain(&self, id: &str) -> Result<bool> {
        let mut conn = self.conn.lock().unwrap();
        // One transaction: a failure midway must not leave orphaned
        // history rows behind a deleted domain.
        let tx = conn.transaction()?;
        let deleted = tx.execute("DELETE FROM domains WHERE id = ?1", rusqlite::params![id])?;
        tx.execute(
            "DELETE FROM check_results WHERE domain_id = ?1",
            rusqlite::params![id],
        )?;
        tx.execute(
            "DELETE FROM certificate_state WHERE domain_id = ?1",
            rusqlite::params![id],
        )?;
        tx.execute(
            "DELETE FROM expiry_state WHERE domain_id = ?1",
            rusqlite::params![id],
        )?;
        tx.execute(
            "DELETE FROM alert_events WHERE domain_id = ?1",
            rusqlite::params![id],
        )?;
        tx.commit()?;
        Ok(deleted > 0)
    }

    fn append_check_result(&self, result: &CheckResult) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO check_results (id, domain_id, kind, outcome, status_code, latency_ms, days_remaining, error, checked_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            rusqlite::params![
                result.id,
                result.domain_id,
                result.kind.to_string(),
                result.outcome.to_string(),
                result.status_code.map(|v| v as i64),
                result.latency_ms,
                result.days_remaining,
                result.error,
                result.checked_at.timestamp(),
            ],
        )?;
        Ok(())
    }

    fn latest_results(&self, domain_id: &str, limit: usize) -> Result<Vec<CheckResult>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, domain_id, kind, outcome, status_code, latency_ms, days_remaining, error, checked_at
             FROM check_results
             WHERE domain_id = ?1
             ORDER BY checked_at DESC, id DESC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(rusqlite::params![domain_id, limit as i64], |row| {
            Ok(Self::row_to_check_result(row))
        })?;
        let mut results = Vec::new();
        for row in rows {
            results.push(row??);
        }
        Ok(results)
    }

    fn upsert_certificate_state(&self, state: &CertificateState) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO certificate_state (domain_id, issuer, valid_from, valid_until, days_remaining, last_checked)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(domain_id) DO UPDATE SET
                 issuer = excluded.issuer,
                 valid_from = excluded.valid_from,
                 valid_until = excluded.valid_until,
                 days_remaining = excluded.days_remaining,
                 last_checked = excluded.last_checked",
            rusqlite::params![
                state.domain_id,
                state.issuer,
                state.valid_from.timestamp(),
                state.valid_until.timestamp(),
                state.days_remaining,
                state.last_checked.timestamp(),
            ],
        )?;
        Ok(())
    }

    fn get_certificate_state(&self, domain_id: &str) -> Result<Option<CertificateState>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT domain_id, issuer, valid_from, valid_until, days_remaining, last_checked
             FROM certificate_state WHERE domain_id = ?1",
        )?;
        let mut rows = stmt.query_map(rusqlite::params![domain_id], |row| {
            Ok(CertificateState {
                domain_id: row.get(0)?,
                issuer: row.get(1)?,
                valid_from: epoch(row.get(2)?),
                valid_until: epoch(row.get(3)?),
                days_remaining: row.get(4)?,
                last_checked: epoch(row.get(5)?),
            })
        })?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    fn upsert_expiry_state(&self, state: &ExpiryState) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO expiry_state (domain_id, expiration_date, registrar, last_checked)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(domain_id) DO UPDATE SET
                 expiration_date = excluded.expiration_date,
                 registrar = excluded.registrar,
                 last_checked = excluded.last_checked",
            rusqlite::params![
                state.domain_id,
                state.expiration_date.map(|t| t.timestamp()),
                state.registrar,
                state.last_checked.timestamp(),
            ],
        )?;
        Ok(())
    }

    fn get_expiry_state(&self, domain_id: &str) -> Result<Option<ExpiryState>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT domain_id, expiration_date, registrar, last_checked
             FROM expiry_state WHERE domain_id = ?1",
        )?;
        let mut rows = stmt.query_map(rusqlite::params![domain_id], |row| {
            Ok(ExpiryState {
                domain_id: row.get(0)?,
                expiration_date: row
                    .get::<_, Option<i64>>(1)?
                    .and_then(|t| DateTime::from_timestamp(t, 0)),
                registrar: row.get(2)?,
                last_checked: epoch(row.get(3)?),
            })
        })?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    fn record_alert(&self, event: &AlertEvent) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO alert_events (id, domain_id, domain_name, category, severity, message, value, fired_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            rusqlite::params![
                event.id,
                event.domain_id,
                event.domain_name,
                event.category.to_string(),
                event.severity.to_string(),
                event.message,
                event.value,
                event.fired_at.timestamp(),
            ],
        )?;
        Ok(())
    }

    fn last_alert_fired(
        &self,
        domain_id: &str,
        category: AlertCategory,
    ) -> Result<Option<DateTime<Utc>>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT MAX(fired_at) FROM alert_events WHERE domain_id = ?1 AND category = ?2",
        )?;
        let ts: Option<i64> = stmt.query_row(
            rusqlite::params![domain_id, category.to_string()],
            |row| row.get(0),
        )?;
        Ok(ts.and_then(|t| DateTime::from_timestamp(t, 0)))
    }

    fn recent_alerts(&self, domain_id: &str, limit: usize) -> Result<Vec<AlertEvent>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, domain_id, domain_name, category, severity, message, value, fired_at
             FROM alert_events
             WHERE domain_id = ?1
             ORDER BY fired_at DESC, id DESC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(rusqlite::params![domain_id, limit as i64], |row| {
            Ok(Self::row_to_alert(row))
        })?;
        let mut alerts = Vec::new();
        for row in rows {
            alerts.push(row??);
        }
        Ok(alerts)
    }
}
