use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use faas_core::{p50_p95_p99, FunctionId, LogRowId};

use crate::error::StoreError;

const LOGS_INIT: &str = "
CREATE TABLE IF NOT EXISTS logs (
    id TEXT PRIMARY KEY,
    function_id TEXT NOT NULL,
    timestamp_ms INTEGER NOT NULL,
    level TEXT NOT NULL,
    message TEXT NOT NULL,
    metadata_json TEXT,
    request_id TEXT,
    duration_ms INTEGER
);
CREATE INDEX IF NOT EXISTS logs_function_id_idx
    ON logs(function_id, timestamp_ms DESC, id DESC);
";

/// Severity of a generic log row, per spec.md §4.F's `countByLevel` /
/// `errorRate` contract. Distinct from [`faas_sandbox::ConsoleLevel`]: this
/// is the level of an application log entry, not a per-invocation console
/// write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl LogLevel {
    fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Fatal => "fatal",
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "debug" => LogLevel::Debug,
            "warn" => LogLevel::Warn,
            "error" => LogLevel::Error,
            "fatal" => LogLevel::Fatal,
            _ => LogLevel::Info,
        }
    }
}

/// `{functionId, level, message, timestamp?, metadata?, requestId?,
/// durationMs?}` accepted by `POST /logs` (spec.md §6).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntryInput {
    pub function_id: FunctionId,
    pub level: LogLevel,
    pub message: String,
    #[serde(rename = "timestamp")]
    pub timestamp_ms: Option<u64>,
    pub metadata: Option<serde_json::Value>,
    pub request_id: Option<String>,
    pub duration_ms: Option<u64>,
}

/// `Log Store Row` from spec.md §3.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub id: LogRowId,
    pub function_id: FunctionId,
    #[serde(rename = "timestamp")]
    pub timestamp_ms: u64,
    pub level: LogLevel,
    pub message: String,
    pub metadata: Option<serde_json::Value>,
    pub request_id: Option<String>,
    pub duration_ms: Option<u64>,
}

/// A page of `query(functionId, {limit, cursor})` results, per spec.md §4.F.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogPage {
    pub entries: Vec<LogEntry>,
    pub cursor: Option<String>,
    pub has_more: bool,
}

/// `metrics(functionId)` output, per spec.md §4.F.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogMetrics {
    pub total: u64,
    pub count_by_level: std::collections::HashMap<String, u64>,
    pub error_rate: f64,
    pub logs_per_minute: f64,
    pub avg_duration_ms: Option<f64>,
    pub p50_duration_ms: Option<f64>,
    pub p95_duration_ms: Option<f64>,
    pub p99_duration_ms: Option<f64>,
    pub last_log_timestamp: Option<u64>,
}

/// Opaque pagination position: the `(timestamp_ms, id)` pair of the last row
/// returned, in the descending order the store iterates rows. Encoded as
/// base64 so callers treat it as opaque per spec.md §4.F.
struct Cursor {
    timestamp_ms: u64,
    id: String,
}

impl Cursor {
    fn encode(&self) -> String {
        BASE64.encode(format!("{}:{}", self.timestamp_ms, self.id))
    }

    fn decode(raw: &str) -> Result<Self, StoreError> {
        let bytes = BASE64.decode(raw).map_err(|_| StoreError::InvalidCursor)?;
        let text = String::from_utf8(bytes).map_err(|_| StoreError::InvalidCursor)?;
        let (ts, id) = text.split_once(':').ok_or(StoreError::InvalidCursor)?;
        Ok(Self {
            timestamp_ms: ts.parse().map_err(|_| StoreError::InvalidCursor)?,
            id: id.to_string(),
        })
    }
}

/// Log-row half of the Log/Metric Store (spec.md §4.F): generic per-function
/// log entries with cursor pagination, level/error-rate aggregation, and
/// whole-function deletion.
pub struct LogStore {
    conn: Mutex<Connection>,
}

impl LogStore {
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(LOGS_INIT)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open(path: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(LOGS_INIT)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// `append(entry)`: allocates an id, stamps `timestamp = entry.timestamp
    /// ?? now`, returns the stored row. O(1) amortized (single indexed
    /// insert).
    pub fn append(&self, entry: LogEntryInput, now_ms: u64) -> Result<LogEntry, StoreError> {
        let id = LogRowId::new();
        let timestamp_ms = entry.timestamp_ms.unwrap_or(now_ms);
        let metadata_json = entry
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        self.conn.lock().execute(
            "INSERT INTO logs (id, function_id, timestamp_ms, level, message, metadata_json,
                                request_id, duration_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                id.to_string(),
                entry.function_id.as_str(),
                timestamp_ms as i64,
                entry.level.as_str(),
                entry.message,
                metadata_json,
                entry.request_id,
                entry.duration_ms.map(|d| d as i64),
            ],
        )?;

        Ok(LogEntry {
            id,
            function_id: entry.function_id,
            timestamp_ms,
            level: entry.level,
            message: entry.message,
            metadata: entry.metadata,
            request_id: entry.request_id,
            duration_ms: entry.duration_ms,
        })
    }

    /// `query(functionId, {limit, cursor})`: descending timestamp order;
    /// iterating with the returned cursor until `None` yields every row
    /// exactly once (spec.md §8 invariant 7).
    pub fn query(
        &self,
        function_id: &FunctionId,
        limit: usize,
        cursor: Option<&str>,
    ) -> Result<LogPage, StoreError> {
        let limit = limit.max(1);
        let conn = self.conn.lock();

        let rows: Vec<LogEntry> = match cursor {
            None => {
                let mut stmt = conn.prepare(
                    "SELECT id, function_id, timestamp_ms, level, message, metadata_json,
                            request_id, duration_ms
                     FROM logs WHERE function_id = ?1
                     ORDER BY timestamp_ms DESC, id DESC LIMIT ?2",
                )?;
                stmt.query_map(params![function_id.as_str(), (limit + 1) as i64], row_to_entry)?
                    .collect::<Result<Vec<_>, _>>()?
            }
            Some(raw) => {
                let cur = Cursor::decode(raw)?;
                let mut stmt = conn.prepare(
                    "SELECT id, function_id, timestamp_ms, level, message, metadata_json,
                            request_id, duration_ms
                     FROM logs WHERE function_id = ?1
                       AND (timestamp_ms < ?2 OR (timestamp_ms = ?2 AND id < ?3))
                     ORDER BY timestamp_ms DESC, id DESC LIMIT ?4",
                )?;
                stmt.query_map(
                    params![
                        function_id.as_str(),
                        cur.timestamp_ms as i64,
                        cur.id,
                        (limit + 1) as i64
                    ],
                    row_to_entry,
                )?
                .collect::<Result<Vec<_>, _>>()?
            }
        };

        let has_more = rows.len() > limit;
        let mut entries = rows;
        entries.truncate(limit);

        let cursor = if has_more {
            entries.last().map(|e| {
                Cursor {
                    timestamp_ms: e.timestamp_ms,
                    id: e.id.to_string(),
                }
                .encode()
            })
        } else {
            None
        };

        Ok(LogPage {
            entries,
            cursor,
            has_more,
        })
    }

    /// `metrics(functionId)`, per spec.md §4.F: `errorRate = (error+fatal) /
    /// total`, `0` when `total = 0`.
    pub fn metrics(&self, function_id: &FunctionId) -> Result<LogMetrics, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT level, timestamp_ms, duration_ms FROM logs WHERE function_id = ?1",
        )?;
        let rows: Vec<(String, i64, Option<i64>)> = stmt
            .query_map(params![function_id.as_str()], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        if rows.is_empty() {
            return Ok(LogMetrics::default());
        }

        let mut count_by_level = std::collections::HashMap::new();
        let mut error_like = 0u64;
        let mut durations = Vec::new();
        let mut timestamps = Vec::new();

        for (level, ts, duration) in &rows {
            *count_by_level.entry(level.clone()).or_insert(0u64) += 1;
            if level == "error" || level == "fatal" {
                error_like += 1;
            }
            if let Some(d) = duration {
                durations.push(*d as f64);
            }
            timestamps.push(*ts as u64);
        }

        let total = rows.len() as u64;
        let error_rate = error_like as f64 / total as f64;
        let last_log_timestamp = timestamps.iter().copied().max();
        let span_minutes = timestamps
            .iter()
            .min()
            .zip(last_log_timestamp)
            .map(|(min, max)| ((max.saturating_sub(*min)) as f64 / 60_000.0).max(1.0 / 60.0))
            .unwrap_or(1.0 / 60.0);
        let logs_per_minute = total as f64 / span_minutes;

        let (avg_duration_ms, p50_duration_ms, p95_duration_ms, p99_duration_ms) =
            if durations.is_empty() {
                (None, None, None, None)
            } else {
                let (p50, p95, p99) = p50_p95_p99(&durations);
                let avg = durations.iter().sum::<f64>() / durations.len() as f64;
                (Some(avg), Some(p50), Some(p95), Some(p99))
            };

        Ok(LogMetrics {
            total,
            count_by_level,
            error_rate,
            logs_per_minute,
            avg_duration_ms,
            p50_duration_ms,
            p95_duration_ms,
            p99_duration_ms,
            last_log_timestamp,
        })
    }

    /// `deleteForFunction(functionId)`: removes only rows for that function;
    /// a no-op when nothing matches (spec.md §4.F invariant).
    pub fn delete_for_function(&self, function_id: &FunctionId) -> Result<usize, StoreError> {
        let removed = self
            .conn
            .lock()
            .execute("DELETE FROM logs WHERE function_id = ?1", params![function_id.as_str()])?;
        Ok(removed)
    }
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<LogEntry> {
    let id: String = row.get(0)?;
    let function_id: String = row.get(1)?;
    let level: String = row.get(3)?;
    let metadata_json: Option<String> = row.get(5)?;

    Ok(LogEntry {
        id: id.parse().unwrap_or_default(),
        function_id: FunctionId::from(function_id),
        timestamp_ms: row.get::<_, i64>(2)? as u64,
        level: LogLevel::parse(&level),
        message: row.get(4)?,
        metadata: metadata_json.and_then(|s| serde_json::from_str(&s).ok()),
        request_id: row.get(6)?,
        duration_ms: row.get::<_, Option<i64>>(7)?.map(|v| v as u64),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fid() -> FunctionId {
        FunctionId::from("P")
    }

    fn entry(ts: u64, level: LogLevel) -> LogEntryInput {
        LogEntryInput {
            function_id: fid(),
            level,
            message: format!("entry at {ts}"),
            timestamp_ms: Some(ts),
            metadata: None,
            request_id: None,
            duration_ms: None,
        }
    }

    #[test]
    fn append_stamps_now_when_timestamp_missing() {
        let store = LogStore::open_in_memory().unwrap();
        let row = store
            .append(
                LogEntryInput {
                    function_id: fid(),
                    level: LogLevel::Info,
                    message: "hi".into(),
                    timestamp_ms: None,
                    metadata: None,
                    request_id: None,
                    duration_ms: None,
                },
                5_000,
            )
            .unwrap();
        assert_eq!(row.timestamp_ms, 5_000);
    }

    #[test]
    fn pagination_covers_every_row_exactly_once_in_descending_order() {
        let store = LogStore::open_in_memory().unwrap();
        for i in 0..25u64 {
            store.append(entry(i, LogLevel::Info), i).unwrap();
        }

        let mut seen = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let page = store.query(&fid(), 10, cursor.as_deref()).unwrap();
            seen.extend(page.entries.iter().map(|e| e.timestamp_ms));
            if !page.has_more {
                assert!(page.cursor.is_none());
                break;
            }
            cursor = page.cursor;
        }

        assert_eq!(seen.len(), 25);
        let mut sorted = seen.clone();
        sorted.sort_unstable_by(|a, b| b.cmp(a));
        assert_eq!(seen, sorted);
        let mut unique = seen.clone();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), 25);
    }

    #[test]
    fn large_limit_returns_everything_with_no_more_pages() {
        let store = LogStore::open_in_memory().unwrap();
        for i in 0..25u64 {
            store.append(entry(i, LogLevel::Info), i).unwrap();
        }
        let page = store.query(&fid(), 25, None).unwrap();
        assert_eq!(page.entries.len(), 25);
        assert!(!page.has_more);
        assert!(page.cursor.is_none());
    }

    #[test]
    fn error_rate_counts_error_and_fatal() {
        let store = LogStore::open_in_memory().unwrap();
        store.append(entry(1, LogLevel::Info), 1).unwrap();
        store.append(entry(2, LogLevel::Error), 2).unwrap();
        store.append(entry(3, LogLevel::Fatal), 3).unwrap();
        store.append(entry(4, LogLevel::Debug), 4).unwrap();

        let metrics = store.metrics(&fid()).unwrap();
        assert_eq!(metrics.total, 4);
        assert_eq!(metrics.error_rate, 0.5);
    }

    #[test]
    fn empty_function_has_zero_error_rate() {
        let store = LogStore::open_in_memory().unwrap();
        let metrics = store.metrics(&fid()).unwrap();
        assert_eq!(metrics.total, 0);
        assert_eq!(metrics.error_rate, 0.0);
    }

    #[test]
    fn delete_for_function_only_affects_that_function() {
        let store = LogStore::open_in_memory().unwrap();
        store.append(entry(1, LogLevel::Info), 1).unwrap();
        store
            .append(
                LogEntryInput {
                    function_id: FunctionId::from("other"),
                    ..entry(1, LogLevel::Info)
                },
                1,
            )
            .unwrap();

        store.delete_for_function(&fid()).unwrap();

        assert_eq!(store.query(&fid(), 10, None).unwrap().entries.len(), 0);
        assert_eq!(
            store
                .query(&FunctionId::from("other"), 10, None)
                .unwrap()
                .entries
                .len(),
            1
        );
    }

    #[test]
    fn delete_for_missing_function_is_noop() {
        let store = LogStore::open_in_memory().unwrap();
        let removed = store.delete_for_function(&fid()).unwrap();
        assert_eq!(removed, 0);
    }
}
