use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use faas_core::{p50_p95_p99, ExecutionId, FunctionId};

use crate::error::StoreError;

const EXECUTIONS_INIT: &str = "
CREATE TABLE IF NOT EXISTS executions (
    id TEXT PRIMARY KEY,
    function_id TEXT NOT NULL,
    start_time_ms INTEGER NOT NULL,
    end_time_ms INTEGER,
    duration_ms INTEGER,
    success INTEGER NOT NULL,
    error TEXT,
    memory_bytes INTEGER,
    console_json TEXT NOT NULL DEFAULT '[]',
    metrics_json TEXT
);
CREATE INDEX IF NOT EXISTS executions_function_id_idx
    ON executions(function_id, start_time_ms DESC);
";

/// `Execution Record` from spec.md §3: append-only, owned exclusively by the
/// executor actor that wrote it. Only `end_time_ms`/`duration_ms`/`success`/
/// `error`/`metrics` transition from null to final, and only once.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRecord {
    pub id: ExecutionId,
    pub function_id: FunctionId,
    #[serde(rename = "startTime")]
    pub start_time_ms: u64,
    #[serde(rename = "endTime")]
    pub end_time_ms: Option<u64>,
    #[serde(rename = "duration")]
    pub duration_ms: Option<u64>,
    pub success: bool,
    pub error: Option<String>,
    #[serde(rename = "consoleOutput")]
    pub console: Vec<serde_json::Value>,
    pub metrics: Option<serde_json::Value>,
}

/// Settlement payload applied once an invocation completes, aborts, or times
/// out (spec.md §4.E step 5 "Settle").
pub struct Settlement {
    pub end_time_ms: u64,
    pub duration_ms: u64,
    pub success: bool,
    pub error: Option<String>,
    pub memory_bytes: Option<u64>,
    pub console: Vec<serde_json::Value>,
    pub metrics: Option<serde_json::Value>,
}

/// Aggregate counters over a function's settled executions (spec.md §3
/// "Aggregates per function").
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateMetrics {
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
    #[serde(rename = "avgDuration")]
    pub avg_duration_ms: f64,
    #[serde(rename = "minDuration")]
    pub min_duration_ms: f64,
    #[serde(rename = "maxDuration")]
    pub max_duration_ms: f64,
    #[serde(rename = "p50Duration")]
    pub p50_duration_ms: f64,
    #[serde(rename = "p95Duration")]
    pub p95_duration_ms: f64,
    #[serde(rename = "p99Duration")]
    pub p99_duration_ms: f64,
    #[serde(rename = "avgMemory")]
    pub avg_memory_bytes: f64,
    #[serde(rename = "totalMemory")]
    pub total_memory_bytes: u64,
}

/// Execution-record half of the Log/Metric Store (spec.md §4.F), backing a
/// single [`faas_executor::FunctionExecutor`]'s `getExecutionLog(s)` and
/// `getAggregateMetrics` reads. One `rusqlite::Connection` guarded by a
/// `parking_lot::Mutex`, since `rusqlite::Connection` does not allow
/// concurrent access.
pub struct ExecutionStore {
    conn: Mutex<Connection>,
}

impl ExecutionStore {
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(EXECUTIONS_INIT)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open(path: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(EXECUTIONS_INIT)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Inserts the initial row for a newly admitted execution, per spec.md
    /// §4.E step 3: `startTime`, `success=false`, empty console.
    pub fn start(
        &self,
        id: ExecutionId,
        function_id: &FunctionId,
        start_time_ms: u64,
    ) -> Result<(), StoreError> {
        self.conn.lock().execute(
            "INSERT INTO executions (id, function_id, start_time_ms, success, console_json)
             VALUES (?1, ?2, ?3, 0, '[]')",
            params![id.to_string(), function_id.as_str(), start_time_ms as i64],
        )?;
        Ok(())
    }

    /// Applies a [`Settlement`], the row's one and only null-to-final
    /// transition (spec.md §3 invariant).
    pub fn settle(&self, id: ExecutionId, settlement: Settlement) -> Result<(), StoreError> {
        let console_json = serde_json::to_string(&settlement.console)?;
        let metrics_json = settlement
            .metrics
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        self.conn.lock().execute(
            "UPDATE executions
             SET end_time_ms = ?1, duration_ms = ?2, success = ?3, error = ?4,
                 memory_bytes = ?5, console_json = ?6, metrics_json = ?7
             WHERE id = ?8",
            params![
                settlement.end_time_ms as i64,
                settlement.duration_ms as i64,
                settlement.success as i64,
                settlement.error,
                settlement.memory_bytes.map(|b| b as i64),
                console_json,
                metrics_json,
                id.to_string(),
            ],
        )?;
        Ok(())
    }

    pub fn get(&self, id: ExecutionId) -> Result<Option<ExecutionRecord>, StoreError> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, function_id, start_time_ms, end_time_ms, duration_ms, success, error,
                    console_json, metrics_json
             FROM executions WHERE id = ?1",
            params![id.to_string()],
            row_to_record,
        )
        .optional()
        .map_err(StoreError::from)
    }

    /// `getExecutionLogs(functionId)`: timestamp-descending (spec.md §4.E).
    pub fn list_for_function(
        &self,
        function_id: &FunctionId,
    ) -> Result<Vec<ExecutionRecord>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, function_id, start_time_ms, end_time_ms, duration_ms, success, error,
                    console_json, metrics_json
             FROM executions WHERE function_id = ?1 ORDER BY start_time_ms DESC",
        )?;
        let rows = stmt
            .query_map(params![function_id.as_str()], row_to_record)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn aggregate_metrics(
        &self,
        function_id: &FunctionId,
    ) -> Result<AggregateMetrics, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT duration_ms, success, memory_bytes FROM executions
             WHERE function_id = ?1 AND end_time_ms IS NOT NULL",
        )?;
        let rows: Vec<(Option<i64>, bool, Option<i64>)> = stmt
            .query_map(params![function_id.as_str()], |row| {
                Ok((
                    row.get::<_, Option<i64>>(0)?,
                    row.get::<_, i64>(1)? != 0,
                    row.get::<_, Option<i64>>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        if rows.is_empty() {
            return Ok(AggregateMetrics::default());
        }

        let durations: Vec<f64> = rows.iter().filter_map(|(d, ..)| *d).map(|d| d as f64).collect();
        let successful = rows.iter().filter(|(_, success, _)| *success).count() as u64;
        let failed = rows.len() as u64 - successful;
        let (p50, p95, p99) = p50_p95_p99(&durations);
        let avg_duration_ms = if durations.is_empty() {
            0.0
        } else {
            durations.iter().sum::<f64>() / durations.len() as f64
        };
        let min_duration_ms = durations.iter().cloned().fold(f64::INFINITY, f64::min);
        let max_duration_ms = durations.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

        let memories: Vec<u64> = rows.iter().filter_map(|(_, _, m)| *m).map(|m| m as u64).collect();
        let total_memory_bytes: u64 = memories.iter().sum();
        let avg_memory_bytes = if memories.is_empty() {
            0.0
        } else {
            total_memory_bytes as f64 / memories.len() as f64
        };

        Ok(AggregateMetrics {
            total: rows.len() as u64,
            successful,
            failed,
            avg_duration_ms,
            min_duration_ms: if min_duration_ms.is_finite() { min_duration_ms } else { 0.0 },
            max_duration_ms: if max_duration_ms.is_finite() { max_duration_ms } else { 0.0 },
            p50_duration_ms: p50,
            p95_duration_ms: p95,
            p99_duration_ms: p99,
            avg_memory_bytes,
            total_memory_bytes,
        })
    }

    /// Trims rows with `start_time_ms < now_ms - retention_ms`, per spec.md
    /// §3's retention clause. Returns the number of rows removed.
    pub fn trim_retention(&self, now_ms: u64, retention_ms: u64) -> Result<usize, StoreError> {
        let cutoff = now_ms.saturating_sub(retention_ms) as i64;
        let removed = self
            .conn
            .lock()
            .execute("DELETE FROM executions WHERE start_time_ms < ?1", params![cutoff])?;
        Ok(removed)
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<ExecutionRecord> {
    let id: String = row.get(0)?;
    let function_id: String = row.get(1)?;
    let console_json: String = row.get(7)?;
    let metrics_json: Option<String> = row.get(8)?;

    Ok(ExecutionRecord {
        id: id.parse().unwrap_or_default(),
        function_id: FunctionId::from(function_id),
        start_time_ms: row.get::<_, i64>(2)? as u64,
        end_time_ms: row.get::<_, Option<i64>>(3)?.map(|v| v as u64),
        duration_ms: row.get::<_, Option<i64>>(4)?.map(|v| v as u64),
        success: row.get::<_, i64>(5)? != 0,
        error: row.get(6)?,
        console: serde_json::from_str(&console_json).unwrap_or_default(),
        metrics: metrics_json.and_then(|s| serde_json::from_str(&s).ok()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fid() -> FunctionId {
        FunctionId::from("f")
    }

    #[test]
    fn start_then_settle_round_trips() {
        let store = ExecutionStore::open_in_memory().unwrap();
        let id = ExecutionId::new();
        store.start(id, &fid(), 1_000).unwrap();

        let mid = store.get(id).unwrap().unwrap();
        assert!(!mid.success);
        assert!(mid.end_time_ms.is_none());

        store
            .settle(
                id,
                Settlement {
                    end_time_ms: 1_050,
                    duration_ms: 50,
                    success: true,
                    error: None,
                    memory_bytes: Some(1024),
                    console: vec![serde_json::json!({"level": "log", "message": "hi"})],
                    metrics: Some(serde_json::json!({"durationMs": 50})),
                },
            )
            .unwrap();

        let settled = store.get(id).unwrap().unwrap();
        assert!(settled.success);
        assert_eq!(settled.end_time_ms, Some(1_050));
        assert_eq!(settled.duration_ms, Some(50));
        assert_eq!(settled.console.len(), 1);
    }

    #[test]
    fn list_for_function_is_timestamp_descending() {
        let store = ExecutionStore::open_in_memory().unwrap();
        for start in [100, 300, 200] {
            store.start(ExecutionId::new(), &fid(), start).unwrap();
        }
        let rows = store.list_for_function(&fid()).unwrap();
        let starts: Vec<u64> = rows.iter().map(|r| r.start_time_ms).collect();
        assert_eq!(starts, vec![300, 200, 100]);
    }

    #[test]
    fn aggregate_metrics_over_settled_rows() {
        let store = ExecutionStore::open_in_memory().unwrap();
        for (duration, success) in [(10u64, true), (20, true), (30, false)] {
            let id = ExecutionId::new();
            store.start(id, &fid(), 0).unwrap();
            store
                .settle(
                    id,
                    Settlement {
                        end_time_ms: duration,
                        duration_ms: duration,
                        success,
                        error: if success { None } else { Some("boom".into()) },
                        memory_bytes: Some(100),
                        console: vec![],
                        metrics: None,
                    },
                )
                .unwrap();
        }

        let agg = store.aggregate_metrics(&fid()).unwrap();
        assert_eq!(agg.total, 3);
        assert_eq!(agg.successful, 2);
        assert_eq!(agg.failed, 1);
        assert_eq!(agg.total_memory_bytes, 300);
    }

    #[test]
    fn retention_trims_old_rows() {
        let store = ExecutionStore::open_in_memory().unwrap();
        store.start(ExecutionId::new(), &fid(), 0).unwrap();
        store.start(ExecutionId::new(), &fid(), 10_000).unwrap();

        let removed = store.trim_retention(10_000, 5_000).unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.list_for_function(&fid()).unwrap().len(), 1);
    }

    #[test]
    fn empty_function_has_zeroed_aggregate() {
        let store = ExecutionStore::open_in_memory().unwrap();
        let agg = store.aggregate_metrics(&fid()).unwrap();
        assert_eq!(agg.total, 0);
        assert_eq!(agg.avg_duration_ms, 0.0);
    }
}
