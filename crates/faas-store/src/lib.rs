//! Append-only Log/Metric Store (spec.md §4.F): two sqlite-backed tables —
//! [`ExecutionStore`] for the per-invocation execution record a
//! `faas-executor` actor owns, and [`LogStore`] for the generic per-function
//! log rows exposed over the `/logs` HTTP contract (spec.md §6). Distinct
//! schemas, same embedded-sqlite idiom.

mod error;
mod execution;
mod log;

pub use error::StoreError;
pub use execution::{AggregateMetrics, ExecutionRecord, ExecutionStore, Settlement};
pub use log::{LogEntry, LogEntryInput, LogLevel, LogMetrics, LogPage, LogStore};
