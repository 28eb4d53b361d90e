//! Shared types and plumbing for the FaaS execution core: identity types,
//! the cross-component event system, and percentile math reused by the
//! executor and metrics exporter.

mod events;
mod ids;
mod percentile;

pub use events::{EventListener, EventListeners, FaasEvent, FnListener};
pub use ids::{CodeHash, ExecutionId, FunctionId, LogRowId};
pub use percentile::{p50_p95_p99, percentile};
