//! HTTP surfaces over a [`crate::FaasCore`] (spec.md §6): the Executor
//! contract, the Log/Metric Store contract, and the cross-function Metrics
//! Exporter.

mod error;
mod executor;
mod logstore;
mod metrics;

pub use executor::executor_router;
pub use logstore::log_store_router;
pub use metrics::metrics_router;

use std::sync::Arc;

use axum::Router;

use crate::core::FaasCore;

/// Merges every HTTP surface into one router sharing a single [`FaasCore`].
/// The three routers' path patterns do not overlap: the executor's
/// `/logs/{functionId}` is `GET`-only, the log store's is `DELETE`-only.
pub fn router(core: Arc<FaasCore>) -> Router {
    executor_router(Arc::clone(&core))
        .merge(log_store_router(Arc::clone(&core)))
        .merge(metrics_router(core))
}
