//! Multi-tenant FaaS execution core (spec.md §1): wires the Module Loader,
//! per-function Executor registry, Log/Metric Store, and cross-function
//! Metrics Exporter behind [`FaasCore`], and exposes their HTTP contracts
//! under [`http`].

mod config;
mod core;
pub mod http;

pub use config::FaasConfig;
pub use core::FaasCore;
pub use faas_loader::{ModuleCompiler, UpstreamFetcher};
