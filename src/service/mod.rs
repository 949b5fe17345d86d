//! Service layer for business logic orchestration
//!
//! This module contains the service layer that drives bundle creation and serving,
//! separating concerns from the CLI layer in main.rs.

pub mod bundle;
pub mod orchestrator;
pub mod serve;

pub use bundle::{BundleService, CreateOptions};
pub use orchestrator::{BundleOrchestrator, BundleSummary};
pub use serve::{ServeOptions, ServeService};
