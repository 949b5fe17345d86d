pub mod archive;
pub mod auth;
pub mod cli;
pub mod config;
pub mod constants;
pub mod copy;
pub mod error;
pub mod manifest;
pub mod platform;
pub mod registry;
pub mod resolve;
pub mod service;
pub mod skopeo;

pub use error::{BundleError, BundleResult};
