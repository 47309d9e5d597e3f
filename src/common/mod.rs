//! Common utilities shared by the service, the CLI and the mock peer

pub mod config;
pub mod error;
pub mod logging;
pub mod paths;

pub use error::{Error, Result};
