//! Command-line runner for stampede load tests.
pub mod cli;
pub mod config_file;
pub mod error;
pub mod profiles;
pub mod runtime;

pub use cli::StampedeCli;
pub use error::RuntimeError;
pub use profiles::Profile;
pub use runtime::{StampedeRuntime, THRESHOLDS_FAILED_EXIT_CODE};
