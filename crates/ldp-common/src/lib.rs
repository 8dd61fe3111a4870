//! LDP Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared error handling and logging for the LDP workspace.
//!
//! # Overview
//!
//! - **Error Handling**: the `PipelineError` taxonomy and `Result` alias
//!   used across every pipeline stage
//! - **Logging**: centralized tracing initialization for the binaries
//!
//! # Example
//!
//! ```no_run
//! use ldp_common::{PipelineError, Result};
//!
//! fn checked_offset(offset: i64) -> Result<u64> {
//!     u64::try_from(offset)
//!         .map_err(|_| PipelineError::configuration("negative byte offset"))
//! }
//! ```

pub mod error;
pub mod logging;

pub use error::{PipelineError, Result};
