//! Rawdrop-Common: Shared types, constants, and utilities.
//!
//! This crate provides common functionality used across rawdrop:
//!
//! - **Typed IDs**: Type-safe wrappers for conversion tasks and workers
//! - **Path Utilities**: RAW detection, upload name sanitising, and
//!   collision-safe file creation in the media directory
//! - **Error Handling**: Common error types and result aliases
//!
//! # Examples
//!
//! ```
//! use rawdrop_common::{TaskId, Error, Result};
//! use rawdrop_common::paths::is_raw_file;
//! use std::path::Path;
//!
//! let task_id = TaskId::new();
//! assert!(is_raw_file(Path::new("DSC_0042.NEF")));
//!
//! fn example() -> Result<()> {
//!     Err(Error::invalid_input("empty file name"))
//! }
//! # assert!(example().is_err());
//! # let _ = task_id;
//! ```

pub mod error;
pub mod ids;
pub mod paths;

pub use error::{Error, Result};
pub use ids::*;
