//! Remuxcode-Common: Shared job types, identifiers, and utilities.
//!
//! This crate provides the vocabulary shared by the job store, the media
//! layer, and the service:
//!
//! - **Job IDs**: Short opaque identifiers for conversion jobs
//! - **Job Types**: Status, kind, and trigger-source enums with string forms
//! - **Path Utilities**: Video file detection by extension
//! - **Error Handling**: Common error types and result aliases
//!
//! # Examples
//!
//! ```
//! use remuxcode_common::{JobId, JobKind, JobStatus, Error, Result};
//! use remuxcode_common::paths::is_video_file;
//! use std::path::Path;
//!
//! let id = JobId::new();
//! assert_eq!(id.as_str().len(), 12);
//!
//! let kind: JobKind = "audio".parse().unwrap();
//! assert!(kind.includes_audio());
//! assert!(JobStatus::Completed.is_terminal());
//!
//! assert!(is_video_file(Path::new("movie.mkv")));
//!
//! fn example() -> Result<()> {
//!     Err(Error::not_found("job"))
//! }
//! ```

pub mod error;
pub mod ids;
pub mod paths;
pub mod types;

pub use error::{Error, Result};
pub use ids::*;
pub use types::*;
