//! Remuxcode-DB: Durable job store
//!
//! This crate persists conversion jobs in SQLite using rusqlite and r2d2
//! connection pooling. It is the only durable owner of job history; the
//! in-memory queue writes through it on every status transition.
//!
//! # Modules
//!
//! - `migrations` - Embedded schema migrations
//! - `pool` - Connection pool management
//! - `models` - The persisted job record
//! - `queries` - Job store operations
//!
//! # Example
//!
//! ```no_run
//! use remuxcode_db::pool::{init_pool, get_conn};
//! use remuxcode_db::models::JobRecord;
//! use remuxcode_db::queries::jobs;
//! use remuxcode_common::{JobKind, JobSource};
//!
//! let pool = init_pool("/var/lib/remuxcode/remuxcode.db").unwrap();
//! let conn = get_conn(&pool).unwrap();
//!
//! let record = JobRecord::new("/media/movie.mkv", JobKind::Full, JobSource::Api);
//! jobs::save_job(&conn, &record).unwrap();
//! println!("Saved job: {}", record.id);
//! ```

pub mod migrations;
pub mod models;
pub mod pool;
pub mod queries;
