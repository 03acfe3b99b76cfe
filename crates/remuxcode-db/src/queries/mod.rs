//! Database query modules.
//!
//! - jobs: job persistence, resume listing, and retention sweeps

pub mod jobs;
