//! Bulk image enhancement job tracking
//!
//! This library holds the in-memory registry of image-enhancement jobs, the
//! scheduler that feeds queued jobs to an image-generation provider, and the
//! cleanup routine that retires finished jobs.

pub mod app_state;
pub mod config;
pub mod models;
pub mod services;
