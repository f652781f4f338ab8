//! Image relay - optimizes uploaded images and their thumbnails for the web
//!
//! Each upload is re-encoded at full size and resized into a bounded
//! thumbnail concurrently, and both results are stored in S3-compatible
//! buckets under the caller's name.

pub mod config;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod server;
pub mod storage;
pub mod transform;

pub use error::{Error, Result};
