#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Geographic resolution primitives shared by every builder.
//!
//! Loads the entity registry, the boundary -> entity mapping (with its
//! inverse), and the boundary -> county weight table; resolves each
//! entity to a weighted county set through the area-weighted,
//! relationship-file, and state fallback tiers; and writes artifacts
//! crash-safely via [`atomic::atomic_write`].

pub mod atomic;
pub mod columns;
pub mod config;
pub mod context;
pub mod coverage;
pub mod progress;
pub mod resolve;
pub mod vintage;
pub mod weighting;

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during geography operations.
#[derive(Debug, Error)]
pub enum GeoError {
    /// File I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing or serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV parsing failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing failed.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A destination path contained a parent-directory component.
    #[error("Refusing to write outside the output directory: {path:?}")]
    PathTraversal {
        /// The rejected destination.
        path: PathBuf,
    },

    /// A required input file does not exist.
    #[error("Required input not found: {path:?}")]
    MissingInput {
        /// The missing file.
        path: PathBuf,
    },

    /// A required column could not be found under any candidate name.
    #[error("Missing column {field}: none of {tried:?} present")]
    MissingColumn {
        /// Logical field name.
        field: String,
        /// Header names that were tried.
        tried: Vec<String>,
    },

    /// Data conversion error.
    #[error("Conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}
