//! # EDA Common Library
//!
//! Shared code for the EDA dashboard service:
//! - Error type used by configuration loading
//! - TOML bootstrap configuration and its resolution order
//! - Sanitization of non-finite floats before values leave the service

pub mod config;
pub mod error;
pub mod sanitize;

pub use error::{Error, Result};
