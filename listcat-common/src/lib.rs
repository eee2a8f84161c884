//! # listcat Common Library
//!
//! Shared code for the listcat workspace including:
//! - Error type used across crates
//! - Bootstrap configuration loading (TOML) and root folder resolution
//! - Catalog event types and the broadcast EventBus
//! - Timestamp utilities

pub mod config;
pub mod error;
pub mod events;
pub mod time;

pub use error::{Error, Result};
