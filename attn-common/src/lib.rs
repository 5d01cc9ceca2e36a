//! # Attendance Kiosk Common Library
//!
//! Shared code for the kiosk crates including:
//! - Configuration loading (TOML + environment + compiled defaults)
//! - Event types (KioskEvent enum) and the EventBus used as the notification channel
//! - Wire data model for the attendance API
//! - Worker id canonicalization
//! - User-facing message catalog

pub mod config;
pub mod error;
pub mod events;
pub mod messages;
pub mod models;
pub mod time;
pub mod worker_id;

pub use config::KioskConfig;
pub use error::{Error, Result};
pub use worker_id::WorkerId;
