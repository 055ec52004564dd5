//! Core domain + application logic for the Tally expense bot.
//!
//! This crate is intentionally framework-agnostic. Telegram and SQLite live
//! behind ports (traits) implemented in adapter crates.

pub mod aggregate;
pub mod bot;
pub mod config;
pub mod domain;
pub mod errors;
pub mod format;
pub mod logging;
pub mod messaging;
pub mod parser;
pub mod security;
pub mod store;

pub use errors::{Error, Result};
