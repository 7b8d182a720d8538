//! This module aggregates various utility submodules used throughout the application.

/// Utilities for interacting with the application's SQLite database.
pub mod database;
/// Translated user-facing strings.
pub mod i18n;
