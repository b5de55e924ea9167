// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Timestamp formatting shared by mutations and backups.
//!
//! Stored timestamps use `YYYY-MM-DD HH:MM:SS` in UTC so they sort
//! lexicographically.

use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{Date, Duration, OffsetDateTime};

use crate::error::PersistenceError;

const STORED: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

const FILE_STAMP: &[BorrowedFormatItem<'static>] =
    format_description!("[year][month][day]_[hour][minute][second]_[subsecond digits:6]");

const DATE: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

fn format(at: OffsetDateTime, format: &[BorrowedFormatItem<'static>]) -> Result<String, PersistenceError> {
    at.format(format)
        .map_err(|e| PersistenceError::SerializationError(e.to_string()))
}

/// Returns the current time as a stored timestamp.
///
/// # Errors
///
/// Returns an error if the timestamp cannot be formatted.
pub fn now() -> Result<String, PersistenceError> {
    format(OffsetDateTime::now_utc(), STORED)
}

/// Returns the stored timestamp `offset` from now.
///
/// # Errors
///
/// Returns an error if the timestamp cannot be formatted.
pub fn from_now(offset: Duration) -> Result<String, PersistenceError> {
    format(OffsetDateTime::now_utc() + offset, STORED)
}

/// Returns a filename-safe timestamp with microsecond resolution.
///
/// # Errors
///
/// Returns an error if the timestamp cannot be formatted.
pub fn file_stamp() -> Result<String, PersistenceError> {
    format(OffsetDateTime::now_utc(), FILE_STAMP)
}

/// Formats a calendar date for storage.
///
/// # Errors
///
/// Returns an error if the date cannot be formatted.
pub fn date_to_string(date: Date) -> Result<String, PersistenceError> {
    date.format(DATE)
        .map_err(|e| PersistenceError::SerializationError(e.to_string()))
}

/// Parses a stored calendar date.
///
/// # Errors
///
/// Returns an error if the value is not `YYYY-MM-DD`.
pub fn date_from_str(value: &str) -> Result<Date, PersistenceError> {
    Date::parse(value, DATE)
        .map_err(|e| PersistenceError::SerializationError(format!("bad date '{value}': {e}")))
}
