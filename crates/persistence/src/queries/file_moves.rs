// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Pending file-move ledger queries.

use diesel::prelude::*;
use diesel::SqliteConnection;
use std::path::PathBuf;

use crate::data_models::PendingFileMove;
use crate::diesel_schema::pending_file_moves;
use crate::error::PersistenceError;

/// Diesel Queryable struct for ledger rows.
#[derive(Queryable, Selectable)]
#[diesel(table_name = pending_file_moves)]
struct PendingMoveRow {
    id: i64,
    swap_id: String,
    step_no: i32,
    step_count: i32,
    from_path: String,
    to_path: String,
}

/// Lists outstanding moves in replay order.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn list_pending_moves(
    conn: &mut SqliteConnection,
) -> Result<Vec<PendingFileMove>, PersistenceError> {
    Ok(pending_file_moves::table
        .select(PendingMoveRow::as_select())
        .order((pending_file_moves::id.asc(), pending_file_moves::step_no.asc()))
        .load::<PendingMoveRow>(conn)?
        .into_iter()
        .map(|row| PendingFileMove {
            id: row.id,
            swap_id: row.swap_id,
            step_no: row.step_no,
            step_count: row.step_count,
            from_path: PathBuf::from(row.from_path),
            to_path: PathBuf::from(row.to_path),
        })
        .collect())
}
