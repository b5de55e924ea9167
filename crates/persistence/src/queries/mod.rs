// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Query modules for persistence layer.
//!
//! This module contains all read-only queries for the persistence layer.
//!
//! ## Module Organization
//!
//! - `employees` - Employee record lookups and listings
//! - `attachments` - Attachment rows
//! - `audit` - Audit log queries
//! - `users` - Users, PIN verification and capability lookups
//! - `locks` - Advisory edit locks
//! - `file_moves` - Pending file-move ledger

pub mod attachments;
pub mod audit;
pub mod employees;
pub mod file_moves;
pub mod locks;
pub mod users;
