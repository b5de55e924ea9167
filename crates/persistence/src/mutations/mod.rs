// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Mutation modules.
//!
//! This module contains all state-changing operations for the persistence layer.
//! Every mutation runs inside an immediate transaction so the write lock is
//! taken before any row is read, and writes its audit row in the same
//! transaction as the change it records.
//!
//! ## Module Organization
//!
//! - `audit` - Append-only audit rows
//! - `employees` - Add, edit, archive, restore and purge
//! - `attachments` - Attachment rows
//! - `users` - Users, PIN hashing and capability settings
//! - `locks` - Advisory edit locks
//! - `swap` - The identifier swap and its file-move ledger

pub mod attachments;
pub mod audit;
pub mod employees;
pub mod locks;
pub mod swap;
pub mod users;

pub use swap::SwapPlan;
