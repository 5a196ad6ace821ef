// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! # Ledger Processor
//!
//! This library provides an idempotent account-ledger transaction processor:
//! deposits and withdrawals identified by a caller-supplied transaction id
//! mutate an account balance exactly once per id, and the balance never goes
//! negative under concurrent access.
//!
//! ## Core Components
//!
//! - [`Engine`]: central processor with idempotency guard and conflict retry
//! - [`LedgerStore`]: persistence contract; [`MemoryStore`] is the in-memory
//!   reference implementation
//! - [`Reconciler`]: periodic balance auditor over the transaction history
//! - [`RetryPolicy`]: bounded linear backoff for lock conflicts
//! - [`LedgerMetrics`]: process-wide operation counters
//! - [`LedgerError`]: error taxonomy for processing failures
//!
//! ## Example
//!
//! ```
//! use ledger_processor_rs::{Engine, MemoryStore, Outcome, TransactionRequest};
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let engine = Engine::new(Arc::new(MemoryStore::new()));
//!
//! // Deposit to an unknown account creates it with a zero balance
//! let receipt = engine
//!     .deposit(&TransactionRequest {
//!         transaction_id: "1".into(),
//!         account_id: "42".into(),
//!         amount: "100.00".into(),
//!     })
//!     .await
//!     .unwrap();
//! assert_eq!(receipt.status, Outcome::Completed);
//!
//! // Replaying the same transaction id does not credit twice
//! let replay = engine
//!     .deposit(&TransactionRequest {
//!         transaction_id: "1".into(),
//!         account_id: "42".into(),
//!         amount: "100.00".into(),
//!     })
//!     .await
//!     .unwrap();
//! assert_eq!(replay, receipt);
//! # }
//! ```
//!
//! ## Concurrency
//!
//! Requests run as independent tasks. Withdrawals on the same account
//! serialize on a per-account exclusive lock (the check-then-act hazard);
//! deposits use the store's atomic increment and need no upfront lock.

pub mod account;
mod base;
mod engine;
pub mod error;
mod metrics;
mod reconciler;
mod request;
mod retry;
mod store;
mod transaction;

pub use account::Account;
pub use base::{AccountId, TransactionId};
pub use engine::Engine;
pub use error::LedgerError;
pub use metrics::{LedgerMetrics, MetricsSnapshot};
pub use reconciler::{
    DEFAULT_CHECK_INTERVAL, ReconciliationEntry, ReconciliationReport, Reconciler,
};
pub use request::{
    DepositReceipt, Outcome, ReportedBalance, TransactionRequest, ValidatedRequest,
    WithdrawalReceipt,
};
pub use retry::RetryPolicy;
pub use store::{LedgerStore, LockedAccount, MemoryStore};
pub use transaction::{Transaction, TransactionKind, TransactionStatus};
