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

//! Transaction audit records.
//!
//! Transactions follow a state machine:
//! - [`Pending`] → [`Completed`] (balance mutation applied)
//! - [`Pending`] → [`Failed`] (business rejection or system failure)
//!
//! A record is created `Pending` before any balance mutation is attempted
//! and reaches a terminal status exactly once. It is never re-executed:
//! replays of the same id reconstruct the recorded outcome.
//!
//! [`Pending`]: TransactionStatus::Pending
//! [`Completed`]: TransactionStatus::Completed
//! [`Failed`]: TransactionStatus::Failed

use crate::base::{AccountId, TransactionId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

/// One row of the append-mostly audit trail.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub account_id: AccountId,
    pub amount: Decimal,
    pub kind: TransactionKind,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
    /// Balance after the mutation, recorded at completion so a replayed
    /// request reconstructs the exact original receipt.
    pub balance_after: Option<Decimal>,
    pub failure_reason: Option<String>,
}

impl Transaction {
    /// Creates a new record in the `Pending` state.
    pub fn pending(
        id: TransactionId,
        account_id: AccountId,
        amount: Decimal,
        kind: TransactionKind,
    ) -> Self {
        Self {
            id,
            account_id,
            amount,
            kind,
            status: TransactionStatus::Pending,
            created_at: Utc::now(),
            balance_after: None,
            failure_reason: None,
        }
    }

    /// Marks the transaction `Completed` and records the resulting balance.
    pub fn complete(&mut self, balance_after: Decimal) {
        debug_assert!(!self.is_terminal(), "terminal status set twice");
        self.status = TransactionStatus::Completed;
        self.balance_after = Some(balance_after);
    }

    /// Marks the transaction `Failed` and records why.
    pub fn fail(&mut self, reason: impl Into<String>) {
        debug_assert!(!self.is_terminal(), "terminal status set twice");
        self.status = TransactionStatus::Failed;
        self.failure_reason = Some(reason.into());
    }

    pub fn is_terminal(&self) -> bool {
        self.status != TransactionStatus::Pending
    }
}
