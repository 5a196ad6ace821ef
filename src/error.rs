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

//! Error types for transaction processing.
//!
//! [`LedgerError::InsufficientFunds`] is a business outcome, not a system
//! failure: the withdrawal path converts it into a `failed` receipt instead
//! of surfacing it. [`LedgerError::LockConflict`] is transient and recovered
//! by the retry controller; everything else propagates to the caller.

use crate::base::{AccountId, TransactionId};
use rust_decimal::Decimal;
use thiserror::Error;

/// Transaction processing errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Request field is not valid numeric text
    #[error("invalid {field} format: '{value}'")]
    InvalidFormat { field: &'static str, value: String },

    /// Business-rule violation other than funds (e.g. non-positive amount)
    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),

    /// Withdrawal against an account that does not exist
    #[error("account {0} not found")]
    AccountNotFound(AccountId),

    /// Debit would exceed the available balance
    #[error("insufficient funds: available {available}, requested {requested}")]
    InsufficientFunds {
        available: Decimal,
        requested: Decimal,
    },

    /// A transaction with this id was already recorded
    #[error("duplicate transaction id {0}")]
    DuplicateTransaction(TransactionId),

    /// Exclusive account lock could not be acquired within the bounded wait
    #[error("lock conflict on account {0}")]
    LockConflict(AccountId),

    /// Underlying store failure
    #[error("store error: {0}")]
    Store(String),
}
