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

//! Account records.
//!
//! Invariant: `balance >= 0` at all times. [`Account::debit`] refuses to
//! overdraw and the store refuses to save a negative balance, so the
//! invariant holds on both sides of the persistence boundary.
//!
//! # Example
//!
//! ```
//! use rust_decimal_macros::dec;
//! use ledger_processor_rs::{Account, AccountId};
//!
//! let mut account = Account::new(AccountId(1));
//! account.credit(dec!(100.00)).unwrap();
//! assert_eq!(account.balance, dec!(100.00));
//! ```

use crate::base::AccountId;
use crate::error::LedgerError;
use rust_decimal::Decimal;
use serde::Serialize;

/// A ledger account row.
///
/// `version` is bumped by the store on every save. It is a monotonic audit
/// counter only: conflict detection for withdrawals is the per-account
/// exclusive lock, not a version check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Account {
    pub id: AccountId,
    pub balance: Decimal,
    pub version: u64,
}

impl Account {
    /// Creates a zero-balance account.
    pub fn new(id: AccountId) -> Self {
        Self {
            id,
            balance: Decimal::ZERO,
            version: 0,
        }
    }

    /// Creates an account with an opening balance.
    pub fn with_balance(id: AccountId, balance: Decimal) -> Self {
        Self {
            id,
            balance,
            version: 0,
        }
    }

    fn assert_invariants(&self) {
        debug_assert!(
            self.balance >= Decimal::ZERO,
            "Invariant violated: balance went negative: {}",
            self.balance
        );
    }

    /// Increases the balance. Returns the new balance.
    pub fn credit(&mut self, amount: Decimal) -> Result<Decimal, LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidTransaction(
                "deposit amount must be positive".into(),
            ));
        }
        self.balance += amount;
        self.assert_invariants();
        Ok(self.balance)
    }

    /// Decreases the balance. Returns the new balance.
    ///
    /// The caller must hold the account's exclusive lock: the sufficiency
    /// check and the mutation are only safe when observed together.
    pub fn debit(&mut self, amount: Decimal) -> Result<Decimal, LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidTransaction(
                "withdrawal amount must be positive".into(),
            ));
        }
        if self.balance < amount {
            return Err(LedgerError::InsufficientFunds {
                available: self.balance,
                requested: amount,
            });
        }
        self.balance -= amount;
        self.assert_invariants();
        Ok(self.balance)
    }
}
