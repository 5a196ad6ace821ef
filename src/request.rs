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

//! Request boundary and receipt shapes.
//!
//! Requests arrive with every field as text; [`TransactionRequest::validate`]
//! parses them exactly once into strict numeric types, so the rest of the
//! core never touches a string-typed id or amount. Parse and validation
//! failures happen before any state is created.

use crate::base::{AccountId, TransactionId};
use crate::error::LedgerError;
use rust_decimal::Decimal;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Wire-shape transaction request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TransactionRequest {
    pub transaction_id: String,
    pub account_id: String,
    pub amount: String,
}

/// A request parsed into strict types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatedRequest {
    pub transaction_id: TransactionId,
    pub account_id: AccountId,
    pub amount: Decimal,
}

impl TransactionRequest {
    /// Parses the text fields into [`ValidatedRequest`].
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidFormat`] - a field is not valid numeric text.
    /// - [`LedgerError::InvalidTransaction`] - the amount is zero or negative.
    pub fn validate(&self) -> Result<ValidatedRequest, LedgerError> {
        let transaction_id = self
            .transaction_id
            .trim()
            .parse::<u64>()
            .map(TransactionId)
            .map_err(|_| LedgerError::InvalidFormat {
                field: "transaction_id",
                value: self.transaction_id.clone(),
            })?;
        let account_id = self
            .account_id
            .trim()
            .parse::<u64>()
            .map(AccountId)
            .map_err(|_| LedgerError::InvalidFormat {
                field: "account_id",
                value: self.account_id.clone(),
            })?;
        let amount =
            self.amount
                .trim()
                .parse::<Decimal>()
                .map_err(|_| LedgerError::InvalidFormat {
                    field: "amount",
                    value: self.amount.clone(),
                })?;
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidTransaction(format!(
                "amount must be positive, got {amount}"
            )));
        }
        Ok(ValidatedRequest {
            transaction_id,
            account_id,
            amount,
        })
    }
}

/// Outcome reported to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Completed,
    Failed,
    Pending,
}

/// A balance in a receipt: a concrete decimal, or `"unknown"` when the
/// transaction is still in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportedBalance {
    Known(Decimal),
    Unknown,
}

impl Serialize for ReportedBalance {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Known(balance) => serializer.collect_str(balance),
            Self::Unknown => serializer.serialize_str("unknown"),
        }
    }
}

impl fmt::Display for ReportedBalance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(balance) => write!(f, "{balance}"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Receipt for a deposit request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DepositReceipt {
    pub transaction_id: TransactionId,
    pub account_id: AccountId,
    pub new_balance: ReportedBalance,
    pub status: Outcome,
}

/// Receipt for a withdrawal request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WithdrawalReceipt {
    pub transaction_id: TransactionId,
    pub account_id: AccountId,
    pub current_balance: ReportedBalance,
    pub requested_amount: Decimal,
    pub status: Outcome,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn request(tx: &str, account: &str, amount: &str) -> TransactionRequest {
        TransactionRequest {
            transaction_id: tx.into(),
            account_id: account.into(),
            amount: amount.into(),
        }
    }

    #[test]
    fn valid_request_parses() {
        let parsed = request("1", "42", "100.50").validate().unwrap();
        assert_eq!(parsed.transaction_id, TransactionId(1));
        assert_eq!(parsed.account_id, AccountId(42));
        assert_eq!(parsed.amount, dec!(100.50));
    }

    #[test]
    fn whitespace_is_tolerated() {
        let parsed = request(" 1 ", " 42 ", " 100.50 ").validate().unwrap();
        assert_eq!(parsed.amount, dec!(100.50));
    }

    #[test]
    fn non_numeric_amount_is_invalid_format() {
        let result = request("1", "42", "abc").validate();
        assert_eq!(
            result,
            Err(LedgerError::InvalidFormat {
                field: "amount",
                value: "abc".into()
            })
        );
    }

    #[test]
    fn non_numeric_ids_are_invalid_format() {
        assert!(matches!(
            request("tx-1", "42", "10").validate(),
            Err(LedgerError::InvalidFormat {
                field: "transaction_id",
                ..
            })
        ));
        assert!(matches!(
            request("1", "acct", "10").validate(),
            Err(LedgerError::InvalidFormat {
                field: "account_id",
                ..
            })
        ));
    }

    #[test]
    fn non_positive_amount_is_invalid_transaction() {
        assert!(matches!(
            request("1", "42", "0").validate(),
            Err(LedgerError::InvalidTransaction(_))
        ));
        assert!(matches!(
            request("1", "42", "-5.00").validate(),
            Err(LedgerError::InvalidTransaction(_))
        ));
    }

    #[test]
    fn receipt_serializes_with_lowercase_status() {
        let receipt = DepositReceipt {
            transaction_id: TransactionId(1),
            account_id: AccountId(42),
            new_balance: ReportedBalance::Known(dec!(100.50)),
            status: Outcome::Completed,
        };
        let json = serde_json::to_value(&receipt).unwrap();
        assert_eq!(json["status"], "completed");
        assert_eq!(json["new_balance"], "100.50");
    }

    #[test]
    fn pending_balance_serializes_as_unknown() {
        let receipt = WithdrawalReceipt {
            transaction_id: TransactionId(2),
            account_id: AccountId(42),
            current_balance: ReportedBalance::Unknown,
            requested_amount: dec!(60.00),
            status: Outcome::Pending,
        };
        let json = serde_json::to_value(&receipt).unwrap();
        assert_eq!(json["current_balance"], "unknown");
        assert_eq!(json["status"], "pending");
        // serde-str carries the amount as a string
        assert_eq!(json["requested_amount"], "60.00");
    }
}
