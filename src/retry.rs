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

//! Retry policy for the contended withdrawal path.
//!
//! Lock acquisition fails transiently when two withdrawals race on the same
//! account. The policy retries that mechanism only: business outcomes
//! (insufficient funds) are terminal and never retried, and non-conflict
//! errors propagate immediately.

use crate::error::LedgerError;
use std::time::Duration;

/// Bounded retry with linear backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Backoff unit: the wait after failed attempt `n` is `base_delay * n`.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// Backoff before the attempt following failed attempt `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }

    /// Whether the error is a transient conflict worth another attempt.
    pub fn retries(&self, error: &LedgerError) -> bool {
        matches!(error, LedgerError::LockConflict(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::AccountId;
    use rust_decimal_macros::dec;

    #[test]
    fn backoff_grows_linearly() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_millis(200));
        assert_eq!(policy.backoff(2), Duration::from_millis(400));
    }

    #[test]
    fn only_lock_conflicts_are_retryable() {
        let policy = RetryPolicy::default();
        assert!(policy.retries(&LedgerError::LockConflict(AccountId(1))));
        assert!(!policy.retries(&LedgerError::InsufficientFunds {
            available: dec!(1.00),
            requested: dec!(2.00)
        }));
        assert!(!policy.retries(&LedgerError::AccountNotFound(AccountId(1))));
        assert!(!policy.retries(&LedgerError::Store("boom".into())));
    }
}
