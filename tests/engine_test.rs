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

//! Engine public API integration tests.

use ledger_processor_rs::{
    AccountId, Engine, LedgerError, LedgerStore, MemoryStore, Outcome, ReportedBalance,
    Transaction, TransactionId, TransactionKind, TransactionRequest, TransactionStatus,
};
use rust_decimal_macros::dec;
use std::sync::Arc;

fn request(tx: &str, account: &str, amount: &str) -> TransactionRequest {
    TransactionRequest {
        transaction_id: tx.into(),
        account_id: account.into(),
        amount: amount.into(),
    }
}

fn engine() -> Engine<MemoryStore> {
    Engine::new(Arc::new(MemoryStore::new()))
}

#[tokio::test]
async fn deposit_creates_account() {
    let engine = engine();
    let receipt = engine.deposit(&request("1", "7", "50.00")).await.unwrap();

    assert_eq!(receipt.status, Outcome::Completed);
    assert_eq!(receipt.new_balance, ReportedBalance::Known(dec!(50.00)));

    let account = engine
        .store()
        .get_account(AccountId(7))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(account.balance, dec!(50.00));
}

#[tokio::test]
async fn multiple_deposits_same_account() {
    let engine = engine();
    engine.deposit(&request("1", "1", "100.00")).await.unwrap();
    let receipt = engine.deposit(&request("2", "1", "50.00")).await.unwrap();

    assert_eq!(receipt.new_balance, ReportedBalance::Known(dec!(150.00)));
}

#[tokio::test]
async fn deposits_across_accounts_are_independent() {
    let engine = engine();
    engine.deposit(&request("1", "1", "100.00")).await.unwrap();
    engine.deposit(&request("2", "2", "200.00")).await.unwrap();

    let a1 = engine
        .store()
        .get_account(AccountId(1))
        .await
        .unwrap()
        .unwrap();
    let a2 = engine
        .store()
        .get_account(AccountId(2))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(a1.balance, dec!(100.00));
    assert_eq!(a2.balance, dec!(200.00));
}

#[tokio::test]
async fn withdrawal_after_deposit() {
    let engine = engine();
    engine.deposit(&request("1", "1", "100.00")).await.unwrap();
    let receipt = engine.withdraw(&request("2", "1", "30.00")).await.unwrap();

    assert_eq!(receipt.status, Outcome::Completed);
    assert_eq!(receipt.current_balance, ReportedBalance::Known(dec!(70.00)));
    assert_eq!(receipt.requested_amount, dec!(30.00));
}

#[tokio::test]
async fn withdrawal_insufficient_funds_is_a_failed_receipt() {
    let engine = engine();
    engine.deposit(&request("1", "1", "50.00")).await.unwrap();

    // Not an error: the rejection is a business outcome
    let receipt = engine.withdraw(&request("2", "1", "100.00")).await.unwrap();
    assert_eq!(receipt.status, Outcome::Failed);
    assert_eq!(receipt.current_balance, ReportedBalance::Known(dec!(50.00)));

    // The rejection is recorded in the audit trail
    let tx = engine
        .store()
        .get_transaction(TransactionId(2))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(tx.status, TransactionStatus::Failed);
    assert_eq!(tx.failure_reason.as_deref(), Some("Insufficient funds"));

    // Balance unchanged
    let account = engine
        .store()
        .get_account(AccountId(1))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(account.balance, dec!(50.00));
}

#[tokio::test]
async fn withdrawal_from_unknown_account_is_not_found() {
    let engine = engine();
    let result = engine.withdraw(&request("1", "404", "10.00")).await;
    assert_eq!(
        result,
        Err(LedgerError::AccountNotFound(AccountId(404)))
    );

    // Rejected before any record was written
    assert!(engine.store().all_transactions().await.unwrap().is_empty());
}

#[tokio::test]
async fn non_numeric_amount_is_rejected_without_side_effects() {
    let engine = engine();
    let result = engine.deposit(&request("1", "1", "abc")).await;
    assert_eq!(
        result,
        Err(LedgerError::InvalidFormat {
            field: "amount",
            value: "abc".into()
        })
    );

    assert!(engine.store().all_transactions().await.unwrap().is_empty());
    assert!(engine.store().all_accounts().await.unwrap().is_empty());
}

#[tokio::test]
async fn non_positive_amount_is_rejected_without_side_effects() {
    let engine = engine();
    for amount in ["0", "-5.00"] {
        let result = engine.deposit(&request("1", "1", amount)).await;
        assert!(matches!(result, Err(LedgerError::InvalidTransaction(_))));
    }
    assert!(engine.store().all_transactions().await.unwrap().is_empty());
}

#[tokio::test]
async fn replayed_deposit_credits_once() {
    let engine = engine();
    let first = engine.deposit(&request("1", "1", "100.00")).await.unwrap();
    let second = engine.deposit(&request("1", "1", "100.00")).await.unwrap();

    assert_eq!(first, second);
    let account = engine
        .store()
        .get_account(AccountId(1))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(account.balance, dec!(100.00));
    assert_eq!(engine.metrics().snapshot().replays, 1);
}

#[tokio::test]
async fn replayed_withdrawal_debits_once() {
    let engine = engine();
    engine.deposit(&request("1", "1", "100.00")).await.unwrap();
    let first = engine.withdraw(&request("2", "1", "40.00")).await.unwrap();
    let second = engine.withdraw(&request("2", "1", "40.00")).await.unwrap();

    assert_eq!(first.status, Outcome::Completed);
    assert_eq!(second.status, Outcome::Completed);
    let account = engine
        .store()
        .get_account(AccountId(1))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(account.balance, dec!(60.00));
}

#[tokio::test]
async fn replayed_failed_withdrawal_stays_failed() {
    let engine = engine();
    engine.deposit(&request("1", "1", "50.00")).await.unwrap();
    let first = engine.withdraw(&request("2", "1", "80.00")).await.unwrap();
    let second = engine.withdraw(&request("2", "1", "80.00")).await.unwrap();

    assert_eq!(first.status, Outcome::Failed);
    assert_eq!(second.status, Outcome::Failed);
    assert_eq!(
        second.current_balance,
        ReportedBalance::Known(dec!(50.00))
    );
}

#[tokio::test]
async fn replay_of_pending_transaction_reports_unknown_balance() {
    let engine = engine();
    engine.deposit(&request("1", "1", "100.00")).await.unwrap();

    // Simulate a request that crashed mid-flight, leaving the record Pending
    let stuck = Transaction::pending(
        TransactionId(9),
        AccountId(1),
        dec!(25.00),
        TransactionKind::Deposit,
    );
    engine.store().create_transaction(&stuck).await.unwrap();

    let receipt = engine.deposit(&request("9", "1", "25.00")).await.unwrap();
    assert_eq!(receipt.status, Outcome::Pending);
    assert_eq!(receipt.new_balance, ReportedBalance::Unknown);

    // No double-apply of the stuck transaction
    let account = engine
        .store()
        .get_account(AccountId(1))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(account.balance, dec!(100.00));
}

#[tokio::test]
async fn metrics_track_operations() {
    let engine = engine();
    engine.deposit(&request("1", "1", "100.00")).await.unwrap();
    engine.withdraw(&request("2", "1", "30.00")).await.unwrap();
    engine.withdraw(&request("3", "1", "999.00")).await.unwrap();
    engine.deposit(&request("1", "1", "100.00")).await.unwrap();

    let snapshot = engine.metrics().snapshot();
    assert_eq!(snapshot.deposits, 1);
    assert_eq!(snapshot.withdrawals, 1);
    assert_eq!(snapshot.insufficient_funds, 1);
    assert_eq!(snapshot.replays, 1);
}

/// End-to-end walk: implicit account creation, deposit, over-withdrawal,
/// normal withdrawal, replay of the first deposit.
#[tokio::test]
async fn deposit_withdraw_replay_scenario() {
    let engine = engine();

    let deposit = engine.deposit(&request("1", "100", "100")).await.unwrap();
    assert_eq!(deposit.status, Outcome::Completed);
    assert_eq!(deposit.new_balance, ReportedBalance::Known(dec!(100)));

    let rejected = engine.withdraw(&request("2", "100", "150")).await.unwrap();
    assert_eq!(rejected.status, Outcome::Failed);
    assert_eq!(rejected.current_balance, ReportedBalance::Known(dec!(100)));

    let withdrawal = engine.withdraw(&request("3", "100", "60")).await.unwrap();
    assert_eq!(withdrawal.status, Outcome::Completed);
    assert_eq!(withdrawal.current_balance, ReportedBalance::Known(dec!(40)));

    // Replay reconstructs the first receipt exactly, even though the
    // balance has since moved on
    let replay = engine.deposit(&request("1", "100", "100")).await.unwrap();
    assert_eq!(replay, deposit);

    let account = engine
        .store()
        .get_account(AccountId(100))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(account.balance, dec!(40));
}
