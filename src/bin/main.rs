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

use clap::Parser;
use csv::{ReaderBuilder, Trim, Writer};
use ledger_processor_rs::{Engine, LedgerStore, MemoryStore, Reconciler, TransactionRequest};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing_subscriber::EnvFilter;

/// Ledger Processor - Process transaction request CSV files
///
/// Reads deposit/withdrawal requests from a CSV file, runs them through the
/// processing engine concurrently, and outputs final account states to
/// stdout. Optionally runs a balance reconciliation pass afterwards.
#[derive(Parser, Debug)]
#[command(name = "ledger-processor-rs")]
#[command(about = "An idempotent ledger transaction processor", long_about = None)]
struct Args {
    /// Path to CSV file with transaction requests
    ///
    /// Expected format: type,tx,account,amount (all fields as text)
    /// Example: cargo run -- requests.csv > accounts.csv
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Run a balance reconciliation pass after processing
    #[arg(long)]
    reconcile: bool,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.json_logs);

    let file = match File::open(&args.input) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error opening file '{}': {}", args.input.display(), e);
            process::exit(1);
        }
    };

    let engine = Arc::new(Engine::new(Arc::new(MemoryStore::new())));

    if let Err(e) = process_requests(&engine, BufReader::new(file)).await {
        eprintln!("Error processing requests: {}", e);
        process::exit(1);
    }

    if let Err(e) = write_accounts(&engine, std::io::stdout()).await {
        eprintln!("Error writing output: {}", e);
        process::exit(1);
    }

    if args.reconcile {
        let reconciler = Reconciler::new(
            Arc::clone(engine.store()),
            Arc::clone(engine.metrics()),
        );
        let report = reconciler.check_all().await;
        for entry in report.drifted() {
            eprintln!(
                "drift: account {} stored {} computed {}",
                entry.account_id, entry.stored, entry.computed
            );
        }
        eprintln!(
            "reconciliation: {} consistent, {} inconsistent, {} skipped",
            report.consistent, report.inconsistent, report.skipped
        );
    }
}

/// Raw CSV record matching the input format.
///
/// Fields: `type, tx, account, amount` - all text, parsed by the engine.
#[derive(Debug, Deserialize)]
struct CsvRecord {
    #[serde(rename = "type")]
    kind: String,
    tx: String,
    account: String,
    amount: String,
}

/// Processes request rows concurrently through the engine.
///
/// Each row becomes its own task, so contention on one account exercises the
/// same lock-and-retry path a server deployment would. Malformed rows and
/// rejected requests are logged and skipped.
async fn process_requests<R: Read>(
    engine: &Arc<Engine<MemoryStore>>,
    reader: R,
) -> Result<(), csv::Error> {
    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .has_headers(true)
        .from_reader(reader);

    let mut tasks = JoinSet::new();
    for result in rdr.deserialize::<CsvRecord>() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(error = %e, "skipping malformed row");
                continue;
            }
        };

        let engine = Arc::clone(engine);
        tasks.spawn(async move {
            let request = TransactionRequest {
                transaction_id: record.tx,
                account_id: record.account,
                amount: record.amount,
            };
            let outcome = match record.kind.to_lowercase().as_str() {
                "deposit" => engine.deposit(&request).await.map(|_| ()),
                "withdrawal" => engine.withdraw(&request).await.map(|_| ()),
                other => {
                    tracing::warn!(kind = other, "skipping unknown transaction type");
                    return;
                }
            };
            if let Err(e) = outcome {
                tracing::warn!(
                    transaction_id = %request.transaction_id,
                    error = %e,
                    "request rejected"
                );
            }
        });
    }

    while tasks.join_next().await.is_some() {}
    Ok(())
}

/// Writes final account states as CSV.
///
/// Columns: `id, balance, version`
async fn write_accounts<W: Write>(
    engine: &Arc<Engine<MemoryStore>>,
    writer: W,
) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);

    let mut accounts = engine
        .store()
        .all_accounts()
        .await
        .unwrap_or_default();
    accounts.sort_by_key(|account| account.id);
    for account in accounts {
        wtr.serialize(&account)?;
    }

    wtr.flush()?;
    Ok(())
}
