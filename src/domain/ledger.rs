//! Append-only record of trade attempts

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::domain::execution::{FailureKind, TradeOutcome};
use crate::shared::types::{Leg, Strategy, VenuePair};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeStatus {
    Success,
    Failed,
}

/// One ledger line. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub strategy: Strategy,
    pub leg: Option<Leg>,
    pub status: TradeStatus,
    pub order_label: String,
    pub tx_id: Option<String>,
    pub input_volume: Decimal,
    pub net_profit: Option<Decimal>,
    pub fail_reason: Option<String>,
    pub failure_kind: Option<FailureKind>,
    pub timestamp: DateTime<Utc>,
}

impl TradeRecord {
    /// Ledger entries for one execution: BUY and SELL on success, a single
    /// FAILED entry otherwise.
    pub fn from_outcome(outcome: &TradeOutcome, venues: &VenuePair) -> Vec<TradeRecord> {
        let timestamp = Utc::now();
        let entry = &venues.get(outcome.strategy.entry()).name;
        let exit = &venues.get(outcome.strategy.exit()).name;

        if !outcome.success {
            return vec![TradeRecord {
                strategy: outcome.strategy,
                leg: None,
                status: TradeStatus::Failed,
                order_label: outcome.strategy.describe(venues),
                tx_id: outcome.leg1_tx_id.clone(),
                input_volume: outcome.amount_in,
                net_profit: None,
                fail_reason: outcome.error.clone(),
                failure_kind: outcome.failure_kind,
                timestamp,
            }];
        }

        vec![
            TradeRecord {
                strategy: outcome.strategy,
                leg: Some(Leg::Buy),
                status: TradeStatus::Success,
                order_label: format!("Order 1: Buy on {}", entry),
                tx_id: outcome.leg1_tx_id.clone(),
                input_volume: outcome.amount_in,
                net_profit: None,
                fail_reason: None,
                failure_kind: None,
                timestamp,
            },
            TradeRecord {
                strategy: outcome.strategy,
                leg: Some(Leg::Sell),
                status: TradeStatus::Success,
                order_label: format!("Order 2: Sell on {}", exit),
                tx_id: outcome.leg2_tx_id.clone(),
                input_volume: outcome.intermediate_amount.unwrap_or_default(),
                net_profit: outcome.net_profit,
                fail_reason: None,
                failure_kind: None,
                timestamp,
            },
        ]
    }

    pub fn needs_attention(&self) -> bool {
        self.failure_kind == Some(FailureKind::Partial)
    }
}

/// JSON-lines mirror of the ledger on disk.
#[derive(Debug)]
struct Journal {
    path: PathBuf,
    file: File,
}

impl Journal {
    fn open(path: &Path) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    fn write(&mut self, record: &TradeRecord) -> std::io::Result<()> {
        let line = serde_json::to_string(record)?;
        writeln!(self.file, "{}", line)?;
        self.file.flush()
    }
}

/// In-memory trade log, optionally journaled to disk.
#[derive(Debug, Default)]
pub struct Ledger {
    records: Vec<TradeRecord>,
    journal: Option<Journal>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_journal(path: &Path) -> std::io::Result<Self> {
        Ok(Self {
            records: Vec::new(),
            journal: Some(Journal::open(path)?),
        })
    }

    /// Journal failures are logged; the in-memory record is kept regardless.
    pub fn append(&mut self, record: TradeRecord) {
        if let Some(journal) = self.journal.as_mut() {
            if let Err(e) = journal.write(&record) {
                warn!("⚠️ Failed to journal trade to {}: {}", journal.path.display(), e);
            }
        }
        self.records.push(record);
    }

    /// Last `n` records, oldest first. The returned vector is a copy.
    pub fn recent(&self, n: usize) -> Vec<TradeRecord> {
        let start = self.records.len().saturating_sub(n);
        self.records[start..].to_vec()
    }
}
