//! JSONL audit trail. Every webhook and worker-lifecycle event is
//! appended to a single file, one JSON object per line, so a run can be
//! reconstructed after the fact without a database.

use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;

/// A single line of the audit trail.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub event: &'static str,
    pub ts: DateTime<Utc>,
    #[serde(flatten)]
    pub data: serde_json::Value,
}

/// Append-only, thread-safe audit logger. Shared across per-asset
/// worker threads via `Arc`.
pub struct AuditLog {
    writer: Mutex<BufWriter<std::fs::File>>,
}

impl AuditLog {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn log(&self, event: &'static str, data: serde_json::Value) -> Result<()> {
        let entry = AuditEvent {
            event,
            ts: Utc::now(),
            data,
        };
        let json = serde_json::to_string(&entry)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        let mut writer = self.writer.lock().unwrap();
        writeln!(writer, "{json}")?;
        writer.flush()?;
        Ok(())
    }

    pub fn log_simple(&self, event: &'static str) -> Result<()> {
        self.log(event, serde_json::json!({}))
    }
}

/// Convenience helpers, one per `AuditEvent` named in the engine's state
/// machine plus the webhook ingress points.
pub fn webhook_received(audit: &AuditLog, exchange: &str, symbol: &str, side: &str) -> Result<()> {
    audit.log(
        "webhook_received",
        serde_json::json!({ "exchange": exchange, "symbol": symbol, "side": side }),
    )
}

pub fn webhook_rejected(audit: &AuditLog, reason: &str) -> Result<()> {
    audit.log("webhook_rejected", serde_json::json!({ "reason": reason }))
}

pub fn order_placed(audit: &AuditLog, symbol: &str, side: &str, price: &str, amount: &str) -> Result<()> {
    audit.log(
        "order_placed",
        serde_json::json!({ "symbol": symbol, "side": side, "price": price, "amount": amount }),
    )
}

pub fn order_replaced(audit: &AuditLog, symbol: &str, old_price: &str, new_price: &str) -> Result<()> {
    audit.log(
        "order_replaced",
        serde_json::json!({ "symbol": symbol, "old_price": old_price, "new_price": new_price }),
    )
}

pub fn order_reconciling(audit: &AuditLog, symbol: &str, order_id: &str) -> Result<()> {
    audit.log(
        "order_reconciling",
        serde_json::json!({ "symbol": symbol, "order_id": order_id }),
    )
}

pub fn fully_matched(audit: &AuditLog, symbol: &str, side: &str, amount: &str) -> Result<()> {
    audit.log(
        "fully_matched",
        serde_json::json!({ "symbol": symbol, "side": side, "amount": amount }),
    )
}

pub fn worker_error(audit: &AuditLog, symbol: &str, error: &str) -> Result<()> {
    audit.log("worker_error", serde_json::json!({ "symbol": symbol, "error": error }))
}

pub fn worker_stopped(audit: &AuditLog, symbol: &str) -> Result<()> {
    audit.log("worker_stopped", serde_json::json!({ "symbol": symbol }))
}

pub fn order_size_too_low(audit: &AuditLog, symbol: &str, side: &str) -> Result<()> {
    audit.log("order_size_too_low", serde_json::json!({ "symbol": symbol, "side": side }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audit_log_writes_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");

        let log = AuditLog::open(&path).unwrap();
        log.log_simple("test_event").unwrap();
        order_placed(&log, "BTC/USDT", "buy", "42000.00", "0.01").unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        for line in &lines {
            let _: serde_json::Value = serde_json::from_str(line).unwrap();
        }
        assert!(lines[0].contains("\"event\":\"test_event\""));
        assert!(lines[1].contains("\"event\":\"order_placed\""));
    }

    #[test]
    fn audit_log_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("subdir").join("deep").join("audit.jsonl");

        let log = AuditLog::open(&path).unwrap();
        log.log_simple("test").unwrap();

        assert!(path.exists());
    }
}
