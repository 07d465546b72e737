//! Append-only JSON-lines audit trail of policy administration.
//!
//! Every load, reload, rule or group creation, rejected exception app and
//! teardown is recorded as one JSON object per line, written by a background
//! task so the caller never waits on disk I/O.
//!
//! ```rust,no_run
//! use audit_log::{AuditEntry, AuditEventType, AuditSink, AuditSource};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let (sink, _handle) = AuditSink::start("/var/log/parental-control/audit.jsonl").await?;
//!
//! sink.log(AuditEntry::new(
//!     AuditEventType::PolicyLoaded,
//!     AuditSource::new("parental-control"),
//!     serde_json::json!({"rules": 3, "groups": 2}),
//! ))
//! .await;
//! # Ok(())
//! # }
//! ```

pub mod entry;
pub mod sink;
pub mod writer;

pub use entry::{AuditEntry, AuditEventType, AuditSource, PolicyChangeRecord};
pub use sink::AuditSink;
pub use writer::{AuditWriteError, AuditWriter};
