// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Append-only audit trail.
//!
//! Every authorization decision, validation failure, and administrative
//! change lands here. The trail is evidence, not control flow: events are
//! written after the decision is final, and a failed write is reported
//! through tracing and swallowed so an unhealthy trail can never change
//! an answer.
//!
//! Events are keyed by `timestamp_millis (big-endian) | event_id`, so a
//! plain range scan returns chronological order.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use redb::{ReadableDatabase, ReadableTable};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::db::{BrokerDb, StoreResult, AUDIT};

/// Types of auditable events.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    // Authorization decisions
    AuthGranted,
    AuthDenied,

    // Token validation
    ValidationFailed,

    // Admin events
    RoleUpdated,
    PermissionsUpdated,
    SuperAdminSetup,
    SiteCreated,
    SiteUpdated,
    SiteDeleted,

    // Infrastructure failures surfaced to callers as generic denials
    SystemError,
}

/// An audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuditEvent {
    /// Unique event ID.
    pub event_id: String,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// Type of event.
    pub event_type: AuditEventType,
    /// User who triggered the event (if known).
    pub user_id: Option<String>,
    /// User affected by an administrative change.
    pub target_user_id: Option<String>,
    /// Site or permission the decision was about.
    pub site: Option<String>,
    /// IP address of the request (if available).
    pub ip_address: Option<String>,
    /// User agent of the request (if available).
    pub user_agent: Option<String>,
    /// Additional details as JSON.
    #[schema(value_type = Option<Object>)]
    pub details: Option<serde_json::Value>,
    /// Whether the operation succeeded.
    pub success: bool,
    /// Denial or failure reason.
    pub error: Option<String>,
}

impl AuditEvent {
    /// Create a new audit event.
    pub fn new(event_type: AuditEventType) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type,
            user_id: None,
            target_user_id: None,
            site: None,
            ip_address: None,
            user_agent: None,
            details: None,
            success: true,
            error: None,
        }
    }

    /// Set the acting user.
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Set the user an administrative change applied to.
    pub fn with_target_user(mut self, user_id: impl Into<String>) -> Self {
        self.target_user_id = Some(user_id.into());
        self
    }

    /// Set the site or permission the decision was about.
    pub fn with_site(mut self, site: impl Into<String>) -> Self {
        self.site = Some(site.into());
        self
    }

    /// Set the IP address.
    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip_address = Some(ip.into());
        self
    }

    /// Set the user agent.
    pub fn with_user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Add details.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Mark as failed with error message.
    pub fn failed(mut self, error: impl Into<String>) -> Self {
        self.success = false;
        self.error = Some(error.into());
        self
    }
}

/// Destination for audit events.
///
/// The engine and handlers go through this seam so tests can observe what
/// was recorded and simulate a broken trail.
pub trait AuditSink: Send + Sync {
    /// Append one event.
    fn log(&self, event: &AuditEvent) -> StoreResult<()>;

    /// Append one event, swallowing storage failures. Decisions are made
    /// before recording, so a failure here changes nothing for the caller.
    fn record(&self, event: AuditEvent) {
        if let Err(e) = self.log(&event) {
            tracing::error!(
                event_type = ?event.event_type,
                user_id = ?event.user_id,
                error = %e,
                "failed to append audit event"
            );
        }
    }
}

/// Redb-backed audit trail.
pub struct AuditLog {
    db: Arc<BrokerDb>,
}

impl AuditLog {
    pub fn new(db: Arc<BrokerDb>) -> Self {
        Self { db }
    }

    /// Read events within an optional time window, oldest first.
    ///
    /// Bounds map straight onto the key prefix, so this is a single range
    /// scan rather than a full-table filter.
    pub fn read_range(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> StoreResult<Vec<AuditEvent>> {
        let low = start
            .map(|t| t.timestamp_millis().max(0) as u64)
            .unwrap_or(0)
            .to_be_bytes();
        let high = end
            .map(|t| (t.timestamp_millis().max(0) as u64).saturating_add(1))
            .unwrap_or(u64::MAX)
            .to_be_bytes();

        let read_txn = self.db.db.begin_read()?;
        let table = read_txn.open_table(AUDIT)?;

        let mut events = Vec::new();
        for entry in table.range(&low[..]..&high[..])? {
            let (_, value) = entry?;
            let event: AuditEvent = serde_json::from_slice(value.value())?;
            events.push(event);
        }
        Ok(events)
    }
}

impl AuditSink for AuditLog {
    fn log(&self, event: &AuditEvent) -> StoreResult<()> {
        let json = serde_json::to_vec(event)?;
        let key = event_key(event.timestamp, &event.event_id);

        let write_txn = self.db.db.begin_write()?;
        {
            let mut table = write_txn.open_table(AUDIT)?;
            table.insert(key.as_slice(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }
}

fn event_key(timestamp: DateTime<Utc>, event_id: &str) -> Vec<u8> {
    let millis = timestamp.timestamp_millis().max(0) as u64;
    let mut key = Vec::with_capacity(8 + event_id.len());
    key.extend_from_slice(&millis.to_be_bytes());
    key.extend_from_slice(event_id.as_bytes());
    key
}

/// Collecting sink for tests: remembers everything, optionally fails.
#[cfg(test)]
pub struct MemoryAuditSink {
    events: std::sync::Mutex<Vec<AuditEvent>>,
    failing: std::sync::atomic::AtomicBool,
}

#[cfg(test)]
impl MemoryAuditSink {
    pub fn new() -> Self {
        Self {
            events: std::sync::Mutex::new(Vec::new()),
            failing: std::sync::atomic::AtomicBool::new(false),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing
            .store(failing, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn recorded(&self) -> Vec<AuditEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl AuditSink for MemoryAuditSink {
    fn log(&self, event: &AuditEvent) -> StoreResult<()> {
        if self.failing.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(super::db::StoreError::Unavailable(
                "injected audit failure".to_string(),
            ));
        }
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn audit_log() -> (AuditLog, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = BrokerDb::open(&dir.path().join("broker.redb")).unwrap();
        (AuditLog::new(Arc::new(db)), dir)
    }

    #[test]
    fn create_audit_event() {
        let event = AuditEvent::new(AuditEventType::AuthDenied)
            .with_user("user_123")
            .with_site("premium_sites")
            .with_ip("203.0.113.9")
            .failed("Insufficient permissions for premium_sites");

        assert_eq!(event.event_type, AuditEventType::AuthDenied);
        assert_eq!(event.user_id, Some("user_123".to_string()));
        assert_eq!(event.site, Some("premium_sites".to_string()));
        assert!(!event.success);
        assert_eq!(
            event.error,
            Some("Insufficient permissions for premium_sites".to_string())
        );
    }

    #[test]
    fn log_and_read_events() {
        let (log, _dir) = audit_log();

        log.log(&AuditEvent::new(AuditEventType::AuthGranted).with_user("user_1"))
            .unwrap();
        log.log(&AuditEvent::new(AuditEventType::RoleUpdated).with_user("admin_1"))
            .unwrap();

        let events = log.read_range(None, None).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, AuditEventType::AuthGranted);
        assert_eq!(events[1].event_type, AuditEventType::RoleUpdated);
    }

    #[test]
    fn events_come_back_in_chronological_order() {
        let (log, _dir) = audit_log();

        let mut late = AuditEvent::new(AuditEventType::AuthDenied).with_user("u");
        late.timestamp = Utc::now() + Duration::hours(1);
        let mut early = AuditEvent::new(AuditEventType::AuthGranted).with_user("u");
        early.timestamp = Utc::now() - Duration::hours(1);

        // Inserted out of order on purpose.
        log.log(&late).unwrap();
        log.log(&early).unwrap();

        let events = log.read_range(None, None).unwrap();
        assert_eq!(events[0].event_type, AuditEventType::AuthGranted);
        assert_eq!(events[1].event_type, AuditEventType::AuthDenied);
    }

    #[test]
    fn read_range_respects_bounds() {
        let (log, _dir) = audit_log();
        let now = Utc::now();

        for hours_ago in [30i64, 20, 10] {
            let mut event = AuditEvent::new(AuditEventType::AuthGranted).with_user("u");
            event.timestamp = now - Duration::hours(hours_ago);
            log.log(&event).unwrap();
        }

        let events = log
            .read_range(
                Some(now - Duration::hours(25)),
                Some(now - Duration::hours(5)),
            )
            .unwrap();
        assert_eq!(events.len(), 2);

        let recent = log.read_range(Some(now - Duration::hours(15)), None).unwrap();
        assert_eq!(recent.len(), 1);
    }

    #[test]
    fn record_swallows_sink_failures() {
        let sink = MemoryAuditSink::new();
        sink.set_failing(true);

        // Must not panic or propagate anything.
        sink.record(AuditEvent::new(AuditEventType::SystemError));
        assert!(sink.recorded().is_empty());

        sink.set_failing(false);
        sink.record(AuditEvent::new(AuditEventType::AuthGranted));
        assert_eq!(sink.recorded().len(), 1);
    }
}
