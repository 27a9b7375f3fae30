//! # Status Reconciler
//!
//! Folds the inbound status stream into two views:
//!
//! 1. **Current status**: level-triggered. Every valid message overwrites it,
//!    and so does every local lifecycle sentinel.
//! 2. **Timeline**: edge-triggered, newest-first, append-only. A message is
//!    recorded only when its status differs from the last *recorded* status,
//!    so no two adjacent entries ever share a status.
//!
//! Lifecycle sentinels never reach the timeline and never change the dedup key.
//! Malformed payloads are rejected before any state is touched.

use std::collections::VecDeque;

use log::{debug, warn};
use serde::Deserialize;

use crate::error::{SessionError, SessionResult};
use crate::status::{Clock, CurrentStatus, LocalClock, Sentinel, StatusValue, TimelineEntry};

/// Inbound message shape. Extra fields (such as a server-side history) are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusMessage {
    pub status: StatusValue,
    #[serde(default)]
    pub reason: Option<String>,
}

impl StatusMessage {
    pub fn parse(payload: &str) -> SessionResult<Self> {
        serde_json::from_str(payload).map_err(|e| SessionError::decode(payload, e))
    }
}

/// What a single inbound message did to the reconciler state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciled {
    /// Status changed; a timeline entry was recorded.
    Appended(TimelineEntry),
    /// Same status as the last recorded one; only the projection was refreshed.
    Repeated(StatusValue),
}

pub struct StatusReconciler {
    current: CurrentStatus,
    timeline: VecDeque<TimelineEntry>,
    last_observed: Option<StatusValue>,
    decode_failures: u64,
    clock: Box<dyn Clock>,
}

impl Default for StatusReconciler {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusReconciler {
    pub fn new() -> Self {
        Self::with_clock(Box::new(LocalClock))
    }

    pub fn with_clock(clock: Box<dyn Clock>) -> Self {
        Self {
            current: CurrentStatus::default(),
            timeline: VecDeque::new(),
            last_observed: None,
            decode_failures: 0,
            clock,
        }
    }

    /// Parse and apply one raw inbound payload.
    ///
    /// On a decode failure the error is returned and nothing else changes
    /// except the failure counter.
    pub fn ingest(&mut self, payload: &str) -> SessionResult<Reconciled> {
        match StatusMessage::parse(payload) {
            Ok(message) => Ok(self.apply(message)),
            Err(err) => {
                self.decode_failures += 1;
                warn!("dropping inbound message: {}", err);
                Err(err)
            }
        }
    }

    /// Apply an already decoded message.
    pub fn apply(&mut self, message: StatusMessage) -> Reconciled {
        let StatusMessage { status, reason } = message;
        self.current = CurrentStatus::Remote(status.clone());

        if self.last_observed.as_ref() == Some(&status) {
            return Reconciled::Repeated(status);
        }

        let entry = TimelineEntry {
            timestamp: self.clock.display_time(),
            status: status.clone(),
            reason,
        };
        debug!("timeline: {} at {}", entry.status, entry.timestamp);
        self.timeline.push_front(entry.clone());
        self.last_observed = Some(status);
        Reconciled::Appended(entry)
    }

    /// Overwrite the projection with a local lifecycle sentinel.
    pub fn set_sentinel(&mut self, sentinel: Sentinel) {
        self.current = CurrentStatus::Local(sentinel);
    }

    pub fn current_status(&self) -> &CurrentStatus {
        &self.current
    }

    /// Snapshot of the timeline, newest first.
    pub fn timeline(&self) -> Vec<TimelineEntry> {
        self.timeline.iter().cloned().collect()
    }

    pub fn timeline_len(&self) -> usize {
        self.timeline.len()
    }

    pub fn decode_failures(&self) -> u64 {
        self.decode_failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::FixedClock;

    fn reconciler() -> StatusReconciler {
        StatusReconciler::with_clock(Box::new(FixedClock("10:00:00".into())))
    }

    fn msg(status: &str) -> String {
        format!(r#"{{"status":"{status}"}}"#)
    }

    fn statuses_oldest_first(r: &StatusReconciler) -> Vec<String> {
        r.timeline()
            .into_iter()
            .rev()
            .map(|e| e.status.as_str().to_string())
            .collect()
    }

    #[test]
    fn first_message_is_always_recorded() {
        let mut r = reconciler();
        let outcome = r.ingest(&msg("CONNECTED")).unwrap();
        assert!(matches!(outcome, Reconciled::Appended(_)));
        assert_eq!(r.timeline_len(), 1);
    }

    #[test]
    fn repeated_status_refreshes_projection_only() {
        let mut r = reconciler();
        r.ingest(&msg("FOCUSED")).unwrap();
        r.set_sentinel(Sentinel::Connected);
        let outcome = r.ingest(&msg("FOCUSED")).unwrap();

        assert_eq!(outcome, Reconciled::Repeated(StatusValue::new("FOCUSED")));
        assert_eq!(r.current_status().as_str(), "FOCUSED");
        assert_eq!(r.timeline_len(), 1);
    }

    #[test]
    fn timeline_is_newest_first() {
        let mut r = reconciler();
        r.ingest(&msg("FOCUSED")).unwrap();
        r.ingest(&msg("CONFUSED")).unwrap();
        let timeline = r.timeline();
        assert_eq!(timeline[0].status.as_str(), "CONFUSED");
        assert_eq!(timeline[1].status.as_str(), "FOCUSED");
    }

    #[test]
    fn sentinels_do_not_touch_dedup_key() {
        let mut r = reconciler();
        r.ingest(&msg("FOCUSED")).unwrap();
        r.set_sentinel(Sentinel::BackendError);
        r.ingest(&msg("FOCUSED")).unwrap();
        assert_eq!(statuses_oldest_first(&r), vec!["FOCUSED"]);
    }

    #[test]
    fn unknown_labels_are_accepted() {
        let mut r = reconciler();
        r.ingest(&msg("PROCTOR_ALERT")).unwrap();
        r.ingest(&msg("NO_FRAME")).unwrap();
        assert_eq!(statuses_oldest_first(&r), vec!["PROCTOR_ALERT", "NO_FRAME"]);
    }

    #[test]
    fn reason_and_extra_fields() {
        let mut r = reconciler();
        let payload = r#"{"status":"PROCTOR_ALERT","reason":"NO_FACE","history":[{"status":"FOCUSED","time":"09:59:59"}]}"#;
        match r.ingest(payload).unwrap() {
            Reconciled::Appended(entry) => {
                assert_eq!(entry.reason.as_deref(), Some("NO_FACE"));
                assert_eq!(entry.timestamp, "10:00:00");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn null_reason_is_none() {
        let mut r = reconciler();
        r.ingest(r#"{"status":"FOCUSED","reason":null}"#).unwrap();
        assert_eq!(r.timeline()[0].reason, None);
    }

    #[test]
    fn malformed_payload_leaves_state_intact() {
        let mut r = reconciler();
        r.ingest(&msg("FOCUSED")).unwrap();

        assert!(r.ingest("not json").is_err());
        assert!(r.ingest(r#"{"reason":"no status"}"#).is_err());
        assert!(r.ingest(r#"{"status":42}"#).is_err());

        assert_eq!(r.current_status().as_str(), "FOCUSED");
        assert_eq!(r.timeline_len(), 1);
        assert_eq!(r.decode_failures(), 3);
    }

    #[test]
    fn no_adjacent_duplicates_over_mixed_sequence() {
        let mut r = reconciler();
        let sequence = [
            "FOCUSED", "FOCUSED", "CONFUSED", "CONFUSED", "FOCUSED", "PROCTOR_ALERT",
            "PROCTOR_ALERT", "FOCUSED", "FOCUSED", "FOCUSED", "CONFUSED",
        ];
        for status in sequence {
            r.ingest(&msg(status)).unwrap();
            assert_eq!(r.current_status().as_str(), status);
        }

        let recorded = statuses_oldest_first(&r);
        assert!(recorded.windows(2).all(|pair| pair[0] != pair[1]));
        assert_eq!(
            recorded,
            vec!["FOCUSED", "CONFUSED", "FOCUSED", "PROCTOR_ALERT", "FOCUSED", "CONFUSED"]
        );
    }
}
