//! Completion-policy tracking.
//!
//! Chromium reports navigation progress as `Page.lifecycleEvent` records
//! (`init`, `DOMContentLoaded`, `load`, `networkAlmostIdle`, `networkIdle`,
//! ...). A navigation counts as finished once every stage named by the
//! policy has been seen for the current document.

use std::collections::HashSet;

use futures::{Stream, StreamExt};

use crate::types::LifecycleEvent;
use crate::{CaptureError, Result};

/// Lifecycle name Chromium emits when a new document starts.
const DOCUMENT_INIT: &str = "init";

#[derive(Debug, Clone)]
pub struct LifecycleTracker {
    pending: HashSet<&'static str>,
    required: Vec<&'static str>,
}

impl LifecycleTracker {
    pub fn new(policy: &[LifecycleEvent]) -> Self {
        let required: Vec<&'static str> = policy.iter().map(|e| e.protocol_name()).collect();
        Self {
            pending: required.iter().copied().collect(),
            required,
        }
    }

    pub fn is_satisfied(&self) -> bool {
        self.pending.is_empty()
    }

    /// Records one lifecycle event; returns whether the policy is now met.
    /// A new document (`init`) resets progress.
    pub fn observe(&mut self, name: &str) -> bool {
        if name == DOCUMENT_INIT {
            self.pending = self.required.iter().copied().collect();
        } else {
            self.pending.remove(name);
        }
        self.is_satisfied()
    }
}

/// Drives `tracker` from a stream of `(is_main_frame, event_name)` pairs.
pub async fn wait_for_policy<S>(mut tracker: LifecycleTracker, events: S) -> Result<()>
where
    S: Stream<Item = (bool, String)> + Unpin,
{
    if tracker.is_satisfied() {
        return Ok(());
    }
    let mut events = events;
    while let Some((is_main_frame, name)) = events.next().await {
        if is_main_frame && tracker.observe(&name) {
            return Ok(());
        }
    }
    Err(CaptureError::navigation(
        "Page closed before navigation finished",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn main(name: &str) -> (bool, String) {
        (true, name.to_string())
    }

    #[test]
    fn tracker_waits_for_every_stage() {
        let mut tracker = LifecycleTracker::new(&LifecycleEvent::URL_DEFAULT);
        assert!(!tracker.observe("DOMContentLoaded"));
        assert!(!tracker.observe("load"));
        assert!(!tracker.observe("networkAlmostIdle"));
        assert!(tracker.observe("networkIdle"));
    }

    #[test]
    fn init_resets_progress() {
        let mut tracker = LifecycleTracker::new(&[LifecycleEvent::DomContentLoaded, LifecycleEvent::Load]);
        assert!(!tracker.observe("DOMContentLoaded"));
        assert!(!tracker.observe("init"));
        assert!(!tracker.observe("load"));
        assert!(tracker.observe("DOMContentLoaded"));
    }

    #[test]
    fn unrelated_events_are_ignored() {
        let mut tracker = LifecycleTracker::new(&[LifecycleEvent::Load]);
        assert!(!tracker.observe("firstPaint"));
        assert!(!tracker.observe("networkIdle"));
        assert!(tracker.observe("load"));
    }

    #[test]
    fn empty_policy_is_immediately_satisfied() {
        assert!(LifecycleTracker::new(&[]).is_satisfied());
    }

    #[tokio::test]
    async fn subframe_events_do_not_count() {
        let events = stream::iter(vec![
            (false, "load".to_string()),
            main("init"),
            main("load"),
        ]);
        wait_for_policy(LifecycleTracker::new(&[LifecycleEvent::Load]), events)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn stream_end_before_policy_is_navigation_failure() {
        let events = stream::iter(vec![main("init"), (false, "load".to_string())]);
        let err = wait_for_policy(LifecycleTracker::new(&[LifecycleEvent::Load]), events)
            .await
            .unwrap_err();
        assert!(matches!(err, CaptureError::Navigation(_)));
    }
}
