//! Monitoring session lifecycle
//!
//! A [`MonitorSession`] wraps the pipeline for one continuous monitoring
//! run: it gates the event entry points on the session being active and
//! exposes the status snapshot the persistent indicator shows.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::overlay::ClickAction;
use crate::pipeline::ObservationPipeline;
use crate::types::{MonitorStatus, NotificationEvent, Observation};

/// One monitoring run over the pipeline.
pub struct MonitorSession {
    id: Uuid,
    started_at: DateTime<Utc>,
    pipeline: Arc<ObservationPipeline>,
    active: AtomicBool,
}

impl MonitorSession {
    pub fn new(pipeline: Arc<ObservationPipeline>) -> Self {
        let id = Uuid::new_v4();
        tracing::info!(session_id = %id, "monitoring session started");
        Self {
            id,
            started_at: Utc::now(),
            pipeline,
            active: AtomicBool::new(true),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }

    pub fn on_observation(&self, observation: Observation) {
        if self.is_active() {
            self.pipeline.handle_observation(observation);
        }
    }

    pub fn on_notification(&self, event: NotificationEvent) {
        if self.is_active() {
            self.pipeline.handle_notification(event);
        }
    }

    pub fn on_marker_click(&self, key: &str, now: Instant) -> ClickAction {
        if !self.is_active() {
            return ClickAction::Unknown;
        }
        self.pipeline.handle_marker_click(key, now)
    }

    pub fn on_context_left(&self) {
        if self.is_active() {
            self.pipeline.handle_context_left();
        }
    }

    /// End the session: stop accepting events and cancel in-flight work.
    /// Idempotent; also runs on drop.
    pub fn on_session_end(&self) {
        if self.active.swap(false, Ordering::Relaxed) {
            let status = self.snapshot(false);
            tracing::info!(
                session_id = %self.id,
                flagged = status.flagged,
                processed = status.processed,
                "monitoring session ended"
            );
            self.pipeline.shutdown();
        }
    }

    /// Status snapshot for the persistent indicator.
    pub fn status(&self) -> MonitorStatus {
        self.snapshot(self.is_active())
    }

    fn snapshot(&self, active: bool) -> MonitorStatus {
        MonitorStatus {
            active,
            flagged: self.pipeline.flagged_count(),
            processed: self.pipeline.processed_count(),
        }
    }
}

impl Drop for MonitorSession {
    fn drop(&mut self) {
        self.on_session_end();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{Classify, ClassifyFuture};
    use crate::config::Config;
    use crate::overlay::OverlayRenderer;
    use crate::types::{ClassificationVerdict, ScreenRect};

    struct NullClassifier;

    impl Classify for NullClassifier {
        fn classify(&self, _text: String, _links: Vec<String>) -> ClassifyFuture<'_> {
            Box::pin(async { None })
        }
        fn classify_enhanced(
            &self,
            _text: String,
            _url: String,
            _reasons: Vec<String>,
        ) -> ClassifyFuture<'_> {
            Box::pin(async { None })
        }
    }

    struct NullRenderer;

    impl OverlayRenderer for NullRenderer {
        fn render_marker(&self, _key: &str, _rect: ScreenRect) -> crate::Result<()> {
            Ok(())
        }
        fn move_marker(&self, _key: &str, _rect: ScreenRect) -> crate::Result<()> {
            Ok(())
        }
        fn remove_marker(&self, _key: &str) -> crate::Result<()> {
            Ok(())
        }
        fn open_popup(&self, _key: &str, _verdict: &ClassificationVerdict) -> crate::Result<()> {
            Ok(())
        }
        fn close_popup(&self, _key: &str) -> crate::Result<()> {
            Ok(())
        }
    }

    fn session() -> MonitorSession {
        let pipeline = Arc::new(ObservationPipeline::new(
            Arc::new(NullClassifier),
            Arc::new(NullRenderer),
            &Config::default(),
        ));
        MonitorSession::new(pipeline)
    }

    #[tokio::test]
    async fn test_session_starts_active() {
        let session = session();
        assert!(session.is_active());
        let status = session.status();
        assert!(status.active);
        assert_eq!(status.flagged, 0);
        assert_eq!(status.processed, 0);
    }

    #[tokio::test]
    async fn test_ended_session_ignores_events() {
        let session = session();
        session.on_session_end();
        assert!(!session.is_active());

        session.on_observation(Observation {
            text: "some long enough message text".to_string(),
            rect: ScreenRect::new(0, 0, 100, 40),
            context_id: "chat-1".to_string(),
        });
        assert_eq!(session.status().processed, 0);
        assert_eq!(
            session.on_marker_click("anything", Instant::now()),
            ClickAction::Unknown
        );
    }

    #[tokio::test]
    async fn test_end_is_idempotent() {
        let session = session();
        session.on_session_end();
        session.on_session_end();
        assert!(!session.status().active);
    }
}
