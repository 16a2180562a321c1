//! Marker placement and click handling
//!
//! [`MarkerManager`] owns the set of visible warning markers and the single
//! open detail popup. Actual drawing goes through the [`OverlayRenderer`]
//! trait; the manager never lets a renderer failure disturb its own
//! bookkeeping, a marker that failed to draw is retried on the next
//! placement of the same key.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::config::DetectionConfig;
use crate::error::Result;
use crate::store::lock_or_recover;
use crate::types::{ClassificationVerdict, ScreenRect};

/// Position deltas at or under this many pixels are not worth a redraw.
const MOVE_THRESHOLD_PX: i32 = 10;

/// Drawing surface for markers and detail popups.
///
/// Implementations are platform glue (an overlay window, an accessibility
/// layer, a test recorder). All methods are fallible; the manager logs and
/// swallows failures.
pub trait OverlayRenderer: Send + Sync {
    fn render_marker(&self, key: &str, rect: ScreenRect) -> Result<()>;
    fn move_marker(&self, key: &str, rect: ScreenRect) -> Result<()>;
    fn remove_marker(&self, key: &str) -> Result<()>;
    fn open_popup(&self, key: &str, verdict: &ClassificationVerdict) -> Result<()>;
    fn close_popup(&self, key: &str) -> Result<()>;
}

/// What a click on a marker did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickAction {
    /// Single click: the detail popup opened (or re-opened).
    PopupOpened,
    /// Second click inside the double-click window: marker dismissed.
    /// The caller records the dismissal so the marker stays gone.
    Dismissed,
    /// No marker with that key exists.
    Unknown,
}

struct MarkerState {
    rect: ScreenRect,
    verdict: ClassificationVerdict,
    last_click: Option<Instant>,
}

#[derive(Default)]
struct ManagerState {
    markers: HashMap<String, MarkerState>,
    open_popup: Option<String>,
}

/// Tracks visible markers and routes clicks on them.
pub struct MarkerManager {
    renderer: Arc<dyn OverlayRenderer>,
    state: Mutex<ManagerState>,
    double_click: Duration,
}

impl MarkerManager {
    pub fn new(renderer: Arc<dyn OverlayRenderer>, config: &DetectionConfig) -> Self {
        Self {
            renderer,
            state: Mutex::new(ManagerState::default()),
            double_click: Duration::from_millis(config.double_click_ms),
        }
    }

    /// Place or reposition the marker for a flagged message, anchored at
    /// the observed bounds.
    ///
    /// Invalid bounds are skipped entirely; a marker anchored to garbage
    /// coordinates is worse than no marker.
    pub fn place(&self, key: &str, rect: ScreenRect, verdict: &ClassificationVerdict) {
        if !rect.is_valid() {
            tracing::debug!(key, "skipping marker with invalid bounds");
            return;
        }

        let mut state = lock_or_recover(&self.state);
        match state.markers.get_mut(key) {
            Some(marker) => {
                let moved = (rect.left - marker.rect.left).abs() > MOVE_THRESHOLD_PX
                    || (rect.top - marker.rect.top).abs() > MOVE_THRESHOLD_PX;
                if !moved {
                    return;
                }
                marker.rect = rect;
                log_render_failure(self.renderer.move_marker(key, rect));
            }
            None => {
                state.markers.insert(
                    key.to_string(),
                    MarkerState {
                        rect,
                        verdict: verdict.clone(),
                        last_click: None,
                    },
                );
                tracing::info!(key, "placing warning marker");
                log_render_failure(self.renderer.render_marker(key, rect));
            }
        }
    }

    /// Handle a click on a marker.
    ///
    /// A single click opens the detail popup, closing any popup open for a
    /// different marker first (at most one popup at a time). A second click
    /// within the double-click window dismisses the marker instead.
    pub fn handle_click(&self, key: &str, now: Instant) -> ClickAction {
        let mut state = lock_or_recover(&self.state);
        let marker = match state.markers.get_mut(key) {
            Some(marker) => marker,
            None => return ClickAction::Unknown,
        };

        let is_double = marker
            .last_click
            .is_some_and(|last| now.duration_since(last) <= self.double_click);
        if is_double {
            state.markers.remove(key);
            if state.open_popup.as_deref() == Some(key) {
                state.open_popup = None;
                log_render_failure(self.renderer.close_popup(key));
            }
            log_render_failure(self.renderer.remove_marker(key));
            tracing::info!(key, "marker dismissed");
            return ClickAction::Dismissed;
        }

        marker.last_click = Some(now);
        let verdict = marker.verdict.clone();
        if let Some(open) = state.open_popup.take() {
            if open != key {
                log_render_failure(self.renderer.close_popup(&open));
            }
        }
        state.open_popup = Some(key.to_string());
        log_render_failure(self.renderer.open_popup(key, &verdict));
        ClickAction::PopupOpened
    }

    /// Close the detail popup without dismissing the marker.
    ///
    /// Returns false when no popup (or another marker's popup) is open.
    pub fn acknowledge(&self, key: &str) -> bool {
        let mut state = lock_or_recover(&self.state);
        if state.open_popup.as_deref() != Some(key) {
            return false;
        }
        state.open_popup = None;
        log_render_failure(self.renderer.close_popup(key));
        true
    }

    /// Remove one marker. Returns whether it existed.
    pub fn remove_one(&self, key: &str) -> bool {
        let mut state = lock_or_recover(&self.state);
        if state.markers.remove(key).is_none() {
            return false;
        }
        if state.open_popup.as_deref() == Some(key) {
            state.open_popup = None;
            log_render_failure(self.renderer.close_popup(key));
        }
        log_render_failure(self.renderer.remove_marker(key));
        true
    }

    /// Remove every marker and any open popup. Returns how many were removed.
    pub fn remove_all(&self) -> usize {
        let mut state = lock_or_recover(&self.state);
        if let Some(open) = state.open_popup.take() {
            log_render_failure(self.renderer.close_popup(&open));
        }
        let keys: Vec<String> = state.markers.keys().cloned().collect();
        for key in &keys {
            log_render_failure(self.renderer.remove_marker(key));
        }
        state.markers.clear();
        keys.len()
    }

    pub fn active_count(&self) -> usize {
        lock_or_recover(&self.state).markers.len()
    }

    pub fn is_marked(&self, key: &str) -> bool {
        lock_or_recover(&self.state).markers.contains_key(key)
    }
}

fn log_render_failure(result: Result<()>) {
    if let Err(err) = result {
        tracing::warn!(error = %err, "overlay renderer failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Severity;

    /// Renderer that records every call it receives.
    #[derive(Default)]
    struct RecordingRenderer {
        events: Mutex<Vec<String>>,
        rects: Mutex<Vec<ScreenRect>>,
    }

    impl RecordingRenderer {
        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }

        fn rects(&self) -> Vec<ScreenRect> {
            self.rects.lock().unwrap().clone()
        }

        fn record(&self, event: String) {
            self.events.lock().unwrap().push(event);
        }
    }

    impl OverlayRenderer for RecordingRenderer {
        fn render_marker(&self, key: &str, rect: ScreenRect) -> Result<()> {
            self.record(format!("render {key}"));
            self.rects.lock().unwrap().push(rect);
            Ok(())
        }
        fn move_marker(&self, key: &str, rect: ScreenRect) -> Result<()> {
            self.record(format!("move {key}"));
            self.rects.lock().unwrap().push(rect);
            Ok(())
        }
        fn remove_marker(&self, key: &str) -> Result<()> {
            self.record(format!("remove {key}"));
            Ok(())
        }
        fn open_popup(&self, key: &str, _verdict: &ClassificationVerdict) -> Result<()> {
            self.record(format!("open {key}"));
            Ok(())
        }
        fn close_popup(&self, key: &str) -> Result<()> {
            self.record(format!("close {key}"));
            Ok(())
        }
    }

    fn verdict() -> ClassificationVerdict {
        ClassificationVerdict {
            is_flagged: true,
            confidence: 0.9,
            label: "FALSE".to_string(),
            explanation: "test".to_string(),
            sources: vec![],
            severity: Severity::High,
            is_humor: false,
        }
    }

    fn rect(left: i32, top: i32) -> ScreenRect {
        ScreenRect {
            left,
            top,
            width: 200,
            height: 40,
        }
    }

    fn manager() -> (Arc<RecordingRenderer>, MarkerManager) {
        let renderer = Arc::new(RecordingRenderer::default());
        let config = DetectionConfig {
            deep_scan_enabled: false,
            double_click_ms: 300,
        };
        let manager = MarkerManager::new(renderer.clone(), &config);
        (renderer, manager)
    }

    #[test]
    fn test_place_renders_once_and_moves_on_new_bounds() {
        let (renderer, manager) = manager();
        manager.place("msg", rect(10, 10), &verdict());
        manager.place("msg", rect(10, 10), &verdict());
        manager.place("msg", rect(10, 60), &verdict());
        assert_eq!(renderer.events(), vec!["render msg", "move msg"]);
        assert_eq!(manager.active_count(), 1);
    }

    #[test]
    fn test_small_position_delta_is_not_redrawn() {
        let (renderer, manager) = manager();
        manager.place("msg", rect(10, 10), &verdict());
        manager.place("msg", rect(18, 14), &verdict());
        assert_eq!(renderer.events(), vec!["render msg"]);
    }

    #[test]
    fn test_invalid_bounds_are_skipped() {
        let (renderer, manager) = manager();
        manager.place(
            "msg",
            ScreenRect {
                left: -5,
                top: 0,
                width: 0,
                height: 0,
            },
            &verdict(),
        );
        assert!(renderer.events().is_empty());
        assert_eq!(manager.active_count(), 0);
    }

    #[test]
    fn test_markers_are_anchored_at_observed_bounds() {
        let (renderer, manager) = manager();
        for i in 0..20 {
            manager.place(&format!("msg-{i}"), rect(10, 20), &verdict());
        }
        let rects = renderer.rects();
        assert_eq!(rects.len(), 20);
        assert!(rects.iter().all(|r| r.left == 10 && r.top == 20));
    }

    #[test]
    fn test_move_reports_the_new_bounds_exactly() {
        let (renderer, manager) = manager();
        manager.place("msg", rect(10, 20), &verdict());
        manager.place("msg", rect(10, 80), &verdict());
        assert_eq!(renderer.rects(), vec![rect(10, 20), rect(10, 80)]);
    }

    #[test]
    fn test_single_click_opens_popup() {
        let (renderer, manager) = manager();
        manager.place("msg", rect(10, 10), &verdict());
        assert_eq!(
            manager.handle_click("msg", Instant::now()),
            ClickAction::PopupOpened
        );
        assert!(renderer.events().contains(&"open msg".to_string()));
    }

    #[test]
    fn test_double_click_dismisses() {
        let (renderer, manager) = manager();
        manager.place("msg", rect(10, 10), &verdict());
        let first = Instant::now();
        assert_eq!(manager.handle_click("msg", first), ClickAction::PopupOpened);
        assert_eq!(
            manager.handle_click("msg", first + Duration::from_millis(120)),
            ClickAction::Dismissed
        );
        assert_eq!(manager.active_count(), 0);
        let events = renderer.events();
        assert!(events.contains(&"close msg".to_string()));
        assert!(events.contains(&"remove msg".to_string()));
    }

    #[test]
    fn test_slow_second_click_is_not_a_dismissal() {
        let (_, manager) = manager();
        manager.place("msg", rect(10, 10), &verdict());
        let first = Instant::now();
        manager.handle_click("msg", first);
        assert_eq!(
            manager.handle_click("msg", first + Duration::from_millis(800)),
            ClickAction::PopupOpened
        );
        assert_eq!(manager.active_count(), 1);
    }

    #[test]
    fn test_only_one_popup_at_a_time() {
        let (renderer, manager) = manager();
        manager.place("a", rect(10, 10), &verdict());
        manager.place("b", rect(10, 100), &verdict());
        let t = Instant::now();
        manager.handle_click("a", t);
        manager.handle_click("b", t + Duration::from_millis(500));
        let events = renderer.events();
        let close_a = events.iter().position(|e| e == "close a").unwrap();
        let open_b = events.iter().position(|e| e == "open b").unwrap();
        assert!(close_a < open_b);
    }

    #[test]
    fn test_acknowledge_closes_popup_but_keeps_marker() {
        let (_, manager) = manager();
        manager.place("msg", rect(10, 10), &verdict());
        manager.handle_click("msg", Instant::now());
        assert!(manager.acknowledge("msg"));
        assert!(!manager.acknowledge("msg"));
        assert_eq!(manager.active_count(), 1);
    }

    #[test]
    fn test_click_on_unknown_marker() {
        let (_, manager) = manager();
        assert_eq!(
            manager.handle_click("ghost", Instant::now()),
            ClickAction::Unknown
        );
    }

    #[test]
    fn test_remove_all() {
        let (_, manager) = manager();
        manager.place("a", rect(10, 10), &verdict());
        manager.place("b", rect(10, 100), &verdict());
        assert_eq!(manager.remove_all(), 2);
        assert_eq!(manager.active_count(), 0);
    }
}
