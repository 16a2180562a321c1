//! Observation pipeline
//!
//! [`ObservationPipeline`] is where everything meets: text observations come
//! in from the UI feed, get filtered and de-duplicated, flow out to the
//! local heuristics and the remote classifier, and flagged verdicts come
//! back as markers anchored to the message on screen.
//!
//! The pipeline is synchronous at its entry points and pushes every slow
//! operation (remote classification) onto spawned tasks, so the observation
//! feed is never blocked behind the network. Verdicts for texts that have
//! scrolled away are not lost: they land in the flagged store and match the
//! next observation of the same text, and a bounded deque of recent
//! observations lets a fresh verdict place its marker immediately when the
//! text is still on screen.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::classify::Classify;
use crate::config::Config;
use crate::heuristics::{self, ImageAnalyzer};
use crate::overlay::{ClickAction, MarkerManager, OverlayRenderer};
use crate::store::{lock_or_recover, DismissalSet, FlaggedStore, ProcessedLedger};
use crate::types::{
    ClassificationVerdict, ImageFinding, NotificationEvent, Observation, ScreenRect, Severity,
};

pub mod matching;

/// Observed texts shorter than this are never worth classifying.
const MIN_TEXT_LEN: usize = 3;

/// How many recent observations are kept for immediate marker placement
/// when a verdict arrives after its text was observed.
const RECENT_CAPACITY: usize = 64;

/// Per-context session state.
#[derive(Default)]
struct SessionState {
    /// Identity of the chat currently being observed.
    context_id: Option<String>,
    /// Texts with a classification in flight; blocks duplicate dispatch
    /// before the ledger records the completion.
    tracked: HashSet<String>,
}

/// The detection core's central coordinator.
pub struct ObservationPipeline {
    flagged: FlaggedStore,
    ledger: ProcessedLedger,
    dismissed: DismissalSet,
    markers: MarkerManager,
    analyzer: ImageAnalyzer,
    classifier: Arc<dyn Classify>,
    state: Mutex<SessionState>,
    recent: Mutex<VecDeque<(String, ScreenRect)>>,
    processed: AtomicUsize,
    inflight: Mutex<Vec<JoinHandle<()>>>,
    cancel: CancellationToken,
}

impl ObservationPipeline {
    pub fn new(
        classifier: Arc<dyn Classify>,
        renderer: Arc<dyn OverlayRenderer>,
        config: &Config,
    ) -> Self {
        Self {
            flagged: FlaggedStore::new(),
            ledger: ProcessedLedger::new(),
            dismissed: DismissalSet::new(),
            markers: MarkerManager::new(renderer, &config.detection),
            analyzer: ImageAnalyzer::new(config.detection.deep_scan_enabled),
            classifier,
            state: Mutex::new(SessionState::default()),
            recent: Mutex::new(VecDeque::with_capacity(RECENT_CAPACITY)),
            processed: AtomicUsize::new(0),
            inflight: Mutex::new(Vec::new()),
            cancel: CancellationToken::new(),
        }
    }

    /// Handle one text observation from the UI feed.
    ///
    /// Cheap and non-blocking: anything needing the network is spawned.
    pub fn handle_observation(self: &Arc<Self>, observation: Observation) {
        self.sync_context(&observation.context_id);

        let text = observation.text.trim();
        if text.chars().count() < MIN_TEXT_LEN || matching::is_ui_chrome(text) {
            return;
        }
        let text = text.to_string();
        self.remember(&text, observation.rect);

        // The local URL layer and the remote dispatch run for every
        // observation; matching a stored flagged text does not excuse a
        // new candidate from classification.
        if !self.check_links(&text, Some(observation.rect)) {
            self.dispatch(text.clone(), true);
        }

        self.match_flagged(&text, observation.rect);
    }

    /// Handle a message arriving through the notification feed.
    ///
    /// Notifications run the same URL heuristics and classification path
    /// as observations; they just carry no screen position, so a flagged
    /// verdict only lands in the store and the marker appears when the
    /// text is observed.
    pub fn handle_notification(self: &Arc<Self>, event: NotificationEvent) {
        let text = event.text.trim();
        if text.chars().count() < MIN_TEXT_LEN {
            return;
        }
        tracing::debug!(app_id = %event.app_id, "classifying notification text");
        let text = text.to_string();

        if !self.check_links(&text, None) {
            self.dispatch(text, false);
        }
    }

    /// Analyze a shared image for hidden payloads.
    pub fn handle_image(&self, bytes: &[u8]) -> ImageFinding {
        let finding = self.analyzer.analyze(bytes);
        if finding.detected {
            tracing::warn!(method = %finding.method, "hidden data suspected in shared image");
        }
        finding
    }

    /// Route a click on a marker. A double-click dismisses the message for
    /// the rest of this context session.
    pub fn handle_marker_click(&self, key: &str, now: Instant) -> ClickAction {
        let action = self.markers.handle_click(key, now);
        if action == ClickAction::Dismissed {
            self.dismissed.dismiss(key);
        }
        action
    }

    /// Close an open detail popup without dismissing its marker.
    pub fn acknowledge(&self, key: &str) -> bool {
        self.markers.acknowledge(key)
    }

    /// The user left the observed surface: markers and per-context state go,
    /// flagged verdicts and the ledger stay.
    pub fn handle_context_left(&self) {
        let removed = self.markers.remove_all();
        if removed > 0 {
            tracing::debug!(removed, "cleared markers on context exit");
        }
        self.dismissed.clear();
        lock_or_recover(&self.recent).clear();
        let mut state = lock_or_recover(&self.state);
        state.context_id = None;
        state.tracked.clear();
    }

    /// Number of completed classification attempts.
    pub fn processed_count(&self) -> usize {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn flagged_count(&self) -> usize {
        self.flagged.len()
    }

    pub fn active_marker_count(&self) -> usize {
        self.markers.active_count()
    }

    /// Cancel in-flight classification tasks.
    pub fn shutdown(&self) {
        self.cancel.cancel();
        self.markers.remove_all();
    }

    /// Wait for every spawned classification task to settle.
    pub async fn drain(&self) {
        let handles: Vec<JoinHandle<()>> = lock_or_recover(&self.inflight).drain(..).collect();
        for handle in handles {
            if let Err(err) = handle.await {
                if !err.is_cancelled() {
                    tracing::warn!(error = %err, "classification task failed");
                }
            }
        }
    }

    // ---- internals ----

    /// Reset per-context state when the observed chat changes.
    fn sync_context(&self, context_id: &str) {
        let switched = {
            let mut state = lock_or_recover(&self.state);
            if state.context_id.as_deref() == Some(context_id) {
                return;
            }
            let switched = state.context_id.is_some();
            if switched {
                state.tracked.clear();
            }
            state.context_id = Some(context_id.to_string());
            switched
        };
        if switched {
            tracing::debug!(context_id, "context switched");
            self.markers.remove_all();
            self.dismissed.clear();
            lock_or_recover(&self.recent).clear();
        }
    }

    fn remember(&self, text: &str, rect: ScreenRect) {
        let mut recent = lock_or_recover(&self.recent);
        if recent.len() == RECENT_CAPACITY {
            recent.pop_front();
        }
        recent.push_back((text.to_string(), rect));
    }

    /// Place markers for every stored flagged text the observation matches.
    fn match_flagged(&self, text: &str, rect: ScreenRect) {
        let normalized = matching::normalize(text);
        for key in self.flagged.keys() {
            let tier = matching::matches_flagged(&normalized, &matching::normalize(&key));
            if tier.is_none() || self.dismissed.is_dismissed(&key) {
                continue;
            }
            if let Some(entry) = self.flagged.entry(&key) {
                tracing::debug!(tier = ?tier, "observation matched flagged text");
                self.markers.place(&key, rect, &entry.verdict);
            }
        }
    }

    /// Run the local URL heuristics. Returns true when the denylist
    /// resolved the text by itself and remote classification is skipped.
    ///
    /// A scorer hit synthesizes a local verdict and fires the enhanced
    /// corroboration request, but does not replace normal classification;
    /// the caller still dispatches the text.
    fn check_links(self: &Arc<Self>, text: &str, rect: Option<ScreenRect>) -> bool {
        let urls = matching::extract_urls(text);
        if urls.is_empty() {
            return false;
        }

        for url in &urls {
            if let Some(host) = heuristics::denylist_match(url) {
                tracing::warn!(host = %host, "denylisted link observed");
                if !self.flagged.is_flagged(text) {
                    let verdict = heuristics::denylist_verdict(url, &host);
                    self.record_flagged(text, verdict.clone());
                    self.place_if_visible(text, rect, &verdict);
                }
                if !self.ledger.contains(text) {
                    self.ledger.mark(text, Utc::now());
                    self.processed.fetch_add(1, Ordering::Relaxed);
                }
                return true;
            }
        }

        for url in &urls {
            let risk = heuristics::assess_url(url);
            if !risk.is_phishing {
                continue;
            }
            // Re-observations keep the stored (possibly merged) verdict;
            // matching re-places the marker.
            if self.flagged.is_flagged(text) {
                break;
            }
            tracing::warn!(url = %url, level = ?risk.risk_level, "suspicious link observed");
            let verdict = heuristics::risk_verdict(url, &risk);
            self.record_flagged(text, verdict.clone());
            self.place_if_visible(text, rect, &verdict);
            self.dispatch_enhanced(text.to_string(), url.clone(), risk.reasons);
            break;
        }

        false
    }

    fn place_if_visible(&self, key: &str, rect: Option<ScreenRect>, verdict: &ClassificationVerdict) {
        if let Some(rect) = rect {
            if !self.dismissed.is_dismissed(key) {
                self.markers.place(key, rect, verdict);
            }
        }
    }

    /// Spawn a remote classification for a text not seen before.
    fn dispatch(self: &Arc<Self>, text: String, place_markers: bool) {
        if self.ledger.contains(&text) {
            return;
        }
        {
            let mut state = lock_or_recover(&self.state);
            if !state.tracked.insert(text.clone()) {
                return;
            }
        }

        let pipeline = self.clone();
        let cancel = self.cancel.clone();
        let handle = tokio::spawn(async move {
            let links = matching::extract_urls(&text);
            let verdict = tokio::select! {
                _ = cancel.cancelled() => return,
                verdict = pipeline.classifier.classify(text.clone(), links) => verdict,
            };
            pipeline.finish_classification(&text, verdict, place_markers);
        });
        self.track(handle);
    }

    /// Spawn the corroboration request for a local phishing hit. The remote
    /// context gets merged into the stored verdict when it arrives.
    fn dispatch_enhanced(self: &Arc<Self>, text: String, url: String, reasons: Vec<String>) {
        let pipeline = self.clone();
        let cancel = self.cancel.clone();
        let handle = tokio::spawn(async move {
            let verdict = tokio::select! {
                _ = cancel.cancelled() => return,
                verdict = pipeline.classifier.classify_enhanced(text.clone(), url, reasons) => verdict,
            };
            if let Some(remote) = verdict {
                pipeline.merge_enhanced(&text, remote);
            }
        });
        self.track(handle);
    }

    /// Register a spawned task, dropping handles of tasks that have
    /// already finished so the list stays bounded by actual in-flight work.
    fn track(&self, handle: JoinHandle<()>) {
        let mut inflight = lock_or_recover(&self.inflight);
        inflight.retain(|task| !task.is_finished());
        inflight.push(handle);
    }

    /// Record the outcome of a classification attempt.
    fn finish_classification(
        &self,
        text: &str,
        verdict: Option<ClassificationVerdict>,
        place_markers: bool,
    ) {
        {
            let mut state = lock_or_recover(&self.state);
            state.tracked.remove(text);
        }
        // Every completed attempt lands in the ledger, flagged or not;
        // re-observations of clean text must not dispatch again.
        self.ledger.mark(text, Utc::now());
        self.processed.fetch_add(1, Ordering::Relaxed);

        let verdict = match verdict {
            Some(verdict) if verdict.needs_marker() => verdict,
            Some(_) => {
                tracing::debug!("classification came back clean");
                return;
            }
            None => return,
        };

        tracing::info!(label = %verdict.label, confidence = verdict.confidence, "message flagged");
        self.record_flagged(text, verdict.clone());
        if place_markers {
            self.rescan_recent(text, &verdict);
        }
    }

    fn record_flagged(&self, text: &str, verdict: ClassificationVerdict) {
        self.flagged.insert(text, verdict, Utc::now());
    }

    /// Place a marker for a freshly flagged text if it is still on screen.
    fn rescan_recent(&self, key: &str, verdict: &ClassificationVerdict) {
        if self.dismissed.is_dismissed(key) {
            return;
        }
        let normalized_key = matching::normalize(key);
        let recent: Vec<(String, ScreenRect)> =
            lock_or_recover(&self.recent).iter().cloned().collect();
        for (text, rect) in recent {
            let normalized = matching::normalize(&text);
            if matching::matches_flagged(&normalized, &normalized_key).is_some() {
                self.markers.place(key, rect, verdict);
                return;
            }
        }
    }

    /// Merge remote corroboration into the verdict stored for a local hit.
    fn merge_enhanced(&self, text: &str, remote: ClassificationVerdict) {
        let Some(entry) = self.flagged.entry(text) else {
            return;
        };
        let local = entry.verdict;
        let merged = ClassificationVerdict {
            is_flagged: true,
            confidence: local.confidence.max(remote.confidence),
            label: local.label.clone(),
            explanation: format!("Local: {} Remote: {}", local.explanation, remote.explanation),
            sources: {
                let mut sources = local.sources.clone();
                sources.extend(remote.sources);
                sources
            },
            severity: Severity::High,
            is_humor: false,
        };
        self.record_flagged(text, merged);
    }
}
