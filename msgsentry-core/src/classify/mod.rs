//! Remote message classification
//!
//! Sends message text to the configured backends and distills their answers
//! into [`ClassificationVerdict`]s. Both backends get the same prompt and
//! race; the first clean verdict wins and the loser is aborted. A failure
//! from the first finisher falls back to whatever the slower backend says,
//! and classification as a whole is infallible: every failure mode comes
//! back as `None`, never an error the pipeline has to handle.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use tokio::task::{JoinHandle, JoinSet};

use crate::config::ClassifyConfig;
use crate::error::Result;
use crate::types::ClassificationVerdict;

pub mod backends;
pub mod normalize;
pub mod prompt;

pub use backends::{GeminiBackend, GroqBackend};
pub use normalize::normalize_response;

/// How many classification requests run concurrently in a batch.
const BATCH_CHUNK_SIZE: usize = 5;

/// Boxed verdict future, so classifiers can be trait objects.
pub type ClassifyFuture<'a> =
    Pin<Box<dyn Future<Output = Option<ClassificationVerdict>> + Send + 'a>>;

/// A source of classification verdicts.
///
/// The pipeline only sees this trait; tests substitute scripted
/// implementations for the real HTTP-backed classifier.
pub trait Classify: Send + Sync {
    /// Classify a message, with any links already extracted from it.
    fn classify(&self, text: String, links: Vec<String>) -> ClassifyFuture<'_>;

    /// Re-classify a message that local heuristics already flagged,
    /// asking for corroborating context on the suspicious URL.
    fn classify_enhanced(&self, text: String, url: String, reasons: Vec<String>)
        -> ClassifyFuture<'_>;
}

/// HTTP-backed classifier racing the configured backends.
#[derive(Clone)]
pub struct MessageClassifier {
    gemini: Option<GeminiBackend>,
    groq: Option<GroqBackend>,
}

impl MessageClassifier {
    /// Build a classifier from config.
    ///
    /// Backends that are absent from config are simply not raced. With
    /// neither configured the classifier answers `None` for everything,
    /// which leaves the local heuristics as the only detection layer.
    pub fn from_config(config: &ClassifyConfig) -> Result<Self> {
        let gemini = config
            .gemini
            .as_ref()
            .map(GeminiBackend::new)
            .transpose()?;
        let groq = config.groq.as_ref().map(GroqBackend::new).transpose()?;
        if gemini.is_none() && groq.is_none() {
            tracing::warn!("no classification backend configured, running heuristics only");
        }
        Ok(Self { gemini, groq })
    }

    /// Classify a message, racing whichever backends are configured.
    pub async fn analyze(
        &self,
        text: String,
        links: Vec<String>,
    ) -> Option<ClassificationVerdict> {
        self.race(prompt::build_prompt(&text, &links)).await
    }

    /// Ask for corroboration on a local phishing hit.
    pub async fn analyze_enhanced(
        &self,
        text: String,
        url: String,
        reasons: Vec<String>,
    ) -> Option<ClassificationVerdict> {
        self.race(prompt::build_enhanced_prompt(&text, &url, &reasons))
            .await
    }

    /// Classify a backlog of messages, at most [`BATCH_CHUNK_SIZE`] in
    /// flight at once. Only texts that produced a verdict appear in the
    /// returned map.
    pub async fn classify_batch(
        &self,
        texts: Vec<String>,
    ) -> HashMap<String, ClassificationVerdict> {
        let mut verdicts = HashMap::new();

        for chunk in texts.chunks(BATCH_CHUNK_SIZE) {
            let mut set = JoinSet::new();
            for text in chunk.iter().cloned() {
                let classifier = self.clone();
                set.spawn(async move {
                    let verdict = classifier.analyze(text.clone(), Vec::new()).await;
                    (text, verdict)
                });
            }
            while let Some(joined) = set.join_next().await {
                match joined {
                    Ok((text, Some(verdict))) => {
                        verdicts.insert(text, verdict);
                    }
                    Ok((_, None)) => {}
                    Err(err) => tracing::warn!(error = %err, "batch classification task failed"),
                }
            }
        }

        verdicts
    }

    async fn race(&self, prompt: String) -> Option<ClassificationVerdict> {
        match (self.gemini.clone(), self.groq.clone()) {
            (Some(gemini), Some(groq)) => {
                let groq_prompt = prompt.clone();
                race_first_success(
                    async move { attempt("gemini", gemini.generate(&prompt).await).await },
                    async move { attempt("groq", groq.generate(&groq_prompt).await).await },
                )
                .await
            }
            (Some(gemini), None) => attempt("gemini", gemini.generate(&prompt).await).await,
            (None, Some(groq)) => attempt("groq", groq.generate(&prompt).await).await,
            (None, None) => None,
        }
    }
}

impl Classify for MessageClassifier {
    fn classify(&self, text: String, links: Vec<String>) -> ClassifyFuture<'_> {
        Box::pin(self.analyze(text, links))
    }

    fn classify_enhanced(
        &self,
        text: String,
        url: String,
        reasons: Vec<String>,
    ) -> ClassifyFuture<'_> {
        Box::pin(self.analyze_enhanced(text, url, reasons))
    }
}

/// Normalize one backend attempt, logging the failure modes.
async fn attempt(
    backend: &'static str,
    raw: Result<String>,
) -> Option<ClassificationVerdict> {
    match raw {
        Ok(raw) => match normalize_response(&raw) {
            Some(verdict) => Some(verdict),
            None => {
                tracing::warn!(backend, "backend answered with an unusable verdict");
                None
            }
        },
        Err(err) => {
            tracing::warn!(backend, error = %err, "backend request failed");
            None
        }
    }
}

/// Race two verdict futures; first clean verdict wins.
///
/// On a clean win the slower task is aborted. When the first finisher comes
/// up empty we wait for the slower one instead, so one flaky backend does
/// not cost a verdict the other was about to deliver.
async fn race_first_success<Fa, Fb>(primary: Fa, secondary: Fb) -> Option<ClassificationVerdict>
where
    Fa: Future<Output = Option<ClassificationVerdict>> + Send + 'static,
    Fb: Future<Output = Option<ClassificationVerdict>> + Send + 'static,
{
    let mut primary = tokio::spawn(primary);
    let mut secondary = tokio::spawn(secondary);

    let (first, slower) = tokio::select! {
        first = &mut primary => (first, secondary),
        first = &mut secondary => (first, primary),
    };

    match first {
        Ok(Some(verdict)) => {
            slower.abort();
            Some(verdict)
        }
        Ok(None) => await_slower(slower).await,
        Err(err) => {
            tracing::warn!(error = %err, "classification task failed");
            await_slower(slower).await
        }
    }
}

async fn await_slower(
    slower: JoinHandle<Option<ClassificationVerdict>>,
) -> Option<ClassificationVerdict> {
    match slower.await {
        Ok(verdict) => verdict,
        Err(err) => {
            tracing::warn!(error = %err, "classification task failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Severity;
    use std::time::Duration;
    use tokio::time::sleep;

    fn verdict(label: &str) -> ClassificationVerdict {
        ClassificationVerdict {
            is_flagged: true,
            confidence: 0.9,
            label: label.to_string(),
            explanation: "test".to_string(),
            sources: vec![],
            severity: Severity::High,
            is_humor: false,
        }
    }

    #[tokio::test]
    async fn test_faster_verdict_wins() {
        let result = race_first_success(
            async {
                sleep(Duration::from_millis(10)).await;
                Some(verdict("fast"))
            },
            async {
                sleep(Duration::from_millis(200)).await;
                Some(verdict("slow"))
            },
        )
        .await;
        assert_eq!(result.unwrap().label, "fast");
    }

    #[tokio::test]
    async fn test_fast_failure_falls_back_to_slow_success() {
        let result = race_first_success(
            async { None },
            async {
                sleep(Duration::from_millis(50)).await;
                Some(verdict("slow"))
            },
        )
        .await;
        assert_eq!(result.unwrap().label, "slow");
    }

    #[tokio::test]
    async fn test_both_failing_yields_none() {
        let result = race_first_success(
            async { None },
            async {
                sleep(Duration::from_millis(10)).await;
                None
            },
        )
        .await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_panicking_task_does_not_poison_race() {
        let result = race_first_success(
            async { panic!("backend task blew up") },
            async {
                sleep(Duration::from_millis(50)).await;
                Some(verdict("survivor"))
            },
        )
        .await;
        assert_eq!(result.unwrap().label, "survivor");
    }

    #[tokio::test]
    async fn test_unconfigured_classifier_answers_none() {
        let classifier = MessageClassifier::from_config(&ClassifyConfig::default()).unwrap();
        assert!(classifier
            .analyze("the moon is made of cheese".to_string(), vec![])
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_batch_keeps_only_successful_verdicts() {
        let classifier = MessageClassifier::from_config(&ClassifyConfig::default()).unwrap();
        let verdicts = classifier
            .classify_batch(vec!["a".to_string(), "b".to_string(), "c".to_string()])
            .await;
        assert!(verdicts.is_empty());
    }
}
