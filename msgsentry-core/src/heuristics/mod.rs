//! Local heuristic classifiers
//!
//! Stateless, synchronous analyzers that need no network and no
//! coordination: a denylist/pattern-based URL risk scorer and a
//! pixel-statistics image analyzer. Both are total functions; internal
//! failures degrade to a neutral result instead of propagating.

pub mod imagestats;
pub mod phishing;

pub use imagestats::ImageAnalyzer;
pub use phishing::{assess_url, denylist_match, denylist_verdict, risk_verdict};
