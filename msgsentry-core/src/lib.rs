//! # msgsentry-core
//!
//! Core library for msgsentry - a misinformation and phishing detection
//! core for messaging-app text observed on screen.
//!
//! This library provides:
//! - Bounded, time-limited stores for flagged and processed messages
//! - Local heuristics: URL risk scoring and image pixel statistics
//! - Remote classification racing two LLM backends
//! - The observation pipeline joining verdicts back to on-screen text
//! - Marker placement and click handling behind a renderer trait
//!
//! ## Architecture
//!
//! Observations flow one way:
//! - **Filter:** UI chrome and trivia never leave the entry point
//! - **Detect:** local heuristics answer instantly, the remote racer
//!   answers eventually; either can flag
//! - **Surface:** flagged verdicts become markers wherever the text is
//!   (re-)observed, until dismissed
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use msgsentry_core::{Config, MessageClassifier, ObservationPipeline};
//! # use msgsentry_core::overlay::OverlayRenderer;
//! # fn renderer() -> Arc<dyn OverlayRenderer> { unimplemented!() }
//!
//! let config = Config::load().expect("failed to load config");
//! let classifier = MessageClassifier::from_config(&config.classify)
//!     .expect("failed to build classifier");
//! let pipeline = Arc::new(ObservationPipeline::new(
//!     Arc::new(classifier),
//!     renderer(),
//!     &config,
//! ));
//! ```

// Re-export commonly used items at the crate root
pub use classify::{Classify, MessageClassifier};
pub use config::Config;
pub use error::{Error, Result};
pub use overlay::{ClickAction, MarkerManager, OverlayRenderer};
pub use pipeline::ObservationPipeline;
pub use session::MonitorSession;
pub use types::*;

// Public modules
pub mod classify;
pub mod config;
pub mod error;
pub mod heuristics;
pub mod logging;
pub mod overlay;
pub mod pipeline;
pub mod session;
pub mod store;
pub mod types;
