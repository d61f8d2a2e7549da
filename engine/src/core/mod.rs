//! Core engine components
//!
//! The slot pool admits requests, each admitted request runs one pipeline,
//! and the pipeline leans on the detector and aggregator while reporting
//! progress through the log stream and session registry.

pub mod duplicate;
pub mod logstream;
pub mod pipeline;
pub mod scoring;
pub mod sessions;
pub mod slots;

pub use duplicate::{canonical_text, cosine_similarity, DuplicateDetector};
pub use logstream::LogStream;
pub use pipeline::{build_prompt, parse_candidate, GenerationPipeline};
pub use scoring::ScoringAggregator;
pub use sessions::SessionRegistry;
pub use slots::{SessionHandle, SlotManager};
