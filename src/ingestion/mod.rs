//! Write path: crawl (C1) → parse (C2) → upsert + index (C5 composes C3/C4).

pub mod crawler;
pub mod fingerprint;
pub mod orchestrator;
pub mod parser;

pub use crawler::{Crawler, RemoteCandidate};
pub use fingerprint::FingerprintMap;
pub use orchestrator::IngestionOrchestrator;
pub use parser::parse_profile_file;
