//! Read path: classify (C6) → synthesize SQL (C7) → execute + cache (C8) →
//! narrate (C9).

pub mod classifier;
pub mod executor;
pub mod gazetteer;
pub mod narrator;
pub mod synthesizer;

pub use classifier::classify;
pub use executor::QueryExecutor;
pub use gazetteer::Gazetteer;
pub use narrator::{HttpNarrator, Narrator, TemplateNarrator};
pub use synthesizer::{synthesize, SynthesizedQuery};
