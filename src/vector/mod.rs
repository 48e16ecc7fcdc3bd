pub mod embedding;
pub mod index;

pub use embedding::{Embedder, HttpEmbedder, StubEmbedder};
pub use index::VectorIndex;
