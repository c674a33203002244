pub mod embeddings;
pub mod generate;
pub mod normalize;
pub mod rerank;
