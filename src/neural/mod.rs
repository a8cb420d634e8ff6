//! Neural predictor: a feed-forward network over history features.

pub mod artifact;
pub mod loss;
pub mod network;
pub mod optimizer;

pub use artifact::{ModelArtifact, ModelConfig};
pub use network::{DrawNetwork, DEFAULT_DROPOUT, OUTPUT_WIDTH, POSITIONS, VALUE_CLASSES};
pub use optimizer::AdamOptimizer;
