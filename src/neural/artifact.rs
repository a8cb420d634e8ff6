//! Binary model checkpoint: weights plus the hyperparameters needed to
//! reconstruct the network.
//!
//! The artifact is an opaque bincode blob guarded by the same lock
//! discipline as the JSON stores. Loading restores both the parameters and
//! the architecture (`input_size`, `hidden_size`), so a process never needs
//! out-of-band knowledge to resume from a checkpoint.

use std::fs;
use std::path::Path;

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::neural::network::DrawNetwork;
use crate::store::lock::{LockBudget, StoreLock};

/// Architectural hyperparameters persisted with the weights.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelConfig {
    pub input_size: usize,
    pub hidden_size: usize,
}

#[derive(Debug, Serialize, Deserialize)]
struct NetworkWeights {
    w1: Array2<f32>,
    b1: Array1<f32>,
    w2: Array2<f32>,
    b2: Array1<f32>,
    w3: Array2<f32>,
    b3: Array1<f32>,
}

/// A trained (or blank) model checkpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub config: ModelConfig,
    pub is_trained: bool,
    weights: NetworkWeights,
}

impl ModelArtifact {
    pub fn from_network(network: &DrawNetwork, is_trained: bool) -> Self {
        Self {
            config: ModelConfig {
                input_size: network.input_size(),
                hidden_size: network.hidden_size(),
            },
            is_trained,
            weights: NetworkWeights {
                w1: network.w1.clone(),
                b1: network.b1.clone(),
                w2: network.w2.clone(),
                b2: network.b2.clone(),
                w3: network.w3.clone(),
                b3: network.b3.clone(),
            },
        }
    }

    /// Reconstructs the network this artifact was saved from.
    pub fn into_network(self) -> DrawNetwork {
        DrawNetwork::from_parts(
            self.weights.w1,
            self.weights.b1,
            self.weights.w2,
            self.weights.b2,
            self.weights.w3,
            self.weights.b3,
        )
    }

    /// Serializes the checkpoint under the artifact's file lock.
    pub fn save(&self, path: &Path, budget: &LockBudget) -> EngineResult<()> {
        let _lock = StoreLock::acquire(path, budget)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let blob = bincode::serialize(self)
            .map_err(|err| EngineError::storage_corrupt(path, err.to_string()))?;
        fs::write(path, blob)?;
        Ok(())
    }

    /// Loads a checkpoint.
    ///
    /// # Errors
    ///
    /// `ModelMissing` when no file exists, `StorageCorrupt` when the blob
    /// fails to deserialize or its shapes are inconsistent.
    pub fn load(path: &Path, budget: &LockBudget) -> EngineResult<Self> {
        let _lock = StoreLock::acquire(path, budget)?;
        let blob = match fs::read(path) {
            Ok(blob) => blob,
            Err(_) => return Err(EngineError::model_missing(path)),
        };
        let artifact: Self = bincode::deserialize(&blob)
            .map_err(|err| EngineError::storage_corrupt(path, err.to_string()))?;

        let weights = &artifact.weights;
        let consistent = weights.w1.dim() == (artifact.config.input_size, artifact.config.hidden_size)
            && weights.w2.nrows() == artifact.config.hidden_size
            && weights.b1.len() == artifact.config.hidden_size;
        if !consistent {
            return Err(EngineError::storage_corrupt(
                path,
                "weight shapes disagree with the stored hyperparameters",
            ));
        }
        Ok(artifact)
    }

    /// True when a usable (trained) checkpoint exists at `path`.
    pub fn is_trained_at(path: &Path, budget: &LockBudget) -> bool {
        matches!(Self::load(path, budget), Ok(artifact) if artifact.is_trained)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FEATURE_WIDTH;
    use ndarray::Array2 as A2;

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.bin");
        let budget = LockBudget::default();

        let network = DrawNetwork::new(FEATURE_WIDTH, 16, 42);
        let artifact = ModelArtifact::from_network(&network, true);
        artifact.save(&path, &budget).unwrap();

        let loaded = ModelArtifact::load(&path, &budget).unwrap();
        assert!(loaded.is_trained);
        assert_eq!(
            loaded.config,
            ModelConfig {
                input_size: FEATURE_WIDTH,
                hidden_size: 16
            }
        );

        // The reconstructed network computes the same function.
        let restored = loaded.into_network();
        let input = A2::from_elem((1, FEATURE_WIDTH), 0.4);
        assert_eq!(network.forward(&input), restored.forward(&input));
    }

    #[test]
    fn test_missing_artifact_is_model_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.bin");
        match ModelArtifact::load(&path, &LockBudget::default()) {
            Err(EngineError::ModelMissing { .. }) => {}
            other => panic!("expected ModelMissing, got {other:?}"),
        }
        assert!(!ModelArtifact::is_trained_at(&path, &LockBudget::default()));
    }

    #[test]
    fn test_garbage_blob_is_storage_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.bin");
        fs::write(&path, b"definitely not a checkpoint").unwrap();
        match ModelArtifact::load(&path, &LockBudget::default()) {
            Err(EngineError::StorageCorrupt { .. }) => {}
            other => panic!("expected StorageCorrupt, got {other:?}"),
        }
    }
}
