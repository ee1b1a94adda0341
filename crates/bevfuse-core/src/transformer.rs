//! Transformer block factory
//!
//! The backbone does not implement attention. Encode strategies that fuse
//! modalities with a transformer hand a [`TransformerSpec`] to the external
//! sequence-model component; [`crate::backbone::Backbone::transformer_spec`]
//! fills one in per fusion stage from the backbone configuration, varying
//! only the embedding width.

use serde::{Deserialize, Serialize};

/// Hyperparameter bundle for one cross-modal transformer stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformerSpec {
    /// Embedding width, i.e. the channel count of the encoder stage this
    /// transformer fuses at.
    pub n_embd: usize,
    /// Attention heads.
    pub n_head: usize,
    /// Layers in this stage.
    pub n_layer: usize,
    /// MLP expansion factor.
    pub block_exp: usize,
    /// Image anchor tokens per frame.
    pub img_anchors: usize,
    /// LiDAR anchor tokens per frame.
    pub lidar_anchors: usize,
    /// Temporal sequence length.
    pub seq_len: usize,
    /// Embedding dropout.
    pub embd_pdrop: f32,
    /// Attention dropout.
    pub attn_pdrop: f32,
    /// Residual dropout.
    pub resid_pdrop: f32,
    /// Whether the stage receives a velocity token.
    pub use_velocity: bool,
}
