//! Pooled-embedding fusion and velocity conditioning

use candle_core::{Result, Tensor};
use candle_nn::{linear, Linear, Module, VarBuilder};

/// Optional conditioning of the fused embedding on ego velocity.
///
/// Fixed at construction: either a learned scalar-to-vector projection
/// (bias included, so a zero velocity still shifts the embedding) or a
/// parameter-free no-op that leaves the fusion untouched.
pub enum VelocityEmbedding {
    Disabled,
    Learned(Linear),
}

impl VelocityEmbedding {
    pub fn new(enabled: bool, features: usize, vb: VarBuilder) -> Result<Self> {
        if enabled {
            Ok(Self::Learned(linear(1, features, vb)?))
        } else {
            Ok(Self::Disabled)
        }
    }

    /// Condition `fused` (`(batch, features)`) on `velocity` (`(batch, 1)`).
    pub fn apply(&self, fused: &Tensor, velocity: &Tensor) -> Result<Tensor> {
        match self {
            Self::Disabled => Ok(fused.clone()),
            Self::Learned(proj) => fused + proj.forward(velocity)?,
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Learned(_))
    }
}

/// Element-wise sum of the two pooled modality embeddings.
pub fn fuse(image_pooled: &Tensor, lidar_pooled: &Tensor) -> Result<Tensor> {
    image_pooled + lidar_pooled
}
