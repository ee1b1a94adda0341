//! Spatial pooling
//!
//! Two pooling flavors live here:
//!
//! - [`GlobalPool`]: collapses a feature map to one embedding vector per
//!   batch element. ConvNeXt-family encoders get a trailing LayerNorm —
//!   their activations are scaled differently from ResNet/RegNet ones and
//!   the affine norm compensates without touching the encoder itself.
//! - [`AnchorPool`]: pools a feature map down to a fixed anchor grid; encode
//!   strategies use these to build token sequences for cross-modal exchange.

use candle_core::{Result, Tensor};
use candle_nn::{layer_norm, LayerNorm, Module, VarBuilder};

use crate::ops::adaptive_avg_pool2d;

/// Architecture families that need the pooled-embedding LayerNorm.
fn wants_layer_norm(architecture: &str) -> bool {
    architecture.starts_with("convnext")
}

enum PoolNorm {
    Identity,
    LayerNorm(LayerNorm),
}

/// Global average pool + flatten, with architecture-conditional LayerNorm.
///
/// Output is always `(batch, features)` regardless of the input's spatial
/// size. Each modality owns its own instance, conditioned on the name of the
/// encoder feeding it.
pub struct GlobalPool {
    norm: PoolNorm,
}

impl GlobalPool {
    pub fn new(architecture: &str, features: usize, vb: VarBuilder) -> Result<Self> {
        let norm = if wants_layer_norm(architecture) {
            PoolNorm::LayerNorm(layer_norm(features, 1e-6, vb.pp("norm"))?)
        } else {
            PoolNorm::Identity
        };
        Ok(Self { norm })
    }

    pub fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        // Adaptive average pool to 1x1 and flatten, i.e. a spatial mean.
        let pooled = xs.mean(3)?.mean(2)?;
        match &self.norm {
            PoolNorm::Identity => Ok(pooled),
            PoolNorm::LayerNorm(norm) => norm.forward(&pooled),
        }
    }

    /// Whether this pool applies the ConvNeXt LayerNorm.
    pub fn has_norm(&self) -> bool {
        matches!(self.norm, PoolNorm::LayerNorm(_))
    }
}

/// Average pool to a fixed `(rows, cols)` anchor grid.
pub struct AnchorPool {
    rows: usize,
    cols: usize,
}

impl AnchorPool {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self { rows, cols }
    }

    pub fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        adaptive_avg_pool2d(xs, self.rows, self.cols)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};

    #[test]
    fn test_global_pool_shape_invariant_to_spatial_size() {
        let vb = VarBuilder::zeros(DType::F32, &Device::Cpu);
        let pool = GlobalPool::new("resnet34", 32, vb).unwrap();
        for (h, w) in [(1, 1), (7, 7), (32, 32)] {
            let xs = Tensor::rand(0f32, 1f32, (3, 32, h, w), &Device::Cpu).unwrap();
            let ys = pool.forward(&xs).unwrap();
            assert_eq!(ys.dims(), &[3, 32]);
        }
    }

    #[test]
    fn test_global_pool_is_spatial_mean() {
        let vb = VarBuilder::zeros(DType::F32, &Device::Cpu);
        let pool = GlobalPool::new("regnety_032", 1, vb).unwrap();
        let xs = Tensor::from_vec(vec![1f32, 2.0, 3.0, 6.0], (1, 1, 2, 2), &Device::Cpu).unwrap();
        let ys = pool.forward(&xs).unwrap();
        let mean = ys.flatten_all().unwrap().to_vec1::<f32>().unwrap()[0];
        assert!((mean - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_layer_norm_only_for_convnext_family() {
        let vb = VarBuilder::zeros(DType::F32, &Device::Cpu);
        assert!(GlobalPool::new("convnext_tiny", 8, vb.pp("a")).unwrap().has_norm());
        assert!(GlobalPool::new("convnext_base", 8, vb.pp("b")).unwrap().has_norm());
        assert!(!GlobalPool::new("resnet18", 8, vb.pp("c")).unwrap().has_norm());
        assert!(!GlobalPool::new("regnety_032", 8, vb.pp("d")).unwrap().has_norm());
    }

    #[test]
    fn test_convnext_norm_changes_values_not_shape() {
        let vb = VarBuilder::zeros(DType::F32, &Device::Cpu);
        let plain = GlobalPool::new("resnet18", 4, vb.pp("plain")).unwrap();
        let normed = GlobalPool::new("convnext_tiny", 4, vb.pp("normed")).unwrap();
        let xs = Tensor::rand(1f32, 2f32, (2, 4, 3, 3), &Device::Cpu).unwrap();

        let a = plain.forward(&xs).unwrap();
        let b = normed.forward(&xs).unwrap();
        assert_eq!(a.dims(), b.dims());
        // Zero-initialized affine norm collapses the embedding; the plain
        // pool keeps the (strictly positive) spatial means.
        let a = a.flatten_all().unwrap().to_vec1::<f32>().unwrap();
        let b = b.flatten_all().unwrap().to_vec1::<f32>().unwrap();
        assert!(a.iter().all(|v| *v > 0.0));
        assert!(b.iter().all(|v| v.abs() < 1e-6));
    }

    #[test]
    fn test_anchor_pool_grid_shape() {
        let pool = AnchorPool::new(5, 22);
        let xs = Tensor::zeros((2, 16, 40, 176), DType::F32, &Device::Cpu).unwrap();
        let ys = pool.forward(&xs).unwrap();
        assert_eq!(ys.dims4().unwrap(), (2, 16, 5, 22));
    }
}
