//! Sensor encoder seam and input preprocessing
//!
//! The backbone never looks inside an encoder: ResNet, RegNet, ConvNeXt or
//! anything else plugs in behind [`SensorEncoder`], which only exposes what
//! the orchestrator needs — a dense feature map, the output channel width,
//! the architecture name (pooler normalization is keyed on it) and whether
//! the branch expects ImageNet-normalized input.
//!
//! [`ConvStem`] is a deliberately small built-in encoder: two stride-2 conv
//! blocks. It keeps the crate runnable without an external backbone and is
//! what the shape tests drive the backbone with.

use candle_core::{Result, Tensor};
use candle_nn::{conv2d, Conv2d, Conv2dConfig, Module, VarBuilder};

/// ImageNet channel means (RGB).
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// ImageNet channel standard deviations (RGB).
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Narrow interface over a swappable image or LiDAR backbone.
pub trait SensorEncoder: Send + Sync {
    /// Map a raw sensor tensor to a dense `(batch, num_features, h, w)`
    /// feature map.
    fn forward(&self, xs: &Tensor) -> Result<Tensor>;

    /// Channel width of the feature maps this encoder produces.
    fn num_features(&self) -> usize;

    /// Whether inputs to this encoder must be ImageNet-normalized first.
    fn normalize(&self) -> bool;

    /// Architecture family name, e.g. `resnet34` or `convnext_tiny`.
    fn architecture(&self) -> &str;
}

/// Normalize an RGB image batch with fixed ImageNet statistics.
///
/// Expects `(batch, 3, h, w)` with values in `[0, 1]`.
pub fn normalize_imagenet(xs: &Tensor) -> Result<Tensor> {
    let mean = Tensor::from_slice(&IMAGENET_MEAN, (1, 3, 1, 1), xs.device())?
        .to_dtype(xs.dtype())?;
    let std = Tensor::from_slice(&IMAGENET_STD, (1, 3, 1, 1), xs.device())?
        .to_dtype(xs.dtype())?;
    xs.broadcast_sub(&mean)?.broadcast_div(&std)
}

/// Minimal two-stage convolutional encoder.
///
/// Downsamples by 4 overall (two stride-2 3x3 convs with ReLU). Not meant to
/// compete with a real backbone; it exists so the backbone can be exercised
/// end to end without external weights.
pub struct ConvStem {
    conv1: Conv2d,
    conv2: Conv2d,
    architecture: String,
    num_features: usize,
    normalize: bool,
}

impl ConvStem {
    pub fn new(
        architecture: impl Into<String>,
        in_channels: usize,
        num_features: usize,
        normalize: bool,
        vb: VarBuilder,
    ) -> Result<Self> {
        let cfg = Conv2dConfig {
            padding: 1,
            stride: 2,
            ..Default::default()
        };
        let conv1 = conv2d(in_channels, num_features, 3, cfg, vb.pp("conv1"))?;
        let conv2 = conv2d(num_features, num_features, 3, cfg, vb.pp("conv2"))?;
        Ok(Self {
            conv1,
            conv2,
            architecture: architecture.into(),
            num_features,
            normalize,
        })
    }
}

impl SensorEncoder for ConvStem {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let xs = self.conv1.forward(xs)?.relu()?;
        self.conv2.forward(&xs)?.relu()
    }

    fn num_features(&self) -> usize {
        self.num_features
    }

    fn normalize(&self) -> bool {
        self.normalize
    }

    fn architecture(&self) -> &str {
        &self.architecture
    }
}
