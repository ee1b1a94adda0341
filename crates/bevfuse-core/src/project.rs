//! Channel projection to the common perception width

use candle_core::{Result, Tensor};
use candle_nn::{conv2d, Conv2d, Conv2dConfig, Module, VarBuilder};

/// Pointwise projection of a feature map to the perception channel width.
///
/// The variant is fixed at construction: when the encoder already produces
/// the target width this is a parameter-free pass-through, otherwise a
/// learned 1x1 conv. Each modality gets its own instance with its own
/// parameters.
pub enum ChannelProjection {
    Identity,
    Conv(Conv2d),
}

impl ChannelProjection {
    pub fn new(in_channels: usize, out_channels: usize, vb: VarBuilder) -> Result<Self> {
        if in_channels == out_channels {
            Ok(Self::Identity)
        } else {
            let conv = conv2d(in_channels, out_channels, 1, Conv2dConfig::default(), vb)?;
            Ok(Self::Conv(conv))
        }
    }

    pub fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        match self {
            Self::Identity => Ok(xs.clone()),
            Self::Conv(conv) => conv.forward(xs),
        }
    }

    /// Whether this projection is a parameter-free pass-through.
    pub fn is_identity(&self) -> bool {
        matches!(self, Self::Identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};

    #[test]
    fn test_identity_when_widths_match() {
        let vb = VarBuilder::zeros(DType::F32, &Device::Cpu);
        let proj = ChannelProjection::new(64, 64, vb).unwrap();
        assert!(proj.is_identity());

        let xs = Tensor::rand(0f32, 1f32, (1, 64, 5, 9), &Device::Cpu).unwrap();
        let ys = proj.forward(&xs).unwrap();
        let a = xs.flatten_all().unwrap().to_vec1::<f32>().unwrap();
        let b = ys.flatten_all().unwrap().to_vec1::<f32>().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_projects_to_target_width() {
        let vb = VarBuilder::zeros(DType::F32, &Device::Cpu);
        let proj = ChannelProjection::new(128, 64, vb).unwrap();
        assert!(!proj.is_identity());

        // Spatial size is irrelevant to the projection.
        for (h, w) in [(1, 1), (7, 7), (4, 11)] {
            let xs = Tensor::zeros((2, 128, h, w), DType::F32, &Device::Cpu).unwrap();
            let ys = proj.forward(&xs).unwrap();
            assert_eq!(ys.dims4().unwrap(), (2, 64, h, w));
        }
    }
}
