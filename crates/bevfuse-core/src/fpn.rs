//! Top-down decoder for the BEV branch
//!
//! A simplified FPN head over a single input level: a lateral 1x1 conv
//! brings the LiDAR feature map to the BEV channel width (P5), then three
//! rounds of bilinear upsample + 1x1 conv + ReLU refine it to P4, P3 and
//! finally P2, which is returned. Three stages undo the encoder's
//! downsampling, so P2 lands back near the original BEV grid resolution.
//! There are no skip connections from earlier encoder stages.

use candle_core::{Result, Tensor};
use candle_nn::{conv2d, Conv2d, Conv2dConfig, Module, VarBuilder};

use crate::ops::bilinear_upsample;

/// Fixed number of upsample stages (P5 -> P2).
const NUM_STAGES: usize = 3;

/// Top-down decoder producing the high-resolution BEV feature map.
pub struct TopDownDecoder {
    lateral: Conv2d,
    refine: Vec<Conv2d>,
    upsample_factor: usize,
}

impl TopDownDecoder {
    pub fn new(
        in_channels: usize,
        bev_channels: usize,
        upsample_factor: usize,
        vb: VarBuilder,
    ) -> Result<Self> {
        let cfg = Conv2dConfig::default();
        let lateral = conv2d(in_channels, bev_channels, 1, cfg, vb.pp("lateral"))?;
        let refine = (0..NUM_STAGES)
            .map(|i| conv2d(bev_channels, bev_channels, 1, cfg, vb.pp(format!("up{i}"))))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            lateral,
            refine,
            upsample_factor,
        })
    }

    /// Decode a `(batch, in_channels, h, w)` map to
    /// `(batch, bev_channels, h * s^3, w * s^3)`.
    pub fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let mut level = self.lateral.forward(xs)?.relu()?;
        for conv in &self.refine {
            let up = bilinear_upsample(&level, self.upsample_factor)?;
            level = conv.forward(&up)?.relu()?;
        }
        Ok(level)
    }
}
