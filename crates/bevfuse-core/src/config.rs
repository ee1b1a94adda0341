//! Backbone configuration
//!
//! All dimensions the backbone derives its parameter shapes from live here.
//! The struct is plain data: build it once, validate it, then hand it to
//! [`crate::backbone::Backbone::new`] by value. Nothing mutates it afterwards
//! and no component reaches for ambient/global configuration.

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// Configuration for the fusion backbone.
///
/// Field values mirror the perception geometry: channel widths, the BEV
/// upsampling factor of the top-down decoder, anchor-grid sizes used by
/// cross-modal encode strategies, and the hyperparameters handed to the
/// external transformer component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackboneConfig {
    /// Common channel width all modality feature maps are projected to
    /// before pooling and fusion.
    pub perception_output_features: usize,
    /// Channel width of the top-down decoder (BEV branch).
    pub bev_features_channels: usize,
    /// Per-stage upsampling factor of the top-down decoder.
    pub bev_upsample_factor: usize,

    /// Anchor grid (rows) the image feature map is pooled to for
    /// cross-modal exchange.
    pub img_vert_anchors: usize,
    /// Anchor grid (columns) for the image branch.
    pub img_horz_anchors: usize,
    /// Anchor grid (rows) for the LiDAR branch.
    pub lidar_vert_anchors: usize,
    /// Anchor grid (columns) for the LiDAR branch.
    pub lidar_horz_anchors: usize,

    /// Feed PointPillars features to the LiDAR encoder instead of rasterized
    /// BEV histograms.
    pub use_point_pillars: bool,
    /// Channel count of the PointPillars feature map (used only when
    /// `use_point_pillars` is set).
    pub num_point_features: usize,
    /// Append a rasterized target-point channel to the LiDAR input.
    pub use_target_point_image: bool,
    /// Number of LiDAR sweeps stacked in the BEV input.
    pub lidar_seq_len: usize,

    /// Transformer attention heads.
    pub n_head: usize,
    /// Transformer layers per fusion stage.
    pub n_layer: usize,
    /// MLP expansion factor inside a transformer block.
    pub block_exp: usize,
    /// Temporal sequence length seen by the transformer.
    pub seq_len: usize,
    /// Embedding dropout.
    pub embd_pdrop: f32,
    /// Attention dropout.
    pub attn_pdrop: f32,
    /// Residual dropout.
    pub resid_pdrop: f32,
}

impl Default for BackboneConfig {
    fn default() -> Self {
        Self {
            perception_output_features: 512,
            bev_features_channels: 64,
            bev_upsample_factor: 2,
            img_vert_anchors: 5,
            img_horz_anchors: 22,
            lidar_vert_anchors: 8,
            lidar_horz_anchors: 8,
            use_point_pillars: false,
            num_point_features: 64,
            use_target_point_image: false,
            lidar_seq_len: 1,
            n_head: 4,
            n_layer: 2,
            block_exp: 4,
            seq_len: 1,
            embd_pdrop: 0.1,
            attn_pdrop: 0.1,
            resid_pdrop: 0.1,
        }
    }
}

impl BackboneConfig {
    /// Load a configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open config: {}", path.display()))?;
        let config: Self = serde_json::from_reader(file)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for values the backbone cannot be built from.
    pub fn validate(&self) -> Result<()> {
        if self.perception_output_features == 0 {
            bail!("perception_output_features must be nonzero");
        }
        if self.bev_features_channels == 0 {
            bail!("bev_features_channels must be nonzero");
        }
        if self.bev_upsample_factor < 2 {
            bail!("bev_upsample_factor must be at least 2");
        }
        if self.img_vert_anchors == 0
            || self.img_horz_anchors == 0
            || self.lidar_vert_anchors == 0
            || self.lidar_horz_anchors == 0
        {
            bail!("anchor grid dimensions must be nonzero");
        }
        if self.lidar_seq_len == 0 {
            bail!("lidar_seq_len must be nonzero");
        }
        if self.use_point_pillars && self.num_point_features == 0 {
            bail!("num_point_features must be nonzero when use_point_pillars is set");
        }
        for (name, p) in [
            ("embd_pdrop", self.embd_pdrop),
            ("attn_pdrop", self.attn_pdrop),
            ("resid_pdrop", self.resid_pdrop),
        ] {
            if !(0.0..=1.0).contains(&p) {
                bail!("{name} must be within [0, 1], got {p}");
            }
        }
        Ok(())
    }

    /// Input channel count the LiDAR encoder must accept.
    ///
    /// PointPillars replaces the rasterized sweep histograms (two channels
    /// per sweep) with its own feature map; the target-point raster adds one
    /// channel either way.
    pub fn lidar_input_channels(&self) -> usize {
        let base = if self.use_point_pillars {
            self.num_point_features
        } else {
            2 * self.lidar_seq_len
        };
        base + usize::from(self.use_target_point_image)
    }

    /// Number of image anchor tokens per frame.
    pub fn img_anchors(&self) -> usize {
        self.img_vert_anchors * self.img_horz_anchors
    }

    /// Number of LiDAR anchor tokens per frame.
    pub fn lidar_anchors(&self) -> usize {
        self.lidar_vert_anchors * self.lidar_horz_anchors
    }
}
