//! Fusion backbone orchestrator
//!
//! [`Backbone`] owns every learned parameter of the perception head and
//! wires the pipeline together: preprocess, encode (strategy-defined),
//! project to the perception width, pool + fuse + velocity-condition, and
//! decode the LiDAR map top-down. All modules are built once in
//! [`Backbone::new`] from the configuration and a [`VarBuilder`]; nothing is
//! created during forward passes.

use std::sync::Arc;

use candle_core::{Result, Tensor};
use candle_nn::VarBuilder;
use tracing::info;

use crate::config::BackboneConfig;
use crate::encoder::{normalize_imagenet, SensorEncoder};
use crate::fpn::TopDownDecoder;
use crate::fusion::{fuse, VelocityEmbedding};
use crate::pool::{AnchorPool, GlobalPool};
use crate::project::ChannelProjection;
use crate::strategy::EncodeStrategy;
use crate::transformer::TransformerSpec;

/// Outputs of one backbone forward pass.
pub struct BackboneOutput {
    /// Decoded LiDAR map from the top-down decoder:
    /// `(batch, bev_features_channels, h * s^3, w * s^3)`.
    pub bev_features: Tensor,
    /// Channel-normalized image feature map, kept for auxiliary heads:
    /// `(batch, perception_output_features, h, w)`.
    pub image_features: Tensor,
    /// Fused, velocity-conditioned embedding:
    /// `(batch, perception_output_features)`.
    pub fused: Tensor,
}

/// Camera + LiDAR fusion backbone.
pub struct Backbone {
    config: BackboneConfig,
    image_encoder: Arc<dyn SensorEncoder>,
    lidar_encoder: Arc<dyn SensorEncoder>,
    strategy: Box<dyn EncodeStrategy>,
    use_velocity: bool,

    image_projection: ChannelProjection,
    lidar_projection: ChannelProjection,
    image_pool: GlobalPool,
    lidar_pool: GlobalPool,
    image_anchor_pool: AnchorPool,
    lidar_anchor_pool: AnchorPool,
    top_down: TopDownDecoder,
    velocity_embedding: VelocityEmbedding,
}

impl Backbone {
    /// Build the backbone.
    ///
    /// The encoders are shared handles so the encode strategy may hold the
    /// same instances; `use_velocity` decides whether the fused embedding is
    /// conditioned on ego speed.
    pub fn new(
        config: BackboneConfig,
        image_encoder: Arc<dyn SensorEncoder>,
        lidar_encoder: Arc<dyn SensorEncoder>,
        strategy: Box<dyn EncodeStrategy>,
        use_velocity: bool,
        vb: VarBuilder,
    ) -> Result<Self> {
        let features = config.perception_output_features;

        let image_projection = ChannelProjection::new(
            image_encoder.num_features(),
            features,
            vb.pp("image_projection"),
        )?;
        let lidar_projection = ChannelProjection::new(
            lidar_encoder.num_features(),
            features,
            vb.pp("lidar_projection"),
        )?;

        let image_pool =
            GlobalPool::new(image_encoder.architecture(), features, vb.pp("image_pool"))?;
        let lidar_pool =
            GlobalPool::new(lidar_encoder.architecture(), features, vb.pp("lidar_pool"))?;
        let image_anchor_pool = AnchorPool::new(config.img_vert_anchors, config.img_horz_anchors);
        let lidar_anchor_pool =
            AnchorPool::new(config.lidar_vert_anchors, config.lidar_horz_anchors);

        let top_down = TopDownDecoder::new(
            features,
            config.bev_features_channels,
            config.bev_upsample_factor,
            vb.pp("top_down"),
        )?;
        let velocity_embedding =
            VelocityEmbedding::new(use_velocity, features, vb.pp("velocity_embedding"))?;

        info!(
            image = image_encoder.architecture(),
            lidar = lidar_encoder.architecture(),
            features,
            use_velocity,
            "backbone constructed"
        );

        Ok(Self {
            config,
            image_encoder,
            lidar_encoder,
            strategy,
            use_velocity,
            image_projection,
            lidar_projection,
            image_pool,
            lidar_pool,
            image_anchor_pool,
            lidar_anchor_pool,
            top_down,
            velocity_embedding,
        })
    }

    /// Run the full fusion pipeline.
    ///
    /// `image` is `(batch, 3, h, w)` in `[0, 1]`, `lidar` is the BEV raster
    /// `(batch, lidar_input_channels, h, w)`, `velocity` is `(batch, 1)`.
    /// `bev_points`/`img_points` are the projection-correspondence tensors
    /// forwarded untouched to the encode strategy.
    pub fn forward(
        &self,
        image: &Tensor,
        lidar: &Tensor,
        velocity: &Tensor,
        bev_points: &Tensor,
        img_points: &Tensor,
    ) -> Result<BackboneOutput> {
        let image = self.process_image(image)?;
        let lidar = self.process_lidar(lidar)?;

        let (image_features, lidar_features) =
            self.strategy
                .encode(&image, &lidar, velocity, bev_points, img_points)?;

        let image_features = self.image_projection.forward(&image_features)?;
        let lidar_features = self.lidar_projection.forward(&lidar_features)?;

        let image_pooled = self.image_pool.forward(&image_features)?;
        let lidar_pooled = self.lidar_pool.forward(&lidar_features)?;
        let fused = fuse(&image_pooled, &lidar_pooled)?;
        let fused = self.velocity_embedding.apply(&fused, velocity)?;

        let bev_features = self.top_down.forward(&lidar_features)?;

        Ok(BackboneOutput {
            bev_features,
            image_features,
            fused,
        })
    }

    fn process_image(&self, image: &Tensor) -> Result<Tensor> {
        if self.image_encoder.normalize() {
            normalize_imagenet(image)
        } else {
            Ok(image.clone())
        }
    }

    // Extension point for LiDAR preprocessing; pass-through for now.
    fn process_lidar(&self, lidar: &Tensor) -> Result<Tensor> {
        Ok(lidar.clone())
    }

    /// Fill in the transformer hyperparameters for a fusion stage operating
    /// at embedding width `n_embd`.
    pub fn transformer_spec(&self, n_embd: usize) -> TransformerSpec {
        let config = &self.config;
        TransformerSpec {
            n_embd,
            n_head: config.n_head,
            n_layer: config.n_layer,
            block_exp: config.block_exp,
            img_anchors: config.img_anchors(),
            lidar_anchors: config.lidar_anchors(),
            seq_len: config.seq_len,
            embd_pdrop: config.embd_pdrop,
            attn_pdrop: config.attn_pdrop,
            resid_pdrop: config.resid_pdrop,
            use_velocity: self.use_velocity,
        }
    }

    pub fn config(&self) -> &BackboneConfig {
        &self.config
    }

    pub fn image_encoder(&self) -> &Arc<dyn SensorEncoder> {
        &self.image_encoder
    }

    pub fn lidar_encoder(&self) -> &Arc<dyn SensorEncoder> {
        &self.lidar_encoder
    }

    /// Anchor-grid pool for the image branch, for encode strategies.
    pub fn image_anchor_pool(&self) -> &AnchorPool {
        &self.image_anchor_pool
    }

    /// Anchor-grid pool for the LiDAR branch, for encode strategies.
    pub fn lidar_anchor_pool(&self) -> &AnchorPool {
        &self.lidar_anchor_pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::ConvStem;
    use crate::strategy::LateFusion;
    use candle_core::{DType, Device};

    fn tiny_config() -> BackboneConfig {
        BackboneConfig {
            perception_output_features: 32,
            bev_features_channels: 8,
            bev_upsample_factor: 2,
            img_vert_anchors: 2,
            img_horz_anchors: 4,
            lidar_vert_anchors: 2,
            lidar_horz_anchors: 2,
            ..Default::default()
        }
    }

    fn build(
        config: BackboneConfig,
        encoder_features: usize,
        use_velocity: bool,
    ) -> Backbone {
        let vb = VarBuilder::zeros(DType::F32, &Device::Cpu);
        let image_encoder: Arc<dyn SensorEncoder> = Arc::new(
            ConvStem::new("resnet34", 3, encoder_features, true, vb.pp("image_encoder")).unwrap(),
        );
        let lidar_encoder: Arc<dyn SensorEncoder> = Arc::new(
            ConvStem::new(
                "resnet18",
                config.lidar_input_channels(),
                encoder_features,
                false,
                vb.pp("lidar_encoder"),
            )
            .unwrap(),
        );
        let strategy = Box::new(LateFusion::new(
            image_encoder.clone(),
            lidar_encoder.clone(),
        ));
        Backbone::new(
            config,
            image_encoder,
            lidar_encoder,
            strategy,
            use_velocity,
            vb.pp("backbone"),
        )
        .unwrap()
    }

    #[test]
    fn test_projection_identity_iff_widths_match() {
        let backbone = build(tiny_config(), 32, false);
        assert!(backbone.image_projection.is_identity());
        assert!(backbone.lidar_projection.is_identity());

        let backbone = build(tiny_config(), 64, false);
        assert!(!backbone.image_projection.is_identity());
        assert!(!backbone.lidar_projection.is_identity());
    }

    #[test]
    fn test_transformer_spec_from_config() {
        let backbone = build(tiny_config(), 32, true);
        let spec = backbone.transformer_spec(72);
        assert_eq!(spec.n_embd, 72);
        assert_eq!(spec.n_head, backbone.config().n_head);
        assert_eq!(spec.img_anchors, 8);
        assert_eq!(spec.lidar_anchors, 4);
        assert!(spec.use_velocity);
    }
}
