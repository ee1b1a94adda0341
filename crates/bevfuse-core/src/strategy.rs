//! Cross-modal encode strategies
//!
//! [`EncodeStrategy`] is the seam the backbone is polymorphic over: given
//! the preprocessed inputs it must produce one feature map per modality, at
//! the channel width the encoders report. How much the modalities talk to
//! each other on the way is entirely the strategy's business — a
//! transformer-based strategy exchanges anchor tokens at intermediate
//! encoder stages, [`LateFusion`] exchanges nothing at all.
//!
//! The trait has no default method body: a strategy that does not implement
//! `encode` does not compile, so an "unimplemented" strategy can never be
//! invoked.

use std::sync::Arc;

use candle_core::{Result, Tensor};
use tracing::debug;

use crate::encoder::SensorEncoder;

/// Strategy for turning preprocessed sensor inputs into per-modality
/// feature maps.
pub trait EncodeStrategy: Send + Sync {
    /// Produce `(image_features, lidar_features)`.
    ///
    /// `bev_points` and `img_points` carry the image-to-BEV and BEV-to-image
    /// projection correspondences; strategies without geometric exchange
    /// ignore them.
    fn encode(
        &self,
        image: &Tensor,
        lidar: &Tensor,
        velocity: &Tensor,
        bev_points: &Tensor,
        img_points: &Tensor,
    ) -> Result<(Tensor, Tensor)>;
}

/// Baseline strategy: run each encoder end to end, no cross-modal exchange.
pub struct LateFusion {
    image_encoder: Arc<dyn SensorEncoder>,
    lidar_encoder: Arc<dyn SensorEncoder>,
}

impl LateFusion {
    pub fn new(
        image_encoder: Arc<dyn SensorEncoder>,
        lidar_encoder: Arc<dyn SensorEncoder>,
    ) -> Self {
        debug!(
            image = image_encoder.architecture(),
            lidar = lidar_encoder.architecture(),
            "using late-fusion encode strategy"
        );
        Self {
            image_encoder,
            lidar_encoder,
        }
    }
}

impl EncodeStrategy for LateFusion {
    fn encode(
        &self,
        image: &Tensor,
        lidar: &Tensor,
        _velocity: &Tensor,
        _bev_points: &Tensor,
        _img_points: &Tensor,
    ) -> Result<(Tensor, Tensor)> {
        let image_features = self.image_encoder.forward(image)?;
        let lidar_features = self.lidar_encoder.forward(lidar)?;
        Ok((image_features, lidar_features))
    }
}
