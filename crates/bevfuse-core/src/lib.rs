//! bevfuse-core: Camera + LiDAR bird's-eye-view fusion backbone
//!
//! This crate provides:
//! - The fusion backbone orchestrator: encode, channel-normalize, pool,
//!   fuse and top-down decode into a BEV feature map, an image feature map
//!   and a pooled embedding for a downstream planning head
//! - The encoder seam ([`SensorEncoder`]) over swappable image/LiDAR
//!   backbones, plus ImageNet input normalization
//! - The cross-modal encode-strategy seam ([`EncodeStrategy`]) with a
//!   late-fusion baseline
//! - Candle-based resampling ops (bilinear upsample, adaptive average
//!   pooling) the building blocks need
//!
//! Built on candle; all parameters come from a [`candle_nn::VarBuilder`],
//! so weights load from safetensors the usual way.

pub mod backbone;
pub mod config;
pub mod encoder;
pub mod fpn;
pub mod fusion;
pub mod ops;
pub mod pool;
pub mod project;
pub mod strategy;
pub mod transformer;

// Re-exports
pub use backbone::{Backbone, BackboneOutput};
pub use config::BackboneConfig;
pub use encoder::{normalize_imagenet, ConvStem, SensorEncoder, IMAGENET_MEAN, IMAGENET_STD};
pub use fpn::TopDownDecoder;
pub use fusion::VelocityEmbedding;
pub use ops::{adaptive_avg_pool2d, bilinear_upsample};
pub use pool::{AnchorPool, GlobalPool};
pub use project::ChannelProjection;
pub use strategy::{EncodeStrategy, LateFusion};
pub use transformer::TransformerSpec;
