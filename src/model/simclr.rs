//! SimCLR projection head and pretraining model
//!
//! The projection head maps encoder features into the space where the
//! NT-Xent loss operates. After pretraining the head is discarded and the
//! encoder is reused by the classifier.

use burn::{
    config::Config,
    module::Module,
    nn::{Linear, LinearConfig, Relu},
    tensor::{backend::Backend, Tensor},
};

use crate::model::cnn::{Encoder, EncoderConfig};

/// Configuration for the projection head
#[derive(Config, Debug)]
pub struct ProjectionConfig {
    /// Output dimensionality of the projection space
    #[config(default = "64")]
    pub projection_dim: usize,
}

/// Two-layer MLP projection head
#[derive(Module, Debug)]
pub struct ProjectionHead<B: Backend> {
    pub fc1: Linear<B>,
    pub fc2: Linear<B>,
}

impl<B: Backend> ProjectionHead<B> {
    pub fn new(feature_dim: usize, config: &ProjectionConfig, device: &B::Device) -> Self {
        let fc1 = LinearConfig::new(feature_dim, feature_dim).init(device);
        let fc2 = LinearConfig::new(feature_dim, config.projection_dim).init(device);
        Self { fc1, fc2 }
    }

    pub fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = self.fc1.forward(x);
        let x = Relu::new().forward(x);
        self.fc2.forward(x)
    }
}

/// Encoder plus projection head for contrastive pretraining
#[derive(Module, Debug)]
pub struct SimClrModel<B: Backend> {
    pub encoder: Encoder<B>,
    pub head: ProjectionHead<B>,
}

impl<B: Backend> SimClrModel<B> {
    pub fn new(
        encoder_config: &EncoderConfig,
        projection_config: &ProjectionConfig,
        device: &B::Device,
    ) -> Self {
        let encoder = Encoder::new(encoder_config, device);
        let head = ProjectionHead::new(encoder.feature_dim(), projection_config, device);
        Self { encoder, head }
    }

    /// Project a batch of images into the contrastive space: [batch, proj_dim]
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let features = self.encoder.forward_features(x);
        self.head.forward(features)
    }

    /// Give up the head and keep the pretrained encoder
    pub fn into_encoder(self) -> Encoder<B> {
        self.encoder
    }
}
