//! Compact CNN encoder and classifier
//!
//! A small convolutional backbone shared by the supervised classifier and
//! the contrastive pretraining head. The budget loop retrains this model
//! from scratch every round, so the backbone is deliberately modest.

use burn::{
    config::Config,
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
        Dropout, DropoutConfig, Linear, LinearConfig, PaddingConfig2d, Relu,
    },
    tensor::{backend::Backend, Tensor},
};

/// Configuration for the convolutional encoder
#[derive(Config, Debug)]
pub struct EncoderConfig {
    /// Number of input channels (3 for RGB)
    #[config(default = "3")]
    pub in_channels: usize,

    /// Base number of convolutional filters; doubles per block
    #[config(default = "32")]
    pub base_filters: usize,
}

/// A convolutional block: Conv2d, ReLU, and optional 2x2 MaxPool
#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    pub conv: Conv2d<B>,
    pub relu: Relu,
    pub pool: Option<MaxPool2d>,
}

impl<B: Backend> ConvBlock<B> {
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        with_pool: bool,
        device: &B::Device,
    ) -> Self {
        let conv = Conv2dConfig::new([in_channels, out_channels], [3, 3])
            .with_padding(PaddingConfig2d::Same)
            .init(device);

        let pool = if with_pool {
            Some(MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init())
        } else {
            None
        };

        Self {
            conv,
            relu: Relu::new(),
            pool,
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv.forward(x);
        let x = self.relu.forward(x);
        match &self.pool {
            Some(pool) => pool.forward(x),
            None => x,
        }
    }
}

/// Convolutional feature extractor
///
/// Three conv blocks with doubling filters, followed by global average
/// pooling into a flat feature vector of `base_filters * 4` dimensions.
#[derive(Module, Debug)]
pub struct Encoder<B: Backend> {
    pub conv1: ConvBlock<B>,
    pub conv2: ConvBlock<B>,
    pub conv3: ConvBlock<B>,
    pub global_pool: AdaptiveAvgPool2d,
    feature_dim: usize,
}

impl<B: Backend> Encoder<B> {
    pub fn new(config: &EncoderConfig, device: &B::Device) -> Self {
        let base = config.base_filters;

        let conv1 = ConvBlock::new(config.in_channels, base, true, device);
        let conv2 = ConvBlock::new(base, base * 2, true, device);
        let conv3 = ConvBlock::new(base * 2, base * 4, true, device);
        let global_pool = AdaptiveAvgPool2dConfig::new([1, 1]).init();

        Self {
            conv1,
            conv2,
            conv3,
            global_pool,
            feature_dim: base * 4,
        }
    }

    /// Flat feature vector per image: [batch, feature_dim]
    pub fn forward_features(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.conv1.forward(x);
        let x = self.conv2.forward(x);
        let x = self.conv3.forward(x);
        let x = self.global_pool.forward(x);

        let [batch_size, channels, _, _] = x.dims();
        x.reshape([batch_size, channels])
    }

    pub fn feature_dim(&self) -> usize {
        self.feature_dim
    }
}

/// Configuration for the full classifier
#[derive(Config, Debug)]
pub struct ClassifierConfig {
    /// Number of output classes
    pub num_classes: usize,

    /// Encoder backbone configuration
    pub encoder: EncoderConfig,

    /// Dropout rate before the final projection
    #[config(default = "0.3")]
    pub dropout_rate: f64,

    /// Hidden units in the classifier head
    #[config(default = "128")]
    pub hidden_units: usize,
}

/// Image classifier: encoder backbone plus a small MLP head
#[derive(Module, Debug)]
pub struct Classifier<B: Backend> {
    pub encoder: Encoder<B>,
    pub fc1: Linear<B>,
    pub dropout: Dropout,
    pub fc2: Linear<B>,
    num_classes: usize,
}

impl<B: Backend> Classifier<B> {
    pub fn new(config: &ClassifierConfig, device: &B::Device) -> Self {
        let encoder = Encoder::new(&config.encoder, device);
        Self::from_encoder(encoder, config, device)
    }

    /// Build a classifier on top of an existing (e.g. pretrained) encoder
    pub fn from_encoder(
        encoder: Encoder<B>,
        config: &ClassifierConfig,
        device: &B::Device,
    ) -> Self {
        let fc1 = LinearConfig::new(encoder.feature_dim(), config.hidden_units).init(device);
        let dropout = DropoutConfig::new(config.dropout_rate).init();
        let fc2 = LinearConfig::new(config.hidden_units, config.num_classes).init(device);

        Self {
            encoder,
            fc1,
            dropout,
            fc2,
            num_classes: config.num_classes,
        }
    }

    /// Logits of shape [batch, num_classes]
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.encoder.forward_features(x);
        let x = self.fc1.forward(x);
        let x = Relu::new().forward(x);
        let x = self.dropout.forward(x);
        self.fc2.forward(x)
    }

    /// Class posteriors for inference
    pub fn forward_softmax(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        burn::tensor::activation::softmax(self.forward(x), 1)
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }
}
