//! Model architectures driven by the harness.

pub mod cnn;
pub mod simclr;

pub use cnn::{Classifier, ClassifierConfig, Encoder, EncoderConfig};
pub use simclr::{ProjectionConfig, ProjectionHead, SimClrModel};
