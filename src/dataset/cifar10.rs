//! CIFAR-10 dataset loader
//!
//! Reads the CIFAR-10 binary batch format from a local directory:
//! each record is 1 label byte followed by 3072 pixel bytes stored as
//! channel planes (1024 red, 1024 green, 1024 blue). The planar layout
//! maps directly onto our CHW buffers.

use std::fs;
use std::path::Path;

use tracing::info;

use crate::dataset::{DatasetSpec, ImageStore};
use crate::utils::error::{Result, WeaksupError};

/// CIFAR-10 class names
pub const CLASS_NAMES: [&str; 10] = [
    "airplane",
    "automobile",
    "bird",
    "cat",
    "deer",
    "dog",
    "frog",
    "horse",
    "ship",
    "truck",
];

/// Image side in pixels
pub const IMAGE_SIZE: usize = 32;

/// Per-channel mean of the CIFAR-10 training set
pub const CHANNEL_MEAN: [f32; 3] = [0.4914, 0.4822, 0.4465];

/// Per-channel std of the CIFAR-10 training set
pub const CHANNEL_STD: [f32; 3] = [0.2023, 0.1994, 0.2010];

const PIXELS: usize = IMAGE_SIZE * IMAGE_SIZE;
const RECORD_SIZE: usize = 1 + 3 * PIXELS;

/// Dataset spec for CIFAR-10
pub fn spec() -> DatasetSpec {
    DatasetSpec {
        name: "cifar10".to_string(),
        num_classes: 10,
        image_size: IMAGE_SIZE,
        channel_mean: CHANNEL_MEAN,
        channel_std: CHANNEL_STD,
        class_names: CLASS_NAMES.iter().map(|s| s.to_string()).collect(),
    }
}

/// Load the training split (`data_batch_1.bin` .. `data_batch_5.bin`)
pub fn load_train(data_dir: impl AsRef<Path>) -> Result<ImageStore> {
    let data_dir = data_dir.as_ref();
    let mut pairs = Vec::new();

    for i in 1..=5 {
        let batch_file = data_dir.join(format!("data_batch_{}.bin", i));
        pairs.extend(load_batch_file(&batch_file)?);
    }

    info!("Loaded {} CIFAR-10 training images", pairs.len());
    Ok(ImageStore::from_pairs(pairs))
}

/// Load the test split (`test_batch.bin`)
pub fn load_test(data_dir: impl AsRef<Path>) -> Result<ImageStore> {
    let test_file = data_dir.as_ref().join("test_batch.bin");
    let pairs = load_batch_file(&test_file)?;

    info!("Loaded {} CIFAR-10 test images", pairs.len());
    Ok(ImageStore::from_pairs(pairs))
}

fn load_batch_file(path: &Path) -> Result<Vec<(Vec<f32>, usize)>> {
    if !path.exists() {
        return Err(WeaksupError::PathNotFound(path.to_path_buf()));
    }

    let buffer = fs::read(path)?;
    parse_records(&buffer).map_err(|msg| {
        WeaksupError::Dataset(format!("{}: {}", path.display(), msg))
    })
}

/// Parse raw CIFAR-10 binary records into ([0,1] CHW buffer, label) pairs
pub fn parse_records(buffer: &[u8]) -> std::result::Result<Vec<(Vec<f32>, usize)>, String> {
    if buffer.is_empty() || buffer.len() % RECORD_SIZE != 0 {
        return Err(format!(
            "invalid file size {} (record size is {})",
            buffer.len(),
            RECORD_SIZE
        ));
    }

    let num_images = buffer.len() / RECORD_SIZE;
    let mut pairs = Vec::with_capacity(num_images);

    for i in 0..num_images {
        let offset = i * RECORD_SIZE;
        let label = buffer[offset] as usize;
        if label >= CLASS_NAMES.len() {
            return Err(format!("record {} has invalid label {}", i, label));
        }

        // Channel-planar bytes are already CHW; just rescale to [0, 1].
        let image: Vec<f32> = buffer[offset + 1..offset + RECORD_SIZE]
            .iter()
            .map(|&b| b as f32 / 255.0)
            .collect();

        pairs.push((image, label));
    }

    Ok(pairs)
}

/// Resolve the conventional extraction directory if the caller passed its parent
pub fn resolve_data_dir(data_dir: &Path) -> std::path::PathBuf {
    let nested = data_dir.join("cifar-10-batches-bin");
    if nested.is_dir() {
        nested
    } else {
        data_dir.to_path_buf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synthetic_record(label: u8, fill: u8) -> Vec<u8> {
        let mut record = vec![fill; RECORD_SIZE];
        record[0] = label;
        record
    }

    #[test]
    fn test_parse_single_record() {
        let buffer = synthetic_record(3, 255);
        let pairs = parse_records(&buffer).unwrap();

        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].1, 3);
        assert_eq!(pairs[0].0.len(), 3 * PIXELS);
        assert!((pairs[0].0[0] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_parse_multiple_records() {
        let mut buffer = synthetic_record(0, 0);
        buffer.extend(synthetic_record(9, 128));

        let pairs = parse_records(&buffer).unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].1, 0);
        assert_eq!(pairs[1].1, 9);
        assert!((pairs[1].0[10] - 128.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn test_parse_rejects_truncated_buffer() {
        let buffer = vec![0u8; RECORD_SIZE - 1];
        assert!(parse_records(&buffer).is_err());
    }

    #[test]
    fn test_parse_rejects_invalid_label() {
        let buffer = synthetic_record(10, 0);
        assert!(parse_records(&buffer).is_err());
    }

    #[test]
    fn test_spec() {
        let spec = spec();
        assert_eq!(spec.num_classes, 10);
        assert_eq!(spec.image_size, 32);
        assert_eq!(spec.class_names[0], "airplane");
        assert_eq!(spec.class_names[9], "truck");
    }

    #[test]
    fn test_planar_layout_maps_to_chw() {
        // First red byte lands at CHW index 0, first green at PIXELS, first blue at 2*PIXELS.
        let mut record = synthetic_record(1, 0);
        record[1] = 255; // red plane start
        record[1 + PIXELS] = 51; // green plane start
        record[1 + 2 * PIXELS] = 102; // blue plane start

        let pairs = parse_records(&record).unwrap();
        let image = &pairs[0].0;
        assert!((image[0] - 1.0).abs() < 1e-6);
        assert!((image[PIXELS] - 0.2).abs() < 1e-6);
        assert!((image[2 * PIXELS] - 0.4).abs() < 1e-6);
    }
}
