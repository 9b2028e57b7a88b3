//! ISIC skin-lesion dataset loader
//!
//! Loads a directory-per-class image tree:
//!
//! ```text
//! root_dir/
//! ├── melanoma/
//! │   ├── ISIC_0000001.jpg
//! │   └── ...
//! ├── nevus/
//! │   └── ...
//! └── ...
//! ```
//!
//! Class indices follow sorted directory order. Images are decoded,
//! resized square, and cached in memory as [0, 1] CHW buffers.

use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use image::ImageReader;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::dataset::{DatasetSpec, ImageStore, TrainItem};
use crate::utils::error::{Result, WeaksupError};

/// Default square input size for ISIC images
pub const DEFAULT_IMAGE_SIZE: usize = 128;

/// ImageNet channel statistics, conventional for dermoscopy transfer setups
pub const CHANNEL_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const CHANNEL_STD: [f32; 3] = [0.229, 0.224, 0.225];

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Discovered ISIC directory layout before decoding
#[derive(Debug, Clone)]
pub struct IsicIndex {
    pub root_dir: PathBuf,
    pub class_names: Vec<String>,
    /// (path, label) pairs in class order
    pub samples: Vec<(PathBuf, usize)>,
}

impl IsicIndex {
    /// Scan the class directories under `root_dir`
    pub fn scan(root_dir: impl AsRef<Path>) -> Result<Self> {
        let root_dir = root_dir.as_ref().to_path_buf();
        if !root_dir.exists() {
            return Err(WeaksupError::PathNotFound(root_dir));
        }

        let mut class_names: Vec<String> = Vec::new();
        for entry in std::fs::read_dir(&root_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    class_names.push(name.to_string());
                }
            }
        }
        class_names.sort();

        if class_names.is_empty() {
            return Err(WeaksupError::Dataset(format!(
                "no class directories found under {}",
                root_dir.display()
            )));
        }

        let mut samples = Vec::new();
        for (label, class_name) in class_names.iter().enumerate() {
            let class_dir = root_dir.join(class_name);
            let before = samples.len();

            for entry in WalkDir::new(&class_dir)
                .min_depth(1)
                .max_depth(1)
                .into_iter()
                .filter_map(|e| e.ok())
            {
                let path = entry.path().to_path_buf();
                if let Some(ext) = path.extension() {
                    let ext = ext.to_string_lossy().to_lowercase();
                    if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
                        samples.push((path, label));
                    }
                }
            }

            debug!(
                "Class '{}' (label {}): {} images",
                class_name,
                label,
                samples.len() - before
            );
        }

        info!(
            "Indexed {} ISIC images across {} classes",
            samples.len(),
            class_names.len()
        );

        Ok(Self {
            root_dir,
            class_names,
            samples,
        })
    }

    pub fn num_classes(&self) -> usize {
        self.class_names.len()
    }

    /// Dataset spec for this index at the given input size
    pub fn spec(&self, image_size: usize) -> DatasetSpec {
        DatasetSpec {
            name: "isic".to_string(),
            num_classes: self.num_classes(),
            image_size,
            channel_mean: CHANNEL_MEAN,
            channel_std: CHANNEL_STD,
            class_names: self.class_names.clone(),
        }
    }

    /// Decode every indexed image into an in-memory store
    pub fn load(&self, image_size: usize) -> Result<ImageStore> {
        let mut items = Vec::with_capacity(self.samples.len());
        for (id, (path, label)) in self.samples.iter().enumerate() {
            let image = load_image_buffer(path, image_size)?;
            items.push(TrainItem::new(image, *label, id as u64));
        }

        info!("Decoded {} ISIC images at {}px", items.len(), image_size);
        Ok(ImageStore::new(items))
    }
}

/// Decode one image into a [0, 1] CHW buffer of the given square size
pub fn load_image_buffer(path: &Path, image_size: usize) -> Result<Vec<f32>> {
    let img = ImageReader::open(path)
        .map_err(|e| WeaksupError::ImageLoad(path.to_path_buf(), e.to_string()))?
        .decode()
        .map_err(|e| WeaksupError::ImageLoad(path.to_path_buf(), e.to_string()))?
        .resize_exact(image_size as u32, image_size as u32, FilterType::Triangle)
        .to_rgb8();

    let (width, height) = (image_size, image_size);
    let mut buffer = vec![0.0f32; 3 * height * width];
    for y in 0..height {
        for x in 0..width {
            let pixel = img.get_pixel(x as u32, y as u32);
            buffer[y * width + x] = pixel[0] as f32 / 255.0;
            buffer[height * width + y * width + x] = pixel[1] as f32 / 255.0;
            buffer[2 * height * width + y * width + x] = pixel[2] as f32 / 255.0;
        }
    }

    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_missing_dir() {
        let result = IsicIndex::scan("/nonexistent/isic/path");
        assert!(matches!(result, Err(WeaksupError::PathNotFound(_))));
    }

    #[test]
    fn test_scan_and_load_synthetic_tree() {
        let dir = std::env::temp_dir().join(format!("weaksup_isic_test_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);

        for class in ["melanoma", "nevus"] {
            let class_dir = dir.join(class);
            std::fs::create_dir_all(&class_dir).unwrap();
            for i in 0..2 {
                let img = image::RgbImage::from_pixel(8, 8, image::Rgb([10 * (i + 1) as u8; 3]));
                img.save(class_dir.join(format!("img_{}.png", i))).unwrap();
            }
        }

        let index = IsicIndex::scan(&dir).unwrap();
        assert_eq!(index.num_classes(), 2);
        assert_eq!(index.class_names, vec!["melanoma", "nevus"]);
        assert_eq!(index.samples.len(), 4);

        let store = index.load(8).unwrap();
        assert_eq!(store.len(), 4);
        let item = store.item(0).unwrap();
        assert_eq!(item.image.len(), 3 * 8 * 8);
        assert!(item.image.iter().all(|&v| (0.0..=1.0).contains(&v)));

        let spec = index.spec(8);
        assert_eq!(spec.num_classes, 2);
        assert_eq!(spec.image_size, 8);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
