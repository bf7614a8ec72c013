pub mod classification;
pub mod config;
pub mod errors;
pub mod imageops;
pub mod metrics;
pub mod model;
pub mod preprocess;
pub mod report;
pub mod segmentation;
pub mod traits;

pub mod mocks;

use image::{DynamicImage, ImageReader, RgbImage};
use ndarray::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};
use walkdir::WalkDir;

pub use classification::{Classifier, Diagnosis, Label};
pub use config::{Command, Config};
pub use errors::{LungSightError, Result};
pub use imageops::{OverlayStyle, MODEL_INPUT_SIZE};
pub use metrics::{MetricRegistry, NamedMetric};
pub use model::{OnnxModel, SessionOptions};
pub use segmentation::Segmenter;
pub use traits::*;

/// Everything one analysis produces; built whole or not at all.
#[derive(Debug, Clone)]
pub struct Insight {
    /// Input resized to model resolution.
    pub display_image: RgbImage,
    pub mask: RgbImage,
    pub overlay: RgbImage,
    pub diagnosis: Diagnosis,
}

/// One metric evaluated between a ground-truth mask and a prediction.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricScore {
    pub name: &'static str,
    pub value: f32,
}

/// Runs both inference units on one image and composes the overlay.
pub struct Pipeline<S: TensorModel, C: TensorModel> {
    segmenter: Segmenter<S>,
    classifier: Classifier<C>,
    style: OverlayStyle,
}

impl<S: TensorModel, C: TensorModel> Pipeline<S, C> {
    pub fn new(segmentation: S, classification: C) -> Self {
        Self {
            segmenter: Segmenter::new(segmentation),
            classifier: Classifier::new(classification),
            style: OverlayStyle::default(),
        }
    }

    /// Decodes `path` and analyses it.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn run_inference(&self, path: &Path) -> Result<Insight> {
        let image = open_image(path)?;
        let insight = self
            .analyze_image(&image)
            .map_err(|e| LungSightError::ImageProcessing {
                path: path.display().to_string(),
                operation: "analysis".to_string(),
                source: Box::new(e),
            })?;
        info!(
            label = %insight.diagnosis.label,
            score = insight.diagnosis.score,
            "analysis finished"
        );
        Ok(insight)
    }

    /// Segments, classifies and overlays an already decoded raster.
    pub fn analyze_image(&self, image: &DynamicImage) -> Result<Insight> {
        let display_image = imageops::resize_to_model(image);
        let resized = DynamicImage::ImageRgb8(display_image.clone());

        let mask = self.segmenter.predict(&resized)?;
        let score = self.classifier.predict(&resized)?;
        let overlay = Segmenter::<S>::colored_mask(&display_image, &mask, &self.style)?;

        Ok(Insight {
            display_image,
            mask,
            overlay,
            diagnosis: Diagnosis::from_score(score),
        })
    }

    /// Scores the predicted mask of `image` against `ground_truth` with every metric
    /// bound to the segmentation model, or the whole registry if it declares none.
    pub fn evaluate_segmentation(
        &self,
        image: &DynamicImage,
        ground_truth: &DynamicImage,
        registry: &MetricRegistry,
    ) -> Result<Vec<MetricScore>> {
        let predicted = self.segmenter.predict_probabilities(image)?;
        let truth = ground_truth_mask(ground_truth);

        let bound = self.segmenter.model().metrics();
        let metrics = if bound.is_empty() {
            registry.all()
        } else {
            bound.to_vec()
        };

        metrics
            .iter()
            .map(|metric| {
                Ok(MetricScore {
                    name: metric.name,
                    value: metric.evaluate(truth.view(), predicted.view())?,
                })
            })
            .collect()
    }
}

impl Pipeline<OnnxModel, OnnxModel> {
    /// Loads both model handles; any failure here is fatal to startup.
    pub fn load(config: &Config, registry: &MetricRegistry) -> Result<Self> {
        for (role, path) in [
            ("Segmentation", &config.seg_model),
            ("Classification", &config.clf_model),
        ] {
            if !path.is_file() {
                return Err(LungSightError::missing_model(role, path));
            }
        }

        let options = config.session_options();
        let segmentation = OnnxModel::load(&config.seg_model, registry, options)?;
        let classification = OnnxModel::load(&config.clf_model, registry, options)?;
        Ok(Self::new(segmentation, classification))
    }
}

/// Decodes an image file, trusting its content over its extension.
pub fn open_image(path: &Path) -> Result<DynamicImage> {
    let image_error = |operation: &str, source: Box<dyn std::error::Error + Send + Sync>| {
        LungSightError::ImageProcessing {
            path: path.display().to_string(),
            operation: operation.to_string(),
            source,
        }
    };
    ImageReader::open(path)
        .map_err(|e| image_error("open image", Box::new(e)))?
        .with_guessed_format()
        .map_err(|e| image_error("detect image format", Box::new(e)))?
        .decode()
        .map_err(|e| image_error("decode image", Box::new(e)))
}

/// Ground-truth mask as `[0, 1]` intensities at model resolution.
pub fn ground_truth_mask(image: &DynamicImage) -> Array2<f32> {
    preprocess::preprocess(image).index_axis_move(Axis(0), 0)
}

/// Supported images under `input_dir`, in a stable order.
pub fn collect_image_files(input_dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<_> = WalkDir::new(input_dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| report::is_supported_image_format(e.path()))
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files
}

/// Mirrors `path` from under `input_dir` into `output_dir`, as a directory to hold
/// that image's outputs.
pub fn relocate(path: &Path, input_dir: &Path, output_dir: &Path) -> Result<PathBuf> {
    let relative = path
        .strip_prefix(input_dir)
        .map_err(|_| LungSightError::FileSystem {
            path: path.to_path_buf(),
            operation: "relative path".to_string(),
            source: std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "file is not inside the input directory",
            ),
        })?;
    Ok(output_dir.join(relative.parent().unwrap_or(Path::new(""))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{ConstantModel, EchoModel, FailingModel, WithMetrics};
    use clap::Parser;
    use image::Rgb;
    use std::fs;

    const SIDE: usize = MODEL_INPUT_SIZE as usize;

    #[test]
    fn test_analyze_empty_mask_overlay() -> Result<()> {
        let pipeline = Pipeline::new(
            ConstantModel::new(vec![1, SIDE, SIDE, 1], 0.0),
            ConstantModel::new(vec![1, 1], 0.2),
        );
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(256, 256, Rgb([200, 100, 50])));

        let insight = pipeline.analyze_image(&image)?;
        assert!(insight.mask.pixels().all(|p| *p == Rgb([0, 0, 0])));
        assert!(insight.overlay.pixels().all(|p| *p == Rgb([120, 60, 30])));
        assert_eq!(insight.diagnosis.label, Label::Negative);
        Ok(())
    }

    #[test]
    fn test_classifier_failure_discards_everything() {
        let pipeline = Pipeline::new(EchoModel, FailingModel);
        let image = DynamicImage::ImageRgb8(RgbImage::new(32, 32));
        assert!(pipeline.analyze_image(&image).is_err());
    }

    #[test]
    fn test_evaluate_with_registry_fallback() -> Result<()> {
        let pipeline = Pipeline::new(EchoModel, ConstantModel::new(vec![1], 0.9));
        let image = DynamicImage::ImageRgb8(RgbImage::from_fn(
            MODEL_INPUT_SIZE,
            MODEL_INPUT_SIZE,
            |x, _| if x < 256 {
                Rgb([255, 255, 255])
            } else {
                Rgb([0, 0, 0])
            },
        ));

        let scores = pipeline.evaluate_segmentation(&image, &image, &MetricRegistry::standard())?;
        let names: Vec<_> = scores.iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["dice_coefficient", "jaccard_index"]);
        // echoed prediction equals the ground truth
        assert!(scores.iter().all(|s| s.value == 1.0));
        Ok(())
    }

    #[test]
    fn test_evaluate_uses_metrics_bound_to_model() -> Result<()> {
        let segmentation = WithMetrics::standard(EchoModel, &["dice_coefficient"])?;
        let pipeline = Pipeline::new(segmentation, ConstantModel::new(vec![1], 0.9));
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(64, 64, Rgb([0, 0, 0])));
        let truth = DynamicImage::ImageRgb8(RgbImage::from_pixel(64, 64, Rgb([255, 255, 255])));

        let scores = pipeline.evaluate_segmentation(&image, &truth, &MetricRegistry::standard())?;
        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].name, "dice_coefficient");
        // no overlap: smooth / (|truth| + smooth)
        let expected = 1.0 / ((SIDE * SIDE) as f32 + 1.0);
        assert!((scores[0].value - expected).abs() < 1e-9);
        Ok(())
    }

    #[test]
    fn test_collect_and_relocate() -> Result<()> {
        let temp_dir = tempfile::TempDir::new()?;
        let input_dir = temp_dir.path().join("input");
        let subdir = input_dir.join("subdir");
        fs::create_dir_all(&subdir)?;
        fs::write(subdir.join("b.png"), b"")?;
        fs::write(input_dir.join("a.jpg"), b"")?;
        fs::write(input_dir.join("notes.txt"), b"")?;

        let files = collect_image_files(&input_dir);
        assert_eq!(files, vec![input_dir.join("a.jpg"), subdir.join("b.png")]);

        let relocated = relocate(&files[1], &input_dir, Path::new("output"))?;
        assert_eq!(relocated, Path::new("output/subdir"));
        assert!(relocate(Path::new("/elsewhere/c.png"), &input_dir, Path::new("output")).is_err());
        Ok(())
    }

    #[test]
    fn test_load_reports_missing_model_as_configuration() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let seg = temp_dir.path().join("seg.onnx").display().to_string();
        let clf = temp_dir.path().join("clf.onnx").display().to_string();
        let config = Config::try_parse_from([
            "lungsight",
            "--seg-model",
            &seg,
            "--clf-model",
            &clf,
            "analyze",
            "xray.png",
        ])
        .unwrap();

        match Pipeline::load(&config, &MetricRegistry::standard()) {
            Err(LungSightError::Configuration { message }) => {
                assert!(message.starts_with("Segmentation model does not exist"));
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("loading missing models succeeded"),
        }
    }
}
