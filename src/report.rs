//! Presentation of an [`Insight`]: the loading indicator shown around a run, and the
//! rasters and text lines a finished run produces.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use image::ImageFormat;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

use crate::errors::{LungSightError, Result};
use crate::Insight;

const NAME_LIMIT: usize = 20;
const NAME_KEEP: usize = 10;

/// Immutable settings for everything written or shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresentationConfig {
    pub output_dir: PathBuf,
    pub format: String,
    pub name_limit: usize,
}

impl PresentationConfig {
    pub fn new(output_dir: &Path, format: &str) -> Self {
        Self {
            output_dir: output_dir.to_path_buf(),
            format: format.to_string(),
            name_limit: NAME_LIMIT,
        }
    }

    fn image_format(&self) -> ImageFormat {
        ImageFormat::from_extension(&self.format).unwrap_or(ImageFormat::Png)
    }
}

/// Rasters written for one insight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedInsight {
    pub original: PathBuf,
    pub mask: PathBuf,
    pub overlay: PathBuf,
}

/// Extensions offered by the upload dialog; anything else is still accepted when
/// passed explicitly, as long as it decodes.
pub fn is_supported_image_format(path: &Path) -> bool {
    if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
        matches!(
            extension.to_lowercase().as_str(),
            "png" | "jpg" | "jpeg" | "jpe" | "bmp" | "tif" | "tiff"
        )
    } else {
        false
    }
}

/// File name for display, cut down when long.
pub fn display_name(path: &Path, limit: usize) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    if name.chars().count() > limit {
        let head: String = name.chars().take(NAME_KEEP).collect();
        format!("{head}...")
    } else {
        name
    }
}

/// The two text lines shown under the images.
pub fn summary_lines(insight: &Insight) -> [String; 2] {
    [
        insight.diagnosis.label_text(),
        format!("Confidence: {}", insight.diagnosis.confidence_text()),
    ]
}

/// Writes original, mask and overlay as `<stem>_original.<fmt>` and so on into `dir`.
pub fn save_insight(
    insight: &Insight,
    dir: &Path,
    stem: &str,
    config: &PresentationConfig,
) -> Result<SavedInsight> {
    fs::create_dir_all(dir).map_err(|e| LungSightError::FileSystem {
        path: dir.to_path_buf(),
        operation: "create output directory".to_string(),
        source: e,
    })?;

    let format = config.image_format();
    let target = |kind: &str| dir.join(format!("{stem}_{kind}.{}", config.format));
    let saved = SavedInsight {
        original: target("original"),
        mask: target("mask"),
        overlay: target("overlay"),
    };

    for (image, path) in [
        (&insight.display_image, &saved.original),
        (&insight.mask, &saved.mask),
        (&insight.overlay, &saved.overlay),
    ] {
        image
            .save_with_format(path, format)
            .map_err(|e| LungSightError::ImageProcessing {
                path: path.display().to_string(),
                operation: "save image".to_string(),
                source: Box::new(e),
            })?;
        debug!(path = %path.display(), "image written");
    }

    Ok(saved)
}

/// Spinner shown while one blocking analysis runs.
pub struct LoadingIndicator {
    spinner: ProgressBar,
}

impl LoadingIndicator {
    pub fn show(name: &str) -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.green} {msg} [{elapsed}]")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.set_message(format!("Uploaded File : {name} Loading..."));
        spinner.enable_steady_tick(Duration::from_millis(100));
        Self { spinner }
    }

    pub fn clear(self) {
        self.spinner.finish_and_clear();
    }
}
