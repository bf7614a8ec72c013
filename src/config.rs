use clap::{Parser, Subcommand};
use image::ImageFormat;
use std::path::{Path, PathBuf};

use crate::model::SessionOptions;
use crate::report::PresentationConfig;

#[derive(Parser, Clone, Debug)]
#[command(version, about, long_about = None)]
pub struct Config {
    #[command(subcommand)]
    pub command: Command,

    /// Lung segmentation model (ONNX)
    #[arg(long, global = true, default_value = "resource/best_seg_model.onnx")]
    pub seg_model: PathBuf,

    /// Tuberculosis classification model (ONNX)
    #[arg(long, global = true, default_value = "resource/best_clf_model.onnx")]
    pub clf_model: PathBuf,

    /// Format of the written images
    #[arg(short, long, global = true, default_value = "png", value_parser = check_format)]
    pub format: String,

    #[arg(short, long, global = true, default_value_t = 0)]
    pub device_id: i32,

    /// Intra-op threads per model session
    #[arg(long, global = true, default_value_t = 1)]
    pub threads: usize,

    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Command {
    /// Segment and classify one chest X-ray
    Analyze {
        image: PathBuf,

        #[arg(short, long, default_value = "output")]
        output_dir: PathBuf,
    },
    /// Analyse every supported image under a directory, one at a time
    Batch {
        input_dir: PathBuf,

        #[arg(default_value = "output")]
        output_dir: PathBuf,
    },
    /// Score the segmentation of one image against a ground-truth mask
    Evaluate { image: PathBuf, ground_truth: PathBuf },
}

impl Config {
    pub fn new() -> Self {
        Self::parse()
    }

    pub const fn session_options(&self) -> SessionOptions {
        SessionOptions {
            intra_threads: self.threads,
            device_id: self.device_id,
        }
    }

    pub fn presentation(&self, output_dir: &Path) -> PresentationConfig {
        PresentationConfig::new(output_dir, &self.format)
    }

    /// Default tracing filter; framework crates stay at warnings.
    pub const fn log_filter(&self) -> &'static str {
        if self.verbose {
            "lungsight=debug,ort=warn"
        } else {
            "lungsight=info,ort=warn"
        }
    }
}

/// Output extension for saved rasters; case and a leading dot are ignored.
fn check_format(s: &str) -> Result<String, String> {
    let extension = s.trim_start_matches('.').to_ascii_lowercase();
    match ImageFormat::from_extension(&extension) {
        Some(format) if format.writing_enabled() => Ok(extension),
        _ => {
            let writable: Vec<&str> = ImageFormat::all()
                .filter(ImageFormat::writing_enabled)
                .flat_map(ImageFormat::extensions_str)
                .copied()
                .collect();
            Err(format!("cannot write `{s}` images (writable: {})", writable.join(", ")))
        }
    }
}
