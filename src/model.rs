use std::path::{Path, PathBuf};

use crate::{
    errors::{LungSightError, Result},
    imageops::MODEL_INPUT_SIZE,
    metrics::{MetricRegistry, NamedMetric},
    traits::TensorModel,
};
use ndarray::prelude::*;
use ort::value::TensorRef;
use ort::{
    execution_providers::CUDAExecutionProvider,
    session::{builder::SessionBuilder, Session},
};
use parking_lot::Mutex;
use tracing::{debug, info};

/// Custom metadata key listing the metric names an artifact was compiled with.
pub const METRICS_METADATA_KEY: &str = "metrics";

/// Options shared by every model handle of a process.
#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    pub intra_threads: usize,
    pub device_id: i32,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            intra_threads: 1,
            device_id: 0,
        }
    }
}

/// A pretrained ONNX artifact bound to one file path.
///
/// The session is loaded once and never swapped. Runs are serialised through the
/// mutex, since concurrent `run` calls on one session are not assumed to be safe.
pub struct OnnxModel {
    path: PathBuf,
    input_name: String,
    output_name: String,
    channels_last: bool,
    metrics: Vec<NamedMetric>,
    session: Mutex<Session>,
}

impl OnnxModel {
    pub fn load(
        model_path: &Path,
        registry: &MetricRegistry,
        options: SessionOptions,
    ) -> Result<Self> {
        let session = SessionBuilder::new()
            .map_err(|e| LungSightError::model("session builder initialisation", e))?
            .with_execution_providers([CUDAExecutionProvider::default()
                .with_device_id(options.device_id)
                .build()])
            .map_err(|e| LungSightError::model("execution provider setup", e))?
            .with_intra_threads(options.intra_threads)
            .map_err(|e| LungSightError::model("intra-op thread setup", e))?
            .with_memory_pattern(true)
            .map_err(|e| LungSightError::model("memory pattern setup", e))?
            .commit_from_file(model_path)
            .map_err(|e| {
                LungSightError::model(format!("model file load: {}", model_path.display()), e)
            })?;

        let input = session.inputs.first().ok_or_else(|| {
            LungSightError::validation("model", format!("{} has no input", model_path.display()))
        })?;
        let output = session.outputs.first().ok_or_else(|| {
            LungSightError::validation("model", format!("{} has no output", model_path.display()))
        })?;
        let input_rank = input
            .input_type
            .tensor_shape()
            .map(|shape| shape.len())
            .ok_or_else(|| LungSightError::validation("model input", "is not a tensor"))?;
        let channels_last = channels_last(input_rank)?;
        let input_name = input.name.clone();
        let output_name = output.name.clone();

        let metrics = {
            let metadata = session
                .metadata()
                .map_err(|e| LungSightError::model("model metadata read", e))?;
            let declared = metadata
                .custom(METRICS_METADATA_KEY)
                .map_err(|e| LungSightError::model("model metadata read", e))?;
            declared_metrics(declared.as_deref(), registry)?
        };

        let model = Self {
            path: model_path.to_path_buf(),
            input_name,
            output_name,
            channels_last,
            metrics,
            session: Mutex::new(session),
        };

        // warm-up run also validates that the artifact accepts the fixed input size
        let side = MODEL_INPUT_SIZE as usize;
        let data = Array3::<f32>::zeros((1, side, side));
        model.predict(data.view()).map_err(|e| {
            LungSightError::model(format!("warm-up run: {}", model_path.display()), e)
        })?;

        info!(
            path = %model.path.display(),
            input = %model.input_name,
            output = %model.output_name,
            metrics = ?model.metrics,
            "model loaded"
        );
        Ok(model)
    }
}

/// Whether an input of this rank takes a trailing channel axis: `(1, H, W)` does
/// not, `(1, H, W, 1)` does.
fn channels_last(rank: usize) -> Result<bool> {
    match rank {
        3 => Ok(false),
        4 => Ok(true),
        rank => Err(LungSightError::validation(
            "model input",
            format!("has rank {rank}, expected (1, H, W) or (1, H, W, 1)"),
        )),
    }
}

/// Resolves the comma separated metric list from an artifact's metadata.
fn declared_metrics(declared: Option<&str>, registry: &MetricRegistry) -> Result<Vec<NamedMetric>> {
    match declared {
        Some(names) => registry.resolve(names.split(',')),
        None => Ok(Vec::new()),
    }
}

impl TensorModel for OnnxModel {
    fn predict(&self, tensor: ArrayView3<f32>) -> Result<ArrayD<f32>> {
        let input = if self.channels_last {
            tensor.insert_axis(Axis(3)).into_dyn()
        } else {
            tensor.into_dyn()
        };
        let input = input.as_standard_layout();

        let mut binding = self.session.lock();
        let outputs = binding.run(
            ort::inputs![self.input_name.as_str() => TensorRef::from_array_view(&input)?],
        )?;
        let output = outputs[self.output_name.as_str()]
            .try_extract_array::<f32>()?
            .to_owned();
        debug!(path = %self.path.display(), shape = ?output.shape(), "inference finished");
        Ok(output)
    }

    fn metrics(&self) -> &[NamedMetric] {
        &self.metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn load_err(path: &Path) -> LungSightError {
        match OnnxModel::load(path, &MetricRegistry::standard(), SessionOptions::default()) {
            Ok(_) => panic!("{} loaded", path.display()),
            Err(e) => e,
        }
    }

    #[test]
    fn test_load_nonexistent_file_fails() {
        let temp_dir = TempDir::new().unwrap();
        let err = load_err(&temp_dir.path().join("missing.onnx"));
        assert!(matches!(err, LungSightError::Model { .. }));
        assert!(err.to_string().contains("model file load"));
    }

    #[test]
    fn test_load_corrupt_file_fails() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.onnx");
        fs::write(&path, b"garbage").unwrap();

        let err = load_err(&path);
        assert!(matches!(err, LungSightError::Model { .. }));
    }

    #[test]
    fn test_input_rank_decides_layout() {
        assert!(!channels_last(3).unwrap());
        assert!(channels_last(4).unwrap());
        for rank in [2, 5] {
            let err = channels_last(rank).unwrap_err();
            assert!(matches!(err, LungSightError::Validation { .. }));
            assert!(err.to_string().contains(&format!("rank {rank}")));
        }
    }

    #[test]
    fn test_declared_metrics_resolution() -> Result<()> {
        let registry = MetricRegistry::standard();

        let metrics = declared_metrics(Some("jaccard_index, dice_coefficient"), &registry)?;
        let names: Vec<_> = metrics.iter().map(|m| m.name).collect();
        assert_eq!(names, vec!["jaccard_index", "dice_coefficient"]);

        assert!(declared_metrics(None, &registry)?.is_empty());

        let err = declared_metrics(Some("focal_loss"), &registry).unwrap_err();
        assert!(matches!(err, LungSightError::Validation { .. }));
        Ok(())
    }
}
