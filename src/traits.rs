use crate::errors::Result;
use crate::metrics::NamedMetric;
use ndarray::prelude::*;

/// A loaded inference artifact that maps one preprocessed batch to its raw output.
///
/// The inference units only depend on this, so they run unchanged against the
/// ONNX Runtime handle or a test double.
pub trait TensorModel: Send + Sync {
    /// Runs the model on a `(batch, height, width)` intensity tensor.
    fn predict(&self, tensor: ArrayView3<f32>) -> Result<ArrayD<f32>>;

    /// Metrics the artifact was compiled with, resolved at load time.
    fn metrics(&self) -> &[NamedMetric] {
        &[]
    }
}
