use crate::errors::{LungSightError, Result};
use crate::metrics::{MetricRegistry, NamedMetric};
use crate::traits::TensorModel;
use ndarray::prelude::*;

/// Test model that ignores its input and returns a constant tensor.
#[derive(Debug, Clone)]
pub struct ConstantModel {
    pub shape: Vec<usize>,
    pub value: f32,
}

impl ConstantModel {
    pub fn new(shape: Vec<usize>, value: f32) -> Self {
        Self { shape, value }
    }
}

impl TensorModel for ConstantModel {
    fn predict(&self, _tensor: ArrayView3<f32>) -> Result<ArrayD<f32>> {
        Ok(ArrayD::from_elem(IxDyn(&self.shape), self.value))
    }
}

/// Test segmentation model whose mask is its own normalized input.
#[derive(Debug, Clone, Copy)]
pub struct EchoModel;

impl TensorModel for EchoModel {
    fn predict(&self, tensor: ArrayView3<f32>) -> Result<ArrayD<f32>> {
        Ok(tensor.to_owned().into_dyn())
    }
}

/// Test model whose every run fails like a broken backend would.
#[derive(Debug, Clone, Copy)]
pub struct FailingModel;

impl TensorModel for FailingModel {
    fn predict(&self, _tensor: ArrayView3<f32>) -> Result<ArrayD<f32>> {
        Err(LungSightError::model(
            "mock inference",
            std::io::Error::other("backend unavailable"),
        ))
    }
}

/// Wraps a model and reports `metrics` as resolved from its artifact.
#[derive(Debug, Clone)]
pub struct WithMetrics<M> {
    pub inner: M,
    pub metrics: Vec<NamedMetric>,
}

impl<M> WithMetrics<M> {
    /// Binds the named metrics of the standard registry, as a loader would.
    pub fn standard(inner: M, names: &[&str]) -> Result<Self> {
        let metrics = MetricRegistry::standard().resolve(names.iter().copied())?;
        Ok(Self { inner, metrics })
    }
}

impl<M: TensorModel> TensorModel for WithMetrics<M> {
    fn predict(&self, tensor: ArrayView3<f32>) -> Result<ArrayD<f32>> {
        self.inner.predict(tensor)
    }

    fn metrics(&self) -> &[NamedMetric] {
        &self.metrics
    }
}
