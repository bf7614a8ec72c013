//! Overlap metrics between a ground-truth mask and a predicted mask.
//!
//! The trained artifacts reference these by name, so they are exposed through an
//! explicit [`MetricRegistry`] that is handed to the model loader.

use std::collections::BTreeMap;
use std::fmt;

use ndarray::{ArrayView, Dimension};

use crate::errors::{LungSightError, Result};

pub const JACCARD_SMOOTH: f32 = 100.0;
pub const DICE_SMOOTH: f32 = 1.0;

pub const JACCARD_INDEX: &str = "jaccard_index";
pub const DICE_COEFFICIENT: &str = "dice_coefficient";

/// A named overlap metric over flattened inputs, with its default smoothing.
pub type MetricFn = fn(&[f32], &[f32]) -> f32;

struct Sums {
    intersection: f32,
    sum_true: f32,
    sum_pred: f32,
}

fn sums(y_true: &[f32], y_pred: &[f32]) -> Sums {
    y_true.iter().zip(y_pred).fold(
        Sums {
            intersection: 0.0,
            sum_true: 0.0,
            sum_pred: 0.0,
        },
        |acc, (&t, &p)| Sums {
            intersection: acc.intersection + t * p,
            sum_true: acc.sum_true + t,
            sum_pred: acc.sum_pred + p,
        },
    )
}

fn flatten<D: Dimension>(
    y_true: ArrayView<'_, f32, D>,
    y_pred: ArrayView<'_, f32, D>,
) -> Result<(Vec<f32>, Vec<f32>)> {
    if y_true.len() != y_pred.len() {
        return Err(LungSightError::validation(
            "y_pred",
            format!(
                "has {} elements, ground truth has {}",
                y_pred.len(),
                y_true.len()
            ),
        ));
    }
    Ok((y_true.iter().copied().collect(), y_pred.iter().copied().collect()))
}

/// Intersection over union with additive smoothing on both sides of the ratio.
pub fn jaccard(y_true: &[f32], y_pred: &[f32], smooth: f32) -> f32 {
    let s = sums(y_true, y_pred);
    let union = s.sum_true + s.sum_pred - s.intersection;
    (s.intersection + smooth) / (union + smooth)
}

/// Twice the intersection over the total mass, with additive smoothing.
pub fn dice(y_true: &[f32], y_pred: &[f32], smooth: f32) -> f32 {
    let s = sums(y_true, y_pred);
    (2.0 * s.intersection + smooth) / (s.sum_true + s.sum_pred + smooth)
}

/// Jaccard index of two equally sized arrays of any dimensionality.
pub fn jaccard_index<D: Dimension>(
    y_true: ArrayView<'_, f32, D>,
    y_pred: ArrayView<'_, f32, D>,
    smooth: f32,
) -> Result<f32> {
    let (t, p) = flatten(y_true, y_pred)?;
    Ok(jaccard(&t, &p, smooth))
}

/// Dice coefficient of two equally sized arrays of any dimensionality.
pub fn dice_coefficient<D: Dimension>(
    y_true: ArrayView<'_, f32, D>,
    y_pred: ArrayView<'_, f32, D>,
    smooth: f32,
) -> Result<f32> {
    let (t, p) = flatten(y_true, y_pred)?;
    Ok(dice(&t, &p, smooth))
}

fn jaccard_default(y_true: &[f32], y_pred: &[f32]) -> f32 {
    jaccard(y_true, y_pred, JACCARD_SMOOTH)
}

fn dice_default(y_true: &[f32], y_pred: &[f32]) -> f32 {
    dice(y_true, y_pred, DICE_SMOOTH)
}

/// A metric resolved from a registry, bound to the name it was looked up by.
#[derive(Clone, Copy)]
pub struct NamedMetric {
    pub name: &'static str,
    pub function: MetricFn,
}

impl NamedMetric {
    pub fn evaluate<D: Dimension>(
        &self,
        y_true: ArrayView<'_, f32, D>,
        y_pred: ArrayView<'_, f32, D>,
    ) -> Result<f32> {
        let (t, p) = flatten(y_true, y_pred)?;
        Ok((self.function)(&t, &p))
    }
}

impl fmt::Debug for NamedMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NamedMetric").field(&self.name).finish()
    }
}

/// Mapping from symbolic metric names to pure functions, consulted at model load time.
#[derive(Debug, Clone, Default)]
pub struct MetricRegistry {
    metrics: BTreeMap<&'static str, NamedMetric>,
}

impl MetricRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The two metrics the trained models were compiled with.
    pub fn standard() -> Self {
        Self::new()
            .with(JACCARD_INDEX, jaccard_default)
            .with(DICE_COEFFICIENT, dice_default)
    }

    pub fn with(mut self, name: &'static str, function: MetricFn) -> Self {
        self.metrics.insert(name, NamedMetric { name, function });
        self
    }

    pub fn get(&self, name: &str) -> Option<NamedMetric> {
        self.metrics.get(name).copied()
    }

    /// Looks up every name, failing on the first one that is not registered.
    pub fn resolve<'a, I>(&self, names: I) -> Result<Vec<NamedMetric>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        names
            .into_iter()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(|name| {
                self.get(name).ok_or_else(|| {
                    LungSightError::validation(
                        "metric",
                        format!("`{name}` is not registered (known: {})", self.names().join(", ")),
                    )
                })
            })
            .collect()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.metrics.keys().copied().collect()
    }

    pub fn all(&self) -> Vec<NamedMetric> {
        self.metrics.values().copied().collect()
    }
}
