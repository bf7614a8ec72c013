use std::fmt;

use image::DynamicImage;

use crate::{
    errors::{LungSightError, Result},
    preprocess::preprocess,
    traits::TensorModel,
};

/// Scores above this are read as tuberculosis present.
pub const POSITIVE_THRESHOLD: f32 = 0.5;

/// Tuberculosis screening: one model handle, one probability out.
pub struct Classifier<M: TensorModel> {
    model: M,
}

impl<M: TensorModel> Classifier<M> {
    pub const fn new(model: M) -> Self {
        Self { model }
    }

    /// Probability of the positive class. Not clamped.
    pub fn predict(&self, image: &DynamicImage) -> Result<f32> {
        let output = self.model.predict(preprocess(image).view())?;
        let mut values = output.iter().copied();
        match (values.next(), values.next()) {
            (Some(score), None) => Ok(score),
            _ => Err(LungSightError::unexpected_shape(
                "classification output",
                output.shape(),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Label {
    Positive,
    Negative,
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Positive => f.write_str("Positive"),
            Label::Negative => f.write_str("Negative"),
        }
    }
}

/// The decision taken on a classification score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Diagnosis {
    pub score: f32,
    pub label: Label,
}

impl Diagnosis {
    pub fn from_score(score: f32) -> Self {
        let label = if score > POSITIVE_THRESHOLD {
            Label::Positive
        } else {
            Label::Negative
        };
        Self { score, label }
    }

    /// Confidence in the chosen label, in percent.
    pub fn confidence_percent(&self) -> f64 {
        let score = f64::from(self.score);
        match self.label {
            Label::Positive => score * 100.0,
            Label::Negative => (1.0 - score) * 100.0,
        }
    }

    pub fn label_text(&self) -> String {
        format!("Tuberculosis: {}", self.label)
    }

    /// Confidence with two decimals and a percent sign, e.g. `90.00%`.
    pub fn confidence_text(&self) -> String {
        format!("{:.2}%", self.confidence_percent())
    }
}

impl fmt::Display for Diagnosis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (confidence {})", self.label_text(), self.confidence_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::ConstantModel;
    use image::RgbImage;

    #[test]
    fn test_threshold_is_strict() {
        assert_eq!(Diagnosis::from_score(0.5).label, Label::Negative);
        assert_eq!(Diagnosis::from_score(0.500_000_1).label, Label::Positive);
    }

    #[test]
    fn test_confidence_formatting() {
        let positive = Diagnosis::from_score(0.9);
        assert_eq!(positive.label, Label::Positive);
        assert_eq!(positive.confidence_text(), "90.00%");
        assert_eq!(positive.label_text(), "Tuberculosis: Positive");

        let negative = Diagnosis::from_score(0.2);
        assert_eq!(negative.label, Label::Negative);
        assert_eq!(negative.confidence_text(), "80.00%");
        assert_eq!(
            negative.to_string(),
            "Tuberculosis: Negative (confidence 80.00%)"
        );
    }

    #[test]
    fn test_predict_squeezes_scalar() -> Result<()> {
        let image = DynamicImage::ImageRgb8(RgbImage::new(64, 64));
        for shape in [vec![1, 1], vec![1], vec![]] {
            let classifier = Classifier::new(ConstantModel::new(shape, 0.73));
            assert_eq!(classifier.predict(&image)?, 0.73);
        }
        Ok(())
    }

    #[test]
    fn test_predict_does_not_clamp() -> Result<()> {
        let image = DynamicImage::ImageRgb8(RgbImage::new(8, 8));
        let classifier = Classifier::new(ConstantModel::new(vec![1, 1], 1.5));
        assert_eq!(classifier.predict(&image)?, 1.5);
        Ok(())
    }

    #[test]
    fn test_predict_rejects_vector_output() {
        let image = DynamicImage::ImageRgb8(RgbImage::new(8, 8));
        let classifier = Classifier::new(ConstantModel::new(vec![1, 2], 0.5));
        assert!(matches!(
            classifier.predict(&image),
            Err(LungSightError::Model { .. })
        ));
    }
}
