use image::{DynamicImage, ImageBuffer, Luma, RgbImage};
use ndarray::prelude::*;

use crate::{
    errors::{LungSightError, Result},
    imageops::{self, OverlayStyle, MODEL_INPUT_SIZE},
    preprocess::preprocess,
    traits::TensorModel,
};

/// Lung segmentation: one model handle, a per-pixel mask out.
pub struct Segmenter<M: TensorModel> {
    model: M,
}

impl<M: TensorModel> Segmenter<M> {
    pub const fn new(model: M) -> Self {
        Self { model }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Foreground probability per pixel, `512 x 512`, as the model returns it.
    pub fn predict_probabilities(&self, image: &DynamicImage) -> Result<Array2<f32>> {
        let output = self.model.predict(preprocess(image).view())?;
        squeeze_mask(output)
    }

    /// Renderable mask: probabilities scaled to 8 bits and replicated into three channels.
    pub fn predict(&self, image: &DynamicImage) -> Result<RgbImage> {
        let probabilities = self.predict_probabilities(image)?;
        mask_to_rgb(probabilities.view())
    }

    /// Overlays `mask` onto `image`; does not touch the model.
    pub fn colored_mask(
        image: &RgbImage,
        mask: &RgbImage,
        style: &OverlayStyle,
    ) -> Result<RgbImage> {
        imageops::colored_mask(image, mask, style)
    }
}

/// Drops the batch axis and any singleton channel axis of a segmentation output.
pub fn squeeze_mask(output: ArrayD<f32>) -> Result<Array2<f32>> {
    let side = MODEL_INPUT_SIZE as usize;
    let shape = output.shape().to_vec();
    if output.len() != side * side {
        return Err(LungSightError::unexpected_shape("segmentation output", &shape));
    }
    let mask = output
        .as_standard_layout()
        .into_owned()
        .into_shape_with_order((side, side))?;
    Ok(mask)
}

/// `[0, 1]` probabilities to an 8-bit grayscale-as-RGB raster.
///
/// Casting truncates toward zero like the training-side export; values above one
/// saturate at 255 and negatives or NaN become 0.
pub fn mask_to_rgb(mask: ArrayView2<f32>) -> Result<RgbImage> {
    let (height, width) = mask.dim();
    let raw = mask
        .as_standard_layout()
        .iter()
        .map(|&v| (v * 255.0) as u8)
        .collect::<Vec<u8>>();
    let gray: ImageBuffer<Luma<u8>, Vec<u8>> =
        ImageBuffer::from_raw(width as u32, height as u32, raw).ok_or_else(|| {
            LungSightError::validation("mask", "pixel buffer does not match mask dimensions")
        })?;
    Ok(DynamicImage::ImageLuma8(gray).to_rgb8())
}
