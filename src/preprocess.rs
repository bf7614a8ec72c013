use image::{DynamicImage, RgbImage};
use ndarray::prelude::*;
use nshare::AsNdarray2;

use crate::imageops::{resize_to_model, to_luma601};

/// Turns a decoded raster into the `(1, 512, 512)` intensity tensor both models take.
///
/// Resize, BT.601 grayscale, scale to `[0, 1]`, leading batch axis. There is no
/// configuration; both inference units share this exact transform.
pub fn preprocess(image: &DynamicImage) -> Array3<f32> {
    preprocess_rgb(&resize_to_model(image))
}

/// Same as [`preprocess`] for an image that is already 8-bit RGB at model resolution.
pub fn preprocess_rgb(image: &RgbImage) -> Array3<f32> {
    let gray = to_luma601(image);
    gray.as_ndarray2()
        .mapv(|v| f32::from(v) / 255.0)
        .insert_axis(Axis(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imageops::MODEL_INPUT_SIZE;
    use image::{GrayImage, ImageBuffer, Luma, Rgb, Rgba, RgbaImage};

    const SIDE: usize = MODEL_INPUT_SIZE as usize;

    #[test]
    fn test_shape_and_range_for_various_inputs() {
        let inputs = vec![
            DynamicImage::ImageRgb8(RgbImage::from_fn(256, 256, |x, y| {
                Rgb([x as u8, y as u8, (x ^ y) as u8])
            })),
            DynamicImage::ImageLuma8(GrayImage::from_pixel(1000, 30, Luma([255]))),
            DynamicImage::ImageRgba8(RgbaImage::from_pixel(512, 512, Rgba([9, 9, 9, 0]))),
            DynamicImage::ImageLuma16(ImageBuffer::from_pixel(64, 640, Luma([u16::MAX / 2]))),
        ];

        for image in inputs {
            let tensor = preprocess(&image);
            assert_eq!(tensor.shape(), &[1, SIDE, SIDE]);
            assert!(tensor.iter().all(|v| (0.0..=1.0).contains(v)));
        }
    }

    #[test]
    fn test_mid_gray_normalizes_to_half() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(256, 256, Rgb([128, 128, 128])));
        let tensor = preprocess(&image);
        let expected = 128.0 / 255.0;
        assert!(tensor.iter().all(|v| (v - expected).abs() < 1e-6));
    }

    #[test]
    fn test_rows_follow_image_rows() {
        let image = RgbImage::from_fn(MODEL_INPUT_SIZE, MODEL_INPUT_SIZE, |_, y| {
            if y == 0 {
                Rgb([255, 255, 255])
            } else {
                Rgb([0, 0, 0])
            }
        });
        let tensor = preprocess_rgb(&image);
        assert_eq!(tensor[[0, 0, 17]], 1.0);
        assert_eq!(tensor[[0, 1, 17]], 0.0);
    }
}
