pub mod grayscale;
pub mod overlay;

pub use grayscale::{luma601, to_luma601};
pub use overlay::{colored_mask, OverlayStyle, HIGHLIGHT};

use image::{imageops, imageops::FilterType, DynamicImage, RgbImage};
use num_traits::{clamp, NumCast};

/// Side length every pipeline stage works at.
pub const MODEL_INPUT_SIZE: u32 = 512;

/// Bilinear, the default interpolation of the library the models were trained with.
pub const RESIZE_FILTER: FilterType = FilterType::Triangle;

/// Converts any decoded raster to 8-bit RGB at the fixed pipeline resolution.
pub fn resize_to_model(image: &DynamicImage) -> RgbImage {
    let rgb = image.to_rgb8();
    if rgb.dimensions() == (MODEL_INPUT_SIZE, MODEL_INPUT_SIZE) {
        return rgb;
    }
    imageops::resize(&rgb, MODEL_INPUT_SIZE, MODEL_INPUT_SIZE, RESIZE_FILTER)
}

/// Rounds to nearest and saturates into the 8-bit range.
pub fn saturate_u8(value: f64) -> u8 {
    <u8 as NumCast>::from(clamp(value.round(), 0.0, 255.0)).unwrap_or(0)
}
