use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::map::map_colors;

use crate::imageops::saturate_u8;

const WEIGHT_R: f64 = 0.299;
const WEIGHT_G: f64 = 0.587;
const WEIGHT_B: f64 = 0.114;

/// BT.601 luma of one pixel, rounded to 8 bits.
pub fn luma601(Rgb([r, g, b]): Rgb<u8>) -> u8 {
    saturate_u8(WEIGHT_R * f64::from(r) + WEIGHT_G * f64::from(g) + WEIGHT_B * f64::from(b))
}

/// Single intensity channel using BT.601 weights.
///
/// `image`'s own `to_luma8` uses Rec. 709 weights, which do not match what the
/// models saw in training.
pub fn to_luma601(image: &RgbImage) -> GrayImage {
    map_colors(image, |pixel| Luma([luma601(pixel)]))
}
