use image::{ImageBuffer, Rgb, RgbImage};

use crate::errors::{LungSightError, Result};
use crate::imageops::{luma601, saturate_u8};

/// Magenta; symmetric in R and B, so it reads the same in RGB and BGR order.
pub const HIGHLIGHT: Rgb<u8> = Rgb([255, 20, 255]);

const BACKGROUND: Rgb<u8> = Rgb([0, 0, 0]);

/// How a mask is painted onto the image it was predicted from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayStyle {
    pub color: Rgb<u8>,
    pub image_weight: f64,
    pub mask_weight: f64,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            color: HIGHLIGHT,
            image_weight: 0.6,
            mask_weight: 0.4,
        }
    }
}

impl OverlayStyle {
    pub const fn with_color(mut self, color: Rgb<u8>) -> Self {
        self.color = color;
        self
    }

    fn paint(&self, mask_pixel: Rgb<u8>) -> Rgb<u8> {
        // zero luma is background, even when a channel is faintly set
        if luma601(mask_pixel) == 0 {
            BACKGROUND
        } else {
            self.color
        }
    }

    fn blend(&self, image_pixel: Rgb<u8>, painted: Rgb<u8>) -> Rgb<u8> {
        let Rgb([ir, ig, ib]) = image_pixel;
        let Rgb([mr, mg, mb]) = painted;
        let mix = |i: u8, m: u8| {
            saturate_u8(self.image_weight * f64::from(i) + self.mask_weight * f64::from(m))
        };
        Rgb([mix(ir, mr), mix(ig, mg), mix(ib, mb)])
    }
}

/// Paints every foreground pixel of `mask` with the style color and alpha-blends
/// the result onto `image`.
///
/// An all-zero mask still goes through the blend and yields `image_weight * image`.
pub fn colored_mask(image: &RgbImage, mask: &RgbImage, style: &OverlayStyle) -> Result<RgbImage> {
    if image.dimensions() != mask.dimensions() {
        let (iw, ih) = image.dimensions();
        let (mw, mh) = mask.dimensions();
        return Err(LungSightError::validation(
            "mask",
            format!("is {mw}x{mh}, image is {iw}x{ih}"),
        ));
    }

    let pixels = image
        .pixels()
        .zip(mask.pixels())
        .flat_map(|(&image_pixel, &mask_pixel)| {
            style.blend(image_pixel, style.paint(mask_pixel)).0
        })
        .collect::<Vec<u8>>();

    ImageBuffer::from_raw(image.width(), image.height(), pixels).ok_or_else(|| {
        LungSightError::validation("overlay", "pixel buffer does not match image dimensions")
    })
}
