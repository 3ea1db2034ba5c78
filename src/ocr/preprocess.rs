use image::{GrayImage, ImageBuffer, Luma, RgbaImage};

use crate::automation::config::RelativeRect;

/// Converts a region to black text on white for Tesseract.
///
/// Pixels whose ITU-R BT.601 luma exceeds the threshold are treated as (white) HUD text
/// and become black; everything else becomes white background.
pub fn binarize(img: &RgbaImage, threshold: u8) -> GrayImage {
    let (width, height) = img.dimensions();
    let mut output = ImageBuffer::new(width, height);

    for (x, y, pixel) in img.enumerate_pixels() {
        let luma = 0.299 * pixel[0] as f32 + 0.587 * pixel[1] as f32 + 0.114 * pixel[2] as f32;
        let value = if luma > threshold as f32 { 0u8 } else { 255u8 };
        output.put_pixel(x, y, Luma([value]));
    }

    output
}

/// Crops a sub-region from an image using relative coordinates.
///
/// Converts the relative rect (0.0–1.0) to absolute pixel coordinates,
/// clamps to image bounds, and returns the cropped sub-image.
pub fn crop_region(img: &RgbaImage, region: &RelativeRect) -> RgbaImage {
    let (w, h) = img.dimensions();

    let x0 = ((region.x.max(0.0) * w as f32) as u32).min(w);
    let y0 = ((region.y.max(0.0) * h as f32) as u32).min(h);
    let rw = ((region.width.max(0.0) * w as f32) as u32).min(w - x0);
    let rh = ((region.height.max(0.0) * h as f32) as u32).min(h - y0);

    image::imageops::crop_imm(img, x0, y0, rw, rh).to_image()
}
