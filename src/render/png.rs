//! PNG output with a physical pixel density chunk, plus the tight crop.

use std::fs;
use std::path::Path;

use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, Rgb, RgbImage};

use crate::error::{HeatmapError, render_error};

const PNG_SIGNATURE_LEN: usize = 8;
/// Signature plus the IHDR chunk (length, type, 13 data bytes, CRC).
const IHDR_END: usize = PNG_SIGNATURE_LEN + 4 + 4 + 13 + 4;
const METERS_PER_INCH: f64 = 0.0254;

fn write_chunk(png: &mut Vec<u8>, chunk_type: &[u8; 4], data: &[u8]) {
    png.extend_from_slice(&(data.len() as u32).to_be_bytes());
    png.extend_from_slice(chunk_type);
    png.extend_from_slice(data);

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(chunk_type);
    hasher.update(data);
    png.extend_from_slice(&hasher.finalize().to_be_bytes());
}

/// Pixels per meter for a DPI value, as stored in `pHYs`.
pub fn pixels_per_meter(dpi: u32) -> u32 {
    (dpi as f64 / METERS_PER_INCH).round() as u32
}

/// Inserts a `pHYs` chunk right after IHDR.
pub fn insert_phys(png: &[u8], dpi: u32) -> Result<Vec<u8>, HeatmapError> {
    if png.len() < IHDR_END || &png[12..16] != b"IHDR" {
        return Err(HeatmapError::Render("encoded PNG has no IHDR chunk".into()));
    }
    let ppm = pixels_per_meter(dpi).to_be_bytes();
    let mut data = [0u8; 9];
    data[..4].copy_from_slice(&ppm);
    data[4..8].copy_from_slice(&ppm);
    data[8] = 1; // unit: meter

    let mut out = Vec::with_capacity(png.len() + 21);
    out.extend_from_slice(&png[..IHDR_END]);
    write_chunk(&mut out, b"pHYs", &data);
    out.extend_from_slice(&png[IHDR_END..]);
    Ok(out)
}

pub fn encode_png(image: &RgbImage, dpi: u32) -> Result<Vec<u8>, HeatmapError> {
    let mut bytes = Vec::new();
    PngEncoder::new(&mut bytes).write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        ExtendedColorType::Rgb8,
    )?;
    insert_phys(&bytes, dpi)
}

/// Writes `image` to `path`, replacing any existing file. PNG (or no
/// extension) carries the DPI; other formats go through `image` as-is.
pub fn write_image(image: &RgbImage, path: &Path, dpi: u32) -> Result<usize, HeatmapError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|source| HeatmapError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let is_png = path
        .extension()
        .and_then(|e| e.to_str())
        .is_none_or(|e| e.eq_ignore_ascii_case("png"));

    if is_png {
        let bytes = encode_png(image, dpi)?;
        fs::write(path, &bytes).map_err(|source| HeatmapError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(bytes.len())
    } else {
        image.save(path)?;
        fs::metadata(path)
            .map(|m| m.len() as usize)
            .map_err(render_error)
    }
}

/// Crops to the bounding box of non-`background` pixels plus `pad` pixels.
pub fn tight_crop(image: &RgbImage, background: Rgb<u8>, pad: u32) -> RgbImage {
    let (w, h) = image.dimensions();
    let mut min_x = u32::MAX;
    let mut min_y = u32::MAX;
    let mut max_x = 0u32;
    let mut max_y = 0u32;

    for (x, y, px) in image.enumerate_pixels() {
        if *px != background {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
    }

    if min_x > max_x || min_y > max_y {
        return image.clone();
    }

    let x0 = min_x.saturating_sub(pad);
    let y0 = min_y.saturating_sub(pad);
    let x1 = (max_x + pad).min(w - 1);
    let y1 = (max_y + pad).min(h - 1);
    tracing::debug!(x0, y0, x1, y1, "tight crop");
    image::imageops::crop_imm(image, x0, y0, x1 - x0 + 1, y1 - y0 + 1).to_image()
}
