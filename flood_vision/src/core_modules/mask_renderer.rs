// THEORY:
// The `mask_renderer` draws a `DamageMask` as a transparent PNG overlay on the same
// pixel grid: damaged cells are opaque highlight, everything else is fully
// transparent, so the overlay can be laid over any basemap of the window.
//
// Rendering must be reproducible. The RGBA buffer is a pure function of the mask
// and the PNG encoder runs with fixed settings, so the same mask always yields
// byte-identical output and overlays can be regenerated and compared by pixel-diff.

use crate::core_modules::damage_mask::{DamageMask, MaskClass};
use crate::error::Result;
use image::ImageEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};

pub type Rgba = [u8; 4];

/// Opaque red used for damaged cells.
pub const HIGHLIGHT: Rgba = [0xFF, 0x00, 0x00, 0xFF];
pub const TRANSPARENT: Rgba = [0x00, 0x00, 0x00, 0x00];
pub const PNG_CONTENT_TYPE: &str = "image/png";

const CHANNELS: usize = 4;

/// A rendered overlay, PNG encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayImage {
    pub width: u32,
    pub height: u32,
    pub png: Vec<u8>,
}

/// The raw RGBA8 buffer for a mask, row-major.
pub fn rgba_buffer(mask: &DamageMask) -> Vec<u8> {
    let mut buffer = Vec::with_capacity(mask.total_count() * CHANNELS);
    for cell in mask.cells() {
        let color = match cell {
            MaskClass::Damaged => HIGHLIGHT,
            MaskClass::Unchanged | MaskClass::NoData => TRANSPARENT,
        };
        buffer.extend_from_slice(&color);
    }
    buffer
}

pub fn render(mask: &DamageMask) -> Result<OverlayImage> {
    let buffer = rgba_buffer(mask);
    let png = encode_png(mask.width(), mask.height(), &buffer)?;
    Ok(OverlayImage {
        width: mask.width(),
        height: mask.height(),
        png,
    })
}

fn encode_png(width: u32, height: u32, buffer: &[u8]) -> Result<Vec<u8>> {
    let mut output = Vec::new();
    let encoder = PngEncoder::new_with_quality(&mut output, CompressionType::Default, FilterType::NoFilter);
    encoder.write_image(buffer, width, height, image::ExtendedColorType::Rgba8)?;
    Ok(output)
}
