//! QR code rendering for pairing payloads.

use qrcode::{Color, EcLevel, QrCode};
use wagate_core::error::GatewayError;

const MODULE_SIZE: u32 = 8;
const QUIET_ZONE: u32 = 4;

fn encode(payload: &str) -> Result<QrCode, GatewayError> {
    QrCode::with_error_correction_level(payload.as_bytes(), EcLevel::L)
        .map_err(|e| GatewayError::Collaborator(format!("QR generation failed: {e}")))
}

/// Render a pairing payload as PNG bytes for the `/qr` page.
pub fn generate_qr_image(payload: &str) -> Result<Vec<u8>, GatewayError> {
    use image::{ImageBuffer, Luma};

    let code = encode(payload)?;
    let modules = code.width() as u32;
    let img_size = (modules + QUIET_ZONE * 2) * MODULE_SIZE;

    let img = ImageBuffer::from_fn(img_size, img_size, |x, y| {
        let (cx, cy) = (x / MODULE_SIZE, y / MODULE_SIZE);
        if cx < QUIET_ZONE || cy < QUIET_ZONE {
            return Luma([255u8]);
        }
        let (mx, my) = (cx - QUIET_ZONE, cy - QUIET_ZONE);
        if mx >= modules || my >= modules {
            return Luma([255u8]);
        }
        match code[(mx as usize, my as usize)] {
            Color::Dark => Luma([0u8]),
            Color::Light => Luma([255u8]),
        }
    });

    let mut buf = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Png)
        .map_err(|e| GatewayError::Collaborator(format!("PNG encoding failed: {e}")))?;

    Ok(buf.into_inner())
}

/// Render a pairing payload for the terminal using Unicode half-blocks.
///
/// Two module rows are packed into one text line, so the output is roughly
/// square in a typical terminal font.
pub fn generate_qr_terminal(payload: &str) -> Result<String, GatewayError> {
    let code = encode(payload)?;
    let width = code.width();
    let colors = code.into_colors();
    let dark = |row: usize, col: usize| row < width && colors[row * width + col] == Color::Dark;

    let mut out = String::with_capacity((width + 1) * width.div_ceil(2));
    for row in (0..width).step_by(2) {
        for col in 0..width {
            out.push(match (dark(row, col), dark(row + 1, col)) {
                (true, true) => '█',
                (true, false) => '▀',
                (false, true) => '▄',
                (false, false) => ' ',
            });
        }
        out.push('\n');
    }
    Ok(out)
}
