use image::DynamicImage;
use std::io::Cursor;
use thiserror::Error;

/// Frames larger than this on either side are scaled down before OCR.
pub const MAX_FRAME_SIDE: u32 = 1280;

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("Failed to load image: {0}")]
    Load(#[from] image::ImageError),
    #[error("Failed to encode processed image: {0}")]
    Encode(String),
}

/// Process raw frame bytes (JPEG / PNG / BMP / …) and return normalized PNG bytes.
pub fn prepare_frame_from_bytes(data: &[u8]) -> Result<Vec<u8>, PreprocessError> {
    let img = image::load_from_memory(data)?;
    encode_as_png(normalize(img))
}

/// Bound the frame size and drop alpha / exotic pixel formats.
fn normalize(img: DynamicImage) -> DynamicImage {
    let img = if img.width() > MAX_FRAME_SIDE || img.height() > MAX_FRAME_SIDE {
        img.resize(MAX_FRAME_SIDE, MAX_FRAME_SIDE, image::imageops::FilterType::Lanczos3)
    } else {
        img
    };
    DynamicImage::ImageRgb8(img.to_rgb8())
}

fn encode_as_png(img: DynamicImage) -> Result<Vec<u8>, PreprocessError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| PreprocessError::Encode(e.to_string()))?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgba, RgbaImage};

    fn solid_rgba(width: u32, height: u32) -> DynamicImage {
        let img: RgbaImage = ImageBuffer::from_fn(width, height, |_, _| Rgba([10, 20, 30, 128]));
        DynamicImage::ImageRgba8(img)
    }

    #[test]
    fn normalize_drops_alpha() {
        let result = normalize(solid_rgba(8, 4));
        assert!(matches!(result, DynamicImage::ImageRgb8(_)));
        assert_eq!((result.width(), result.height()), (8, 4));
    }

    #[test]
    fn wide_frame_is_resized_preserving_aspect() {
        let result = normalize(solid_rgba(2560, 720));
        assert_eq!(result.width(), MAX_FRAME_SIDE);
        assert_eq!(result.height(), 360);
    }

    #[test]
    fn prepare_from_bytes_produces_png_header() {
        let mut png_bytes = Vec::new();
        solid_rgba(4, 4)
            .write_to(&mut Cursor::new(&mut png_bytes), image::ImageFormat::Png)
            .unwrap();
        let result = prepare_frame_from_bytes(&png_bytes).unwrap();
        assert_eq!(&result[..4], b"\x89PNG");
    }

    #[test]
    fn prepare_from_garbage_fails_to_load() {
        assert!(matches!(
            prepare_frame_from_bytes(b"definitely not an image"),
            Err(PreprocessError::Load(_))
        ));
    }
}
