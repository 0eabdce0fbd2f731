use std::{fs, path::Path};

use image::{codecs::jpeg::JpegEncoder, DynamicImage, ImageFormat};
use shared::domain::CapturedImage;

use crate::CaptureError;

const JPEG_MIME: &str = "image/jpeg";

/// Encodes a frame as a JPEG data URL. Alpha is dropped the way a canvas export does.
pub fn encode_frame(frame: &DynamicImage, quality: u8) -> Result<CapturedImage, CaptureError> {
    let quality = quality.clamp(1, 100);
    let rgb = frame.to_rgb8();
    let mut bytes = Vec::new();
    rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut bytes, quality))?;
    Ok(CapturedImage::from_bytes(JPEG_MIME, &bytes))
}

/// Reads an image file verbatim into a data URL tagged with its MIME type.
pub fn encode_file(path: &Path) -> Result<CapturedImage, CaptureError> {
    let bytes = read(path)?;
    let mime = image_mime(path, &bytes)?;
    Ok(CapturedImage::from_bytes(&mime, &bytes))
}

/// Decodes an image file and re-encodes a bounded thumbnail for display.
pub fn preview_file(path: &Path, max_dimension: u32) -> Result<CapturedImage, CaptureError> {
    let bytes = read(path)?;
    image_mime(path, &bytes)?;
    let decoded = image::load_from_memory(&bytes)?;
    let thumbnail = if decoded.width().max(decoded.height()) > max_dimension {
        decoded.thumbnail(max_dimension, max_dimension)
    } else {
        decoded
    };
    encode_frame(&thumbnail, crate::DEFAULT_JPEG_QUALITY)
}

fn read(path: &Path) -> Result<Vec<u8>, CaptureError> {
    fs::read(path).map_err(|source| CaptureError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn image_mime(path: &Path, bytes: &[u8]) -> Result<String, CaptureError> {
    if let Some(guess) = mime_guess::from_path(path).first() {
        if guess.type_() == mime_guess::mime::IMAGE {
            return Ok(guess.essence_str().to_string());
        }
        return Err(CaptureError::NotAnImage {
            path: path.to_path_buf(),
            mime: guess.essence_str().to_string(),
        });
    }

    image::guess_format(bytes)
        .map(|format: ImageFormat| format.to_mime_type().to_string())
        .map_err(|_| CaptureError::NotAnImage {
            path: path.to_path_buf(),
            mime: "unknown".to_string(),
        })
}
