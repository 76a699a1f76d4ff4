// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Image and pose file I/O plus the base64 PNG encoding used on the wire.

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use image::{DynamicImage, ImageFormat};

use crate::error::{PoseError, Result};
use crate::pose::PoseDocument;

const DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// Encode an image as PNG bytes.
///
/// # Errors
///
/// Returns [`PoseError::ImageDecodeError`] if the encoder rejects the image.
pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

/// Encode an image as a `data:image/png;base64,` URL.
///
/// # Errors
///
/// Returns [`PoseError::ImageDecodeError`] if PNG encoding fails.
pub fn encode_image_base64(image: &DynamicImage) -> Result<String> {
    Ok(format!("{DATA_URL_PREFIX}{}", STANDARD.encode(encode_png(image)?)))
}

/// Decode a base64 image, with or without a `data:<mime>;base64,` prefix.
///
/// # Errors
///
/// Returns [`PoseError::ImageDecodeError`] for invalid base64 or undecodable image bytes.
pub fn decode_image_base64(encoded: &str) -> Result<DynamicImage> {
    let payload = match encoded.split_once(";base64,") {
        Some((head, data)) if head.starts_with("data:") => data,
        _ => encoded,
    };
    let bytes = STANDARD.decode(payload.trim())?;
    Ok(image::load_from_memory(&bytes)?)
}

/// Load an image from disk.
///
/// # Errors
///
/// Returns [`PoseError::ImageDecodeError`] if the file is missing or not a supported image.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<DynamicImage> {
    let path = path.as_ref();
    image::open(path)
        .map_err(|e| PoseError::ImageDecodeError(format!("{}: {e}", path.display())))
}

/// Save an image, creating parent directories. The format follows the extension.
///
/// # Errors
///
/// Returns [`PoseError::Io`] if the directory cannot be created, or
/// [`PoseError::ImageDecodeError`] if encoding fails.
pub fn save_image<P: AsRef<Path>>(image: &DynamicImage, path: P) -> Result<()> {
    let path = path.as_ref();
    ensure_parent(path)?;
    image.save(path)?;
    Ok(())
}

/// Load a pose JSON document.
///
/// # Errors
///
/// [`PoseError::Io`] if the file cannot be read, plus every error of
/// [`PoseDocument::from_json`].
pub fn load_pose<P: AsRef<Path>>(path: P, schema_id: Option<&str>) -> Result<PoseDocument> {
    let json = fs::read_to_string(path)?;
    PoseDocument::from_json(schema_id, &json)
}

/// Save a pose document as JSON, creating parent directories.
///
/// # Errors
///
/// Returns [`PoseError::Io`] on write failure.
pub fn save_pose<P: AsRef<Path>>(doc: &PoseDocument, path: P) -> Result<()> {
    let path = path.as_ref();
    ensure_parent(path)?;
    fs::write(path, doc.to_json()?)?;
    Ok(())
}

/// Find the next free run directory (`edit`, `edit2`, `edit3`, ...) under `base`.
#[must_use]
pub fn find_next_run_dir<P: AsRef<Path>>(base: P, prefix: &str) -> PathBuf {
    let base = base.as_ref();
    let first = base.join(prefix);
    if !first.exists() {
        return first;
    }
    (2..)
        .map(|i| base.join(format!("{prefix}{i}")))
        .find(|p| !p.exists())
        .unwrap_or(first)
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn sample() -> DynamicImage {
        let mut img = RgbaImage::from_pixel(4, 3, Rgba([0, 0, 0, 0]));
        img.put_pixel(1, 2, Rgba([10, 20, 30, 255]));
        DynamicImage::ImageRgba8(img)
    }

    #[test]
    fn test_base64_png_preserves_pixels() {
        let encoded = encode_image_base64(&sample()).unwrap();
        assert!(encoded.starts_with("data:image/png;base64,"));

        let decoded = decode_image_base64(&encoded).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (4, 3));
        assert_eq!(decoded.get_pixel(1, 2), &Rgba([10, 20, 30, 255]));
        assert_eq!(decoded.get_pixel(0, 0)[3], 0);
    }

    #[test]
    fn test_decode_without_prefix() {
        let bytes = encode_png(&sample()).unwrap();
        let decoded = decode_image_base64(&STANDARD.encode(bytes)).unwrap();
        assert_eq!(decoded.width(), 4);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            decode_image_base64("!!!not base64!!!"),
            Err(PoseError::ImageDecodeError(_))
        ));
        assert!(matches!(
            decode_image_base64("data:image/png;base64,aGVsbG8="),
            Err(PoseError::ImageDecodeError(_))
        ));
    }

    #[test]
    fn test_find_next_run_dir() {
        let tmp = tempfile::tempdir().unwrap();
        assert_eq!(find_next_run_dir(tmp.path(), "edit"), tmp.path().join("edit"));
        fs::create_dir(tmp.path().join("edit")).unwrap();
        fs::create_dir(tmp.path().join("edit2")).unwrap();
        assert_eq!(find_next_run_dir(tmp.path(), "edit"), tmp.path().join("edit3"));
    }

    #[test]
    fn test_save_image_creates_parents() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("a/b/out.png");
        save_image(&sample(), &path).unwrap();
        assert_eq!(load_image(&path).unwrap().width(), 4);
    }
}
