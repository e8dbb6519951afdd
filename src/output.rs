//! PNG output for the command-line tool

use std::path::Path;

use image::imageops::FilterType;
use image::RgbaImage;
use thiserror::Error;

/// Error type for output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

/// Save an RGBA image to a PNG file, creating parent directories as needed.
pub fn save_png(image: &RgbaImage, path: &Path) -> Result<(), OutputError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    image.save(path)?;
    Ok(())
}

/// Scale an image by an integer factor with nearest-neighbor interpolation,
/// keeping pixel edges crisp.
pub fn scale_image(image: RgbaImage, factor: u8) -> RgbaImage {
    if factor <= 1 {
        return image;
    }
    let (w, h) = image.dimensions();
    image::imageops::resize(
        &image,
        w * u32::from(factor),
        h * u32::from(factor),
        FilterType::Nearest,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out.png");

        let mut image = RgbaImage::new(2, 2);
        image.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        save_png(&image, &path).unwrap();

        let reloaded = image::open(&path).unwrap().to_rgba8();
        assert_eq!(reloaded.dimensions(), (2, 2));
        assert_eq!(*reloaded.get_pixel(0, 0), Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn test_scale_nearest() {
        let mut image = RgbaImage::new(1, 1);
        image.put_pixel(0, 0, Rgba([0, 255, 0, 255]));

        let scaled = scale_image(image, 4);
        assert_eq!(scaled.dimensions(), (4, 4));
        assert_eq!(*scaled.get_pixel(3, 3), Rgba([0, 255, 0, 255]));
    }

    #[test]
    fn test_scale_factor_one_is_identity() {
        let image = RgbaImage::new(3, 2);
        assert_eq!(scale_image(image, 1).dimensions(), (3, 2));
    }
}
