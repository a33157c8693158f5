use crate::render::ascii::CharGrid;
use std::path::{Path, PathBuf};

pub const DEFAULT_TEXT_FILE: &str = "ASCII.txt";
pub const DEFAULT_IMAGE_FILE: &str = "ASCII.jpg";

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("failed writing '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed writing image '{path}': {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("'{0}' does not name a supported image format")]
    UnsupportedFormat(PathBuf),
    #[error("capture holds {actual} bytes, expected {expected} for {width}x{height}")]
    BufferSize {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
}

pub type Result<T> = std::result::Result<T, ExportError>;

/// Plain-text form of the rendered grid, one line per row.
pub fn export_text(grid: &CharGrid) -> String {
    grid.to_text()
}

pub fn save_text(path: &Path, text: &str) -> Result<()> {
    ensure_parent(path)?;
    std::fs::write(path, text).map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    log::info!("Saved ASCII text to {}", path.display());
    Ok(())
}

/// Writes an RGBA8 capture; the format follows the file extension. Formats
/// without alpha (JPEG) get the color channels only.
pub fn save_capture(path: &Path, width: u32, height: u32, rgba: &[u8]) -> Result<()> {
    let expected = width as usize * height as usize * 4;
    if rgba.len() != expected {
        return Err(ExportError::BufferSize {
            width,
            height,
            expected,
            actual: rgba.len(),
        });
    }
    let format = image::ImageFormat::from_path(path)
        .map_err(|_| ExportError::UnsupportedFormat(path.to_path_buf()))?;
    ensure_parent(path)?;

    let image_error = |source| ExportError::Image {
        path: path.to_path_buf(),
        source,
    };
    if format == image::ImageFormat::Jpeg {
        let buffer = image::RgbaImage::from_raw(width, height, rgba.to_vec()).ok_or(
            ExportError::BufferSize {
                width,
                height,
                expected,
                actual: rgba.len(),
            },
        )?;
        image::DynamicImage::ImageRgba8(buffer)
            .to_rgb8()
            .save_with_format(path, format)
            .map_err(image_error)?;
    } else {
        image::save_buffer_with_format(path, rgba, width, height, image::ColorType::Rgba8, format)
            .map_err(image_error)?;
    }
    log::info!("Saved screenshot to {} ({}x{})", path.display(), width, height);
    Ok(())
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|source| ExportError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
    }
    Ok(())
}
