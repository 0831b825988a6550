use image::{imageops::FilterType, DynamicImage, ImageFormat};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::config::ThumbnailSize;
use crate::error::ThumbnailError;

/// Decode `source` and shrink it to fit within `size`
pub fn render_thumbnail(source: &Path, size: ThumbnailSize) -> Result<DynamicImage, ThumbnailError> {
    let img = image::open(source)?;

    // JPEG carries neither alpha nor a palette
    let img = DynamicImage::ImageRgb8(img.to_rgb8());

    Ok(fit_within(img, size))
}

/// Resize preserving aspect ratio; images already inside the box are kept as is
fn fit_within(img: DynamicImage, size: ThumbnailSize) -> DynamicImage {
    if img.width() <= size.width && img.height() <= size.height {
        return img;
    }
    img.resize(size.width, size.height, FilterType::Lanczos3)
}

/// Generate the thumbnail of `source` at `target`.
///
/// The JPEG is written to a temporary file next to `target` and renamed into
/// place, so a failed encode never leaves a partial thumbnail behind.
pub fn write_thumbnail(source: &Path, target: &Path, size: ThumbnailSize) -> Result<(), ThumbnailError> {
    let thumbnail = render_thumbnail(source, size)?;

    let dir = target.parent().unwrap_or(Path::new("."));
    let mut tmp = tempfile::Builder::new()
        .prefix(".thumb-")
        .suffix(".tmp")
        .tempfile_in(dir)?;

    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        thumbnail.write_to(&mut writer, ImageFormat::Jpeg)?;
        writer.flush()?;
    }

    tmp.persist(target)?;
    Ok(())
}
