//! Cover-art cache: user-supplied art probing, catalogue downloads, and
//! format/size normalisation.
//!
//! A path handed out by this module always points at a file that exists
//! and decodes as the format its extension claims.

use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use image::ImageFormat;

use crate::error::ScanError;

/// Largest dimension of a stored cover, in pixels.
pub const DEFAULT_MAX_WIDTH: u32 = 200;

/// Extensions probed for user-supplied art, and the formats covers are
/// stored in. Anything else is coerced to PNG on normalisation.
const PROBE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "gif"];

/// Probe the cover-art directory for a file matching any candidate stem.
///
/// A file that matches by name but fails to decode is deleted and probing
/// continues, so stale junk can't shadow a good cover forever.
pub fn resolve_existing(cover_art_dir: &Path, stems: &[String]) -> Option<PathBuf> {
    for stem in stems {
        for ext in PROBE_EXTENSIONS {
            let path = cover_art_dir.join(format!("{stem}.{ext}"));
            if !path.is_file() {
                continue;
            }
            if decodes_as_image(&path) {
                return Some(path);
            }
            log::warn!("removing unreadable cover art {}", path.display());
            let _ = std::fs::remove_file(&path);
        }
    }
    None
}

/// Content-based validity check, so a lying extension can't mask a
/// decodable payload or vice versa.
fn decodes_as_image(path: &Path) -> bool {
    match std::fs::read(path) {
        Ok(bytes) => image::load_from_memory(&bytes).is_ok(),
        Err(_) => false,
    }
}

/// Download a cover to `dest`, atomically: the payload lands in a
/// temporary sibling, must decode as an image, and is then renamed into
/// place. On any failure nothing is left behind.
pub fn download_and_store(
    http: &reqwest::blocking::Client,
    url: &str,
    dest: &Path,
) -> Result<(), ScanError> {
    let resp = http.get(url).send()?.error_for_status()?;
    let bytes = resp.bytes()?;

    // Verify before anything touches the disk.
    image::load_from_memory(&bytes)?;

    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp = temp_sibling(dest);
    std::fs::write(&tmp, &bytes)?;
    std::fs::rename(&tmp, dest)?;
    Ok(())
}

/// Repair and rescale a cover in place.
///
/// Detects the real payload format (JPEG/PNG/GIF, anything else becomes
/// PNG), renames the file when its extension disagrees, and downscales
/// with Lanczos3 so the larger dimension is at most `max_width`. Returns
/// the final path, which may differ from the input. A file that cannot be
/// decoded is deleted before the error is returned.
pub fn normalise(path: &Path, max_width: u32) -> Result<PathBuf, ScanError> {
    let bytes = std::fs::read(path)?;
    let target = match image::guess_format(&bytes) {
        Ok(ImageFormat::Jpeg) => ImageFormat::Jpeg,
        Ok(ImageFormat::Gif) => ImageFormat::Gif,
        _ => ImageFormat::Png,
    };

    let img = match image::load_from_memory(&bytes) {
        Ok(img) => img,
        Err(e) => {
            let _ = std::fs::remove_file(path);
            return Err(e.into());
        }
    };

    let needs_resize = img.width().max(img.height()) > max_width;
    let extension_ok = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| extension_matches(&e.to_lowercase(), target))
        .unwrap_or(false);

    if !needs_resize && extension_ok {
        return Ok(path.to_path_buf());
    }

    let img = if needs_resize {
        // resize() preserves aspect ratio within the bounding box.
        img.resize(max_width, max_width, FilterType::Lanczos3)
    } else {
        img
    };

    let final_path = path.with_extension(canonical_extension(target));
    let tmp = temp_sibling(&final_path);
    img.save_with_format(&tmp, target)?;
    std::fs::rename(&tmp, &final_path)?;
    if final_path != path {
        let _ = std::fs::remove_file(path);
    }

    Ok(final_path)
}

fn extension_matches(ext: &str, format: ImageFormat) -> bool {
    match format {
        ImageFormat::Jpeg => ext == "jpg" || ext == "jpeg",
        ImageFormat::Png => ext == "png",
        ImageFormat::Gif => ext == "gif",
        _ => false,
    }
}

fn canonical_extension(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Jpeg => "jpg",
        ImageFormat::Gif => "gif",
        _ => "png",
    }
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    path.with_file_name(name)
}
