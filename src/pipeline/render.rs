//! PDF rasterisation: render selected pages to `DynamicImage` via pdfium.
//!
//! Everything here is blocking. pdfium keeps thread-local state and is not
//! safe to drive from async code, so callers run these functions inside
//! `tokio::task::spawn_blocking` (see [`crate::pipeline::extract`]).
//!
//! ## Why cap pixels as well as DPI?
//!
//! Page sizes vary wildly: an A0 poster at 300 DPI would produce a
//! 10,000 × 14,000 px image. `max_rendered_pixels` caps the longest edge
//! regardless of physical size, keeping memory bounded while ordinary A4
//! pages still render close to the requested DPI.

use crate::config::PageSelection;
use crate::error::ExtractionError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// PDF user space is 72 points per inch.
const POINTS_PER_INCH: f32 = 72.0;

/// Bind to a pdfium shared library.
///
/// Lookup order: `lib_path` (a directory or the library file itself), then
/// `PDFIUM_LIB_PATH`, then the working directory, then the system library.
pub fn bind_pdfium(lib_path: Option<&Path>) -> Result<Pdfium, ExtractionError> {
    let env_path = std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from);
    let candidates = lib_path
        .map(Path::to_path_buf)
        .into_iter()
        .chain(env_path)
        .chain(std::iter::once(PathBuf::from("./")));

    let mut last_err = String::from("no pdfium library found");
    for candidate in candidates {
        let library = if candidate.is_dir() {
            let dir = candidate.to_string_lossy().into_owned();
            PathBuf::from(Pdfium::pdfium_platform_library_name_at_path(&dir))
        } else {
            candidate
        };
        let library = library.to_string_lossy().into_owned();
        match Pdfium::bind_to_library(&library) {
            Ok(bindings) => {
                debug!("Bound pdfium from {}", library);
                return Ok(Pdfium::new(bindings));
            }
            Err(e) => last_err = format!("{}: {:?}", library, e),
        }
    }

    Pdfium::bind_to_system_library()
        .map(Pdfium::new)
        .map_err(|e| ExtractionError::PdfiumBindingFailed(format!("{last_err}; system: {e:?}")))
}

/// Render the selected pages of `pdf_path`.
///
/// Returns `(page_index_0based, image)` pairs in ascending page order.
pub fn render_pages_blocking(
    pdfium: &Pdfium,
    pdf_path: &Path,
    dpi: u32,
    max_pixels: u32,
    selection: &PageSelection,
) -> Result<Vec<(usize, DynamicImage)>, ExtractionError> {
    let document =
        pdfium
            .load_pdf_from_file(pdf_path, None)
            .map_err(|e| ExtractionError::CorruptPdf {
                path: pdf_path.to_path_buf(),
                detail: format!("{:?}", e),
            })?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    let indices = selection.to_indices(total_pages);
    info!(
        "PDF loaded: {} pages, rendering {} at {} DPI",
        total_pages,
        indices.len(),
        dpi
    );

    let render_config = PdfRenderConfig::new()
        .scale_page_by_factor(dpi as f32 / POINTS_PER_INCH)
        .set_maximum_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let mut results = Vec::with_capacity(indices.len());

    for idx in indices {
        let page = match pages.get(idx as u16) {
            Ok(page) => page,
            Err(e) => {
                warn!("Skipping page {}: {:?}", idx + 1, e);
                continue;
            }
        };

        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| ExtractionError::RenderFailed {
                page: idx + 1,
                detail: format!("{:?}", e),
            })?;

        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            idx + 1,
            image.width(),
            image.height()
        );

        results.push((idx, image));
    }

    Ok(results)
}
