//! Font discovery for chart text.
//!
//! The bitmap backend draws text through `ab_glyph`, which only knows fonts
//! that were registered by name. The first usable TrueType file is loaded
//! once per process and registered as `sans-serif`.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use plotters::style::{FontStyle, register_font};

const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu-sans-fonts/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation-sans/LiberationSans-Regular.ttf",
    "/usr/share/fonts/noto/NotoSans-Regular.ttf",
    "/usr/share/fonts/truetype/noto/NotoSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

static REGISTERED: OnceLock<Option<PathBuf>> = OnceLock::new();

/// Reads `path` and keeps its bytes for the rest of the process, but only
/// once they parse as a font.
fn load_font(path: &Path) -> Option<&'static [u8]> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "font not readable");
            return None;
        }
    };
    if ab_glyph::FontRef::try_from_slice(&bytes).is_err() {
        tracing::warn!(path = %path.display(), "not a usable TrueType/OpenType font");
        return None;
    }
    Some(Box::leak(bytes.into_boxed_slice()))
}

fn try_register(path: &Path) -> bool {
    let Some(bytes) = load_font(path) else {
        return false;
    };
    if register_font("sans-serif", FontStyle::Normal, bytes).is_err() {
        tracing::warn!(path = %path.display(), "font could not be registered");
        return false;
    }
    true
}

fn discover(preferred: Option<&Path>) -> Option<PathBuf> {
    preferred
        .into_iter()
        .map(Path::to_path_buf)
        .chain(SYSTEM_FONTS.iter().map(PathBuf::from))
        .find(|candidate| try_register(candidate))
}

/// Registers a font on first use and returns its path, or `None` when no
/// candidate could be loaded.
///
/// The first call decides for the whole process: later calls return the same
/// outcome and a different `preferred` path is ignored with a warning.
pub fn ensure_font(preferred: Option<&Path>) -> Option<&'static Path> {
    let found = REGISTERED.get_or_init(|| {
        let found = discover(preferred);
        match &found {
            Some(path) => tracing::info!(font = %path.display(), "registered chart font"),
            None => tracing::warn!("no usable font found; chart text will be skipped"),
        }
        found
    });
    if let Some(wanted) = preferred
        && found.as_deref() != Some(wanted)
    {
        tracing::warn!(font = %wanted.display(), "a chart font was already chosen; ignoring");
    }
    found.as_deref()
}
