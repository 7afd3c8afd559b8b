//! Font discovery for the header banner renderer.
//!
//! Fonts are looked up in the directory named by `REPORT_PAGINATOR_FONTS_DIR`,
//! then in `assets/fonts` next to the running executable, then in
//! `assets/fonts` under the crate manifest. When none of those hold the bundled
//! Roboto files, the Windows Arial pair is tried as a fallback.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use log::warn;
use rusttype::Font;
use thiserror::Error;

/// Name of the bundled font family.
pub const DEFAULT_FONT_FAMILY_NAME: &str = "Roboto";

/// Environment variable overriding the bundled font directory.
pub const FONTS_DIR_ENV: &str = "REPORT_PAGINATOR_FONTS_DIR";

/// Environment variable overriding the Windows fallback font directory.
pub const WINDOWS_FONTS_DIR_ENV: &str = "REPORT_PAGINATOR_WINDOWS_FONTS_DIR";

const REGULAR_FILE: &str = "Roboto-Regular.ttf";
const BOLD_FILE: &str = "Roboto-Bold.ttf";

const WINDOWS_FALLBACK_FAMILY_NAME: &str = "Arial";
const WINDOWS_REGULAR_FILE: &str = "arial.ttf";
const WINDOWS_BOLD_FILE: &str = "arialbd.ttf";

/// Errors raised while locating or parsing banner fonts.
#[derive(Error, Debug)]
pub enum FontError {
    /// No search location held the required font files.
    #[error("banner fonts not found; checked: {0}")]
    NotFound(String),

    /// A font file could not be read.
    #[error("failed to read font file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A font file did not contain a usable TrueType font.
    #[error("font file {0} is not a valid TrueType font")]
    Invalid(PathBuf),
}

/// Regular and bold faces used by the banner.
pub struct BannerFonts {
    pub regular: Font<'static>,
    pub bold: Font<'static>,
}

fn env_path(var: &str) -> Option<PathBuf> {
    env::var_os(var).and_then(|value| {
        let path = PathBuf::from(value);
        if path.as_os_str().is_empty() {
            None
        } else {
            Some(path)
        }
    })
}

fn font_directory_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    if let Some(path) = env_path(FONTS_DIR_ENV) {
        candidates.push(path);
    }

    if let Ok(current_exe) = env::current_exe() {
        if let Some(bin_dir) = current_exe.parent() {
            let candidate = bin_dir.join("assets/fonts");
            if !candidates.contains(&candidate) {
                candidates.push(candidate);
            }
        }
    }

    let manifest_candidate = bundled_fonts_source_dir();
    if !candidates.contains(&manifest_candidate) {
        candidates.push(manifest_candidate);
    }

    candidates
}

/// Directory under the crate manifest that ships the bundled fonts.
pub fn bundled_fonts_source_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("assets/fonts")
}

fn missing_files(directory: &Path, files: &[&str]) -> Vec<String> {
    files
        .iter()
        .filter(|name| !directory.join(name).is_file())
        .map(|name| name.to_string())
        .collect()
}

fn resolve_font_directory() -> Result<PathBuf, FontError> {
    let mut attempts = Vec::new();

    for candidate in font_directory_candidates() {
        if !candidate.is_dir() {
            attempts.push(format!("{} (directory missing)", candidate.display()));
            continue;
        }
        let missing = missing_files(&candidate, &[REGULAR_FILE, BOLD_FILE]);
        if missing.is_empty() {
            return Ok(candidate);
        }
        attempts.push(format!(
            "{} (missing files [{}])",
            candidate.display(),
            missing.join(", ")
        ));
    }

    let summary = if attempts.is_empty() {
        "no search paths were available".to_owned()
    } else {
        attempts.join(", ")
    };
    Err(FontError::NotFound(summary))
}

fn windows_font_directory() -> Option<PathBuf> {
    if let Some(path) = env_path(WINDOWS_FONTS_DIR_ENV) {
        return Some(path);
    }

    #[cfg(windows)]
    {
        for var in ["WINDIR", "SystemRoot"] {
            if let Some(root) = env_path(var) {
                let candidate = root.join("Fonts");
                if candidate.is_dir() {
                    return Some(candidate);
                }
            }
        }
    }

    None
}

fn load_font(path: &Path) -> Result<Font<'static>, FontError> {
    let data = fs::read(path).map_err(|source| FontError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Font::try_from_vec(data).ok_or_else(|| FontError::Invalid(path.to_path_buf()))
}

fn load_pair(directory: &Path, regular: &str, bold: &str) -> Result<BannerFonts, FontError> {
    Ok(BannerFonts {
        regular: load_font(&directory.join(regular))?,
        bold: load_font(&directory.join(bold))?,
    })
}

/// Loads the bundled Roboto faces, falling back to Windows Arial when the
/// bundled files cannot be found.
pub fn load_banner_fonts() -> Result<BannerFonts, FontError> {
    match resolve_font_directory() {
        Ok(directory) => load_pair(&directory, REGULAR_FILE, BOLD_FILE),
        Err(err) => {
            let Some(directory) = windows_font_directory() else {
                return Err(err);
            };
            match load_pair(&directory, WINDOWS_REGULAR_FILE, WINDOWS_BOLD_FILE) {
                Ok(fonts) => {
                    warn!(
                        "{DEFAULT_FONT_FAMILY_NAME} fonts unavailable ({err}); using Windows '{WINDOWS_FALLBACK_FAMILY_NAME}'"
                    );
                    Ok(fonts)
                }
                Err(fallback_err) => {
                    warn!("{DEFAULT_FONT_FAMILY_NAME} fonts unavailable ({err}); Windows fallback failed: {fallback_err}");
                    Err(err)
                }
            }
        }
    }
}

/// Indicates whether the bundled fonts can be located on disk.
pub fn default_fonts_available() -> bool {
    resolve_font_directory().is_ok()
}
