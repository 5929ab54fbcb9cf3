//! Decoding and saving received images.

use std::fs;
use std::path::{Path, PathBuf};

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use chrono::{DateTime, TimeZone};
use tracing::{info, warn};

use crate::config::ImageConfig;
use crate::error::{LinkError, LinkResult};

/// Standard alphabet, tolerant of missing padding and stray trailing bits
/// (the last chunk of a salvaged transfer is often cut short).
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Extension for bodies that could not be decoded and are kept verbatim.
const RAW_EXTENSION: &str = ".b64";

/// An image written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedImage {
    /// Where the file was written.
    pub path: PathBuf,
    /// Bytes written.
    pub bytes: usize,
    /// Whether the fallback name was used.
    pub fallback: bool,
    /// Whether the body decoded; if not, the received text was saved as is.
    pub decoded: bool,
}

/// Writes received image bodies into the image directory.
#[derive(Debug, Clone)]
pub struct ImageStore {
    dir: PathBuf,
    extension: String,
    fallback_stem: String,
}

impl ImageStore {
    /// Create a store.
    pub fn new(
        dir: impl Into<PathBuf>,
        extension: impl Into<String>,
        fallback_stem: impl Into<String>,
    ) -> Self {
        ImageStore {
            dir: dir.into(),
            extension: extension.into(),
            fallback_stem: fallback_stem.into(),
        }
    }

    /// Create a store from the image configuration.
    pub fn from_config(config: &ImageConfig) -> Self {
        Self::new(
            config.image_dir.clone(),
            config.extension.clone(),
            config.fallback_stem.clone(),
        )
    }

    /// Image directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File name for a stem: the stem plus the extension, unless the stem
    /// already ends with it.
    pub fn file_name(&self, stem: &str) -> String {
        if stem.ends_with(&self.extension) {
            stem.to_string()
        } else {
            format!("{stem}{}", self.extension)
        }
    }

    /// Decode a base64 body and save it under `stem`.
    ///
    /// If the stem is unusable or the write fails, the fallback name is used.
    /// If the body does not decode, the received text is saved under the
    /// fallback stem with a `.b64` extension rather than discarded.
    pub fn save(&self, stem: &str, encoded: &[u8]) -> LinkResult<SavedImage> {
        fs::create_dir_all(&self.dir).map_err(|source| LinkError::Persistence {
            path: self.dir.clone(),
            source,
        })?;

        let decoded = match decode(encoded) {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!(error = %e, bytes = encoded.len(), "image body did not decode, keeping raw text");
                let path = self
                    .dir
                    .join(format!("{}{}", self.fallback_stem, RAW_EXTENSION));
                return write(&path, encoded, true, false);
            }
        };

        if is_usable_stem(stem) {
            let path = self.dir.join(self.file_name(stem));
            match write(&path, &decoded, false, true) {
                Ok(saved) => return Ok(saved),
                Err(e) => warn!(error = %e, "falling back to default image name"),
            }
        } else {
            warn!(stem, "unusable image name, using fallback");
        }

        let path = self.dir.join(self.file_name(&self.fallback_stem));
        write(&path, &decoded, true, true)
    }
}

fn write(path: &Path, data: &[u8], fallback: bool, decoded: bool) -> LinkResult<SavedImage> {
    fs::write(path, data).map_err(|source| LinkError::Persistence {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), bytes = data.len(), fallback, "image saved");
    Ok(SavedImage {
        path: path.to_path_buf(),
        bytes: data.len(),
        fallback,
        decoded,
    })
}

/// Decode a base64 body, ignoring line breaks and surrounding whitespace.
pub fn decode(encoded: &[u8]) -> Result<Vec<u8>, base64::DecodeError> {
    let compact: Vec<u8> = encoded
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    LENIENT.decode(compact)
}

/// A stem can be used as a file name inside the image directory.
fn is_usable_stem(stem: &str) -> bool {
    !stem.trim().is_empty()
        && stem != "."
        && stem != ".."
        && !stem.contains(['/', '\\', '\0'])
}

/// Stem for the most recent image.
///
/// Prefers the caller's name, then the camera's own name when it looks like
/// one of its image files (they start with `i`), then a timestamp.
pub fn latest_image_stem<Tz>(requested: Option<&str>, remote: &str, now: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    if let Some(name) = requested.map(str::trim).filter(|n| !n.is_empty()) {
        return name.to_string();
    }
    let remote = remote.trim_matches(|c: char| c.is_whitespace() || c == '\0');
    if remote.starts_with('i') {
        return remote.to_string();
    }
    now.format("image_%Y%m%d_T%H%M%S").to_string()
}
