//! Camera picture settings exchanged as a 7-field line.

use crate::constants::SETTINGS_FIELD_COUNT;
use crate::error::{ProtocolError, ProtocolResult};

/// Picture settings of the payload camera.
///
/// Wire order: width, height, sharpness, brightness, contrast, saturation, ISO.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PictureSettings {
    /// Image width in pixels.
    pub width: i32,
    /// Image height in pixels.
    pub height: i32,
    /// Sharpness, -100 to 100.
    pub sharpness: i32,
    /// Brightness, 0 to 100.
    pub brightness: i32,
    /// Contrast, -100 to 100.
    pub contrast: i32,
    /// Saturation, -100 to 100.
    pub saturation: i32,
    /// ISO, 100 to 800.
    pub iso: i32,
}

impl Default for PictureSettings {
    fn default() -> Self {
        PictureSettings {
            width: 200,
            height: 100,
            sharpness: 0,
            brightness: 50,
            contrast: 0,
            saturation: 0,
            iso: 400,
        }
    }
}

impl PictureSettings {
    /// Parse a settings line.
    ///
    /// Every field must be digits with at most one leading `-`.
    pub fn parse(line: &str) -> ProtocolResult<PictureSettings> {
        let line = line.trim_end_matches(['\r', '\n']);
        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() != SETTINGS_FIELD_COUNT || !fields.iter().all(|f| is_signed_digits(f)) {
            return Err(ProtocolError::MalformedSettings(line.to_string()));
        }

        let mut values = [0i32; SETTINGS_FIELD_COUNT];
        for (value, field) in values.iter_mut().zip(&fields) {
            *value = field
                .parse()
                .map_err(|_| ProtocolError::MalformedSettings(line.to_string()))?;
        }
        Ok(Self::from_values(values))
    }

    /// Build from the 7 values in wire order.
    pub fn from_values(values: [i32; SETTINGS_FIELD_COUNT]) -> Self {
        let [width, height, sharpness, brightness, contrast, saturation, iso] = values;
        PictureSettings {
            width,
            height,
            sharpness,
            brightness,
            contrast,
            saturation,
            iso,
        }
    }

    /// The 7 values in wire order.
    pub fn values(&self) -> [i32; SETTINGS_FIELD_COUNT] {
        [
            self.width,
            self.height,
            self.sharpness,
            self.brightness,
            self.contrast,
            self.saturation,
            self.iso,
        ]
    }

    /// Comma-joined values, no terminator.
    pub fn to_line(&self) -> String {
        self.values()
            .iter()
            .map(i32::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl std::fmt::Display for PictureSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "width={} height={} sharpness={} brightness={} contrast={} saturation={} iso={}",
            self.width,
            self.height,
            self.sharpness,
            self.brightness,
            self.contrast,
            self.saturation,
            self.iso
        )
    }
}

fn is_signed_digits(field: &str) -> bool {
    let digits = field.strip_prefix('-').unwrap_or(field);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}
