use std::path::{Path, PathBuf};

use image::Rgba;
use thiserror::Error;

use crate::canvas::MAX_PHYSICAL_EDGE;

#[derive(Debug, Error, PartialEq)]
pub enum SettingsError {
    #[error("endpoint URL must not be empty")]
    EmptyEndpoint,
    #[error("canvas size must be positive")]
    ZeroCanvas,
    #[error("stroke width range {0}..={1} is empty")]
    BadWidthRange(f32, f32),
    #[error("density factor must be positive, got {0}")]
    BadDensity(f32),
    #[error("{size}px canvas at density {density} exceeds the {max}px buffer limit")]
    TooLarge { size: u32, density: f32, max: u32 },
}

/// Application configuration.
///
/// Resolution order: built-in defaults, then the optional settings file,
/// then command-line flags / environment (applied by the caller).
#[derive(Clone, Debug, PartialEq)]
pub struct PadSettings {
    /// Prediction endpoint receiving the POSTed image
    pub endpoint: String,
    /// JSON field holding the data URL (`image_data` or `image`)
    pub payload_field: String,
    /// Logical edge length of the square pad
    pub canvas_size: u32,
    /// Fixed density factor; `None` = follow the display
    pub density: Option<f32>,
    /// Stroke width slider bounds (logical px)
    pub width_min: f32,
    pub width_max: f32,
    pub default_width: f32,
    pub default_color: Rgba<u8>,
    /// Request timeout
    pub timeout_secs: u64,
}

impl Default for PadSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8000/predict".to_string(),
            payload_field: "image_data".to_string(),
            canvas_size: 280,
            density: None,
            width_min: 20.0,
            width_max: 60.0,
            default_width: 30.0,
            default_color: Rgba([0, 0, 0, 255]),
            timeout_secs: 30,
        }
    }
}

impl PadSettings {
    /// Path to the settings file.
    /// On Linux:   ~/.config/digitpad/digitpad.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\DigitPad\digitpad.cfg
    /// On macOS:   ~/Library/Application Support/DigitPad/digitpad.cfg
    pub fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA").ok()?;
            return Some(PathBuf::from(appdata).join("DigitPad").join("digitpad.cfg"));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").ok()?;
            return Some(
                PathBuf::from(home)
                    .join("Library")
                    .join("Application Support")
                    .join("DigitPad")
                    .join("digitpad.cfg"),
            );
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        {
            let config_dir = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .or_else(|_| std::env::var("HOME").map(|h| PathBuf::from(h).join(".config")))
                .ok()?;
            Some(config_dir.join("digitpad").join("digitpad.cfg"))
        }
    }

    /// Load from the default settings file (defaults if missing).
    pub fn load() -> Self {
        match Self::settings_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Load from `path`. A missing or unreadable file yields the defaults.
    pub fn load_from(path: &Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            log::debug!("no settings file at {}", path.display());
            return Self::default();
        };
        log::info!("loading settings from {}", path.display());
        let mut s = Self::default();
        s.apply_config(&content);
        s
    }

    /// Apply `key=value` lines over the current values. Unknown keys and
    /// unparsable values are skipped with a warning.
    pub fn apply_config(&mut self, content: &str) {
        for (n, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, val)) = line.split_once('=') else {
                log::warn!("settings line {}: expected key=value", n + 1);
                continue;
            };
            let key = key.trim();
            let val = val.trim();
            let ok = match key {
                "endpoint" => {
                    self.endpoint = val.to_string();
                    true
                }
                "payload_field" => {
                    self.payload_field = val.to_string();
                    true
                }
                "canvas_size" => set_parsed(&mut self.canvas_size, val),
                "density" => match val {
                    "auto" => {
                        self.density = None;
                        true
                    }
                    _ => val.parse::<f32>().map(|d| self.density = Some(d)).is_ok(),
                },
                "width_min" => set_parsed(&mut self.width_min, val),
                "width_max" => set_parsed(&mut self.width_max, val),
                "default_width" => set_parsed(&mut self.default_width, val),
                "default_color" => parse_color(val).map(|c| self.default_color = c).is_some(),
                "timeout_secs" => set_parsed(&mut self.timeout_secs, val),
                _ => {
                    log::warn!("settings line {}: unknown key '{}'", n + 1, key);
                    continue;
                }
            };
            if !ok {
                log::warn!("settings line {}: bad value '{}' for '{}'", n + 1, val, key);
            }
        }
    }

    /// Check invariants, clamping the default width into the slider range.
    pub fn validate(mut self) -> Result<Self, SettingsError> {
        if self.endpoint.trim().is_empty() {
            return Err(SettingsError::EmptyEndpoint);
        }
        if self.canvas_size == 0 {
            return Err(SettingsError::ZeroCanvas);
        }
        if !(self.width_min > 0.0 && self.width_min <= self.width_max) {
            return Err(SettingsError::BadWidthRange(self.width_min, self.width_max));
        }
        if let Some(d) = self.density
            && !(d.is_finite() && d > 0.0)
        {
            return Err(SettingsError::BadDensity(d));
        }
        // Auto density is checked against the display later, by the surface
        let density = self.density.unwrap_or(1.0);
        if (self.canvas_size as f32 * density).round() > MAX_PHYSICAL_EDGE as f32 {
            return Err(SettingsError::TooLarge {
                size: self.canvas_size,
                density,
                max: MAX_PHYSICAL_EDGE,
            });
        }
        self.default_width = self.default_width.clamp(self.width_min, self.width_max);
        Ok(self)
    }
}

fn set_parsed<T: std::str::FromStr>(slot: &mut T, val: &str) -> bool {
    match val.parse::<T>() {
        Ok(v) => {
            *slot = v;
            true
        }
        Err(_) => false,
    }
}

/// Parse `#rgb`, `#rrggbb` or a handful of CSS colour names.
pub fn parse_color(s: &str) -> Option<Rgba<u8>> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix('#') {
        if !hex.is_ascii() {
            return None;
        }
        return match hex.len() {
            3 => {
                let n = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|v| v * 17);
                Some(Rgba([n(0)?, n(1)?, n(2)?, 255]))
            }
            6 => {
                let b = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
                Some(Rgba([b(0)?, b(2)?, b(4)?, 255]))
            }
            _ => None,
        };
    }
    match s.to_ascii_lowercase().as_str() {
        "black" => Some(Rgba([0, 0, 0, 255])),
        "white" => Some(Rgba([255, 255, 255, 255])),
        "red" => Some(Rgba([255, 0, 0, 255])),
        "green" => Some(Rgba([0, 128, 0, 255])),
        "blue" => Some(Rgba([0, 0, 255, 255])),
        "gray" | "grey" => Some(Rgba([128, 128, 128, 255])),
        _ => None,
    }
}

/// Format a colour as `#rrggbb`.
pub fn color_to_hex(c: Rgba<u8>) -> String {
    format!("#{:02x}{:02x}{:02x}", c[0], c[1], c[2])
}
