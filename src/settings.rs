use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use egui::Color32;

use crate::config::{BackendKind, ChannelStyle};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScopeSettings {
    pub channels: Option<usize>,
    pub duration: Option<u32>,
    pub clipping: Option<bool>,
    pub scrolling: Option<bool>,
    pub width: Option<usize>,
    pub height: Option<usize>,
    pub backend: Option<BackendKind>,
    pub fps: Option<u32>,
    pub input_device: Option<String>,
    pub channel_styles: BTreeMap<usize, ChannelStyle>,
}

impl ScopeSettings {
    /// Reads `key=value` lines; a missing file yields empty settings.
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(raw) => {
                log::debug!("Loaded settings from {}", path.display());
                Self::parse(&raw)
            }
            Err(err) => {
                log::debug!("No settings at {}: {err}", path.display());
                Self::default()
            }
        }
    }

    pub fn parse(raw: &str) -> Self {
        let mut settings = ScopeSettings::default();
        for line in raw.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                apply_kv(key.trim(), value.trim(), &mut settings);
            } else {
                log::warn!("Ignoring malformed settings line: {line}");
            }
        }
        settings
    }
}

pub fn default_settings_path() -> PathBuf {
    config_dir().join("settings.cfg")
}

fn apply_kv(key: &str, value: &str, settings: &mut ScopeSettings) {
    match key {
        "channels" => settings.channels = parse(key, value),
        "duration" => settings.duration = parse(key, value),
        "clipping" => settings.clipping = parse_bool(key, value),
        "scrolling" => settings.scrolling = parse_bool(key, value),
        "width" => settings.width = parse(key, value),
        "height" => settings.height = parse(key, value),
        "fps" => settings.fps = parse(key, value),
        "backend" => {
            settings.backend = BackendKind::from_str(value);
            if settings.backend.is_none() {
                log::warn!("Unknown backend '{value}', expected 'raster' or 'strips'");
            }
        }
        "input_device" => {
            settings.input_device = if value.is_empty() {
                None
            } else {
                Some(value.to_string())
            }
        }
        _ => {
            if let Some(rest) = key.strip_prefix("channel.") {
                if let Some((index, field)) = rest.split_once('.') {
                    if let Ok(index) = index.parse::<usize>() {
                        let style = settings.channel_styles.entry(index).or_default();
                        apply_channel_kv(field, value, style);
                        return;
                    }
                }
            }
            log::warn!("Unknown settings key '{key}'");
        }
    }
}

fn apply_channel_kv(field: &str, value: &str, style: &mut ChannelStyle) {
    match field {
        "color" => {
            if let Some(color) = parse_color(value) {
                style.color = color;
            } else {
                log::warn!("Invalid channel color '{value}', expected #rrggbb");
            }
        }
        "scale" => {
            if let Some(scale) = parse::<f32>(field, value) {
                style.scale = scale;
            }
        }
        "height" => style.height = parse(field, value),
        _ => log::warn!("Unknown channel setting '{field}'"),
    }
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Option<T> {
    match value.parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            log::warn!("Invalid value '{value}' for '{key}'");
            None
        }
    }
}

fn parse_bool(key: &str, value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => {
            log::warn!("Invalid value '{value}' for '{key}'");
            None
        }
    }
}

fn parse_color(value: &str) -> Option<Color32> {
    let hex = value.strip_prefix('#').unwrap_or(value);
    if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let rgb = u32::from_str_radix(hex, 16).ok()?;
    let [_, r, g, b] = rgb.to_be_bytes();
    Some(Color32::from_rgb(r, g, b))
}

fn config_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Ok(roaming) = std::env::var("APPDATA") {
            return PathBuf::from(roaming).join("Scrollscope");
        }
        if let Ok(local) = std::env::var("LOCALAPPDATA") {
            return PathBuf::from(local).join("Scrollscope");
        }
    }

    #[cfg(target_os = "macos")]
    {
        if let Some(home) = home_dir() {
            return home
                .join("Library")
                .join("Application Support")
                .join("Scrollscope");
        }
    }

    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("scrollscope");
    }

    home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("scrollscope")
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from).or_else(|| {
        #[cfg(target_os = "windows")]
        {
            std::env::var("USERPROFILE").ok().map(PathBuf::from)
        }
        #[cfg(not(target_os = "windows"))]
        {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_global_and_channel_keys() {
        let settings = ScopeSettings::parse(
            "# scope\n\
             channels = 2\n\
             duration=8\n\
             clipping=on\n\
             scrolling=0\n\
             backend=strips\n\
             fps=0\n\
             input_device=USB Audio\n\
             channel.0.color=#ff8000\n\
             channel.1.scale=0.5\n\
             channel.1.height=99\n",
        );

        assert_eq!(settings.channels, Some(2));
        assert_eq!(settings.duration, Some(8));
        assert_eq!(settings.clipping, Some(true));
        assert_eq!(settings.scrolling, Some(false));
        assert_eq!(settings.backend, Some(BackendKind::Strips));
        assert_eq!(settings.fps, Some(0));
        assert_eq!(settings.input_device.as_deref(), Some("USB Audio"));
        assert_eq!(
            settings.channel_styles[&0].color,
            Color32::from_rgb(255, 128, 0)
        );
        assert_eq!(settings.channel_styles[&1].scale, 0.5);
        assert_eq!(settings.channel_styles[&1].height, Some(99));
    }

    #[test]
    fn bad_values_are_skipped() {
        let settings = ScopeSettings::parse(
            "duration=soon\nchannel.0.color=green\nchannel.1.color=a\u{e9}abc\nnonsense\n",
        );
        assert_eq!(settings.duration, None);
        assert_eq!(settings.channel_styles[&0], ChannelStyle::default());
        assert_eq!(settings.channel_styles[&1], ChannelStyle::default());
    }

    #[test]
    fn missing_file_gives_defaults() {
        let settings = ScopeSettings::load(Path::new("/nonexistent/scrollscope/settings.cfg"));
        assert_eq!(settings, ScopeSettings::default());
    }
}
