//! Persisted user settings — a small key=value config file in the platform
//! config directory, written whenever a setting changes.
//!
//! Location:
//!   Linux:   `~/.config/picview/picview.cfg`  (XDG_CONFIG_HOME respected)
//!   Windows: `%APPDATA%\PicView\picview.cfg`
//!   macOS:   `~/Library/Application Support/PicView/picview.cfg`

use std::path::PathBuf;

use image::Rgba;

#[derive(Clone, Debug, PartialEq)]
pub struct AppSettings {
    /// Brush color for annotation strokes (RGBA).
    pub brush_color: Rgba<u8>,
    /// Brush stroke width in pixels, 1..=50.
    pub brush_width: u32,
    /// Sample textures nearest-neighbor when zoomed in past 2× (sharp pixels
    /// instead of smeared ones).
    pub sharp_zoom: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            brush_color: Rgba([255, 0, 0, 255]),
            brush_width: 5,
            sharp_zoom: true,
        }
    }
}

impl AppSettings {
    fn settings_path() -> Option<PathBuf> {
        let dir = config_dir()?;
        let _ = std::fs::create_dir_all(&dir);
        Some(dir.join("picview.cfg"))
    }

    fn color_to_str(c: Rgba<u8>) -> String {
        format!("{},{},{},{}", c[0], c[1], c[2], c[3])
    }

    fn str_to_color(s: &str) -> Option<Rgba<u8>> {
        let parts: Vec<&str> = s.split(',').collect();
        if parts.len() != 4 {
            return None;
        }
        let r = parts[0].trim().parse::<u8>().ok()?;
        let g = parts[1].trim().parse::<u8>().ok()?;
        let b = parts[2].trim().parse::<u8>().ok()?;
        let a = parts[3].trim().parse::<u8>().ok()?;
        Some(Rgba([r, g, b, a]))
    }

    /// Save settings to disk. Failures are ignored — losing preferences is
    /// not worth interrupting the user.
    pub fn save(&self) {
        let Some(path) = Self::settings_path() else {
            return;
        };
        let content = format!(
            "brush_color={}\n\
             brush_width={}\n\
             sharp_zoom={}\n",
            Self::color_to_str(self.brush_color),
            self.brush_width,
            self.sharp_zoom,
        );
        let _ = std::fs::write(path, content);
    }

    /// Load settings from disk; missing or corrupt files yield defaults, and
    /// unrecognized keys are skipped so old configs keep working.
    pub fn load() -> Self {
        let Some(path) = Self::settings_path() else {
            return Self::default();
        };
        let Ok(content) = std::fs::read_to_string(&path) else {
            return Self::default();
        };
        Self::parse(&content)
    }

    fn parse(content: &str) -> Self {
        let mut s = Self::default();
        for line in content.lines() {
            let Some((key, val)) = line.split_once('=') else {
                continue;
            };
            match key.trim() {
                "brush_color" => {
                    if let Some(c) = Self::str_to_color(val) {
                        s.brush_color = c;
                    }
                }
                "brush_width" => {
                    if let Ok(w) = val.trim().parse::<u32>() {
                        s.brush_width = w.clamp(1, 50);
                    }
                }
                "sharp_zoom" => s.sharp_zoom = val.trim() == "true",
                _ => {}
            }
        }
        s
    }
}

/// Platform config directory (without the app sub-folder).
fn config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        let base = std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|_| std::env::var("HOME").map(|h| PathBuf::from(h).join(".config")))
            .ok()?;
        return Some(base.join("picview"));
    }
    #[cfg(target_os = "windows")]
    {
        let appdata = std::env::var("APPDATA").ok()?;
        return Some(PathBuf::from(appdata).join("PicView"));
    }
    #[cfg(target_os = "macos")]
    {
        let home = std::env::var("HOME").ok()?;
        return Some(
            PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("PicView"),
        );
    }
    #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
    {
        std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|d| d.to_path_buf()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_round_trips_all_fields() {
        let s = AppSettings {
            brush_color: Rgba([12, 34, 56, 200]),
            brush_width: 17,
            sharp_zoom: false,
        };
        let content = format!(
            "brush_color={}\nbrush_width={}\nsharp_zoom={}\n",
            AppSettings::color_to_str(s.brush_color),
            s.brush_width,
            s.sharp_zoom,
        );
        assert_eq!(AppSettings::parse(&content), s);
    }

    #[test]
    fn parse_tolerates_junk_and_clamps_width() {
        let s = AppSettings::parse("garbage\nbrush_width=500\nunknown_key=1\nbrush_color=1,2\n");
        assert_eq!(s.brush_width, 50);
        // Unparseable color falls back to the default
        assert_eq!(s.brush_color, AppSettings::default().brush_color);
    }
}
