//! User configuration (TOML).
//!
//! Looked up at `<config dir>/sheetstage/sheetstage.toml` unless an explicit
//! path is given. Problems reading or parsing the file degrade to defaults
//! with a warning; a config file must never stop a rehearsal.

use directories::ProjectDirs;
use serde::Deserialize;
use sheetstage_core::preview::PreviewPolicy;
use sheetstage_core::render::RenderOptions;
use std::path::PathBuf;

const MAX_CONFIG_FILE_BYTES: u64 = 65_536;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    preview: Option<PreviewSection>,
    render: Option<RenderSection>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct PreviewSection {
    accent_color: Option<String>,
    keep_fill_on_reject: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RenderSection {
    clear_row_buffer: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub policy: PreviewPolicy,
    pub render: RenderOptions,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            policy: PreviewPolicy::default(),
            render: RenderOptions::default(),
        }
    }
}

/// Load configuration. Returns the effective config plus any warnings to
/// surface to the user.
pub fn load_config(explicit: Option<&PathBuf>, skip_user_config: bool) -> (Config, Vec<String>) {
    let mut warnings = Vec::new();
    let mut config = Config::default();

    let path = match explicit {
        Some(p) => Some(p.clone()),
        None if skip_user_config => None,
        None => user_config_path(),
    };

    let Some(path) = path else {
        return (config, warnings);
    };
    if !path.exists() {
        if explicit.is_some() {
            warnings.push(format!("Config file not found: {}", path.display()));
        }
        return (config, warnings);
    }

    match std::fs::metadata(&path) {
        Ok(meta) if meta.len() > MAX_CONFIG_FILE_BYTES => {
            warnings.push(format!(
                "Refusing to read {}: file too large ({} bytes, max {})",
                path.display(),
                meta.len(),
                MAX_CONFIG_FILE_BYTES
            ));
            return (config, warnings);
        }
        Ok(_) => {}
        Err(err) => {
            warnings.push(format!("Failed to stat {}: {}", path.display(), err));
            return (config, warnings);
        }
    }

    let parsed = match std::fs::read_to_string(&path) {
        Ok(content) => match toml::from_str::<ConfigFile>(&content) {
            Ok(parsed) => parsed,
            Err(err) => {
                warnings.push(format!("Failed to parse {}: {}", path.display(), err));
                return (config, warnings);
            }
        },
        Err(err) => {
            warnings.push(format!("Failed to read {}: {}", path.display(), err));
            return (config, warnings);
        }
    };

    if let Some(preview) = parsed.preview {
        if let Some(color) = preview.accent_color {
            if looks_like_hex_color(&color) {
                config.policy.accent_color = color;
            } else {
                warnings.push(format!(
                    "Ignoring preview.accent_color {:?}: expected #RRGGBB",
                    color
                ));
            }
        }
        if let Some(keep) = preview.keep_fill_on_reject {
            config.policy.keep_fill_on_reject = keep;
        }
    }
    if let Some(render) = parsed.render {
        if let Some(buffer) = render.clear_row_buffer {
            config.render.clear_row_buffer = buffer;
        }
    }

    (config, warnings)
}

fn looks_like_hex_color(s: &str) -> bool {
    s.len() == 7 && s.starts_with('#') && s[1..].chars().all(|c| c.is_ascii_hexdigit())
}

fn user_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "sheetstage")
        .map(|dirs| dirs.config_dir().join("sheetstage.toml"))
}
