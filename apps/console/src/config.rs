use std::{collections::HashMap, fs, path::PathBuf};

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub api_base_url: String,
    pub cache_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: "https://reaction.powercodeai.space/avatar".into(),
            cache_dir: "./data/media-cache".into(),
        }
    }
}

/// Defaults, then `reaction.toml`, then environment variables. Later layers
/// win.
pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("reaction.toml") {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(&raw) {
            if let Some(v) = file_cfg.get("api_base_url") {
                settings.api_base_url = v.clone();
            }
            if let Some(v) = file_cfg.get("cache_dir") {
                settings.cache_dir = v.clone().into();
            }
        }
    }

    if let Ok(v) = std::env::var("API_BASE_URL") {
        settings.api_base_url = v;
    }
    if let Ok(v) = std::env::var("APP__API_BASE_URL") {
        settings.api_base_url = v;
    }

    if let Ok(v) = std::env::var("APP__CACHE_DIR") {
        settings.cache_dir = v.into();
    }

    settings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_the_hosted_service() {
        let settings = Settings::default();
        assert_eq!(
            settings.api_base_url,
            "https://reaction.powercodeai.space/avatar"
        );
        assert_eq!(settings.cache_dir, PathBuf::from("./data/media-cache"));
    }

    #[test]
    fn file_values_parse_as_a_flat_string_table() {
        let raw = "api_base_url = \"http://localhost:9000\"\ncache_dir = \"/tmp/cache\"\n";
        let file_cfg: HashMap<String, String> = toml::from_str(raw).expect("parse");
        assert_eq!(
            file_cfg.get("api_base_url").map(String::as_str),
            Some("http://localhost:9000")
        );
        assert_eq!(
            file_cfg.get("cache_dir").map(String::as_str),
            Some("/tmp/cache")
        );
    }
}
