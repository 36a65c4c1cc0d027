use directories::ProjectDirs;
use std::path::PathBuf;

const APP_NAME: &str = "keyprint";
const CONFIG_FILE: &str = "config.json";

/// Where keyprint looks for its config when `--config` is not given.
pub struct AppDirs;

impl AppDirs {
    /// `$XDG_CONFIG_HOME/keyprint`, then `$HOME/.config/keyprint`, then the
    /// platform config directory.
    pub fn config_dir() -> Option<PathBuf> {
        let from_env = |var: &str| {
            std::env::var_os(var)
                .filter(|value| !value.is_empty())
                .map(PathBuf::from)
        };

        if let Some(xdg) = from_env("XDG_CONFIG_HOME") {
            return Some(xdg.join(APP_NAME));
        }
        if let Some(home) = from_env("HOME") {
            return Some(home.join(".config").join(APP_NAME));
        }
        ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().to_path_buf())
    }

    pub fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join(CONFIG_FILE))
    }
}
