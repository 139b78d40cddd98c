//! On-disk locations: config, secrets, session token and logs.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "config.yml";
pub const SECRETS_FILE: &str = "secrets.yaml";
pub const SESSION_TOKEN_FILE: &str = ".session_token";
const APP_DIR: &str = "corpus-agent";

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub project_root: PathBuf,
    pub user_data_dir: PathBuf,
    pub log_dir: PathBuf,
    pub secrets_path: PathBuf,
    pub session_token_path: PathBuf,
}

impl AppPaths {
    /// Resolves locations from `CORPUS_AGENT_ROOT` / `CORPUS_AGENT_DATA_DIR`,
    /// falling back to platform defaults.
    pub fn new() -> Self {
        let project_root = env_path("CORPUS_AGENT_ROOT").unwrap_or_else(default_project_root);
        let user_data_dir =
            env_path("CORPUS_AGENT_DATA_DIR").unwrap_or_else(|| default_data_dir(&project_root));
        Self::with_dirs(project_root, user_data_dir)
    }

    /// Builds paths rooted at explicit directories, creating the data and log dirs.
    pub fn with_dirs(project_root: PathBuf, user_data_dir: PathBuf) -> Self {
        let log_dir = user_data_dir.join("logs");
        for dir in [&user_data_dir, &log_dir] {
            let _ = fs::create_dir_all(dir);
        }

        AppPaths {
            secrets_path: user_data_dir.join(SECRETS_FILE),
            session_token_path: user_data_dir.join(SESSION_TOKEN_FILE),
            project_root,
            user_data_dir,
            log_dir,
        }
    }

    /// `CORPUS_AGENT_CONFIG_PATH`, else a config in the data dir, else the
    /// project's own.
    pub fn config_path(&self) -> PathBuf {
        if let Some(path) = env_path("CORPUS_AGENT_CONFIG_PATH") {
            return path;
        }
        let user_config = self.user_data_dir.join(CONFIG_FILE);
        if user_config.exists() {
            return user_config;
        }
        self.project_root.join(CONFIG_FILE)
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

fn default_project_root() -> PathBuf {
    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    if manifest_dir.join(CONFIG_FILE).exists() {
        return manifest_dir;
    }
    env::current_dir().unwrap_or(manifest_dir)
}

// debug builds keep data next to the project
fn default_data_dir(project_root: &Path) -> PathBuf {
    if cfg!(debug_assertions) {
        return project_root.to_path_buf();
    }
    platform_data_home().join(APP_DIR)
}

fn platform_data_home() -> PathBuf {
    if cfg!(target_os = "windows") {
        return env_path("LOCALAPPDATA")
            .or_else(|| env_path("USERPROFILE"))
            .unwrap_or_else(|| PathBuf::from("."));
    }
    let home = env_path("HOME").unwrap_or_else(|| PathBuf::from("."));
    if cfg!(target_os = "macos") {
        return home.join("Library").join("Application Support");
    }
    env_path("XDG_DATA_HOME").unwrap_or_else(|| home.join(".local").join("share"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn files_live_in_the_data_dir() {
        let root = tempfile::tempdir().expect("root");
        let data = tempfile::tempdir().expect("data");
        let paths = AppPaths::with_dirs(root.path().to_path_buf(), data.path().to_path_buf());

        assert_eq!(paths.secrets_path, data.path().join(SECRETS_FILE));
        assert_eq!(paths.session_token_path, data.path().join(SESSION_TOKEN_FILE));
        assert!(paths.log_dir.is_dir());
    }

    #[test]
    fn data_dir_config_wins_over_project_config() {
        let root = tempfile::tempdir().expect("root");
        let data = tempfile::tempdir().expect("data");
        let paths = AppPaths::with_dirs(root.path().to_path_buf(), data.path().to_path_buf());
        if env::var_os("CORPUS_AGENT_CONFIG_PATH").is_some() {
            return;
        }

        assert_eq!(paths.config_path(), root.path().join(CONFIG_FILE));
        fs::write(data.path().join(CONFIG_FILE), "rag: {}\n").expect("write");
        assert_eq!(paths.config_path(), data.path().join(CONFIG_FILE));
    }
}
