//! Configuration loading and root folder resolution

use crate::{Error, Result};
use std::path::PathBuf;

/// Module configuration from database
#[derive(Debug, Clone)]
pub struct ModuleConfig {
    pub module_name: String,
    pub host: String,
    pub port: u16,
    pub enabled: bool,
}

/// Root folder resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(cli_arg: Option<&str>, env_var_name: &str) -> Result<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Ok(PathBuf::from(path));
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        return Ok(PathBuf::from(path));
    }

    // Priority 3: TOML config file
    if let Ok(config_path) = find_config_file() {
        if let Ok(toml_content) = std::fs::read_to_string(&config_path) {
            if let Ok(config) = toml::from_str::<toml::Value>(&toml_content) {
                if let Some(root_folder) = config.get("root_folder").and_then(|v| v.as_str()) {
                    return Ok(PathBuf::from(root_folder));
                }
            }
        }
    }

    // Priority 4: OS-dependent compiled default
    Ok(default_root_folder())
}

/// Get configuration file path for the platform
fn find_config_file() -> Result<PathBuf> {
    if cfg!(target_os = "linux") {
        // Try ~/.config/core314/config.toml first, then /etc/core314/config.toml
        if let Some(path) = dirs::config_dir().map(|d| d.join("core314").join("config.toml")) {
            if path.exists() {
                return Ok(path);
            }
        }
        let system_config = PathBuf::from("/etc/core314/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }
        return Err(Error::Config("No config file found".to_string()));
    }

    let path = dirs::config_dir()
        .map(|d| d.join("core314").join("config.toml"))
        .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))?;

    if path.exists() {
        Ok(path)
    } else {
        Err(Error::Config(format!("Config file not found: {:?}", path)))
    }
}

/// Get OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        dirs::data_local_dir()
            .map(|d| d.join("core314"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/core314"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("core314"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/core314"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("core314"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\core314"))
    } else {
        PathBuf::from("./core314_data")
    }
}

/// Database file path within the root folder
pub fn database_path(root_folder: &std::path::Path) -> PathBuf {
    root_folder.join("core314.db")
}

/// Load module configuration from database
///
/// Each binary reads its own host/port from the module_config table,
/// seeded with defaults at database initialization.
pub async fn load_module_config(db: &sqlx::SqlitePool, module_name: &str) -> Result<ModuleConfig> {
    let record = sqlx::query_as::<_, (String, String, i64, i64)>(
        "SELECT module_name, host, port, enabled FROM module_config WHERE module_name = ?",
    )
    .bind(module_name)
    .fetch_one(db)
    .await?;

    Ok(ModuleConfig {
        module_name: record.0,
        host: record.1,
        port: record.2 as u16,
        enabled: record.3 != 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_arg_takes_priority() {
        let resolved = resolve_root_folder(Some("/tmp/core314-test"), "CORE314_TEST_UNSET").unwrap();
        assert_eq!(resolved, PathBuf::from("/tmp/core314-test"));
    }

    #[test]
    fn test_env_var_used_when_no_cli_arg() {
        std::env::set_var("CORE314_TEST_ROOT", "/tmp/core314-env");
        let resolved = resolve_root_folder(None, "CORE314_TEST_ROOT").unwrap();
        assert_eq!(resolved, PathBuf::from("/tmp/core314-env"));
        std::env::remove_var("CORE314_TEST_ROOT");
    }

    #[test]
    fn test_database_path_inside_root() {
        let path = database_path(std::path::Path::new("/data/core314"));
        assert_eq!(path, PathBuf::from("/data/core314/core314.db"));
    }
}
