// src/config/loader.rs
//! Layered configuration loader with environment overrides and hot reload
//!
//! Files are merged over the built-in defaults in precedence order, then
//! `EMG_<SECTION>__<KEY>` environment variables are applied, e.g.
//! `EMG_DEVICE__HOST=10.0.0.5` or `EMG_DEVICE__ACTIVE_CHANNELS=[1,3]`.

use crate::config::{constants::paths, SystemConfig};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    #[error("configuration parse error: {0}")]
    Parse(String),

    #[error("configuration validation errors: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("file watcher error: {0}")]
    Watcher(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}

/// Configuration loader with hot reload capabilities
pub struct ConfigLoader {
    config_paths: Vec<PathBuf>,
    current_config: Arc<RwLock<SystemConfig>>,
    change_notifier: Option<mpsc::Sender<SystemConfig>>,
    _file_watcher: Option<notify::RecommendedWatcher>,
}

impl ConfigLoader {
    /// Loader over the standard system, user and local paths
    pub fn new() -> Self {
        Self::with_paths(Self::discover_config_paths())
    }

    /// Loader over explicit paths, lowest precedence first
    pub fn with_paths(paths: Vec<PathBuf>) -> Self {
        Self {
            config_paths: paths,
            current_config: Arc::new(RwLock::new(SystemConfig::default())),
            change_notifier: None,
            _file_watcher: None,
        }
    }

    /// Paths consulted, lowest precedence first
    pub fn config_paths(&self) -> &[PathBuf] {
        &self.config_paths
    }

    /// Load, merge and validate
    pub fn load_system_config(&mut self) -> Result<SystemConfig, ConfigError> {
        let config = load_and_merge_configs(&self.config_paths)?;
        *self.current_config.write() = config.clone();
        Ok(config)
    }

    /// Most recently loaded configuration
    pub fn current_config(&self) -> SystemConfig {
        self.current_config.read().clone()
    }

    /// Watch the configuration files and call `callback` with every valid reload
    ///
    /// Invalid edits are logged and the previous configuration stays current.
    pub fn enable_hot_reload(
        &mut self,
        callback: impl Fn(SystemConfig) + Send + 'static,
    ) -> Result<(), ConfigError> {
        let (tx, rx) = mpsc::channel();
        self.change_notifier = Some(tx.clone());

        let config_ref = self.current_config.clone();
        thread::Builder::new()
            .name("config-reload".to_string())
            .spawn(move || {
                while let Ok(new_config) = rx.recv() {
                    *config_ref.write() = new_config.clone();
                    callback(new_config);
                }
            })?;

        self.setup_file_watcher(tx)
    }

    /// Reload manually and notify the hot reload callback, if any
    pub fn reload(&mut self) -> Result<SystemConfig, ConfigError> {
        let config = load_and_merge_configs(&self.config_paths)?;
        *self.current_config.write() = config.clone();

        if let Some(ref notifier) = self.change_notifier {
            if notifier.send(config.clone()).is_err() {
                warn!("configuration reload listener has gone away");
            }
        }
        Ok(config)
    }

    /// Check a single file on top of the defaults without loading it
    pub fn validate_config_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let mut merged = defaults_value()?;
        merge_toml_values(&mut merged, load_config_file(path)?);
        let config: SystemConfig = merged.try_into()?;
        config.validate()
    }

    /// Write the current configuration as TOML
    pub fn export_config<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let toml_content = toml::to_string_pretty(&self.current_config())
            .map_err(|e| ConfigError::Parse(e.to_string()))?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    fn setup_file_watcher(&mut self, tx: mpsc::Sender<SystemConfig>) -> Result<(), ConfigError> {
        use notify::{DebouncedEvent, RecursiveMode, Watcher};

        let (watch_tx, watch_rx) = mpsc::channel();
        let mut watcher = notify::watcher(watch_tx, Duration::from_millis(500))
            .map_err(|e| ConfigError::Watcher(e.to_string()))?;

        let mut watched = std::collections::HashSet::new();
        for path in &self.config_paths {
            if let Some(parent) = path.parent().filter(|p| p.is_dir()) {
                if watched.insert(parent.to_path_buf()) {
                    watcher
                        .watch(parent, RecursiveMode::NonRecursive)
                        .map_err(|e| ConfigError::Watcher(e.to_string()))?;
                }
            }
        }

        let config_paths = self.config_paths.clone();
        thread::Builder::new()
            .name("config-watch".to_string())
            .spawn(move || {
                while let Ok(event) = watch_rx.recv() {
                    let changed = match event {
                        DebouncedEvent::Write(path) | DebouncedEvent::Create(path) => path,
                        _ => continue,
                    };
                    if !config_paths.iter().any(|p| p == &changed) {
                        continue;
                    }
                    match load_and_merge_configs(&config_paths) {
                        Ok(new_config) => {
                            info!(path = %changed.display(), "configuration reloaded");
                            if tx.send(new_config).is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!(path = %changed.display(), error = %e, "rejected configuration change"),
                    }
                }
            })?;

        self._file_watcher = Some(watcher);
        Ok(())
    }

    fn discover_config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(paths::SYSTEM_CONFIG_PATH)];

        if let Some(home_dir) = dirs::home_dir() {
            paths.push(home_dir.join(paths::USER_CONFIG_DIR).join("config.toml"));
        }

        paths.push(PathBuf::from(paths::DEFAULT_CONFIG_FILE));
        paths.push(PathBuf::from(paths::LOCAL_CONFIG_FILE));
        paths.push(PathBuf::from("config/local.toml"));
        paths
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn defaults_value() -> Result<toml::Value, ConfigError> {
    toml::Value::try_from(SystemConfig::default()).map_err(|e| ConfigError::Parse(e.to_string()))
}

fn load_and_merge_configs(config_paths: &[PathBuf]) -> Result<SystemConfig, ConfigError> {
    let mut merged = defaults_value()?;

    for path in config_paths {
        match load_config_file(path) {
            Ok(file_config) => merge_toml_values(&mut merged, file_config),
            Err(ConfigError::FileNotFound(_)) => continue,
            Err(e) => return Err(e),
        }
    }

    apply_environment_overrides(&mut merged, std::env::vars());

    let config: SystemConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

fn load_config_file<P: AsRef<Path>>(path: P) -> Result<toml::Value, ConfigError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }
    let content = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

fn merge_toml_values(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, value) in overlay_table {
                match base_table.get_mut(&key) {
                    Some(base_value) => merge_toml_values(base_value, value),
                    None => {
                        base_table.insert(key, value);
                    }
                }
            }
        }
        (base_value, overlay_value) => *base_value = overlay_value,
    }
}

fn apply_environment_overrides(config: &mut toml::Value, vars: impl Iterator<Item = (String, String)>) {
    for (key, value) in vars {
        let Some(stripped) = key.strip_prefix(paths::ENV_PREFIX) else {
            continue;
        };
        let path: Vec<String> = stripped
            .to_lowercase()
            .split(paths::ENV_SEPARATOR)
            .map(str::to_string)
            .collect();
        if path.len() < 2 || path.iter().any(String::is_empty) {
            continue;
        }
        set_nested_value(config, &path, parse_env_value(&value));
    }
}

/// Interpret an override as a TOML literal, falling back to a bare string
fn parse_env_value(value: &str) -> toml::Value {
    toml::from_str::<toml::Table>(&format!("v = {}", value))
        .ok()
        .and_then(|mut table| table.remove("v"))
        .unwrap_or_else(|| toml::Value::String(value.to_string()))
}

fn set_nested_value(config: &mut toml::Value, path: &[String], value: toml::Value) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };
    let mut current = config;
    for part in parents {
        let toml::Value::Table(table) = current else {
            return;
        };
        current = table
            .entry(part.clone())
            .or_insert_with(|| toml::Value::Table(toml::value::Table::new()));
    }
    if let toml::Value::Table(table) = current {
        table.insert(last.clone(), value);
    }
}

mod dirs {
    use std::path::PathBuf;

    pub fn home_dir() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            std::env::var_os("USERPROFILE").map(PathBuf::from)
        }
        #[cfg(not(target_os = "windows"))]
        {
            std::env::var_os("HOME").map(PathBuf::from)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_config_loader_creation() {
        let loader = ConfigLoader::new();
        assert!(!loader.config_paths().is_empty());
    }

    #[test]
    #[serial]
    fn test_missing_files_give_defaults() {
        let mut loader = ConfigLoader::with_paths(vec![PathBuf::from("/nonexistent/emg.toml")]);
        let config = loader.load_system_config().unwrap();
        assert_eq!(config, SystemConfig::default());
    }

    #[test]
    #[serial]
    fn test_later_files_take_precedence() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("base.toml");
        let local = dir.path().join("local.toml");
        std::fs::write(&base, "[device]\nhost = \"10.0.0.1\"\ntimeout_ms = 500\n").unwrap();
        std::fs::write(&local, "[device]\nhost = \"10.0.0.2\"\n").unwrap();

        let mut loader = ConfigLoader::with_paths(vec![base, local]);
        let config = loader.load_system_config().unwrap();
        assert_eq!(config.device.host, "10.0.0.2");
        assert_eq!(config.device.timeout_ms, 500);
        assert_eq!(loader.current_config().device.host, "10.0.0.2");
    }

    #[test]
    fn test_config_file_validation() {
        let loader = ConfigLoader::with_paths(Vec::new());

        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[acquisition]
sample_rate_hz = 2000.0

[control]
hysteresis_threshold = 2.5
        "#
        )
        .unwrap();

        assert!(loader.validate_config_file(temp_file.path()).is_ok());
    }

    #[test]
    fn test_invalid_config_validation() {
        let loader = ConfigLoader::with_paths(Vec::new());

        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[processing.filter]
band = "high"
        "#
        )
        .unwrap();

        assert!(matches!(
            loader.validate_config_file(temp_file.path()),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let loader = ConfigLoader::with_paths(Vec::new());
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "[device\nhost = ").unwrap();
        assert!(matches!(
            loader.validate_config_file(temp_file.path()),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    #[serial]
    fn test_environment_override() {
        std::env::set_var("EMG_DEVICE__HOST", "192.168.1.20");
        std::env::set_var("EMG_DEVICE__ACTIVE_CHANNELS", "[1, 3]");
        std::env::set_var("EMG_CONTROL__HYSTERESIS_WIDTH", "0.5");

        let mut loader = ConfigLoader::with_paths(Vec::new());
        let result = loader.load_system_config();

        std::env::remove_var("EMG_DEVICE__HOST");
        std::env::remove_var("EMG_DEVICE__ACTIVE_CHANNELS");
        std::env::remove_var("EMG_CONTROL__HYSTERESIS_WIDTH");

        let config = result.unwrap();
        assert_eq!(config.device.host, "192.168.1.20");
        assert_eq!(config.device.active_channels, vec![1, 3]);
        assert_eq!(config.control.hysteresis_width, 0.5);
    }

    #[test]
    fn test_override_parsing() {
        let mut value = defaults_value().unwrap();
        apply_environment_overrides(
            &mut value,
            vec![
                ("EMG_ACQUISITION__SAMPLES_PER_BLOCK".to_string(), "4000".to_string()),
                ("EMG_NOSECTION".to_string(), "1".to_string()),
                ("PATH".to_string(), "/usr/bin".to_string()),
            ]
            .into_iter(),
        );
        let config: SystemConfig = value.try_into().unwrap();
        assert_eq!(config.acquisition.samples_per_block, 4000);
    }

    #[test]
    #[serial]
    fn test_config_export() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("exported.toml");
        let loader = ConfigLoader::with_paths(Vec::new());

        loader.export_config(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("[device]"));
        let mut reloaded = ConfigLoader::with_paths(vec![path]);
        assert_eq!(reloaded.load_system_config().unwrap(), SystemConfig::default());
    }

    #[test]
    #[serial]
    fn test_manual_reload_reaches_callback() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[setpoint]\nhand_gain = 1.0\n").unwrap();

        let mut loader = ConfigLoader::with_paths(vec![path.clone()]);
        loader.load_system_config().unwrap();

        let (tx, rx) = mpsc::channel();
        loader
            .enable_hot_reload(move |config| {
                let _ = tx.send(config.setpoint.hand_gain);
            })
            .unwrap();

        std::fs::write(&path, "[setpoint]\nhand_gain = 2.0\n").unwrap();
        loader.reload().unwrap();

        let gain = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(gain, 2.0);
    }
}
