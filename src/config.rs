use crate::defaults;
use crate::error::{Result, VoxrelayError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub audio: AudioConfig,
    pub recognizer: RecognizerConfig,
    pub delivery: DeliveryConfig,
}

/// Audio capture configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub clip_secs: u64,
}

/// Speech recognizer configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RecognizerConfig {
    pub executable: PathBuf,
    pub model: PathBuf,
    pub language: String,
}

/// Result delivery configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct DeliveryConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: defaults::SAMPLE_RATE,
            channels: defaults::CHANNELS,
            clip_secs: defaults::CLIP_SECS,
        }
    }
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            executable: PathBuf::from(defaults::RECOGNIZER_BIN),
            model: PathBuf::from(defaults::MODEL_PATH),
            language: defaults::LANGUAGE.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Only returns defaults if the file is missing.
    /// Panics on invalid TOML so a broken config is never silently ignored.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(VoxrelayError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Self::default()
            }
            Err(e) => panic!("Failed to load config from {}: {}", path.display(), e),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - VOXRELAY_RECOGNIZER → recognizer.executable
    /// - VOXRELAY_MODEL → recognizer.model
    /// - VOXRELAY_LANGUAGE → recognizer.language
    /// - VOXRELAY_API_HOST → delivery.host
    /// - VOXRELAY_CLIP_SECS → audio.clip_secs
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(executable) = std::env::var("VOXRELAY_RECOGNIZER")
            && !executable.is_empty()
        {
            self.recognizer.executable = PathBuf::from(executable);
        }

        if let Ok(model) = std::env::var("VOXRELAY_MODEL")
            && !model.is_empty()
        {
            self.recognizer.model = PathBuf::from(model);
        }

        if let Ok(language) = std::env::var("VOXRELAY_LANGUAGE")
            && !language.is_empty()
        {
            self.recognizer.language = language;
        }

        if let Ok(host) = std::env::var("VOXRELAY_API_HOST")
            && !host.is_empty()
        {
            self.delivery.host = Some(host);
        }

        if let Ok(secs) = std::env::var("VOXRELAY_CLIP_SECS")
            && let Ok(secs) = secs.parse::<u64>()
            && secs > 0
        {
            self.audio.clip_secs = secs;
        }

        self
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/voxrelay/config.toml on Linux
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .expect("Could not determine config directory")
            .join("voxrelay")
            .join("config.toml")
    }

    /// Check that every numeric setting is usable before the pipeline starts.
    pub fn validate(&self) -> Result<()> {
        if self.audio.sample_rate == 0 {
            return Err(VoxrelayError::ConfigInvalidValue {
                key: "audio.sample_rate".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.audio.channels == 0 {
            return Err(VoxrelayError::ConfigInvalidValue {
                key: "audio.channels".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.audio.clip_secs == 0 {
            return Err(VoxrelayError::ConfigInvalidValue {
                key: "audio.clip_secs".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// The delivery host, or an error naming the missing key.
    ///
    /// The pipeline refuses to start without a destination for results.
    pub fn require_host(&self) -> Result<&str> {
        self.delivery.host.as_deref().ok_or_else(|| {
            VoxrelayError::ConfigMissingValue {
                key: "delivery.host".to_string(),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    // Mutex to serialize tests that modify environment variables
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    // SAFETY: These helpers are only used in tests with ENV_LOCK held,
    // ensuring no concurrent access to environment variables.
    fn set_env(key: &str, value: &str) {
        unsafe { std::env::set_var(key, value) }
    }

    fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) }
    }

    fn clear_voxrelay_env() {
        remove_env("VOXRELAY_RECOGNIZER");
        remove_env("VOXRELAY_MODEL");
        remove_env("VOXRELAY_LANGUAGE");
        remove_env("VOXRELAY_API_HOST");
        remove_env("VOXRELAY_CLIP_SECS");
    }

    #[test]
    fn test_default_config_has_correct_values() {
        let config = Config::default();

        // Audio defaults
        assert_eq!(config.audio.sample_rate, 16000);
        assert_eq!(config.audio.channels, 1);
        assert_eq!(config.audio.clip_secs, 3);

        // Recognizer defaults
        assert_eq!(
            config.recognizer.executable,
            PathBuf::from("./whisper.cpp/build/bin/whisper-cli")
        );
        assert_eq!(
            config.recognizer.model,
            PathBuf::from("./whisper.cpp/models/ggml-base.bin")
        );
        assert_eq!(config.recognizer.language, "ko");

        // Delivery defaults
        assert_eq!(config.delivery.host, None);
    }

    #[test]
    fn test_load_from_toml_file() {
        let toml_content = r#"
            [audio]
            sample_rate = 48000
            channels = 2
            clip_secs = 5

            [recognizer]
            executable = "/opt/whisper/whisper-cli"
            model = "/opt/whisper/ggml-large-v3.bin"
            language = "en"

            [delivery]
            host = "192.168.0.10"
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = Config::load(temp_file.path()).unwrap();

        assert_eq!(config.audio.sample_rate, 48000);
        assert_eq!(config.audio.channels, 2);
        assert_eq!(config.audio.clip_secs, 5);

        assert_eq!(
            config.recognizer.executable,
            PathBuf::from("/opt/whisper/whisper-cli")
        );
        assert_eq!(
            config.recognizer.model,
            PathBuf::from("/opt/whisper/ggml-large-v3.bin")
        );
        assert_eq!(config.recognizer.language, "en");

        assert_eq!(config.delivery.host, Some("192.168.0.10".to_string()));
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let toml_content = r#"
            [recognizer]
            language = "en"
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = Config::load(temp_file.path()).unwrap();

        // Only language should be overridden
        assert_eq!(config.recognizer.language, "en");

        // Everything else should be defaults
        assert_eq!(config.audio.sample_rate, 16000);
        assert_eq!(config.audio.channels, 1);
        assert_eq!(config.audio.clip_secs, 3);
        assert_eq!(
            config.recognizer.model,
            PathBuf::from("./whisper.cpp/models/ggml-base.bin")
        );
        assert_eq!(config.delivery.host, None);
    }

    #[test]
    fn test_env_override_language() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_voxrelay_env();

        set_env("VOXRELAY_LANGUAGE", "en");
        let config = Config::default().with_env_overrides();

        assert_eq!(config.recognizer.language, "en");
        assert_eq!(config.delivery.host, None); // Not overridden

        clear_voxrelay_env();
    }

    #[test]
    fn test_env_override_all() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_voxrelay_env();

        set_env("VOXRELAY_RECOGNIZER", "/usr/local/bin/whisper-cli");
        set_env("VOXRELAY_MODEL", "/models/ggml-small.bin");
        set_env("VOXRELAY_LANGUAGE", "ja");
        set_env("VOXRELAY_API_HOST", "10.0.0.3");
        set_env("VOXRELAY_CLIP_SECS", "7");

        let config = Config::default().with_env_overrides();

        assert_eq!(
            config.recognizer.executable,
            PathBuf::from("/usr/local/bin/whisper-cli")
        );
        assert_eq!(
            config.recognizer.model,
            PathBuf::from("/models/ggml-small.bin")
        );
        assert_eq!(config.recognizer.language, "ja");
        assert_eq!(config.delivery.host, Some("10.0.0.3".to_string()));
        assert_eq!(config.audio.clip_secs, 7);

        clear_voxrelay_env();
    }

    #[test]
    fn test_env_override_empty_string_ignored() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_voxrelay_env();

        set_env("VOXRELAY_LANGUAGE", "");
        let config = Config::default().with_env_overrides();

        // Empty string should not override default
        assert_eq!(config.recognizer.language, "ko");

        clear_voxrelay_env();
    }

    #[test]
    fn test_env_override_rejects_bad_clip_secs() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_voxrelay_env();

        set_env("VOXRELAY_CLIP_SECS", "0");
        let config = Config::default().with_env_overrides();
        assert_eq!(config.audio.clip_secs, 3);

        set_env("VOXRELAY_CLIP_SECS", "soon");
        let config = Config::default().with_env_overrides();
        assert_eq!(config.audio.clip_secs, 3);

        clear_voxrelay_env();
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let invalid_toml = r#"
            [audio
            sample_rate = "broken
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(invalid_toml.as_bytes()).unwrap();

        let result = Config::load(temp_file.path());

        assert!(result.is_err());
    }

    #[test]
    fn test_default_path_is_xdg_compliant() {
        let path = Config::default_path();
        let path_str = path.to_string_lossy();

        // Should contain .config/voxrelay/config.toml
        assert!(path_str.contains(".config"));
        assert!(path_str.contains("voxrelay"));
        assert!(path_str.ends_with("config.toml"));
    }

    #[test]
    fn test_load_or_default_returns_default_for_missing_file() {
        let missing_path = Path::new("/tmp/nonexistent_voxrelay_config_12345.toml");
        let config = Config::load_or_default(missing_path);

        // Should return defaults
        assert_eq!(config, Config::default());
    }

    #[test]
    #[should_panic(expected = "Failed to load config")]
    fn test_load_or_default_panics_on_invalid_toml() {
        let invalid_toml = r#"
            [audio
            sample_rate = "broken
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(invalid_toml.as_bytes()).unwrap();

        // Should panic on invalid TOML, not return defaults
        Config::load_or_default(temp_file.path());
    }

    #[test]
    fn test_validate_accepts_defaults() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_clip_secs() {
        let mut config = Config::default();
        config.audio.clip_secs = 0;

        match config.validate() {
            Err(VoxrelayError::ConfigInvalidValue { key, .. }) => {
                assert_eq!(key, "audio.clip_secs");
            }
            other => panic!("Expected ConfigInvalidValue, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_rejects_zero_sample_rate() {
        let mut config = Config::default();
        config.audio.sample_rate = 0;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_channels() {
        let mut config = Config::default();
        config.audio.channels = 0;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_require_host_returns_configured_host() {
        let mut config = Config::default();
        config.delivery.host = Some("192.168.0.10".to_string());

        assert_eq!(config.require_host().unwrap(), "192.168.0.10");
    }

    #[test]
    fn test_require_host_errors_when_unset() {
        let config = Config::default();

        match config.require_host() {
            Err(VoxrelayError::ConfigMissingValue { key }) => {
                assert_eq!(key, "delivery.host");
            }
            other => panic!("Expected ConfigMissingValue, got {:?}", other),
        }
    }
}
