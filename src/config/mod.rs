use std::env;
use std::path::PathBuf;
use std::time::Duration;
use validator::Validate;

/// Minimum number of PDFs accepted by the merge route.
pub const MIN_MERGE_FILES: usize = 2;
/// Maximum number of PDFs accepted by the merge route.
pub const MAX_MERGE_FILES: usize = 10;
/// Maximum number of images accepted by the image-to-PDF route.
pub const MAX_IMAGE_FILES: usize = 20;

/// Runtime configuration for staging, conversion and cleanup
#[derive(Debug, Clone, Validate)]
pub struct ConverterConfig {
    /// Directory receiving uploaded files
    pub staging_dir: PathBuf,

    /// Directory receiving converted artifacts
    pub output_dir: PathBuf,

    /// Root under which per-invocation office profiles are created
    pub office_profile_dir: PathBuf,

    /// Maximum size of a single uploaded file in bytes (default: 10 MB)
    #[validate(range(min = 1, message = "MAX_FILE_SIZE must be positive"))]
    pub max_file_size: usize,

    /// Office suite binary (default: "libreoffice")
    #[validate(length(min = 1, message = "OFFICE_BINARY cannot be empty"))]
    pub office_binary: String,

    /// Office conversion timeout in seconds (default: 300)
    #[validate(range(min = 1, message = "OFFICE_TIMEOUT_SECS must be positive"))]
    pub office_timeout_secs: u64,

    /// Delay between finishing a response and deleting its files (default: 3)
    pub cleanup_grace_secs: u64,

    /// Janitor sweep interval in seconds (default: 1800)
    #[validate(range(min = 1, message = "JANITOR_INTERVAL_SECS must be positive"))]
    pub janitor_interval_secs: u64,

    /// Age after which the janitor deletes a file, in seconds (default: 3600)
    pub retention_secs: u64,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        let root = env::temp_dir().join("doc-converter");
        Self {
            staging_dir: root.join("uploads"),
            output_dir: root.join("converted"),
            office_profile_dir: root.join("office-profiles"),
            max_file_size: 10 * 1024 * 1024, // 10 MB
            office_binary: "libreoffice".to_string(),
            office_timeout_secs: 300,
            cleanup_grace_secs: 3,
            janitor_interval_secs: 1800,
            retention_secs: 3600,
        }
    }
}

impl ConverterConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            staging_dir: env::var("STAGING_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.staging_dir),

            output_dir: env::var("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.output_dir),

            office_profile_dir: env::var("OFFICE_PROFILE_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.office_profile_dir),

            max_file_size: env::var("MAX_FILE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_file_size),

            office_binary: env::var("OFFICE_BINARY").unwrap_or(default.office_binary),

            office_timeout_secs: env::var("OFFICE_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.office_timeout_secs),

            cleanup_grace_secs: env::var("CLEANUP_GRACE_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.cleanup_grace_secs),

            janitor_interval_secs: env::var("JANITOR_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.janitor_interval_secs),

            retention_secs: env::var("RETENTION_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.retention_secs),
        }
    }

    /// Config rooted in the given directory, with no cleanup grace delay.
    /// Used by tests and local runs that want an isolated working area.
    pub fn for_dirs(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            staging_dir: root.join("uploads"),
            output_dir: root.join("converted"),
            office_profile_dir: root.join("office-profiles"),
            cleanup_grace_secs: 0,
            ..Self::default()
        }
    }

    pub fn office_timeout(&self) -> Duration {
        Duration::from_secs(self.office_timeout_secs)
    }

    pub fn cleanup_grace(&self) -> Duration {
        Duration::from_secs(self.cleanup_grace_secs)
    }

    pub fn janitor_interval(&self) -> Duration {
        Duration::from_secs(self.janitor_interval_secs)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }

    /// Transport-level body limit: a full image batch plus multipart overhead
    pub fn max_request_size(&self) -> usize {
        self.max_file_size
            .saturating_mul(MAX_IMAGE_FILES)
            .saturating_add(1024 * 1024)
    }

    /// Create every working directory if missing
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.staging_dir)?;
        std::fs::create_dir_all(&self.output_dir)?;
        std::fs::create_dir_all(&self.office_profile_dir)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ConverterConfig::default();
        assert_eq!(config.max_file_size, 10 * 1024 * 1024);
        assert_eq!(config.office_binary, "libreoffice");
        assert_eq!(config.office_timeout(), Duration::from_secs(300));
        assert_eq!(config.retention(), Duration::from_secs(3600));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_for_dirs_config() {
        let config = ConverterConfig::for_dirs("/tmp/converter-test");
        assert_eq!(config.staging_dir, PathBuf::from("/tmp/converter-test/uploads"));
        assert_eq!(config.output_dir, PathBuf::from("/tmp/converter-test/converted"));
        assert_eq!(config.cleanup_grace(), Duration::ZERO);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ConverterConfig {
            office_timeout_secs: 0,
            office_binary: String::new(),
            ..ConverterConfig::default()
        };
        let errors = config.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("office_timeout_secs"));
        assert!(fields.contains_key("office_binary"));
    }

    #[test]
    fn test_request_limit_covers_full_batch() {
        let config = ConverterConfig::default();
        assert!(config.max_request_size() > config.max_file_size * MAX_IMAGE_FILES);
    }

    #[test]
    fn test_request_limit_saturates() {
        let config = ConverterConfig {
            max_file_size: usize::MAX / 2,
            ..ConverterConfig::default()
        };
        assert_eq!(config.max_request_size(), usize::MAX);
    }
}
