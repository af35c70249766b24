use std::path::{Path, PathBuf};
use std::time::Duration;

use facet::Facet;

use crate::error::GcexError;

pub const DEFAULT_CONFIG_FILE: &str = "gcex.toml";

const LICENSE_BASE: &str = "https://www.googleapis.com/compute/v1/projects/rhel-cloud/global/licenses";

#[derive(Debug, Clone, Default, Facet)]
#[facet(default)]
pub struct Config {
    #[facet(default)]
    pub api: ApiConfig,
    #[facet(default)]
    pub export: ExportConfig,
    #[facet(default)]
    pub timing: TimingConfig,
    #[facet(default)]
    pub licenses: LicenseConfig,
}

#[derive(Debug, Clone, Facet)]
#[facet(default)]
pub struct ApiConfig {
    #[facet(default = "https://compute.googleapis.com/compute/v1")]
    pub compute_base: String,
    /// License replacement on disks is only exposed by the alpha surface.
    #[facet(default = "https://compute.googleapis.com/compute/alpha")]
    pub disk_patch_base: String,
    #[facet(default = "GCEX_ACCESS_TOKEN")]
    pub access_token_env: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            compute_base: "https://compute.googleapis.com/compute/v1".into(),
            disk_patch_base: "https://compute.googleapis.com/compute/alpha".into(),
            access_token_env: "GCEX_ACCESS_TOKEN".into(),
        }
    }
}

#[derive(Debug, Clone, Facet)]
#[facet(default)]
pub struct ExportConfig {
    #[facet(default = ".")]
    pub dir: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self { dir: ".".into() }
    }
}

#[derive(Debug, Clone, Facet)]
#[facet(default)]
pub struct TimingConfig {
    #[facet(default = 5)]
    pub settle_timeout_s: u64,
    #[facet(default = 15)]
    pub verify_timeout_s: u64,
    #[facet(default = 1000)]
    pub poll_interval_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            settle_timeout_s: 5,
            verify_timeout_s: 15,
            poll_interval_ms: 1000,
        }
    }
}

impl TimingConfig {
    pub fn settle_timeout(&self) -> Duration {
        Duration::from_secs(self.settle_timeout_s)
    }

    pub fn verify_timeout(&self) -> Duration {
        Duration::from_secs(self.verify_timeout_s)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// One row of the license table: a lowercase marker searched for in
/// existing license identifiers (or the boot disk's source image) and the
/// PAYG license URL it converts to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Facet)]
#[facet(default)]
pub struct LicenseRule {
    pub marker: String,
    pub target: String,
}

impl LicenseRule {
    pub fn new(marker: &str, target: &str) -> Self {
        Self {
            marker: marker.into(),
            target: target.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Facet)]
#[facet(default)]
pub struct LicenseConfig {
    /// Target used when an instance carries no license data at all and
    /// its source image matches no marker. Empty means the built-in default.
    #[facet(default)]
    pub default: String,
    /// Checked in order; empty means the built-in table.
    #[facet(default)]
    pub rules: Vec<LicenseRule>,
}

impl LicenseConfig {
    pub fn effective_rules(&self) -> Vec<LicenseRule> {
        if self.rules.is_empty() {
            builtin_rules()
        } else {
            self.rules.clone()
        }
    }

    pub fn effective_default(&self) -> String {
        if self.default.is_empty() {
            format!("{LICENSE_BASE}/rhel-9-server")
        } else {
            self.default.clone()
        }
    }
}

pub fn builtin_rules() -> Vec<LicenseRule> {
    vec![
        LicenseRule::new("rhel-8", &format!("{LICENSE_BASE}/rhel-8-server")),
        LicenseRule::new("rhel-9", &format!("{LICENSE_BASE}/rhel-9-server")),
    ]
}

impl Config {
    /// Location of the export file for a project: `{dir}/{project}-instances.yml`.
    pub fn export_path(&self, project: &str) -> PathBuf {
        Path::new(&self.export.dir).join(format!("{project}-instances.yml"))
    }
}

fn validate_config(config: &Config) -> Result<(), GcexError> {
    for (key, url) in [
        ("api.compute_base", &config.api.compute_base),
        ("api.disk_patch_base", &config.api.disk_patch_base),
    ] {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(GcexError::Validation {
                message: format!("{key} must be an http(s) URL (got '{url}')"),
            });
        }
    }

    if config.api.access_token_env.is_empty() {
        return Err(GcexError::Validation {
            message: "api.access_token_env must not be empty".into(),
        });
    }

    if config.timing.poll_interval_ms == 0 {
        return Err(GcexError::Validation {
            message: "timing.poll_interval_ms must be greater than zero".into(),
        });
    }

    for rule in &config.licenses.rules {
        if rule.marker.trim().is_empty() || rule.target.trim().is_empty() {
            return Err(GcexError::Validation {
                message: "license rules need both a marker and a target".into(),
            });
        }
    }

    Ok(())
}

/// Load the config file.
///
/// `path` is `None` when the user did not pass `--config`: a missing
/// `gcex.toml` then means defaults. An explicitly named file must exist.
pub fn load_config(path: Option<&Path>) -> Result<Config, GcexError> {
    let (path, explicit) = match path {
        Some(p) => (p.to_path_buf(), true),
        None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
    };

    if !explicit && !path.exists() {
        tracing::debug!("no {DEFAULT_CONFIG_FILE} found, using defaults");
        return Ok(Config::default());
    }

    let contents = std::fs::read_to_string(&path).map_err(|source| GcexError::ConfigLoad {
        path: path.display().to_string(),
        source,
    })?;

    let config: Config = facet_toml::from_str(&contents).map_err(|e| GcexError::ConfigParse {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    validate_config(&config)?;
    tracing::debug!(path = %path.display(), "loaded config");

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &tempfile::TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("gcex.toml");
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn defaults_when_file_absent_and_not_explicit() {
        // Nothing named gcex.toml is expected in the crate root during tests.
        let config = load_config(None).unwrap();
        assert_eq!(config.timing.poll_interval_ms, 1000);
        assert_eq!(config.export.dir, ".");
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let err = load_config(Some(Path::new("/nonexistent/gcex.toml"))).unwrap_err();
        assert!(matches!(err, GcexError::ConfigLoad { .. }));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "[timing]\nverify_timeout_s = 30\n");
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.timing.verify_timeout_s, 30);
        assert_eq!(config.timing.settle_timeout_s, 5);
        assert!(config.api.compute_base.starts_with("https://"));
    }

    #[test]
    fn custom_license_rules_replace_builtin_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            r#"
[licenses]
default = "https://example.com/licenses/sles-15"

[[licenses.rules]]
marker = "sles-15"
target = "https://example.com/licenses/sles-15"
"#,
        );
        let config = load_config(Some(&path)).unwrap();
        let rules = config.licenses.effective_rules();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].marker, "sles-15");
        assert_eq!(
            config.licenses.effective_default(),
            "https://example.com/licenses/sles-15"
        );
    }

    #[test]
    fn builtin_table_used_when_rules_absent() {
        let config = Config::default();
        let rules = config.licenses.effective_rules();
        assert_eq!(rules.len(), 2);
        assert!(rules[0].target.ends_with("rhel-8-server"));
        assert!(config.licenses.effective_default().ends_with("rhel-9-server"));
    }

    #[test]
    fn zero_poll_interval_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "[timing]\npoll_interval_ms = 0\n");
        let err = load_config(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("poll_interval_ms"));
    }

    #[test]
    fn non_http_base_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "[api]\ncompute_base = \"ftp://nope\"\n");
        assert!(matches!(
            load_config(Some(&path)),
            Err(GcexError::Validation { .. })
        ));
    }

    #[test]
    fn empty_marker_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "[[licenses.rules]]\nmarker = \"\"\ntarget = \"https://x\"\n",
        );
        assert!(matches!(
            load_config(Some(&path)),
            Err(GcexError::Validation { .. })
        ));
    }

    #[test]
    fn malformed_toml_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "[timing\n");
        let err = load_config(Some(&path)).unwrap_err();
        assert!(matches!(err, GcexError::ConfigParse { .. }));
        assert!(err.to_string().contains("gcex.toml"));
    }

    #[test]
    fn export_path_is_project_named() {
        let mut config = Config::default();
        config.export.dir = "/tmp/exports".into();
        assert_eq!(
            config.export_path("my-proj"),
            PathBuf::from("/tmp/exports/my-proj-instances.yml")
        );
    }
}
