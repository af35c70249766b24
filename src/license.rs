//! Target license selection for BYOS → PAYG conversion.

use crate::config::{LicenseConfig, LicenseRule};

/// What an instance's existing license identifiers say about its target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// A rule marker was found; convert to this license URL.
    Target(String),
    /// No license identifiers at all; look at the boot disk's image.
    NoLicenseData,
    /// Licenses exist but none matches a marker. Never guessed at.
    Unrecognized,
}

/// Ordered marker → target table plus the no-data default.
#[derive(Debug, Clone)]
pub struct LicenseTable {
    rules: Vec<LicenseRule>,
    default: String,
}

impl LicenseTable {
    pub fn new(rules: Vec<LicenseRule>, default: String) -> Self {
        let rules = rules
            .into_iter()
            .map(|r| LicenseRule {
                marker: r.marker.to_lowercase(),
                target: r.target,
            })
            .collect();
        Self { rules, default }
    }

    pub fn from_config(config: &LicenseConfig) -> Self {
        Self::new(config.effective_rules(), config.effective_default())
    }

    fn find(&self, haystack: &str) -> Option<&str> {
        let haystack = haystack.to_lowercase();
        self.rules
            .iter()
            .find(|r| haystack.contains(&r.marker))
            .map(|r| r.target.as_str())
    }

    /// Classify by existing license identifiers, case-insensitively.
    pub fn classify(&self, licenses: &[String]) -> Classification {
        if let Some(target) = self.find(&licenses.join(" ")) {
            return Classification::Target(target.to_string());
        }
        if licenses.is_empty() {
            Classification::NoLicenseData
        } else {
            Classification::Unrecognized
        }
    }

    /// Target for an instance without license data, from its source image.
    /// `None` (image unknown) and unmatched images both yield the default.
    pub fn target_for_image(&self, source_image: Option<&str>) -> &str {
        source_image
            .and_then(|image| self.find(image))
            .unwrap_or(&self.default)
    }
}

impl Default for LicenseTable {
    fn default() -> Self {
        Self::from_config(&LicenseConfig::default())
    }
}
