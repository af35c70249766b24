//! Export file: a hand-editable YAML list of instances, one file per project.
//!
//! Export writes `{project}-instances.yml`; the operator may delete entries
//! to narrow a later conversion run, which reads the same file back.

use std::path::Path;

use facet::Facet;
use thiserror::Error;

use crate::catalog::Instance;
use crate::error::GcexError;

const HEADER: &str = "# Instances exported by gcex. Remove entries you do not want converted.\n";

#[derive(Debug, Clone, Default, PartialEq, Eq, Facet)]
#[facet(default)]
pub struct ExportedInstanceRecord {
    #[facet(default)]
    pub name: String,
    #[facet(default)]
    pub zone: String,
    #[facet(default, rename = "machineType")]
    pub machine_type: String,
    #[facet(default)]
    pub status: String,
    #[facet(default)]
    pub licenses: Vec<String>,
}

impl ExportedInstanceRecord {
    pub fn key(&self) -> (&str, &str) {
        (&self.zone, &self.name)
    }
}

impl From<&Instance> for ExportedInstanceRecord {
    fn from(instance: &Instance) -> Self {
        Self {
            name: instance.name.clone(),
            zone: instance.zone.clone(),
            machine_type: instance.machine_type.clone(),
            status: instance.status.clone(),
            licenses: instance.licenses.clone(),
        }
    }
}

/// The export file's YAML could not be produced or read.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("could not encode instance list: {0}")]
    Encode(String),

    #[error("{0}")]
    Decode(String),
}

pub fn render(records: &[ExportedInstanceRecord]) -> Result<String, FormatError> {
    let records = records.to_vec();
    let body = facet_yaml::to_string(&records).map_err(|e| FormatError::Encode(e.to_string()))?;
    Ok(format!("{HEADER}{body}"))
}

pub fn parse(contents: &str) -> Result<Vec<ExportedInstanceRecord>, FormatError> {
    let meaningful = contents
        .lines()
        .any(|l| !l.trim().is_empty() && !l.trim_start().starts_with('#'));
    if !meaningful {
        return Ok(Vec::new());
    }
    facet_yaml::from_str(contents).map_err(|e| FormatError::Decode(e.to_string()))
}

/// Write every instance to `path`, replacing any existing file.
pub fn export_instances(instances: &[Instance], path: &Path) -> Result<usize, GcexError> {
    let records: Vec<ExportedInstanceRecord> = instances.iter().map(Into::into).collect();
    let write_err = |message: String| GcexError::ExportWrite {
        path: path.display().to_string(),
        message,
    };

    let yaml = render(&records).map_err(|e| write_err(e.to_string()))?;

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| write_err(e.to_string()))?;
    }
    std::fs::write(path, yaml).map_err(|e| write_err(e.to_string()))?;

    tracing::info!(path = %path.display(), count = records.len(), "exported instances");
    Ok(records.len())
}

/// Read an export file back.
pub fn import_instances(path: &Path) -> Result<Vec<ExportedInstanceRecord>, GcexError> {
    if !path.exists() {
        return Err(GcexError::ExportMissing {
            path: path.display().to_string(),
        });
    }

    let contents = std::fs::read_to_string(path).map_err(|e| GcexError::Io {
        context: format!("reading {}", path.display()),
        source: e,
    })?;

    parse(&contents).map_err(|e| GcexError::ExportParse {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}
