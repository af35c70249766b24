//! Live instance inventory for one project.
//!
//! The inventory is rebuilt from the API on every fetch; nothing here is
//! persisted.

use std::io::Write;

use crate::compute::{ComputeApi, InstanceResource, last_segment};
use crate::error::GcexError;

/// A normalized view of one instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    pub name: String,
    pub zone: String,
    pub project: String,
    /// Short form, e.g. `e2-medium`.
    pub machine_type: String,
    pub status: String,
    /// First external IP of the first network interface.
    pub ip: Option<String>,
    /// `{interface}-{type}` of the boot disk, e.g. `SCSI-PERSISTENT`.
    pub disk_type: String,
    pub disk_size_gb: u64,
    /// Identifiers derived from the boot disk's license URLs.
    pub licenses: Vec<String>,
}

impl Instance {
    pub fn is_running(&self) -> bool {
        self.status == "RUNNING"
    }

    /// Matching key used when reconciling against an export file.
    pub fn key(&self) -> (&str, &str) {
        (&self.zone, &self.name)
    }

    /// Comma-joined license identifiers, or `none`.
    pub fn license_summary(&self) -> String {
        summarize_licenses(&self.licenses)
    }

    pub fn from_resource(project: &str, zone: &str, resource: &InstanceResource) -> Self {
        let ip = resource
            .network_interfaces
            .first()
            .and_then(|nic| nic.access_configs.first())
            .map(|ac| ac.nat_ip.clone())
            .filter(|ip| !ip.is_empty());

        let (disk_type, disk_size_gb, licenses) = match resource.disks.first() {
            Some(boot) => {
                let disk_type = if boot.interface.is_empty() {
                    boot.disk_type.clone()
                } else {
                    format!("{}-{}", boot.interface, boot.disk_type)
                };
                let size = boot.disk_size_gb.parse().unwrap_or(0);
                (disk_type, size, license_identifiers(&boot.licenses))
            }
            None => (String::new(), 0, Vec::new()),
        };

        Self {
            name: resource.name.clone(),
            zone: zone.to_string(),
            project: project.to_string(),
            machine_type: last_segment(&resource.machine_type).to_string(),
            status: resource.status.clone(),
            ip,
            disk_type,
            disk_size_gb,
            licenses,
        }
    }
}

pub fn summarize_licenses(licenses: &[String]) -> String {
    if licenses.is_empty() {
        "none".to_string()
    } else {
        licenses.join(", ")
    }
}

/// Derive a short identifier from a license URL.
///
/// `https://www.googleapis.com/compute/v1/projects/rhel-cloud/global/licenses/rhel-8-server`
/// becomes `rhel-cloud:rhel-8-server`. URLs with fewer than six segments
/// fall back to their last segment.
pub fn license_identifier(url: &str) -> String {
    let parts: Vec<&str> = url.split('/').collect();
    if parts.len() >= 6 {
        format!("{}:{}", parts[parts.len() - 4], parts[parts.len() - 1])
    } else {
        base_name(url)
    }
}

pub fn license_identifiers(urls: &[String]) -> Vec<String> {
    urls.iter().map(|u| license_identifier(u)).collect()
}

/// Last path element, ignoring trailing slashes (`.` for an empty path).
fn base_name(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    if trimmed.is_empty() {
        return if url.is_empty() { ".".into() } else { "/".into() };
    }
    last_segment(trimmed).to_string()
}

/// Fetch every instance across all zones, draining all result pages.
///
/// Any page failure aborts the listing; partial results are discarded.
pub async fn list_instances<C: ComputeApi>(
    api: &C,
    project: &str,
) -> Result<Vec<Instance>, GcexError> {
    let mut instances = Vec::new();
    let mut page_token: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let page = api
            .list_instances_page(project, page_token.as_deref())
            .await
            .map_err(|source| GcexError::Listing {
                project: project.to_string(),
                source,
            })?;
        pages += 1;

        for (scope, scoped) in &page.items {
            let zone = scope.strip_prefix("zones/").unwrap_or(scope);
            for resource in &scoped.instances {
                instances.push(Instance::from_resource(project, zone, resource));
            }
        }

        match page.next_page_token {
            Some(token) if !token.is_empty() => page_token = Some(token),
            _ => break,
        }
    }

    tracing::debug!(project, pages, count = instances.len(), "listed instances");
    Ok(instances)
}

/// Print a one-line-per-instance table.
pub fn display_instances(instances: &[Instance], w: &mut (impl Write + ?Sized)) -> std::io::Result<()> {
    let headers = ["NAME", "ZONE", "MACHINE TYPE", "STATUS", "LICENSES"];
    let rows: Vec<[String; 5]> = instances
        .iter()
        .map(|i| {
            [
                i.name.clone(),
                i.zone.clone(),
                i.machine_type.clone(),
                i.status.clone(),
                i.license_summary(),
            ]
        })
        .collect();

    let mut widths = headers.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row.iter()) {
            *width = (*width).max(cell.len());
        }
    }

    let line = |cells: [&str; 5]| {
        let mut out = String::new();
        for (i, cell) in cells.iter().enumerate() {
            if i == cells.len() - 1 {
                out.push_str(cell);
            } else {
                out.push_str(&format!("{cell:<width$}  ", width = widths[i]));
            }
        }
        out
    };

    writeln!(w, "{}", line(headers))?;
    for row in &rows {
        writeln!(w, "{}", line(row.each_ref().map(String::as_str)))?;
    }
    Ok(())
}

/// `name (zone, status)` label used in selection prompts.
pub fn format_instance_label(instance: &Instance) -> String {
    format!("{} ({}, {})", instance.name, instance.zone, instance.status)
}
