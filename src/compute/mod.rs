//! Compute Engine API seam.
//!
//! `ComputeApi` is the set of calls the console makes against a project;
//! `gce::GceClient` implements it over the REST API. Wire types mirror the
//! camelCase JSON resources and only carry the fields this tool reads.

pub mod gce;
#[cfg(test)]
pub mod fake;

use std::collections::BTreeMap;

use facet::Facet;

use crate::error::ApiError;

#[allow(async_fn_in_trait)] // trait is internal-only
pub trait ComputeApi {
    /// One page of the all-zones instance listing.
    async fn list_instances_page(
        &self,
        project: &str,
        page_token: Option<&str>,
    ) -> Result<InstanceAggregatedList, ApiError>;

    async fn get_instance(
        &self,
        project: &str,
        zone: &str,
        name: &str,
    ) -> Result<InstanceResource, ApiError>;

    async fn get_disk(&self, project: &str, zone: &str, disk: &str)
    -> Result<DiskResource, ApiError>;

    async fn start_instance(
        &self,
        project: &str,
        zone: &str,
        name: &str,
    ) -> Result<Operation, ApiError>;

    async fn stop_instance(
        &self,
        project: &str,
        zone: &str,
        name: &str,
    ) -> Result<Operation, ApiError>;

    async fn set_metadata(
        &self,
        project: &str,
        zone: &str,
        name: &str,
        metadata: &Metadata,
    ) -> Result<Operation, ApiError>;

    /// Replace the disk's license list with exactly `license_url`.
    /// Returns the raw 2xx response body.
    async fn patch_disk_licenses(
        &self,
        project: &str,
        zone: &str,
        disk: &str,
        license_url: &str,
    ) -> Result<String, ApiError>;

    async fn get_zone_operation(
        &self,
        project: &str,
        zone: &str,
        operation: &str,
    ) -> Result<Operation, ApiError>;

    /// URL the license patch for `disk` is sent to.
    fn disk_patch_url(&self, project: &str, zone: &str, disk: &str) -> String;
}

// ── Wire types ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Facet)]
#[facet(default, rename_all = "camelCase")]
pub struct InstanceAggregatedList {
    /// Keyed by scope, e.g. `zones/us-central1-a`.
    #[facet(default)]
    pub items: BTreeMap<String, InstancesScopedList>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Default, Facet)]
#[facet(default)]
pub struct InstancesScopedList {
    #[facet(default)]
    pub instances: Vec<InstanceResource>,
}

#[derive(Debug, Clone, Default, Facet)]
#[facet(default, rename_all = "camelCase")]
pub struct InstanceResource {
    #[facet(default)]
    pub name: String,
    /// Full zone URL.
    #[facet(default)]
    pub zone: String,
    /// Full machine type URL.
    #[facet(default)]
    pub machine_type: String,
    #[facet(default)]
    pub status: String,
    #[facet(default)]
    pub network_interfaces: Vec<NetworkInterface>,
    #[facet(default)]
    pub disks: Vec<AttachedDisk>,
    pub metadata: Option<Metadata>,
}

#[derive(Debug, Clone, Default, Facet)]
#[facet(default, rename_all = "camelCase")]
pub struct NetworkInterface {
    #[facet(default)]
    pub access_configs: Vec<AccessConfig>,
}

#[derive(Debug, Clone, Default, Facet)]
#[facet(default)]
pub struct AccessConfig {
    #[facet(default, rename = "natIP")]
    pub nat_ip: String,
}

#[derive(Debug, Clone, Default, Facet)]
#[facet(default, rename_all = "camelCase")]
pub struct AttachedDisk {
    /// Full disk URL; the last segment is the disk name.
    #[facet(default)]
    pub source: String,
    /// `PERSISTENT` or `SCRATCH`.
    #[facet(default, rename = "type")]
    pub disk_type: String,
    /// `SCSI` or `NVME`.
    #[facet(default)]
    pub interface: String,
    /// int64 fields arrive as JSON strings.
    #[facet(default)]
    pub disk_size_gb: String,
    #[facet(default)]
    pub licenses: Vec<String>,
}

#[derive(Debug, Clone, Default, Facet)]
#[facet(default, rename_all = "camelCase")]
pub struct DiskResource {
    #[facet(default)]
    pub name: String,
    #[facet(default)]
    pub source_image: String,
    #[facet(default)]
    pub licenses: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Facet)]
#[facet(default)]
pub struct Metadata {
    #[facet(default)]
    pub fingerprint: String,
    #[facet(default)]
    pub items: Vec<MetadataItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Facet)]
#[facet(default)]
pub struct MetadataItem {
    #[facet(default)]
    pub key: String,
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, Facet)]
#[facet(default)]
pub struct Operation {
    #[facet(default)]
    pub name: String,
    /// `PENDING`, `RUNNING` or `DONE`.
    #[facet(default)]
    pub status: String,
    #[facet(default)]
    pub zone: String,
}

impl Operation {
    pub fn is_done(&self) -> bool {
        self.status == "DONE"
    }
}

/// Body of the disk license patch.
#[derive(Debug, Clone, Facet)]
pub struct DiskLicensePatch {
    pub name: String,
    pub licenses: Vec<String>,
}

/// Last `/`-separated segment of a resource URL.
pub fn last_segment(url: &str) -> &str {
    url.rsplit('/').next().unwrap_or(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_aggregated_page() {
        let body = r#"{
            "kind": "compute#instanceAggregatedList",
            "items": {
                "zones/us-central1-a": {
                    "instances": [{
                        "name": "web-1",
                        "zone": "https://www.googleapis.com/compute/v1/projects/p/zones/us-central1-a",
                        "machineType": "https://www.googleapis.com/compute/v1/projects/p/zones/us-central1-a/machineTypes/e2-medium",
                        "status": "RUNNING",
                        "networkInterfaces": [{"accessConfigs": [{"natIP": "34.1.2.3"}]}],
                        "disks": [{
                            "source": "https://www.googleapis.com/compute/v1/projects/p/zones/us-central1-a/disks/web-1",
                            "type": "PERSISTENT",
                            "interface": "SCSI",
                            "diskSizeGb": "20",
                            "boot": true,
                            "licenses": ["https://www.googleapis.com/compute/v1/projects/rhel-cloud/global/licenses/rhel-8-server"]
                        }]
                    }]
                },
                "zones/europe-west1-b": {
                    "warning": {"code": "NO_RESULTS_ON_PAGE"}
                }
            },
            "nextPageToken": "abc"
        }"#;

        let page: InstanceAggregatedList = facet_json::from_str(body).unwrap();
        assert_eq!(page.next_page_token.as_deref(), Some("abc"));
        assert_eq!(page.items.len(), 2);
        let zone = &page.items["zones/us-central1-a"];
        let inst = &zone.instances[0];
        assert_eq!(inst.name, "web-1");
        assert_eq!(inst.network_interfaces[0].access_configs[0].nat_ip, "34.1.2.3");
        assert_eq!(inst.disks[0].disk_size_gb, "20");
        assert_eq!(inst.disks[0].disk_type, "PERSISTENT");
        assert!(page.items["zones/europe-west1-b"].instances.is_empty());
    }

    #[test]
    fn decodes_operation() {
        let op: Operation =
            facet_json::from_str(r#"{"name":"operation-123","status":"RUNNING","zone":"z"}"#)
                .unwrap();
        assert_eq!(op.name, "operation-123");
        assert!(!op.is_done());
    }

    #[test]
    fn last_segment_of_url() {
        assert_eq!(last_segment("projects/p/zones/z/disks/boot-1"), "boot-1");
        assert_eq!(last_segment("plain"), "plain");
        assert_eq!(last_segment("trailing/"), "");
    }
}
