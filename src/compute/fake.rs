//! In-memory `ComputeApi` for tests.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use super::{
    AttachedDisk, ComputeApi, DiskResource, InstanceAggregatedList, InstanceResource,
    InstancesScopedList, Metadata, Operation,
};
use crate::error::ApiError;

#[derive(Default)]
struct State {
    pages: Vec<InstanceAggregatedList>,
    failing_page: Option<usize>,
    instances: HashMap<(String, String), InstanceResource>,
    disks: HashMap<(String, String), DiskResource>,
    /// Disk licenses reported by successive `get_disk` calls, per disk.
    disk_reads: HashMap<(String, String), VecDeque<Vec<String>>>,
    failing_instances: HashSet<String>,
    failing_patches: HashMap<String, (u16, String)>,
    patch_response: Option<String>,
    calls: Vec<String>,
}

#[derive(Default)]
pub struct FakeCompute {
    state: Mutex<State>,
}

fn not_found(url: String) -> ApiError {
    ApiError::Status {
        url,
        status: 404,
        body: "not found".into(),
    }
}

impl FakeCompute {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an instance whose boot disk is named after it.
    pub fn with_instance(self, zone: &str, name: &str, status: &str, license_urls: &[&str]) -> Self {
        let resource = InstanceResource {
            name: name.into(),
            machine_type: format!("zones/{zone}/machineTypes/e2-medium"),
            status: status.into(),
            disks: vec![AttachedDisk {
                source: format!("projects/proj/zones/{zone}/disks/{name}-boot"),
                disk_type: "PERSISTENT".into(),
                interface: "SCSI".into(),
                disk_size_gb: "20".into(),
                licenses: license_urls.iter().map(|s| s.to_string()).collect(),
            }],
            ..Default::default()
        };
        self.with_resource(zone, resource)
    }

    pub fn with_resource(self, zone: &str, resource: InstanceResource) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            for disk in &resource.disks {
                let disk_name = disk.source.rsplit('/').next().unwrap_or_default().to_string();
                state.disks.insert(
                    (zone.to_string(), disk_name.clone()),
                    DiskResource {
                        name: disk_name,
                        source_image: String::new(),
                        licenses: disk.licenses.clone(),
                    },
                );
            }
            state
                .instances
                .insert((zone.to_string(), resource.name.clone()), resource);
        }
        self
    }

    pub fn with_source_image(self, zone: &str, disk: &str, image: &str) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            let entry = state
                .disks
                .entry((zone.to_string(), disk.to_string()))
                .or_default();
            entry.name = disk.to_string();
            entry.source_image = image.to_string();
        }
        self
    }

    pub fn without_disk(self, zone: &str, disk: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .disks
            .remove(&(zone.to_string(), disk.to_string()));
        self
    }

    /// Serve the registered instances as pages of `per_page` instances.
    pub fn paginate(self, per_page: usize) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            let mut all: Vec<(String, InstanceResource)> = state
                .instances
                .iter()
                .map(|((zone, _), r)| (zone.clone(), r.clone()))
                .collect();
            all.sort_by(|a, b| (&a.0, &a.1.name).cmp(&(&b.0, &b.1.name)));

            let chunks: Vec<_> = all.chunks(per_page.max(1)).map(|c| c.to_vec()).collect();
            let count = chunks.len();
            state.pages = chunks
                .into_iter()
                .enumerate()
                .map(|(i, chunk)| {
                    let mut items: BTreeMap<String, InstancesScopedList> = BTreeMap::new();
                    for (zone, resource) in chunk {
                        items
                            .entry(format!("zones/{zone}"))
                            .or_default()
                            .instances
                            .push(resource);
                    }
                    InstanceAggregatedList {
                        items,
                        next_page_token: (i + 1 < count).then(|| format!("page-{}", i + 1)),
                    }
                })
                .collect();
        }
        self
    }

    pub fn fail_page(self, index: usize) -> Self {
        self.state.lock().unwrap().failing_page = Some(index);
        self
    }

    pub fn fail_instance_get(self, name: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_instances
            .insert(name.to_string());
        self
    }

    pub fn fail_patch(self, disk: &str, status: u16, body: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_patches
            .insert(disk.to_string(), (status, body.to_string()));
        self
    }

    pub fn with_patch_response(self, body: &str) -> Self {
        self.state.lock().unwrap().patch_response = Some(body.to_string());
        self
    }

    /// Queue what successive disk reads will report after the patch.
    pub fn with_disk_reads(self, zone: &str, disk: &str, reads: Vec<Vec<String>>) -> Self {
        self.state
            .lock()
            .unwrap()
            .disk_reads
            .insert((zone.to_string(), disk.to_string()), reads.into());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn instance(&self, zone: &str, name: &str) -> Option<InstanceResource> {
        self.state
            .lock()
            .unwrap()
            .instances
            .get(&(zone.to_string(), name.to_string()))
            .cloned()
    }

    pub fn patches(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with("patch "))
            .collect()
    }

    fn record(&self, call: String) {
        self.state.lock().unwrap().calls.push(call);
    }
}

impl ComputeApi for FakeCompute {
    async fn list_instances_page(
        &self,
        project: &str,
        page_token: Option<&str>,
    ) -> Result<InstanceAggregatedList, ApiError> {
        self.record(format!("list {project} {}", page_token.unwrap_or("-")));
        let state = self.state.lock().unwrap();
        let index = match page_token {
            None => 0,
            Some(t) => t.trim_start_matches("page-").parse().unwrap_or(usize::MAX),
        };
        if state.failing_page == Some(index) {
            return Err(ApiError::Status {
                url: format!("aggregated/instances?page={index}"),
                status: 500,
                body: "backend error".into(),
            });
        }
        if state.pages.is_empty() && index == 0 {
            let mut items: BTreeMap<String, InstancesScopedList> = BTreeMap::new();
            for ((zone, _), resource) in &state.instances {
                items
                    .entry(format!("zones/{zone}"))
                    .or_default()
                    .instances
                    .push(resource.clone());
            }
            return Ok(InstanceAggregatedList {
                items,
                next_page_token: None,
            });
        }
        state
            .pages
            .get(index)
            .cloned()
            .ok_or_else(|| not_found(format!("page {index}")))
    }

    async fn get_instance(
        &self,
        project: &str,
        zone: &str,
        name: &str,
    ) -> Result<InstanceResource, ApiError> {
        self.record(format!("get_instance {project} {zone} {name}"));
        let state = self.state.lock().unwrap();
        if state.failing_instances.contains(name) {
            return Err(ApiError::Status {
                url: format!("instances/{name}"),
                status: 503,
                body: "unavailable".into(),
            });
        }
        state
            .instances
            .get(&(zone.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| not_found(format!("instances/{name}")))
    }

    async fn get_disk(
        &self,
        project: &str,
        zone: &str,
        disk: &str,
    ) -> Result<DiskResource, ApiError> {
        self.record(format!("get_disk {project} {zone} {disk}"));
        let mut state = self.state.lock().unwrap();
        let key = (zone.to_string(), disk.to_string());
        let queued = state.disk_reads.get_mut(&key).and_then(|q| {
            // The last queued read repeats once the queue is down to it.
            if q.len() > 1 { q.pop_front() } else { q.front().cloned() }
        });
        let mut resource = state
            .disks
            .get(&key)
            .cloned()
            .ok_or_else(|| not_found(format!("disks/{disk}")))?;
        if let Some(licenses) = queued {
            resource.licenses = licenses;
        }
        Ok(resource)
    }

    async fn start_instance(
        &self,
        project: &str,
        zone: &str,
        name: &str,
    ) -> Result<Operation, ApiError> {
        self.record(format!("start {project} {zone} {name}"));
        Ok(Operation {
            name: format!("operation-start-{name}"),
            status: "RUNNING".into(),
            zone: zone.into(),
        })
    }

    async fn stop_instance(
        &self,
        project: &str,
        zone: &str,
        name: &str,
    ) -> Result<Operation, ApiError> {
        self.record(format!("stop {project} {zone} {name}"));
        Ok(Operation {
            name: format!("operation-stop-{name}"),
            status: "RUNNING".into(),
            zone: zone.into(),
        })
    }

    async fn set_metadata(
        &self,
        project: &str,
        zone: &str,
        name: &str,
        metadata: &Metadata,
    ) -> Result<Operation, ApiError> {
        self.record(format!("set_metadata {project} {zone} {name}"));
        let mut state = self.state.lock().unwrap();
        let instance = state
            .instances
            .get_mut(&(zone.to_string(), name.to_string()))
            .ok_or_else(|| not_found(format!("instances/{name}")))?;
        instance.metadata = Some(metadata.clone());
        Ok(Operation {
            name: format!("operation-metadata-{name}"),
            status: "DONE".into(),
            zone: zone.into(),
        })
    }

    async fn patch_disk_licenses(
        &self,
        project: &str,
        zone: &str,
        disk: &str,
        license_url: &str,
    ) -> Result<String, ApiError> {
        self.record(format!("patch {project} {zone} {disk} {license_url}"));
        let mut state = self.state.lock().unwrap();
        if let Some((status, body)) = state.failing_patches.get(disk) {
            return Err(ApiError::Status {
                url: self.disk_patch_url(project, zone, disk),
                status: *status,
                body: body.clone(),
            });
        }
        if let Some(resource) = state.disks.get_mut(&(zone.to_string(), disk.to_string())) {
            resource.licenses = vec![license_url.to_string()];
        }
        Ok(state.patch_response.clone().unwrap_or_else(|| {
            format!(r#"{{"name":"operation-patch-{disk}","status":"RUNNING","zone":"{zone}"}}"#)
        }))
    }

    async fn get_zone_operation(
        &self,
        project: &str,
        zone: &str,
        operation: &str,
    ) -> Result<Operation, ApiError> {
        self.record(format!("get_operation {project} {zone} {operation}"));
        Ok(Operation {
            name: operation.into(),
            status: "DONE".into(),
            zone: zone.into(),
        })
    }

    fn disk_patch_url(&self, project: &str, zone: &str, disk: &str) -> String {
        format!("https://fake/projects/{project}/zones/{zone}/disks/{disk}?paths=licenses")
    }
}
