//! BYOS → PAYG license conversion.
//!
//! Each matched instance is attempted exactly once: fetch its current
//! detail, locate the boot disk, pick a target license, and replace the
//! disk's license list with that single license. Failures are recorded
//! per instance and never stop the batch.

use thiserror::Error;

use crate::catalog::{Instance, summarize_licenses};
use crate::compute::{ComputeApi, Operation, last_segment};
use crate::config::TimingConfig;
use crate::error::ApiError;
use crate::license::{Classification, LicenseTable};
use crate::observer::{ConversionEvent, ConversionObserver};
use crate::wait::poll_until;

/// Why a conversion attempt failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionFailure {
    #[error("error getting instance details: {0}")]
    InstanceLookup(String),

    #[error("instance has no disks")]
    NoDisks,

    #[error("could not determine disk name")]
    DiskName,

    #[error("could not determine license for OS: {0}")]
    UnknownLicense(String),

    #[error("error making API request: {0}")]
    Request(String),

    #[error("API request failed: {status} - {body}")]
    Rejected { status: u16, body: String },
}

impl From<ApiError> for ConversionFailure {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Status { status, body, .. } => Self::Rejected { status, body },
            other => Self::Request(other.to_string()),
        }
    }
}

/// State of a post-conversion check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    /// Not checked yet (or the attempt failed).
    Unchecked,
    /// The disk reports these license identifiers.
    Verified(Vec<String>),
    /// No licenses visible and the VM is stopped.
    NeedsStart,
    /// No licenses visible on a running VM.
    Pending,
    /// The disk could not be read back.
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionStatus {
    Converted,
    Failed(ConversionFailure),
}

/// One conversion attempt for one instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionRecord {
    pub instance: Instance,
    /// License summary before the attempt.
    pub original: String,
    pub disk: Option<String>,
    pub target_license: Option<String>,
    /// Disk patch request URL.
    pub update_url: Option<String>,
    pub operation: Option<String>,
    pub status: ConversionStatus,
    /// Description of the resulting license state.
    pub after: String,
    pub verification: Verification,
}

impl ConversionRecord {
    fn new(instance: &Instance) -> Self {
        Self {
            instance: instance.clone(),
            original: summarize_licenses(&instance.licenses),
            disk: None,
            target_license: None,
            update_url: None,
            operation: None,
            status: ConversionStatus::Converted,
            after: String::new(),
            verification: Verification::Unchecked,
        }
    }

    fn fail(mut self, failure: ConversionFailure) -> Self {
        self.after = failure.to_string();
        self.status = ConversionStatus::Failed(failure);
        self
    }

    pub fn succeeded(&self) -> bool {
        matches!(self.status, ConversionStatus::Converted)
    }

    pub fn failure(&self) -> Option<&ConversionFailure> {
        match &self.status {
            ConversionStatus::Failed(f) => Some(f),
            ConversionStatus::Converted => None,
        }
    }
}

/// Name of a disk from its resource URL, if there is one.
pub fn disk_name(source: &str) -> Option<&str> {
    Some(last_segment(source)).filter(|name| !name.is_empty())
}

pub struct Converter<'a, C> {
    api: &'a C,
    table: &'a LicenseTable,
    timing: &'a TimingConfig,
}

impl<'a, C: ComputeApi> Converter<'a, C> {
    pub fn new(api: &'a C, table: &'a LicenseTable, timing: &'a TimingConfig) -> Self {
        Self { api, table, timing }
    }

    /// Attempt every instance in order. Returns one record per instance.
    pub async fn convert_all(
        &self,
        instances: &[Instance],
        observer: &mut dyn ConversionObserver,
    ) -> Vec<ConversionRecord> {
        let mut records = Vec::with_capacity(instances.len());
        for instance in instances {
            let record = self.convert_one(instance, observer).await;
            match record.failure() {
                Some(failure) => {
                    tracing::warn!(instance = %instance.name, zone = %instance.zone, %failure, "conversion failed")
                }
                None => {
                    tracing::info!(instance = %instance.name, zone = %instance.zone, "conversion submitted")
                }
            }
            observer.on_event(&ConversionEvent::Outcome { record: &record });
            records.push(record);
        }
        records
    }

    pub async fn convert_one(
        &self,
        instance: &Instance,
        observer: &mut dyn ConversionObserver,
    ) -> ConversionRecord {
        observer.on_event(&ConversionEvent::Attempt { instance });
        let mut record = ConversionRecord::new(instance);

        let detail = match self
            .api
            .get_instance(&instance.project, &instance.zone, &instance.name)
            .await
        {
            Ok(detail) => detail,
            Err(e) => return record.fail(ConversionFailure::InstanceLookup(e.to_string())),
        };

        let Some(boot) = detail.disks.first() else {
            return record.fail(ConversionFailure::NoDisks);
        };

        let Some(disk) = disk_name(&boot.source) else {
            return record.fail(ConversionFailure::DiskName);
        };
        record.disk = Some(disk.to_string());

        let target = match self.table.classify(&instance.licenses) {
            Classification::Target(target) => target,
            Classification::NoLicenseData => {
                let image = match self.api.get_disk(&instance.project, &instance.zone, disk).await {
                    Ok(d) => Some(d.source_image),
                    Err(e) => {
                        tracing::warn!(instance = %instance.name, disk, error = %e, "could not get disk details");
                        None
                    }
                };
                let image = image.filter(|i| !i.is_empty());
                let target = self.table.target_for_image(image.as_deref()).to_string();
                observer.on_event(&ConversionEvent::ImageLookup {
                    instance,
                    source_image: image.as_deref(),
                    target: &target,
                });
                target
            }
            Classification::Unrecognized => {
                let original = record.original.clone();
                return record.fail(ConversionFailure::UnknownLicense(original));
            }
        };

        let url = self
            .api
            .disk_patch_url(&instance.project, &instance.zone, disk);
        record.target_license = Some(target.clone());
        record.update_url = Some(url.clone());

        observer.on_event(&ConversionEvent::Patch {
            instance,
            disk,
            target: &target,
            url: &url,
        });

        let body = match self
            .api
            .patch_disk_licenses(&instance.project, &instance.zone, disk, &target)
            .await
        {
            Ok(body) => body,
            Err(e) => return record.fail(e.into()),
        };

        let parsed: Result<Operation, _> = facet_json::from_str(&body);
        let operation = parsed.ok().filter(|op| !op.name.is_empty());
        if let Some(op) = &operation {
            tracing::debug!(instance = %instance.name, operation = %op.name, status = %op.status, "disk update operation");
            observer.on_event(&ConversionEvent::Operation {
                instance,
                operation: op,
            });
            record.operation = Some(op.name.clone());
        }

        self.settle(instance, operation.as_ref(), observer).await;

        record.after = if instance.is_running() {
            format!("PAYG: Converting to {target}")
        } else {
            format!(
                "PAYG license applied to disk (VM status: {})",
                instance.status
            )
        };
        record
    }

    /// Give the update a bounded chance to start: poll its operation until
    /// `DONE`, or wait one poll interval when there is none to poll.
    async fn settle(
        &self,
        instance: &Instance,
        operation: Option<&Operation>,
        observer: &mut dyn ConversionObserver,
    ) {
        let timeout = self.timing.settle_timeout();
        let interval = self.timing.poll_interval();

        observer.on_event(&ConversionEvent::Waiting {
            message: "Waiting for the disk update to start",
        });
        match operation {
            Some(op) if !op.is_done() => {
                let api = self.api;
                let project = instance.project.as_str();
                let zone = instance.zone.as_str();
                let name = op.name.as_str();
                let deadline = tokio::time::Instant::now() + timeout;
                let polled = poll_until(deadline, interval, move || async move {
                    match api.get_zone_operation(project, zone, name).await {
                        Ok(op) => (op.is_done(), op.status),
                        Err(e) => {
                            tracing::debug!(error = %e, "operation poll failed");
                            (false, String::new())
                        }
                    }
                })
                .await;
                tracing::debug!(operation = name, settled = polled.settled, status = %polled.value, "operation wait finished");
            }
            Some(_) => {}
            None => tokio::time::sleep(interval.min(timeout)).await,
        }
        observer.on_event(&ConversionEvent::Waited);
    }
}
