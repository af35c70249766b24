//! Post-conversion check: read each converted disk back and describe what
//! it now reports. Verification only refines `after`; it never turns a
//! converted record into a failed one.

use crate::catalog::{license_identifier, license_identifiers};
use crate::compute::ComputeApi;
use crate::config::TimingConfig;
use crate::convert::{ConversionRecord, Verification};
use crate::observer::{ConversionEvent, ConversionObserver};
use crate::wait::poll_until;

use tokio::time::Instant;

pub const NEEDS_START: &str = "License changed, but VM needs to be started to verify";
pub const MAY_BE_PENDING: &str = "License change may be pending";

pub struct Verifier<'a, C> {
    api: &'a C,
    timing: &'a TimingConfig,
}

impl<'a, C: ComputeApi> Verifier<'a, C> {
    pub fn new(api: &'a C, timing: &'a TimingConfig) -> Self {
        Self { api, timing }
    }

    /// Check every converted record in place. Failed records are skipped.
    /// The verify timeout bounds the whole batch: each disk gets whatever
    /// time the disks before it left over, and at least one read.
    pub async fn verify_all(
        &self,
        records: &mut [ConversionRecord],
        observer: &mut dyn ConversionObserver,
    ) {
        if !records.iter().any(ConversionRecord::succeeded) {
            return;
        }

        observer.on_event(&ConversionEvent::Waiting {
            message: "Waiting for license changes to propagate",
        });
        let deadline = Instant::now() + self.timing.verify_timeout();
        for record in records.iter_mut().filter(|r| r.succeeded()) {
            self.verify_one(record, deadline).await;
        }
        observer.on_event(&ConversionEvent::Waited);

        for record in records.iter().filter(|r| r.succeeded()) {
            observer.on_event(&ConversionEvent::Verified { record });
        }
    }

    /// Poll the disk until it reports the target license or `deadline`
    /// passes, then classify the last observation.
    async fn verify_one(&self, record: &mut ConversionRecord, deadline: Instant) {
        let instance = &record.instance;
        let Some(disk) = record.disk.as_deref() else {
            record.verification = Verification::Unavailable("disk name unknown".into());
            return;
        };
        let expected = record.target_license.as_deref().map(license_identifier);

        tracing::debug!(instance = %instance.name, disk, "verifying license change");

        let api = self.api;
        let project = instance.project.as_str();
        let zone = instance.zone.as_str();
        let expected_ref = expected.as_deref();
        let polled = poll_until(
            deadline,
            self.timing.poll_interval(),
            move || async move {
                match api.get_disk(project, zone, disk).await {
                    Ok(d) => {
                        let ids = license_identifiers(&d.licenses);
                        let done = match expected_ref {
                            Some(e) => ids.iter().any(|id| id == e),
                            None => !ids.is_empty(),
                        };
                        (done, Ok(ids))
                    }
                    Err(e) => (false, Err(e.to_string())),
                }
            },
        )
        .await;

        let verification = match polled.value {
            Ok(ids) if !ids.is_empty() => Verification::Verified(ids),
            Ok(_) if !instance.is_running() => Verification::NeedsStart,
            Ok(_) => Verification::Pending,
            Err(message) => Verification::Unavailable(message),
        };

        match &verification {
            Verification::Verified(ids) => {
                tracing::info!(instance = %instance.name, licenses = %ids.join(", "), "licenses found on disk");
                record.after = ids.join(", ");
            }
            Verification::NeedsStart => record.after = NEEDS_START.into(),
            Verification::Pending => record.after = MAY_BE_PENDING.into(),
            Verification::Unavailable(message) => {
                tracing::warn!(instance = %instance.name, error = %message, "could not read disk back");
            }
            Verification::Unchecked => {}
        }
        record.verification = verification;
    }
}
