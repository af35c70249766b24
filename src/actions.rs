//! Single-instance operations offered by the console menu.

use crate::compute::{ComputeApi, Metadata, MetadataItem, Operation};
use crate::error::{ApiError, GcexError};

/// Metadata key the annotated license is stored under.
pub const LICENSE_METADATA_KEY: &str = "license";

pub async fn start_instance<C: ComputeApi>(
    api: &C,
    project: &str,
    zone: &str,
    name: &str,
) -> Result<Operation, GcexError> {
    tracing::info!(instance = name, zone, "starting instance");
    let op = api
        .start_instance(project, zone, name)
        .await
        .map_err(|e| not_found_as_unknown(e, zone, name))?;
    tracing::debug!(operation = %op.name, "start issued");
    Ok(op)
}

pub async fn stop_instance<C: ComputeApi>(
    api: &C,
    project: &str,
    zone: &str,
    name: &str,
) -> Result<Operation, GcexError> {
    tracing::info!(instance = name, zone, "stopping instance");
    let op = api
        .stop_instance(project, zone, name)
        .await
        .map_err(|e| not_found_as_unknown(e, zone, name))?;
    tracing::debug!(operation = %op.name, "stop issued");
    Ok(op)
}

/// Record `license_url` in the instance's metadata under `license`.
///
/// This is bookkeeping only: the disk's actual license list is left alone.
/// Other metadata items are preserved and the current fingerprint is sent
/// back so a concurrent edit is rejected by the API instead of lost.
pub async fn annotate_license<C: ComputeApi>(
    api: &C,
    project: &str,
    zone: &str,
    name: &str,
    license_url: &str,
) -> Result<Operation, GcexError> {
    let license_url = license_url.trim();
    if license_url.is_empty() {
        return Err(GcexError::Validation {
            message: "license URL must not be empty".into(),
        });
    }

    let resource = api
        .get_instance(project, zone, name)
        .await
        .map_err(|e| not_found_as_unknown(e, zone, name))?;
    if resource.disks.is_empty() {
        return Err(GcexError::NoDisks { name: name.into() });
    }

    let metadata = with_license(resource.metadata.unwrap_or_default(), license_url);
    tracing::info!(instance = name, zone, license = license_url, "recording license in metadata");
    Ok(api.set_metadata(project, zone, name, &metadata).await?)
}

fn with_license(mut metadata: Metadata, license_url: &str) -> Metadata {
    match metadata
        .items
        .iter_mut()
        .find(|item| item.key == LICENSE_METADATA_KEY)
    {
        Some(item) => item.value = Some(license_url.to_string()),
        None => metadata.items.push(MetadataItem {
            key: LICENSE_METADATA_KEY.into(),
            value: Some(license_url.to_string()),
        }),
    }
    metadata
}

fn not_found_as_unknown(err: ApiError, zone: &str, name: &str) -> GcexError {
    match err {
        ApiError::Status { status: 404, .. } => GcexError::UnknownInstance {
            name: name.into(),
            zone: zone.into(),
        },
        other => other.into(),
    }
}
