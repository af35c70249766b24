//! Match a previously exported instance list against the live inventory.

use std::collections::HashMap;
use std::path::Path;

use crate::catalog::Instance;
use crate::error::GcexError;
use crate::inventory::ExportedInstanceRecord;

/// Outcome of reconciling an export file with the live inventory.
#[derive(Debug, Clone)]
pub struct Reconciliation {
    /// Live instances, in export-file order.
    pub matched: Vec<Instance>,
    /// `zone/name` of records with no live counterpart.
    pub missing: Vec<String>,
}

/// Split exported records into live matches and missing keys.
///
/// Matching is exact on `(zone, name)`.
pub fn match_records(records: &[ExportedInstanceRecord], live: &[Instance]) -> Reconciliation {
    let by_key: HashMap<(&str, &str), &Instance> = live.iter().map(|i| (i.key(), i)).collect();

    let mut matched = Vec::new();
    let mut missing = Vec::new();
    for record in records {
        match by_key.get(&record.key()) {
            Some(instance) => matched.push((*instance).clone()),
            None => missing.push(format!("{}/{}", record.zone, record.name)),
        }
    }

    Reconciliation { matched, missing }
}

/// Match records read from the export file at `path` against `live`.
///
/// Fails when nothing matches.
pub fn reconcile(
    records: &[ExportedInstanceRecord],
    path: &Path,
    project: &str,
    live: &[Instance],
) -> Result<Reconciliation, GcexError> {
    let result = match_records(records, live);

    for key in &result.missing {
        tracing::warn!(instance = %key, "exported instance not found in project");
    }

    if result.matched.is_empty() {
        return Err(GcexError::NoMatches {
            path: path.display().to_string(),
            project: project.to_string(),
        });
    }

    tracing::info!(
        matched = result.matched.len(),
        missing = result.missing.len(),
        "reconciled export file"
    );
    Ok(result)
}
