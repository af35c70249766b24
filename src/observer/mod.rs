//! Conversion progress rendering.
//!
//! The conversion engine and verifier report what they are doing through
//! a `ConversionObserver`; implementations render it as plain text or as
//! JSON lines. Events are delivered in order, one instance at a time.

pub mod json;
pub mod plain;

use crate::catalog::Instance;
use crate::compute::Operation;
use crate::convert::ConversionRecord;

#[derive(Debug, Clone, Copy)]
pub enum ConversionEvent<'a> {
    /// Work on an instance begins.
    Attempt { instance: &'a Instance },
    /// No license data on the instance; target chosen from the disk image.
    ImageLookup {
        instance: &'a Instance,
        source_image: Option<&'a str>,
        target: &'a str,
    },
    /// About to send the license patch.
    Patch {
        instance: &'a Instance,
        disk: &'a str,
        target: &'a str,
        url: &'a str,
    },
    /// The patch was accepted and returned an operation.
    Operation {
        instance: &'a Instance,
        operation: &'a Operation,
    },
    /// A bounded wait begins.
    Waiting { message: &'a str },
    /// The wait ended.
    Waited,
    /// Conversion attempt finished, either way.
    Outcome { record: &'a ConversionRecord },
    /// Verification updated a converted record.
    Verified { record: &'a ConversionRecord },
}

pub trait ConversionObserver {
    fn on_event(&mut self, event: &ConversionEvent<'_>);

    /// Called once with the final records after verification.
    fn on_summary(&mut self, records: &[ConversionRecord]);
}

/// Number of successful records, for `X/Y succeeded` summaries.
pub fn success_count(records: &[ConversionRecord]) -> usize {
    records.iter().filter(|r| r.succeeded()).count()
}
