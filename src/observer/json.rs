//! JSON-lines observer for `--output json`: one object per event, then a
//! summary object.

use std::io::Write;

use facet::Facet;

use super::{ConversionEvent, ConversionObserver, success_count};
use crate::convert::ConversionRecord;

#[derive(Debug, Default, Facet)]
#[facet(default)]
struct EventLine {
    event: String,
    instance: Option<String>,
    zone: Option<String>,
    detail: Option<String>,
    ok: Option<bool>,
}

#[derive(Debug, Facet)]
struct RecordLine {
    instance: String,
    zone: String,
    before: String,
    after: String,
    ok: bool,
    error: Option<String>,
    operation: Option<String>,
}

#[derive(Debug, Facet)]
struct SummaryLine {
    event: String,
    succeeded: usize,
    total: usize,
    records: Vec<RecordLine>,
}

pub struct JsonObserver<W: Write> {
    out: W,
}

impl<W: Write> JsonObserver<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    #[cfg(test)]
    pub(crate) fn into_inner(self) -> W {
        self.out
    }

    fn emit<'a, T: Facet<'a>>(&mut self, value: &T) {
        match facet_json::to_string(value) {
            Ok(line) => {
                let _ = writeln!(self.out, "{line}");
            }
            Err(e) => tracing::warn!(error = %e, "failed to encode progress event"),
        }
    }
}

fn event_line(event: &ConversionEvent<'_>) -> EventLine {
    match event {
        ConversionEvent::Attempt { instance } => EventLine {
            event: "attempt".into(),
            instance: Some(instance.name.clone()),
            zone: Some(instance.zone.clone()),
            ..Default::default()
        },
        ConversionEvent::ImageLookup {
            instance,
            source_image,
            target,
        } => EventLine {
            event: "image_lookup".into(),
            instance: Some(instance.name.clone()),
            zone: Some(instance.zone.clone()),
            detail: Some(format!("{} -> {target}", source_image.unwrap_or("unknown"))),
            ..Default::default()
        },
        ConversionEvent::Patch {
            instance,
            disk,
            target,
            ..
        } => EventLine {
            event: "patch".into(),
            instance: Some(instance.name.clone()),
            zone: Some(instance.zone.clone()),
            detail: Some(format!("{disk} -> {target}")),
            ..Default::default()
        },
        ConversionEvent::Operation {
            instance,
            operation,
        } => EventLine {
            event: "operation".into(),
            instance: Some(instance.name.clone()),
            zone: Some(instance.zone.clone()),
            detail: Some(operation.name.clone()),
            ..Default::default()
        },
        ConversionEvent::Waiting { message } => EventLine {
            event: "waiting".into(),
            detail: Some(message.to_string()),
            ..Default::default()
        },
        ConversionEvent::Waited => EventLine {
            event: "waited".into(),
            ..Default::default()
        },
        ConversionEvent::Outcome { record } => EventLine {
            event: "outcome".into(),
            instance: Some(record.instance.name.clone()),
            zone: Some(record.instance.zone.clone()),
            detail: Some(record.after.clone()),
            ok: Some(record.succeeded()),
        },
        ConversionEvent::Verified { record } => EventLine {
            event: "verified".into(),
            instance: Some(record.instance.name.clone()),
            zone: Some(record.instance.zone.clone()),
            detail: Some(record.after.clone()),
            ok: Some(record.succeeded()),
        },
    }
}

impl<W: Write> ConversionObserver for JsonObserver<W> {
    fn on_event(&mut self, event: &ConversionEvent<'_>) {
        let line = event_line(event);
        self.emit(&line);
    }

    fn on_summary(&mut self, records: &[ConversionRecord]) {
        let summary = SummaryLine {
            event: "summary".into(),
            succeeded: success_count(records),
            total: records.len(),
            records: records
                .iter()
                .map(|r| RecordLine {
                    instance: r.instance.name.clone(),
                    zone: r.instance.zone.clone(),
                    before: r.original.clone(),
                    after: r.after.clone(),
                    ok: r.succeeded(),
                    error: r.failure().map(|f| f.to_string()),
                    operation: r.operation.clone(),
                })
                .collect(),
        };
        self.emit(&summary);
    }
}
