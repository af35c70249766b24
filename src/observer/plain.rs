//! Human-readable observer: inline ✓/✗ lines, a spinner during waits when
//! attached to a terminal.

use std::io::Write;
use std::time::Duration;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use super::{ConversionEvent, ConversionObserver, success_count};
use crate::convert::ConversionRecord;

pub struct PlainObserver<W: Write> {
    out: W,
    animate: bool,
    spinner: Option<ProgressBar>,
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

impl<W: Write> PlainObserver<W> {
    /// `animate` enables the wait spinner; pass whether stderr is a TTY.
    pub fn new(out: W, animate: bool) -> Self {
        Self {
            out,
            animate,
            spinner: None,
        }
    }

    #[cfg(test)]
    pub(crate) fn into_inner(self) -> W {
        self.out
    }

    // Output errors (closed pipe) are not worth aborting a conversion for.
    fn line(&mut self, text: std::fmt::Arguments<'_>) {
        let _ = writeln!(self.out, "{text}");
    }
}

impl<W: Write> ConversionObserver for PlainObserver<W> {
    fn on_event(&mut self, event: &ConversionEvent<'_>) {
        match event {
            ConversionEvent::Attempt { instance } => {
                self.line(format_args!(
                    "Processing {} ({})...",
                    instance.name, instance.zone
                ));
            }
            ConversionEvent::ImageLookup {
                source_image,
                target,
                ..
            } => {
                self.line(format_args!(
                    "  No license data; source image {} -> {}",
                    source_image.unwrap_or("unknown"),
                    target
                ));
            }
            ConversionEvent::Patch { disk, target, .. } => {
                self.line(format_args!("  Updating disk {disk} to {target}"));
            }
            ConversionEvent::Operation { operation, .. } => {
                self.line(format_args!(
                    "  Operation: {} ({})",
                    operation.name, operation.status
                ));
            }
            ConversionEvent::Waiting { message } => {
                if self.animate {
                    let bar = ProgressBar::new_spinner();
                    bar.set_style(spinner_style());
                    bar.set_message(message.to_string());
                    bar.enable_steady_tick(Duration::from_millis(80));
                    self.spinner = Some(bar);
                } else {
                    self.line(format_args!("{message}..."));
                }
            }
            ConversionEvent::Waited => {
                if let Some(bar) = self.spinner.take() {
                    bar.finish_and_clear();
                }
            }
            ConversionEvent::Outcome { record } => match record.failure() {
                None => self.line(format_args!(
                    "{} {}: {}",
                    style("\u{2713}").green(),
                    record.instance.name,
                    record.after
                )),
                Some(failure) => self.line(format_args!(
                    "{} {}: {}",
                    style("\u{2717}").red(),
                    record.instance.name,
                    failure
                )),
            },
            ConversionEvent::Verified { record } => {
                self.line(format_args!(
                    "  {} now reports: {}",
                    record.instance.name, record.after
                ));
            }
        }
    }

    fn on_summary(&mut self, records: &[ConversionRecord]) {
        self.line(format_args!("\nConversion Results:"));
        self.line(format_args!("-------------------"));
        for record in records {
            self.line(format_args!(
                "Instance: {} ({})",
                record.instance.name, record.instance.zone
            ));
            self.line(format_args!("  Before: {}", record.original));
            match record.failure() {
                None => self.line(format_args!("  After:  {}", record.after)),
                Some(failure) => self.line(format_args!("  Status: Failed - {failure}")),
            }
        }
        self.line(format_args!(
            "\nConverted {}/{} instances successfully.",
            success_count(records),
            records.len()
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::tests::instance;

    fn render(f: impl FnOnce(&mut PlainObserver<Vec<u8>>)) -> String {
        let mut observer = PlainObserver::new(Vec::new(), false);
        f(&mut observer);
        String::from_utf8(observer.into_inner()).unwrap()
    }

    #[test]
    fn waits_print_a_line_without_a_terminal() {
        let out = render(|o| {
            o.on_event(&ConversionEvent::Waiting {
                message: "Waiting for the disk update to start",
            });
            o.on_event(&ConversionEvent::Waited);
        });
        assert_eq!(out, "Waiting for the disk update to start...\n");
    }

    #[test]
    fn attempt_names_instance_and_zone() {
        let web = instance("us-central1-a", "web", "RUNNING", &[]);
        let out = render(|o| o.on_event(&ConversionEvent::Attempt { instance: &web }));
        assert_eq!(out, "Processing web (us-central1-a)...\n");
    }

    #[test]
    fn image_lookup_without_image_says_unknown() {
        let web = instance("z1", "web", "RUNNING", &[]);
        let out = render(|o| {
            o.on_event(&ConversionEvent::ImageLookup {
                instance: &web,
                source_image: None,
                target: "rhel-9-server",
            })
        });
        assert!(out.contains("source image unknown -> rhel-9-server"));
    }

    #[test]
    fn summary_reports_before_after_and_counts() {
        use crate::convert::{ConversionFailure, ConversionStatus, Verification};

        let ok = ConversionRecord {
            instance: instance("z1", "web", "RUNNING", &["rhel-cloud:rhel-8-byos"]),
            original: "rhel-cloud:rhel-8-byos".into(),
            disk: Some("web-boot".into()),
            target_license: Some("rhel-8-server".into()),
            update_url: None,
            operation: None,
            status: ConversionStatus::Converted,
            after: "rhel-cloud:rhel-8-server".into(),
            verification: Verification::Verified(vec!["rhel-cloud:rhel-8-server".into()]),
        };
        let failed = ConversionRecord {
            instance: instance("z1", "db", "RUNNING", &[]),
            original: "none".into(),
            status: ConversionStatus::Failed(ConversionFailure::NoDisks),
            after: "instance has no disks".into(),
            verification: Verification::Unchecked,
            disk: None,
            ..ok.clone()
        };

        let out = render(|o| o.on_summary(&[ok.clone(), failed]));
        assert!(out.contains("Instance: web (z1)\n  Before: rhel-cloud:rhel-8-byos\n  After:  rhel-cloud:rhel-8-server\n"));
        assert!(out.contains("Instance: db (z1)\n  Before: none\n  Status: Failed - instance has no disks\n"));
        assert!(out.ends_with("Converted 1/2 instances successfully.\n"));
    }
}
