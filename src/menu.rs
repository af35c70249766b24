//! Interactive console and the workflows shared with the subcommands.

use std::fmt;
use std::io::Write;
use std::path::PathBuf;

use inquire::{Confirm, Select, Text};

use crate::actions;
use crate::catalog::{self, Instance, format_instance_label};
use crate::compute::{ComputeApi, Operation};
use crate::config::Config;
use crate::convert::{ConversionRecord, Converter};
use crate::error::GcexError;
use crate::inventory;
use crate::license::LicenseTable;
use crate::observer::ConversionObserver;
use crate::reconcile;
use crate::verify::Verifier;

/// Write a line of user-facing output, mapping I/O failures.
macro_rules! say {
    ($out:expr) => {
        writeln!($out).map_err(output_err)?
    };
    ($out:expr, $($arg:tt)*) => {
        writeln!($out, $($arg)*).map_err(output_err)?
    };
}

fn output_err(source: std::io::Error) -> GcexError {
    GcexError::Io {
        context: "writing output".into(),
        source,
    }
}

/// Everything one session works with: the API client, the project and
/// the loaded config.
pub struct Console<C> {
    api: C,
    project: String,
    config: Config,
    table: LicenseTable,
}

impl<C: ComputeApi> Console<C> {
    pub fn new(api: C, project: String, config: Config) -> Self {
        let table = LicenseTable::from_config(&config.licenses);
        Self {
            api,
            project,
            config,
            table,
        }
    }

    #[cfg(test)]
    pub(crate) fn api(&self) -> &C {
        &self.api
    }

    pub fn export_path(&self) -> PathBuf {
        self.config.export_path(&self.project)
    }

    pub async fn inventory(&self) -> Result<Vec<Instance>, GcexError> {
        catalog::list_instances(&self.api, &self.project).await
    }

    /// Fetch and print the inventory table.
    pub async fn list(&self, out: &mut dyn Write) -> Result<Vec<Instance>, GcexError> {
        let instances = self.inventory().await?;
        show_inventory(&self.project, &instances, out)?;
        Ok(instances)
    }

    /// Write `instances` to the project's export file.
    pub fn export(&self, instances: &[Instance], out: &mut dyn Write) -> Result<PathBuf, GcexError> {
        let path = self.export_path();
        let count = inventory::export_instances(instances, &path)?;
        say!(out, "Exported {count} instances to {}", path.display());
        Ok(path)
    }

    /// Reconcile the export file with the live inventory, confirm, convert
    /// and verify. Returns `None` when the user declines. The file is read
    /// before any API call, so a missing export fails without credentials
    /// being exercised.
    pub async fn convert(
        &self,
        confirm: impl FnOnce(&[Instance]) -> Result<bool, GcexError>,
        observer: &mut dyn ConversionObserver,
        out: &mut dyn Write,
    ) -> Result<Option<Vec<ConversionRecord>>, GcexError> {
        let path = self.export_path();
        let records = inventory::import_instances(&path)?;
        let live = self.inventory().await?;
        let plan = reconcile::reconcile(&records, &path, &self.project, &live)?;

        say!(out, "Instances to convert ({}):", plan.matched.len());
        for instance in &plan.matched {
            say!(
                out,
                "  {}/{}  [{}]  {}",
                instance.zone,
                instance.name,
                instance.license_summary(),
                instance.status
            );
        }
        if !plan.missing.is_empty() {
            say!(out, "Not found in project {}: {}", self.project, plan.missing.join(", "));
        }

        if !confirm(&plan.matched)? {
            say!(out, "Conversion cancelled.");
            return Ok(None);
        }

        let timing = &self.config.timing;
        let mut records = Converter::new(&self.api, &self.table, timing)
            .convert_all(&plan.matched, observer)
            .await;
        Verifier::new(&self.api, timing)
            .verify_all(&mut records, observer)
            .await;
        observer.on_summary(&records);
        Ok(Some(records))
    }

    pub async fn start(&self, zone: &str, name: &str, out: &mut dyn Write) -> Result<Operation, GcexError> {
        let op = actions::start_instance(&self.api, &self.project, zone, name).await?;
        say!(out, "Operation in progress: {}", op.name);
        Ok(op)
    }

    pub async fn stop(&self, zone: &str, name: &str, out: &mut dyn Write) -> Result<Operation, GcexError> {
        let op = actions::stop_instance(&self.api, &self.project, zone, name).await?;
        say!(out, "Operation in progress: {}", op.name);
        Ok(op)
    }

    pub async fn annotate(
        &self,
        zone: &str,
        name: &str,
        license_url: &str,
        out: &mut dyn Write,
    ) -> Result<Operation, GcexError> {
        let op = actions::annotate_license(&self.api, &self.project, zone, name, license_url).await?;
        say!(
            out,
            "Recorded license in metadata of {name}; the disk license is unchanged."
        );
        say!(out, "Operation in progress: {}", op.name);
        Ok(op)
    }

    /// The interactive loop: show the inventory, run the chosen action,
    /// repeat until Exit or Ctrl-C.
    pub async fn run_menu(&self, observer: &mut dyn ConversionObserver) -> Result<(), GcexError> {
        let mut stdout = std::io::stdout();
        let out: &mut dyn Write = &mut stdout;

        // A bad project or missing permission shows up here; nothing to fall back to.
        let mut instances = self.list(out).await?;

        loop {
            let action = match Select::new("What would you like to do?", MenuAction::ALL.to_vec())
                .prompt()
                .map_err(map_inquire_err)
            {
                Ok(action) => action,
                Err(GcexError::Cancelled) => continue,
                Err(e) => return Err(e),
            };

            if action == MenuAction::Exit {
                return Ok(());
            }

            let refresh = match self.run_action(action, &instances, observer, out).await {
                Ok(refresh) => refresh,
                Err(GcexError::Interrupted) => return Err(GcexError::Interrupted),
                Err(GcexError::Cancelled) => {
                    say!(out, "Cancelled.");
                    false
                }
                Err(e) => {
                    tracing::debug!(error = %e, "menu action failed");
                    eprintln!("{:?}", miette::Report::new(e));
                    false
                }
            };

            if refresh {
                match self.list(out).await {
                    Ok(fresh) => instances = fresh,
                    Err(e) => eprintln!("{:?}", miette::Report::new(e)),
                }
            }
        }
    }

    /// Run one menu entry. `Ok(true)` means the listing should be refreshed.
    async fn run_action(
        &self,
        action: MenuAction,
        instances: &[Instance],
        observer: &mut dyn ConversionObserver,
        out: &mut dyn Write,
    ) -> Result<bool, GcexError> {
        match action {
            MenuAction::Exit => Ok(false),
            MenuAction::Refresh => Ok(true),
            MenuAction::Export => {
                self.export(instances, out)?;
                Ok(false)
            }
            MenuAction::Start => {
                let Some(i) = pick_instance(instances, "Instance to turn on:", out)? else {
                    return Ok(false);
                };
                self.start(&i.zone, &i.name, out).await?;
                Ok(true)
            }
            MenuAction::Stop => {
                let Some(i) = pick_instance(instances, "Instance to turn off:", out)? else {
                    return Ok(false);
                };
                self.stop(&i.zone, &i.name, out).await?;
                Ok(true)
            }
            MenuAction::Annotate => {
                let Some(i) = pick_instance(instances, "Instance to annotate:", out)? else {
                    return Ok(false);
                };
                let url = Text::new("License URL:")
                    .with_help_message("stored under the `license` metadata key")
                    .prompt()
                    .map_err(map_inquire_err)?;
                self.annotate(&i.zone, &i.name, &url, out).await?;
                Ok(true)
            }
            MenuAction::Convert => {
                self.convert(confirm_conversion, observer, out).await?;
                Ok(true)
            }
        }
    }
}

fn show_inventory(project: &str, instances: &[Instance], out: &mut dyn Write) -> Result<(), GcexError> {
    say!(out, "\nInstances in project {project}:");
    if instances.is_empty() {
        say!(out, "  (none)");
        return Ok(());
    }
    catalog::display_instances(instances, &mut *out).map_err(output_err)?;
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MenuAction {
    Start,
    Stop,
    Annotate,
    Convert,
    Refresh,
    Export,
    Exit,
}

impl MenuAction {
    const ALL: [MenuAction; 7] = [
        MenuAction::Start,
        MenuAction::Stop,
        MenuAction::Annotate,
        MenuAction::Convert,
        MenuAction::Refresh,
        MenuAction::Export,
        MenuAction::Exit,
    ];
}

impl fmt::Display for MenuAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MenuAction::Start => "Turn ON instance",
            MenuAction::Stop => "Turn OFF instance",
            MenuAction::Annotate => "Replace license (metadata)",
            MenuAction::Convert => "BYOS to PAYG mass mover",
            MenuAction::Refresh => "Refresh list",
            MenuAction::Export => "Export instances to YAML",
            MenuAction::Exit => "Exit",
        })
    }
}

const CANCEL: &str = "Cancel";

fn pick_instance<'a>(
    instances: &'a [Instance],
    prompt: &str,
    out: &mut dyn Write,
) -> Result<Option<&'a Instance>, GcexError> {
    if instances.is_empty() {
        say!(out, "No instances in this project.");
        return Ok(None);
    }
    let mut labels: Vec<String> = instances.iter().map(format_instance_label).collect();
    labels.push(CANCEL.to_string());

    let choice = Select::new(prompt, labels.clone())
        .prompt()
        .map_err(map_inquire_err)?;
    Ok(labels
        .iter()
        .position(|l| *l == choice)
        .and_then(|i| instances.get(i)))
}

pub fn confirm_conversion(matched: &[Instance]) -> Result<bool, GcexError> {
    Confirm::new(&format!(
        "Switch {} instance(s) to PAYG licensing?",
        matched.len()
    ))
    .with_default(false)
    .prompt()
    .map_err(map_inquire_err)
}

/// Ask for the project ID when it was not given on the command line.
pub fn prompt_project() -> Result<String, GcexError> {
    let project = Text::new("Project ID:")
        .with_validator(|input: &str| {
            if input.trim().is_empty() {
                Ok(inquire::validator::Validation::Invalid(
                    "project ID must not be empty".into(),
                ))
            } else {
                Ok(inquire::validator::Validation::Valid)
            }
        })
        .prompt()
        .map_err(map_inquire_err)?;
    Ok(project.trim().to_string())
}

pub fn map_inquire_err(e: inquire::InquireError) -> GcexError {
    match e {
        inquire::InquireError::OperationCanceled => GcexError::Cancelled,
        inquire::InquireError::OperationInterrupted => GcexError::Interrupted,
        other => GcexError::Validation {
            message: format!("prompt error: {other}"),
        },
    }
}
