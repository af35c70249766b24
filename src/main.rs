use std::io::{IsTerminal, Write};

use clap::Parser;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use gcex::cli::{Cli, Command, OutputFormat};
use gcex::compute::gce::GceClient;
use gcex::config;
use gcex::error::GcexError;
use gcex::inventory::ExportedInstanceRecord;
use gcex::logging;
use gcex::menu::{self, Console};
use gcex::observer::ConversionObserver;
use gcex::observer::json::JsonObserver;
use gcex::observer::plain::PlainObserver;

#[tokio::main]
async fn main() -> miette::Result<()> {
    let cli = Cli::parse();

    let terminal_filter = if cli.verbose {
        EnvFilter::new("gcex=debug")
    } else if cli.quiet {
        EnvFilter::new("off")
    } else {
        EnvFilter::from_default_env().add_directive("gcex=warn".parse().expect("valid log directive"))
    };

    let terminal_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(terminal_filter);

    // File layer: always captures gcex=debug, discards until the project is known
    let (file_writer, file_handle) = logging::DeferredFileWriter::new();
    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(file_writer)
        .with_filter(EnvFilter::new("gcex=debug"));

    tracing_subscriber::registry()
        .with(terminal_layer)
        .with(file_layer)
        .init();

    let config = config::load_config(cli.config.as_deref())?;

    let interactive = std::io::stdin().is_terminal();
    let project = match cli.project.clone() {
        Some(p) if !p.trim().is_empty() => p.trim().to_string(),
        _ if interactive => match menu::prompt_project() {
            Ok(p) => p,
            Err(GcexError::Cancelled | GcexError::Interrupted) => return Ok(()),
            Err(e) => return Err(e.into()),
        },
        _ => {
            return Err(GcexError::Validation {
                message: "--project is required when stdin is not a terminal".into(),
            }
            .into());
        }
    };

    let log_path = gcex::paths::project_log_path(&project);
    if let Err(e) = file_handle.set_file(&log_path) {
        tracing::warn!(path = %log_path.display(), error = %e, "file logging disabled");
    }
    tracing::info!(%project, "session started");

    let tokens = gcex::auth::token_source(&config.api).await?;
    let client = GceClient::new(&config.api, tokens)?;
    let console = Console::new(client, project, config);

    let format = resolve_output_format(cli.output);
    let mut observer: Box<dyn ConversionObserver> = match format {
        OutputFormat::Json => Box::new(JsonObserver::new(std::io::stdout())),
        OutputFormat::Plain => Box::new(PlainObserver::new(std::io::stdout(), false)),
        OutputFormat::Auto => Box::new(PlainObserver::new(
            std::io::stdout(),
            std::io::stderr().is_terminal(),
        )),
    };

    // Narration goes to stderr in JSON mode so stdout stays machine-readable
    let mut text_out: Box<dyn Write> = match format {
        OutputFormat::Json => Box::new(std::io::stderr()),
        _ => Box::new(std::io::stdout()),
    };

    match cli.command {
        None => match console.run_menu(&mut *observer).await {
            Ok(()) | Err(GcexError::Interrupted) => {}
            Err(e) => return Err(e.into()),
        },
        Some(Command::List) => {
            if format == OutputFormat::Json {
                for instance in console.inventory().await? {
                    let record = ExportedInstanceRecord::from(&instance);
                    println!(
                        "{}",
                        facet_json::to_string(&record).map_err(|e| GcexError::Validation {
                            message: format!("JSON serialization failed: {e}"),
                        })?
                    );
                }
            } else {
                console.list(&mut *text_out).await?;
            }
        }
        Some(Command::Export) => {
            let instances = console.inventory().await?;
            console.export(&instances, &mut *text_out)?;
        }
        Some(Command::Convert { yes }) => {
            let confirm = |matched: &[gcex::catalog::Instance]| {
                if yes {
                    Ok(true)
                } else if interactive {
                    menu::confirm_conversion(matched)
                } else {
                    Err(GcexError::Validation {
                        message: "refusing to convert without confirmation; pass --yes".into(),
                    })
                }
            };
            let outcome = match console.convert(confirm, &mut *observer, &mut *text_out).await {
                Err(GcexError::Cancelled | GcexError::Interrupted) => None,
                other => other?,
            };
            if let Some(records) = outcome
                && records.iter().any(|r| !r.succeeded())
            {
                std::process::exit(2);
            }
        }
        Some(Command::Start { name, zone }) => {
            console.start(&zone, &name, &mut *text_out).await?;
        }
        Some(Command::Stop { name, zone }) => {
            console.stop(&zone, &name, &mut *text_out).await?;
        }
        Some(Command::Annotate {
            name,
            zone,
            license,
        }) => {
            console
                .annotate(&zone, &name, &license, &mut *text_out)
                .await?;
        }
    }

    Ok(())
}

/// Resolve `Auto` to `Plain` when stdout is not a terminal.
fn resolve_output_format(format: OutputFormat) -> OutputFormat {
    match format {
        OutputFormat::Auto if !std::io::stdout().is_terminal() => OutputFormat::Plain,
        other => other,
    }
}
