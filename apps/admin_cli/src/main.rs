mod config;

use std::{path::PathBuf, sync::Arc};

use admin_core::{
    dispatch, CommandOutcome, ControllerCommand, EntityManagementController, RecordOutcome,
};
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{CsvFileCodec, HttpEntityService};
use serde_json::Value;
use shared::domain::{Entity, EntityId};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Manage entities of a remote collection")]
struct Cli {
    #[arg(long, default_value = "admin.toml")]
    config: PathBuf,
    #[arg(long)]
    service_url: Option<String>,
    #[arg(long)]
    resource: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    List {
        #[arg(long)]
        json: bool,
    },
    Create {
        #[arg(long = "field", value_parser = parse_field)]
        fields: Vec<(String, Value)>,
    },
    Update {
        id: String,
        #[arg(long = "field", value_parser = parse_field)]
        fields: Vec<(String, Value)>,
    },
    Import {
        file: PathBuf,
    },
    Export {
        file: Option<PathBuf>,
    },
}

/// `key=value`; the value is read as JSON when it parses, otherwise as text.
fn parse_field(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing field name in '{raw}'"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

fn with_fields(mut entity: Entity, fields: Vec<(String, Value)>) -> Entity {
    entity.attributes.extend(fields);
    entity
}

fn find_by_id(items: Vec<Entity>, id: &EntityId) -> Option<Entity> {
    let wanted = Entity::with_id(id.clone());
    items.into_iter().find(|entity| entity.same_identity(&wanted))
}

impl Command {
    /// Commands that read the current list before acting on it.
    fn needs_initial_load(&self) -> bool {
        matches!(
            self,
            Command::List { .. } | Command::Update { .. } | Command::Export { .. }
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = config::load_settings(&cli.config)?;
    if let Some(url) = cli.service_url {
        settings.service_url = url;
    }
    if let Some(resource) = cli.resource {
        settings.resource = resource;
    }
    settings.validate()?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.log_filter.as_str()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let service = HttpEntityService::new(&settings.service_url, &settings.resource)
        .context("failed to build entity service")?;
    info!(collection = %service.collection_url(), "using entity service");
    let controller =
        EntityManagementController::new(Arc::new(service), Arc::new(CsvFileCodec::new()));

    if cli.command.needs_initial_load() {
        let loaded = controller.mount().await?;
        info!(loaded, "entity list loaded");
    }

    match cli.command {
        Command::List { json } => {
            let items = controller.fetch_cache().items();
            if json {
                println!("{}", serde_json::to_string_pretty(&items)?);
            } else {
                for entity in &items {
                    let id = entity.id.as_ref().map(EntityId::as_str).unwrap_or("-");
                    println!("{id}\t{}", entity.display_label());
                }
                println!("{} entities", items.len());
            }
        }
        Command::Create { fields } => {
            dispatch(&controller, ControllerCommand::StartCreate).await?;
            let outcome =
                dispatch(&controller, ControllerCommand::Submit(with_fields(Entity::new(), fields)))
                    .await?;
            if let CommandOutcome::Saved(created) = outcome {
                println!("created {}", created.display_label());
            }
        }
        Command::Update { id, fields } => {
            let id = EntityId::new(id);
            let Some(target) = find_by_id(controller.fetch_cache().items(), &id) else {
                bail!("no entity with id '{id}'");
            };
            dispatch(&controller, ControllerCommand::StartUpdate(target.clone())).await?;
            let outcome =
                dispatch(&controller, ControllerCommand::Submit(with_fields(target, fields)))
                    .await?;
            if let CommandOutcome::Saved(updated) = outcome {
                println!("updated {id} ({})", updated.display_label());
            }
        }
        Command::Import { file } => {
            let bytes = tokio::fs::read(&file)
                .await
                .with_context(|| format!("failed to read '{}'", file.display()))?;
            let outcome = dispatch(&controller, ControllerCommand::Import(bytes)).await?;
            if let CommandOutcome::Imported(report) = outcome {
                let tally = report.tally();
                println!(
                    "imported {} of {} records ({} failed)",
                    tally.succeeded,
                    tally.total(),
                    tally.failed
                );
                for failure in report.failures() {
                    if let RecordOutcome::Failed(reason) = &failure.outcome {
                        println!("  {}: {reason}", failure.source_record.display_label());
                    }
                }
                if let Some(err) = report.refetch_error {
                    println!("warning: list reload failed: {err}");
                }
            }
        }
        Command::Export { file } => {
            let path = file.unwrap_or_else(|| PathBuf::from(&settings.export_filename));
            let outcome = dispatch(&controller, ControllerCommand::Export(path.clone())).await?;
            if let CommandOutcome::Exported(records) = outcome {
                println!("exported {records} entities to {}", path.display());
            }
        }
    }

    Ok(())
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
