//! Command line front end for the CRD provider
//!
//! Every command reads JSON files, prints the resulting state as JSON on
//! stdout and diagnostics on stderr. The exit status is 1 when any error
//! diagnostic was raised.
//!
//! # Usage
//!
//! Print the schemas of every resource and data source:
//! ```bash
//! cargo run --bin k8s-crd-provider -- schema
//! ```
//!
//! Render a manifest without a cluster:
//! ```bash
//! cargo run --bin k8s-crd-provider -- manifest k8s_ec2_services_k8s_aws_vpc_v1alpha1_manifest vpc.json
//! ```
//!
//! Apply a resource, updating the state written by a previous run:
//! ```bash
//! cargo run --bin k8s-crd-provider -- --provider provider.json \
//!     apply k8s_ec2_services_k8s_aws_vpc_v1alpha1 vpc.json --prior state.json
//! ```

use clap::{Parser, Subcommand};
use k8s_crd_provider::{Diagnostics, Provider, ProviderConfig, Response};
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "k8s-crd-provider")]
#[command(about = "Manage Kubernetes custom resources as Terraform-style resources", long_about = None)]
struct Args {
    /// Provider configuration block as a JSON file
    #[arg(short, long)]
    provider: Option<PathBuf>,

    /// Additional CRD manifest to bind (repeatable)
    #[arg(long = "crd-file")]
    crd_files: Vec<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the provider, resource and data source schemas
    Schema,

    /// Check every schema for implementation errors
    Validate,

    /// Write markdown documentation for every type
    Docs {
        /// Output directory
        #[arg(short, long, default_value = "docs")]
        output: PathBuf,
    },

    /// Render a manifest data source
    Manifest { type_name: String, config: PathBuf },

    /// Create or update a resource from its configuration
    Apply {
        type_name: String,
        config: PathBuf,

        /// State of the existing resource, if any
        #[arg(long)]
        prior: Option<PathBuf>,
    },

    /// Refresh a resource state from the cluster
    Read { type_name: String, state: PathBuf },

    /// Delete the object behind a resource state
    Delete { type_name: String, state: PathBuf },

    /// Import an existing object by ID (`namespace/name` or `name`)
    Import { type_name: String, id: String },

    /// Read a data source
    Data { type_name: String, config: PathBuf },
}

impl Command {
    /// Commands that talk to the cluster
    fn needs_cluster(&self) -> bool {
        matches!(
            self,
            Command::Apply { .. }
                | Command::Read { .. }
                | Command::Delete { .. }
                | Command::Import { .. }
                | Command::Data { .. }
        )
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    init_tracing();
    let args = Args::parse();

    let mut config = match &args.provider {
        Some(path) => ProviderConfig::from_value(&read_json(path)?)?,
        None => ProviderConfig::default(),
    };
    config.crd_files.extend(args.crd_files.iter().cloned());

    let mut builder = Provider::builder();
    if let Some(field_manager) = &config.field_manager {
        builder = builder.with_field_manager(field_manager);
    }
    if !args.command.needs_cluster() {
        for path in &config.crd_files {
            builder = builder.with_crd_file(path)?;
        }
    }
    let mut provider = builder.build()?;

    if args.command.needs_cluster() {
        let diagnostics = provider.configure(config).await;
        if diagnostics.has_error() {
            report(&diagnostics);
            return Ok(ExitCode::FAILURE);
        }
    }

    let response = run(&provider, args.command).await?;
    report(&response.diagnostics);
    if let Some(state) = &response.state {
        print_json(state)?;
    }

    Ok(if response.has_error() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

async fn run(provider: &Provider, command: Command) -> Result<Response, Box<dyn std::error::Error>> {
    let response = match command {
        Command::Schema => Response::ok(serde_json::to_value(provider.schema())?),
        Command::Validate => {
            let diagnostics = provider.validate_schemas();
            if !diagnostics.has_error() {
                info!("All schemas are valid");
            }
            Response::from_diagnostics(diagnostics)
        }
        Command::Docs { output } => {
            let written = k8s_crd_provider::docs::write_docs(provider, &output)?;
            info!("Wrote {} pages to {:?}", written, output);
            Response::default()
        }
        Command::Manifest { type_name, config } => {
            provider.manifest(&type_name)?.read(&read_json(&config)?)
        }
        Command::Apply {
            type_name,
            config,
            prior,
        } => {
            let resource = provider.resource(&type_name)?;
            let config = read_json(&config)?;
            let prior = prior.as_deref().map(read_json).transpose()?;

            let plan = resource.plan(prior.as_ref(), &config);
            let Some(planned) = plan.planned_state else {
                return Ok(Response::from_diagnostics(plan.diagnostics));
            };

            match prior {
                Some(prior) if !plan.requires_replace.is_empty() => {
                    debug!("Replacing {}: {:?} changed", type_name, plan.requires_replace);
                    let deleted = resource.delete(&prior).await;
                    if deleted.has_error() {
                        deleted
                    } else {
                        resource.create(&planned).await
                    }
                }
                Some(prior) => resource.update(&prior, &planned).await,
                None => resource.create(&planned).await,
            }
        }
        Command::Read { type_name, state } => {
            provider.resource(&type_name)?.read(&read_json(&state)?).await
        }
        Command::Delete { type_name, state } => {
            provider.resource(&type_name)?.delete(&read_json(&state)?).await
        }
        Command::Import { type_name, id } => provider.resource(&type_name)?.import_state(&id).await,
        Command::Data { type_name, config } => {
            provider.data_source(&type_name)?.read(&read_json(&config)?).await
        }
    };
    Ok(response)
}

/// `TF_LOG` takes precedence over `RUST_LOG`; both default to warnings only
fn init_tracing() {
    let filter = std::env::var("TF_LOG")
        .ok()
        .and_then(|level| EnvFilter::try_new(level.to_lowercase()).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn read_json(path: &Path) -> Result<Value, Box<dyn std::error::Error>> {
    let content = fs::read_to_string(path).map_err(|e| format!("Failed to read {:?}: {}", path, e))?;
    Ok(serde_json::from_str(&content)?)
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn report(diagnostics: &Diagnostics) {
    for diagnostic in diagnostics.iter() {
        eprintln!("{}", diagnostic);
    }
}
