use std::{collections::BTreeMap, process::ExitCode};

use clap::Parser;
use pingone_provider::{
    config::{LoggingConfig, ProviderConfig},
    framework::Diagnostics,
    observability::init_tracing,
    resource::{DeleteRequest, Provider, ReadRequest, StateResponse},
    scim::{FilterGroup, build_scim_filter},
};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

/// CLI arguments for the PingOne provider core
#[derive(Parser, Debug)]
#[command(version, about = "PingOne resource reconciliation core", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Path to a TOML config file (defaults to environment variables only)
    #[arg(short = 'f', long, global = true)]
    config_file: Option<String>,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Load and validate the provider configuration
    CheckConfig,
    /// List registered resource and data source types
    Resources,
    /// Print the schema of a resource or data source type
    Schema {
        type_name: String,
    },
    /// Compile a SCIM filter from attribute groups
    ScimFilter {
        /// Attribute and accepted values, e.g. `name=Staff,Contractors`
        #[arg(long = "group", value_parser = parse_group, required = true)]
        groups: Vec<FilterGroup>,
        /// Per-attribute template containing `%s`, e.g. `name=name sw "%s"`
        #[arg(long = "template", value_parser = parse_template)]
        templates: Vec<(String, String)>,
    },
    /// Refresh a resource from its state snapshot
    Read {
        type_name: String,
        /// State snapshot as JSON
        #[arg(long)]
        state: String,
    },
    /// Import a resource by ID and read it
    Import {
        type_name: String,
        import_id: String,
    },
    /// Delete a resource described by its state snapshot
    Delete {
        type_name: String,
        /// State snapshot as JSON
        #[arg(long)]
        state: String,
    },
    /// Read a data source
    Data {
        type_name: String,
        /// Configuration snapshot as JSON
        #[arg(long)]
        config: String,
    },
}

fn parse_group(arg: &str) -> Result<FilterGroup, String> {
    let (name, values) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE[,VALUE...], got '{}'", arg))?;
    Ok(FilterGroup::new(name, values.split(',')))
}

fn parse_template(arg: &str) -> Result<(String, String), String> {
    let (name, template) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=TEMPLATE, got '{}'", arg))?;
    Ok((name.to_string(), template.to_string()))
}

fn parse_json(label: &str, raw: &str) -> Result<Value, String> {
    serde_json::from_str(raw).map_err(|e| format!("Invalid {} JSON: {}", label, e))
}

fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("Error: failed to render output: {}", e),
    }
}

/// Print diagnostics and return the exit code they imply.
fn report(output: Value, diagnostics: &Diagnostics) -> ExitCode {
    print_json(&output);
    for diag in diagnostics.iter() {
        eprintln!("{}\n", diag);
    }
    if diagnostics.has_error() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn report_state(resp: StateResponse) -> ExitCode {
    let output = json!({
        "state": resp.state,
        "diagnostics": resp.diagnostics,
    });
    report(output, &resp.diagnostics)
}

fn load_config(path: Option<&str>) -> Result<ProviderConfig, String> {
    match path {
        Some(path) => ProviderConfig::from_file(path),
        None => ProviderConfig::from_env(),
    }
    .map_err(|e| e.to_string())
}

/// Load the configuration, start logging and configure a provider.
fn configured_provider(path: Option<&str>) -> Result<(Provider, Diagnostics), String> {
    let config = load_config(path)?;
    if let Err(e) = init_tracing(&config.logging) {
        eprintln!("Warning: {}", e);
    }

    let mut provider = Provider::default();
    let diags = provider.configure(&config);
    Ok((provider, diags))
}

fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling in-flight requests");
            token.cancel();
        }
    });
    cancel
}

fn unknown_type(type_name: &str) -> ExitCode {
    eprintln!("Error: unknown type '{}'. Run `pingone-provider resources` for the list.", type_name);
    ExitCode::FAILURE
}

async fn run(args: Args) -> Result<ExitCode, String> {
    let config_path = args.config_file.as_deref();

    match args.command {
        Command::CheckConfig => {
            let (_, diags) = configured_provider(config_path)?;
            Ok(report(json!({ "diagnostics": diags }), &diags))
        }
        Command::Resources => {
            let provider = Provider::default();
            let registry = provider.registry();
            print_json(&json!({
                "resources": registry.resource_types().collect::<Vec<_>>(),
                "data_sources": registry.data_source_types().collect::<Vec<_>>(),
            }));
            Ok(ExitCode::SUCCESS)
        }
        Command::Schema { type_name } => {
            let provider = Provider::default();
            let schema = match (provider.resource(&type_name), provider.data_source(&type_name)) {
                (Some(resource), _) => resource.schema(),
                (None, Some(data_source)) => data_source.schema(),
                (None, None) => return Ok(unknown_type(&type_name)),
            };
            print_json(&schema.describe());
            Ok(ExitCode::SUCCESS)
        }
        Command::ScimFilter { groups, templates } => {
            let templates: BTreeMap<&str, &str> = templates
                .iter()
                .map(|(name, template)| (name.as_str(), template.as_str()))
                .collect();
            println!("{}", build_scim_filter(&groups, &templates));
            Ok(ExitCode::SUCCESS)
        }
        Command::Read { type_name, state } => {
            let state = parse_json("state", &state)?;
            let (provider, mut diags) = configured_provider(config_path)?;
            let Some(resource) = provider.resource(&type_name) else {
                return Ok(unknown_type(&type_name));
            };
            if diags.has_error() {
                return Ok(report(json!({ "diagnostics": diags }), &diags));
            }

            let mut resp = resource.read(&cancel_on_ctrl_c(), ReadRequest { state }).await;
            diags.append(resp.diagnostics);
            resp.diagnostics = diags;
            Ok(report_state(resp))
        }
        Command::Import { type_name, import_id } => {
            let (provider, mut diags) = configured_provider(config_path)?;
            let Some(resource) = provider.resource(&type_name) else {
                return Ok(unknown_type(&type_name));
            };

            let imported = resource.import_state(&import_id);
            diags.append(imported.diagnostics);
            let Some(state) = imported.state.filter(|_| !diags.has_error()) else {
                return Ok(report(json!({ "diagnostics": diags }), &diags));
            };

            let mut resp = resource.read(&cancel_on_ctrl_c(), ReadRequest { state }).await;
            diags.append(resp.diagnostics);
            resp.diagnostics = diags;
            Ok(report_state(resp))
        }
        Command::Delete { type_name, state } => {
            let state = parse_json("state", &state)?;
            let (provider, mut diags) = configured_provider(config_path)?;
            let Some(resource) = provider.resource(&type_name) else {
                return Ok(unknown_type(&type_name));
            };
            if diags.has_error() {
                return Ok(report(json!({ "diagnostics": diags }), &diags));
            }

            let resp = resource.delete(&cancel_on_ctrl_c(), DeleteRequest { state }).await;
            diags.append(resp.diagnostics);
            Ok(report(json!({ "diagnostics": diags }), &diags))
        }
        Command::Data { type_name, config } => {
            let config = parse_json("config", &config)?;
            let (provider, mut diags) = configured_provider(config_path)?;
            let Some(data_source) = provider.data_source(&type_name) else {
                return Ok(unknown_type(&type_name));
            };
            diags.append(data_source.validate_config(&config));
            if diags.has_error() {
                return Ok(report(json!({ "diagnostics": diags }), &diags));
            }

            let mut resp = data_source.read(&cancel_on_ctrl_c(), config).await;
            diags.append(resp.diagnostics);
            resp.diagnostics = diags;
            Ok(report_state(resp))
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if matches!(
        args.command,
        Command::Resources | Command::Schema { .. } | Command::ScimFilter { .. }
    ) && let Err(e) = init_tracing(&LoggingConfig::default())
    {
        eprintln!("Warning: {}", e);
    }

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
