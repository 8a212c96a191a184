//! Command line definitions for the `hal` binary.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use hal_dmr::DispatchConfig;
use hal_meta::{AddressTemplate, ResolutionPolicy, SelectionContext};
use hal_types::constants::{
    INCLUDE_RUNTIME, OPERATIONS, READ_RESOURCE_DESCRIPTION_OPERATION, READ_RESOURCE_OPERATION, RECURSIVE,
};
use hal_types::{ModelNode, Operation, ResourceAddress};

/// Runs management operations against a server or domain controller.
#[derive(Parser, Debug)]
#[command(name = "hal", version, about)]
pub(crate) struct Cli {
    /// Base URL of the management interface, e.g. http://localhost:9990
    #[arg(long, global = true)]
    pub(crate) url: Option<String>,

    #[arg(long, global = true)]
    pub(crate) user: Option<String>,

    #[arg(long, global = true)]
    pub(crate) password: Option<String>,

    /// Treat the target as a managed domain instead of a standalone server.
    #[arg(long, global = true)]
    pub(crate) domain: bool,

    /// Fail when a template placeholder has no selected value.
    #[arg(long, global = true)]
    pub(crate) strict: bool,

    /// Value of `{selected.profile}`.
    #[arg(long, global = true)]
    pub(crate) profile: Option<String>,

    /// Value of `{selected.host}` and `{domain.controller}`.
    #[arg(long, global = true)]
    pub(crate) host: Option<String>,

    /// Value of `{selected.server}`.
    #[arg(long, global = true)]
    pub(crate) server: Option<String>,

    /// Value of `{selected.group}`.
    #[arg(long, global = true)]
    pub(crate) server_group: Option<String>,

    /// Value of `{selected.server-config}`.
    #[arg(long, global = true)]
    pub(crate) server_config: Option<String>,

    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub(crate) enum Command {
    /// Reads a resource (`read-resource`).
    Read {
        /// Address template, e.g. `{selected.profile}/subsystem=logging`
        template: String,
        #[arg(long)]
        recursive: bool,
        #[arg(long)]
        include_runtime: bool,
    },
    /// Reads a resource description (`read-resource-description`).
    Describe {
        template: String,
        #[arg(long)]
        recursive: bool,
        #[arg(long)]
        operations: bool,
    },
    /// Executes an arbitrary operation.
    Exec {
        template: String,
        operation: String,
        /// Operation parameters
        #[arg(value_name = "NAME=VALUE")]
        params: Vec<String>,
    },
    /// Uploads a file together with an operation, e.g. a deployment.
    Upload {
        file: PathBuf,
        template: String,
        operation: String,
        #[arg(value_name = "NAME=VALUE")]
        params: Vec<String>,
        /// Multipart field carrying the file
        #[arg(long, default_value = "input")]
        field: String,
    },
}

impl Cli {
    /// Loads the configuration file and environment, then applies flags.
    pub(crate) fn dispatch_config(&self) -> Result<DispatchConfig> {
        let mut config = DispatchConfig::load().context("failed to load configuration")?;
        self.apply_overrides(&mut config);
        Ok(config)
    }

    fn apply_overrides(&self, config: &mut DispatchConfig) {
        if let Some(url) = &self.url {
            config.base_url = url.clone();
        }
        if let Some(user) = &self.user {
            config.username = Some(user.clone());
        }
        if let Some(password) = &self.password {
            config.password = Some(password.clone());
        }
        if self.domain {
            config.standalone = false;
        }
    }

    pub(crate) fn selection_context(&self) -> SelectionContext {
        let mut context = SelectionContext::new();
        if let Some(profile) = &self.profile {
            context.select_profile(profile);
        }
        if let Some(host) = &self.host {
            context.select_host(host).select_domain_controller(host);
        }
        if let Some(server) = &self.server {
            context.select_server(server);
        }
        if let Some(group) = &self.server_group {
            context.select_server_group(group);
        }
        if let Some(server_config) = &self.server_config {
            context.select_server_config(server_config);
        }
        context
    }

    /// Resolves the command's template and builds its operation.
    pub(crate) fn operation(&self, context: &SelectionContext) -> Result<Operation> {
        let policy = if self.strict { ResolutionPolicy::Strict } else { ResolutionPolicy::Permissive };
        let operation = match &self.command {
            Command::Read {
                template,
                recursive,
                include_runtime,
            } => {
                let mut builder = Operation::builder(resolve(template, context, policy)?, READ_RESOURCE_OPERATION);
                if *recursive {
                    builder = builder.param(RECURSIVE, true);
                }
                if *include_runtime {
                    builder = builder.param(INCLUDE_RUNTIME, true);
                }
                builder.build()
            }
            Command::Describe {
                template,
                recursive,
                operations,
            } => {
                let mut builder = Operation::builder(resolve(template, context, policy)?, READ_RESOURCE_DESCRIPTION_OPERATION);
                if *recursive {
                    builder = builder.param(RECURSIVE, true);
                }
                if *operations {
                    builder = builder.param(OPERATIONS, true);
                }
                builder.build()
            }
            Command::Exec {
                template,
                operation,
                params,
            }
            | Command::Upload {
                template,
                operation,
                params,
                ..
            } => {
                let mut builder = Operation::builder(resolve(template, context, policy)?, operation.as_str());
                for param in params {
                    let (name, value) = parse_param(param)?;
                    builder = builder.param(name, value);
                }
                builder.build()
            }
        };
        Ok(operation)
    }
}

fn resolve(template: &str, context: &SelectionContext, policy: ResolutionPolicy) -> Result<ResourceAddress> {
    let template = AddressTemplate::of(template).with_context(|| format!("invalid address template '{template}'"))?;
    template
        .resolve_with(context, policy, &[])
        .with_context(|| format!("could not resolve '{template}'"))
}

/// Parses `name=value`. Booleans and integers keep their type, JSON objects
/// and arrays are parsed, everything else is a string.
pub(crate) fn parse_param(param: &str) -> Result<(String, ModelNode)> {
    let Some((name, value)) = param.split_once('=') else {
        bail!("expected NAME=VALUE, got '{param}'");
    };
    let name = name.trim();
    if name.is_empty() {
        bail!("parameter name missing in '{param}'");
    }

    let node = match value {
        "true" => ModelNode::Boolean(true),
        "false" => ModelNode::Boolean(false),
        _ if value.starts_with('{') || value.starts_with('[') => {
            ModelNode::from_json_str(value).with_context(|| format!("invalid JSON value for '{name}'"))?
        }
        _ => match value.parse::<i64>() {
            Ok(number) => i32::try_from(number).map(ModelNode::Int).unwrap_or(ModelNode::Long(number)),
            Err(_) => ModelNode::from(value),
        },
    };
    Ok((name.to_string(), node))
}
