//! rebac binary
//!
//! Loads a YAML fixture (model plus tuples) into an in-memory store and
//! answers a check or expand against it, printing the result as JSON.
//!
//! # Usage
//!
//! ```bash
//! rebac check --fixture docs.yaml user:alice viewer document:1
//! rebac --config config.yaml expand --fixture docs.yaml viewer document:1
//! REBAC_RESOLVER__RESOLVE_NODE_LIMIT=10 rebac check --fixture docs.yaml user:bob viewer document:1
//! ```

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use rebac_domain::model::Tuple;
use rebac_domain::resolver::{CheckRequest, ContextualTuple, ExpandRequest};
use tracing::info;

use rebac_server::fixture::Fixture;
use rebac_server::{init_logging, AuthzService, ServerConfig};

/// Relationship-based authorization engine
#[derive(Parser, Debug)]
#[command(name = "rebac")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decide whether a user has a relation to an object
    Check {
        /// YAML fixture with the model and tuples
        #[arg(short, long)]
        fixture: PathBuf,
        user: String,
        relation: String,
        object: String,
        /// Contextual tuple as object#relation@user (repeatable)
        #[arg(long = "context")]
        context: Vec<String>,
        /// Resolve against this model id instead of the latest
        #[arg(long)]
        model_id: Option<String>,
    },
    /// Print the userset tree of an object's relation
    Expand {
        #[arg(short, long)]
        fixture: PathBuf,
        relation: String,
        object: String,
        #[arg(long = "context")]
        context: Vec<String>,
    },
}

fn contextual_tuples(raw: &[String]) -> anyhow::Result<Vec<ContextualTuple>> {
    raw.iter()
        .map(|value| {
            let tuple = Tuple::parse(value)
                .with_context(|| format!("invalid contextual tuple '{value}'"))?;
            Ok(ContextualTuple::new(
                tuple.user.to_string(),
                tuple.relation,
                tuple.object.to_string(),
            ))
        })
        .collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::from_env()?,
    };
    init_logging(&config.logging, &config.service_name);

    let service = AuthzService::from_config(&config);
    let fixture_path = match &cli.command {
        Command::Check { fixture, .. } | Command::Expand { fixture, .. } => fixture,
    };
    let fixture = Fixture::load(fixture_path)?;
    let model_id = fixture
        .apply(&service, config.storage.max_tuples_per_write)
        .await?;
    info!(store_id = %fixture.store_id, %model_id, tuples = fixture.tuples.len(), "fixture loaded");

    let output = match cli.command {
        Command::Check {
            user,
            relation,
            object,
            context,
            model_id,
            ..
        } => {
            let mut request = CheckRequest::new(&fixture.store_id, user, relation, object)
                .with_contextual_tuples(contextual_tuples(&context)?);
            if let Some(model_id) = model_id {
                request = request.with_model_id(model_id);
            }
            serde_json::to_string_pretty(&service.check(&request).await?)?
        }
        Command::Expand {
            relation,
            object,
            context,
            ..
        } => {
            let request = ExpandRequest::new(&fixture.store_id, relation, object)
                .with_contextual_tuples(contextual_tuples(&context)?);
            serde_json::to_string_pretty(&service.expand(&request).await?)?
        }
    };

    println!("{output}");
    Ok(())
}
