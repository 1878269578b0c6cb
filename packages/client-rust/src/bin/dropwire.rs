//! `dropwire`: inspect request payloads, topic strings and pool capacity.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use dropwire_client::{logging, ClientArgs, GqlRequest};
use dropwire_core::{OperationRegistry, TopicAddress, TopicCategory, TopicNameTable, VarValue, VariableTree};
use tracing::info;

#[derive(Parser)]
#[command(name = "dropwire", version, about = "Inspect persisted-query payloads and pub/sub topics")]
struct Cli {
    #[command(flatten)]
    client: ClientArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the request body for an operation.
    Operation {
        /// Logical operation name (e.g. `ClaimDrop`).
        name: String,
        /// Variable overrides as `path=value`; `value` is parsed as JSON,
        /// falling back to a plain string. Dotted paths build nested trees.
        #[arg(long = "var", value_name = "PATH=VALUE")]
        vars: Vec<String>,
    },
    /// List the known operations.
    Operations,
    /// Print the wire string for a topic.
    Topic {
        /// `User` or `Channel`.
        category: TopicCategory,
        /// Internal kind name (e.g. `StreamState`).
        kind: String,
        /// Integer entity id.
        id: String,
    },
    /// Parse a wire topic string.
    Resolve { topic: String },
    /// Print the derived pool capacity.
    Capacity,
    /// Print the configured client identity.
    Identity,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.client.into_config()?;
    logging::init(&config.log)?;

    match cli.command {
        Commands::Operation { name, vars } => {
            let registry = OperationRegistry::builtin();
            let overlay = parse_vars(&vars)?;
            let request = GqlRequest::build(&registry, &name, &overlay)?;
            let body: serde_json::Value = serde_json::from_slice(&request.to_body()?)?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        Commands::Operations => {
            let registry = OperationRegistry::builtin();
            for name in registry.names() {
                let template = registry.get(name)?;
                println!("{name}\t{}\t{}", template.operation_name(), template.sha256_hash());
            }
        }
        Commands::Topic { category, kind, id } => {
            let table = TopicNameTable::builtin();
            let address = TopicAddress::new(&table, category, &kind, id.as_str(), |_, _| Ok(()))?;
            println!("{address}");
        }
        Commands::Resolve { topic } => {
            let resolved = TopicNameTable::builtin().resolve(&topic)?;
            println!("{} {} {}", resolved.category, resolved.kind, resolved.entity_id);
        }
        Commands::Capacity => {
            let model = config.capacity;
            info!(pool_size = model.pool_size(), "computing capacity");
            println!("connections:             {}", model.pool_size());
            println!("topics per connection:   {}", model.topics_per_connection());
            println!("reserved per connection: {}", model.reserved_per_connection());
            println!("usable per connection:   {}", model.usable_topics_per_connection());
            println!("total usable topics:     {}", model.total_usable_topics());
            println!("topics per channel:      {}", model.topics_per_channel());
            println!("max channels:            {}", model.max_channels());
        }
        Commands::Identity => {
            let info = config.client.info();
            println!("kind:       {}", config.client);
            println!("url:        {}", info.client_url);
            println!("client id:  {}", info.client_id);
            println!("user agent: {}", info.user_agent());
        }
    }
    Ok(())
}

fn parse_vars(vars: &[String]) -> Result<VariableTree> {
    let mut tree = VariableTree::new();
    for raw in vars {
        let (path, value) = raw
            .split_once('=')
            .with_context(|| format!("expected PATH=VALUE, got '{raw}'"))?;
        let value = serde_json::from_str::<serde_json::Value>(value)
            .map_or_else(|_| VarValue::from(value), VarValue::from);
        set_path(&mut tree, path, value)?;
    }
    Ok(tree)
}

fn set_path(tree: &mut VariableTree, path: &str, value: VarValue) -> Result<()> {
    let Some((head, rest)) = path.split_once('.') else {
        if path.is_empty() {
            bail!("empty variable name");
        }
        tree.insert(path, value);
        return Ok(());
    };
    if head.is_empty() {
        bail!("empty segment in variable path '{path}'");
    }
    if !tree.contains_key(head) {
        tree.insert(head, VariableTree::new());
    }
    match tree.get_mut(head) {
        Some(VarValue::Map(child)) => set_path(child, rest, value),
        _ => bail!("variable '{head}' is already set to a non-tree value"),
    }
}

#[cfg(test)]
mod tests {
    use dropwire_core::EntityId;

    use super::*;

    #[test]
    fn parses_nested_and_typed_vars() {
        let tree = parse_vars(&[
            "input.claimID=abc".to_string(),
            "input.channelID=\"42\"".to_string(),
            "limit=30".to_string(),
        ])
        .unwrap();
        assert_eq!(tree.lookup("input.claimID"), Some(&VarValue::from("abc")));
        assert_eq!(tree.lookup("input.channelID"), Some(&VarValue::from("42")));
        assert_eq!(tree.get("limit"), Some(&VarValue::Int(30)));
    }

    #[test]
    fn rejects_malformed_vars() {
        assert!(parse_vars(&["novalue".to_string()]).is_err());
        assert!(parse_vars(&["=1".to_string()]).is_err());
        assert!(parse_vars(&["a=1".to_string(), "a.b=2".to_string()]).is_err());
    }

    #[test]
    fn entity_id_flag_must_be_integer() {
        let table = TopicNameTable::builtin();
        assert!(TopicAddress::new(&table, TopicCategory::Channel, "StreamState", "4.2", |_: EntityId, _: &serde_json::Value| Ok(())).is_err());
    }

    #[test]
    fn cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["dropwire", "--pool-size", "2", "topic", "Channel", "StreamState", "42"]).unwrap();
        assert!(matches!(cli.command, Commands::Topic { ref kind, .. } if kind == "StreamState"));
        assert_eq!(cli.client.pool_size, 2);
    }
}
