//! CLI for the x-batch object store, namespace tables and worker configuration

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use x_batch::{parse_mappings, CredentialResolver, NamespaceRegistry, RemoteObjectStore, WorkerConfig};

/// x-batch - inspect worker configuration and the object store
#[derive(Parser, Debug)]
#[command(name = "x-batch")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Worker configuration file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Object store operations
    Store {
        #[command(subcommand)]
        action: StoreAction,
    },
    /// Namespace table tools
    Namespaces {
        #[command(subcommand)]
        action: NamespacesAction,
    },
    /// Worker configuration tools
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum StoreAction {
    /// Print an object to stdout
    Get {
        #[arg(long)]
        bucket: String,
        #[arg(long)]
        key: String,
    },
    /// Upload a file, or stdin when no file is given
    Put {
        #[arg(long)]
        bucket: String,
        #[arg(long)]
        key: String,
        #[arg(long)]
        file: Option<PathBuf>,
        #[arg(long, default_value = "text/xml")]
        content_type: String,
    },
    /// Delete an object
    Delete {
        #[arg(long)]
        bucket: String,
        #[arg(long)]
        key: String,
    },
    /// Print length and last-modified date
    Stat {
        #[arg(long)]
        bucket: String,
        #[arg(long)]
        key: String,
    },
}

#[derive(Subcommand, Debug)]
enum NamespacesAction {
    /// Parse a prefix=uri table and print the merged registry table
    Check { file: PathBuf },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the effective configuration as JSON
    Show,
}

fn load_config(path: Option<&Path>) -> Result<WorkerConfig> {
    match path {
        Some(path) => {
            WorkerConfig::load(path).with_context(|| format!("loading configuration from {}", path.display()))
        }
        None => {
            let mut config = WorkerConfig::default();
            config.apply_overrides(|name| std::env::var(name).ok());
            config.validate()?;
            Ok(config)
        }
    }
}

fn open_store(config: &WorkerConfig) -> Result<RemoteObjectStore> {
    let properties = Arc::new(config.properties()?);
    let store = RemoteObjectStore::new(config.connector()?, CredentialResolver::new(properties));
    if !store.init() {
        bail!("object store client could not be initialized; set AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY");
    }
    Ok(store)
}

fn run_store(config: &WorkerConfig, action: StoreAction) -> Result<()> {
    let store = open_store(config)?;
    match action {
        StoreAction::Get { bucket, key } => {
            print!("{}", store.get(&bucket, &key)?);
        }
        StoreAction::Put {
            bucket,
            key,
            file,
            content_type,
        } => {
            let content = match file {
                Some(path) => {
                    std::fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?
                }
                None => std::io::read_to_string(std::io::stdin()).context("reading stdin")?,
            };
            store.put(&bucket, &key, &content, &content_type)?;
            tracing::info!(bucket = %bucket, key = %key, bytes = content.len(), "object stored");
        }
        StoreAction::Delete { bucket, key } => {
            store.delete(&bucket, &key)?;
            tracing::info!(bucket = %bucket, key = %key, "object deleted");
        }
        StoreAction::Stat { bucket, key } => {
            let length = store.length(&bucket, &key)?;
            let modified = store.last_modified(&bucket, &key)?;
            println!("length: {}", length);
            println!("last-modified: {}", modified.to_rfc3339());
        }
    }
    Ok(())
}

fn run_namespaces(action: NamespacesAction) -> Result<()> {
    match action {
        NamespacesAction::Check { file } => {
            let text = std::fs::read_to_string(&file).with_context(|| format!("reading {}", file.display()))?;
            let mappings = parse_mappings(&text).with_context(|| format!("parsing {}", file.display()))?;
            let registry = NamespaceRegistry::new();
            registry.init(mappings);
            if let Some(table) = registry.mappings() {
                for (prefix, uri) in table.iter() {
                    println!("{}={}", prefix, uri);
                }
            }
        }
    }
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;
    x_batch::logging::init(&config.log_filter);

    match cli.command {
        Command::Store { action } => run_store(&config, action),
        Command::Namespaces { action } => run_namespaces(action),
        Command::Config {
            action: ConfigAction::Show,
        } => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::io::Write;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn store_put_parses_with_defaults() {
        let cli = Cli::parse_from(["x-batch", "store", "put", "--bucket", "b", "--key", "k"]);
        match cli.command {
            Command::Store {
                action: StoreAction::Put { content_type, file, .. },
            } => {
                assert_eq!(content_type, "text/xml");
                assert!(file.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn config_file_is_loaded() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "partitions": 3 }}"#).unwrap();
        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.partitions, 3);
    }

    #[test]
    fn namespace_check_rejects_bad_tables() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "a=urn:a").unwrap();
        writeln!(file, "no separator").unwrap();
        let err = run_namespaces(NamespacesAction::Check {
            file: file.path().to_path_buf(),
        })
        .unwrap_err();
        assert!(format!("{:#}", err).contains("line 2"));
    }
}
