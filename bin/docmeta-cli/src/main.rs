//! docmeta CLI - Command line access to document metadata
//!
//! Reads and edits the metadata file the editor keeps in the user cache
//! directory. Every command runs through the metadata service and shuts it
//! down before exiting, so mutations are on disk when the command returns.

use anyhow::Result;
use clap::{Parser, Subcommand};
use docmeta_common::{AttributeKey, Config, DocumentUri, DocumentUriError};
use docmeta_common::Result as MetaResult;
use docmeta_store::{Entry, MetadataService, MetadataStore};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "docmeta")]
#[command(about = "Inspect and edit per-document editor metadata")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding the metadata file (overrides the configuration)
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Log level
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print an attribute value (exit status 1 if unset)
    Get {
        /// Document URI or file path
        document: String,
        /// Attribute key
        key: String,
    },
    /// Set an attribute value
    Set {
        /// Document URI or file path
        document: String,
        /// Attribute key
        key: String,
        /// New value
        value: String,
    },
    /// Remove an attribute
    Unset {
        /// Document URI or file path
        document: String,
        /// Attribute key
        key: String,
    },
    /// Remove every attribute of a document
    Forget {
        /// Document URI or file path
        document: String,
    },
    /// List all documents
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Rewrite the metadata file now, applying the size limit
    Flush,
}

#[derive(Serialize)]
struct DocumentView<'a> {
    uri: &'a str,
    atime: i64,
    attributes: BTreeMap<&'a str, &'a str>,
}

impl<'a> DocumentView<'a> {
    fn new(uri: &'a str, entry: &'a Entry) -> Self {
        Self {
            uri,
            atime: entry.atime(),
            attributes: entry.sorted_values().into_iter().collect(),
        }
    }
}

/// A `scheme://` argument is a URI, anything else a path
fn document_uri(arg: &str) -> MetaResult<DocumentUri> {
    if arg.is_empty() {
        return Err(DocumentUriError::Empty.into());
    }
    if arg.contains("://") {
        return Ok(DocumentUri::new(arg)?);
    }

    let path = PathBuf::from(arg);
    let path = if path.is_absolute() {
        path
    } else {
        std::env::current_dir()?.join(path)
    };
    Ok(DocumentUri::from_path(path)?)
}

fn attribute_key(arg: String) -> MetaResult<AttributeKey> {
    Ok(AttributeKey::new(arg)?)
}

fn print_documents(documents: &[(String, Entry)], json: bool) -> Result<()> {
    let views: Vec<_> = documents
        .iter()
        .map(|(uri, entry)| DocumentView::new(uri, entry))
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&views)?);
        return Ok(());
    }

    if views.is_empty() {
        println!("No documents found");
        return Ok(());
    }

    println!("{:<60} {:<15} ATTRIBUTES", "URI", "ATIME");
    println!("{}", "-".repeat(100));
    for view in views {
        let attributes = view
            .attributes
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(" ");
        println!("{:<60} {:<15} {}", view.uri, view.atime, attributes);
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    // Parse command line arguments
    let args = Args::parse();

    // Load config file if given (CLI flags take precedence)
    let mut config = match &args.config {
        Some(path) => Config::load_or_default(path)?,
        None => Config::default(),
    };
    if let Some(dir) = args.cache_dir {
        config.store.cache_dir = Some(dir);
    }
    let log_level = args.log_level.unwrap_or_else(|| config.logging.level.clone());

    // Initialize logging on stderr so values on stdout stay scriptable
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    config.store.validate()?;

    let store = MetadataStore::open(&config.store);
    match store.path() {
        Some(path) => debug!("Using metadata file {}", path.display()),
        None => anyhow::bail!("No cache directory available, use --cache-dir"),
    }

    let service = MetadataService::start(store);
    let handle = service.handle();

    let mut status = ExitCode::SUCCESS;
    match args.command {
        Commands::Get { document, key } => {
            let uri = document_uri(&document)?;
            let key = attribute_key(key)?;
            match handle.get(&uri, &key).await? {
                Some(value) => println!("{value}"),
                None => status = ExitCode::FAILURE,
            }
        }
        Commands::Set {
            document,
            key,
            value,
        } => {
            let uri = document_uri(&document)?;
            let key = attribute_key(key)?;
            handle.set(&uri, &key, Some(value.as_str()))?;
            info!("Set {} for {}", key, uri);
        }
        Commands::Unset { document, key } => {
            let uri = document_uri(&document)?;
            let key = attribute_key(key)?;
            handle.set(&uri, &key, None)?;
            info!("Unset {} for {}", key, uri);
        }
        Commands::Forget { document } => {
            let uri = document_uri(&document)?;
            if handle.forget(&uri).await? {
                info!("Forgot {}", uri);
            } else {
                println!("No metadata for {uri}");
                status = ExitCode::FAILURE;
            }
        }
        Commands::List { json } => {
            let documents = handle.snapshot().await?;
            print_documents(&documents, json)?;
        }
        Commands::Flush => {
            handle.flush().await?;
            let stats = handle.stats().await?;
            println!("Flushed metadata ({} evicted)", stats.evictions);
        }
    }

    service.shutdown().await?;
    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_uri_passthrough() {
        let uri = document_uri("sftp://host/home/me/a.txt").unwrap();
        assert_eq!(uri.as_str(), "sftp://host/home/me/a.txt");
    }

    #[cfg(unix)]
    #[test]
    fn test_document_uri_from_path() {
        let uri = document_uri("/tmp/my file.txt").unwrap();
        assert_eq!(uri.as_str(), "file:///tmp/my%20file.txt");

        let relative = document_uri("notes.txt").unwrap();
        assert!(relative.as_str().starts_with("file:///"));
        assert!(relative.as_str().ends_with("/notes.txt"));
    }

    #[cfg(unix)]
    #[test]
    fn test_document_uri_parent_segment() {
        let cwd = std::env::current_dir().unwrap();
        let Some(parent) = cwd.parent() else {
            return;
        };
        let expected = DocumentUri::from_path(parent.join("x.txt")).unwrap();
        assert_eq!(document_uri("../x.txt").unwrap(), expected);
        assert_eq!(document_uri("./../x.txt").unwrap(), expected);
    }

    #[test]
    fn test_invalid_identifiers() {
        assert!(matches!(
            attribute_key(" position".to_string()),
            Err(docmeta_common::Error::InvalidAttributeKey(_))
        ));
        assert!(matches!(
            attribute_key(String::new()),
            Err(docmeta_common::Error::InvalidAttributeKey(_))
        ));
        assert!(attribute_key("position".to_string()).is_ok());
        assert!(matches!(
            document_uri(""),
            Err(docmeta_common::Error::InvalidDocumentUri(DocumentUriError::Empty))
        ));
    }

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from([
            "docmeta",
            "--cache-dir",
            "/tmp/cache",
            "set",
            "file:///a.txt",
            "position",
            "42",
        ])
        .unwrap();
        assert_eq!(args.cache_dir, Some(PathBuf::from("/tmp/cache")));
        assert!(matches!(args.command, Commands::Set { ref value, .. } if value == "42"));
    }

    #[test]
    fn test_document_view_sorted() {
        let mut entry = Entry::new(7);
        entry.set("position", Some("1"));
        entry.set("encoding", Some("UTF-8"));
        let view = DocumentView::new("file:///a.txt", &entry);
        let json = serde_json::to_string(&view).unwrap();
        assert_eq!(
            json,
            r#"{"uri":"file:///a.txt","atime":7,"attributes":{"encoding":"UTF-8","position":"1"}}"#
        );
    }
}
