//! Operator tool for the meter cache.
//!
//! Provides commands for:
//! - Computing and checking schema hashes between processes
//! - Listing the record kinds of a schema
//! - Decoding a stored bucket payload to JSON

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use meter_cache_core::codec;
use meter_cache_core::schema::{SchemaHash, SchemaSet, SchemaSource};

/// Command-line arguments for the cache tool.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the SHA-256 hash of a schema file
    Hash {
        /// Schema file
        #[arg(long, default_value = "./schema.json")]
        schema: PathBuf,
    },

    /// List record kinds and their fields
    Inspect {
        /// Schema file
        #[arg(long, default_value = "./schema.json")]
        schema: PathBuf,
    },

    /// Compare a schema against a peer's hash; exits non-zero on mismatch
    Check {
        /// Schema file
        #[arg(long, default_value = "./schema.json")]
        schema: PathBuf,

        /// Hex-encoded hash reported by the peer
        #[arg(long)]
        peer_hash: String,
    },

    /// Decode a stored bucket payload and print it as JSON
    Decode {
        /// Schema file
        #[arg(long, default_value = "./schema.json")]
        schema: PathBuf,

        /// File holding the compressed bucket bytes
        #[arg(long)]
        bucket: PathBuf,

        /// Print only the bucket header
        #[arg(long)]
        header_only: bool,
    },
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match args.command {
        Command::Hash { schema } => {
            let set = load_schema(&schema)?;
            println!("{}", set.hash());
        }
        Command::Inspect { schema } => {
            let set = load_schema(&schema)?;
            println!("schema {}", set.hash());
            for def in set.record_defs() {
                let role = if def.is_bucket_kind() {
                    "bucket"
                } else if def.is_reading_kind() {
                    "reading"
                } else {
                    "record"
                };
                println!("{} ({})", def.name(), role);
                for field in def.fields() {
                    let mut marks = Vec::new();
                    if def.timestamp_field().map(|f| &f.name) == Some(&field.name) {
                        marks.push("timestamp");
                    }
                    if def.array_field().map(|f| &f.name) == Some(&field.name) {
                        marks.push("array");
                    }
                    let marks = if marks.is_empty() {
                        String::new()
                    } else {
                        format!(" [{}]", marks.join(", "))
                    };
                    println!(
                        "  {:>2} {:<20} {}{}",
                        field.order, field.name, field.field_type, marks
                    );
                }
            }
        }
        Command::Check { schema, peer_hash } => {
            let set = load_schema(&schema)?;
            let remote: SchemaHash = peer_hash.parse()?;
            if let Err(e) = meter_cache_core::schema::validate_peer_hash(&set.hash(), &remote) {
                tracing::error!("{}", e);
                eprintln!("{}", e);
                return Ok(ExitCode::FAILURE);
            }
            println!("schema {} matches peer", set.hash());
        }
        Command::Decode {
            schema,
            bucket,
            header_only,
        } => {
            let data = std::fs::read(&bucket)
                .with_context(|| format!("Failed to read bucket file {}", bucket.display()))?;
            if header_only {
                let header = codec::decode_bucket_header(&data)?;
                let json = serde_json::json!({
                    "ownerId": header.owner_id,
                    "day": header.day,
                    "kind": header.kind,
                    "count": header.reading_count,
                    "createdAt": header.created_at,
                    "lastAccessAt": header.last_access_at,
                });
                println!("{}", serde_json::to_string_pretty(&json)?);
            } else {
                let set = load_schema(&schema)?;
                let decoded = codec::decode_bucket(&data, &set)?;
                tracing::info!(
                    "Decoded bucket {} with {} readings",
                    decoded.owner_id(),
                    decoded.len()
                );
                println!("{}", serde_json::to_string_pretty(&decoded.to_json())?);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn load_schema(path: &Path) -> Result<SchemaSet> {
    SchemaSet::load(&SchemaSource::Path(path.to_path_buf()))
        .with_context(|| format!("Failed to load schema {}", path.display()))
}
