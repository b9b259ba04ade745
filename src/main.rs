// Copyright 2026 Omnio Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

mod cli;
mod output;

use std::io::Read as _;
use std::io::Write as _;

use anyhow::Context as _;
use anyhow::Result;
use clap::CommandFactory as _;
use clap::Parser;
use clap_complete::generate;
use serde_json::Value;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use omnio::Omnio;
use omnio::PutObjectInput;
use omnio::catalog::ListEntry;
use omnio::catalog::ListOptions;
use omnio::catalog::ListOrder;
use omnio::catalog::SearchOptions;
use omnio::config::Config;
use omnio::config::ConfigCtx;
use omnio::config::write_config;
use omnio::types::DirPath;
use omnio::types::ObjectId;
use omnio::types::ObjectPath;
use omnio::types::WriteFlag;

use crate::cli::Cli;
use crate::cli::Commands;
use crate::cli::GetArgs;
use crate::cli::LsArgs;
use crate::cli::MoveArgs;
use crate::cli::PathArgs;
use crate::cli::PurgeArgs;
use crate::cli::PutArgs;
use crate::cli::SearchArgs;
use crate::output::JsonResponse;
use crate::output::print_json;

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let runtime = tokio::runtime::Runtime::new().context("start async runtime")?;
    runtime.block_on(dispatch(cli))
}

/// Installs the process-wide `tracing` subscriber. `RUST_LOG` wins when
/// set; otherwise `--verbose` selects debug-level, info-level
/// otherwise.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("omnio={level}")));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}

async fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Init { bucket, part_size } => handle(cmd_init(bucket, part_size).await, false),
        Commands::Put(args) => {
            let json = args.json;
            handle(cmd_put(args).await, json)
        }
        Commands::Get(args) => {
            let json = args.json;
            handle(cmd_get(args).await, json)
        }
        Commands::Stat(args) => {
            let json = args.json;
            handle(cmd_stat(args).await, json)
        }
        Commands::Ls(args) => {
            let json = args.json;
            handle(cmd_ls(args).await, json)
        }
        Commands::Rm(args) => {
            let json = args.json;
            handle(cmd_rm(args).await, json)
        }
        Commands::Purge(args) => {
            let json = args.json;
            handle(cmd_purge(args).await, json)
        }
        Commands::Mv(args) => {
            let json = args.json;
            handle(cmd_mv(args).await, json)
        }
        Commands::Cp(args) => {
            let json = args.json;
            handle(cmd_cp(args).await, json)
        }
        Commands::Search(args) => {
            let json = args.json;
            handle(cmd_search(args).await, json)
        }
        Commands::Doctor { json } => handle(cmd_doctor().await, json),
        Commands::Completions { shell } => cmd_completions(shell),
    }
}

/// Prints `result` and translates it into the process's final
/// `Result<()>`: under `--json` a failure is reported as a JSON error
/// envelope and swallowed (exit code stays 0, matching tools that
/// always emit one JSON document); otherwise the error propagates to
/// `main`'s `eprintln!`/non-zero exit.
fn handle(result: Result<Value>, json: bool) -> Result<()> {
    match result {
        Ok(data) => {
            if json {
                print_json(&JsonResponse::ok(data))?;
            } else {
                println!("{}", serde_json::to_string_pretty(&data)?);
            }
            Ok(())
        }
        Err(err) => {
            if json {
                print_json(&JsonResponse::error(&err.to_string()))?;
                Ok(())
            } else {
                Err(err)
            }
        }
    }
}

async fn open_from_cwd() -> Result<(Omnio, ConfigCtx)> {
    let ctx = ConfigCtx::load_from_cwd()?;
    let omnio = Omnio::open(ctx.bucket_root(), ctx.config.default_part_size).await?;
    Ok((omnio, ctx))
}

fn parse_dir(raw: Option<&str>) -> DirPath {
    match raw {
        None => DirPath::root(),
        Some(s) => DirPath(s.split('/').filter(|seg| !seg.is_empty()).map(String::from).collect()),
    }
}

fn list_order() -> ListOrder {
    ListOrder {
        collation: "BINARY".to_string(),
        prefer_object: true,
    }
}

fn entry_to_json(entry: ListEntry) -> Value {
    match entry {
        ListEntry::Object(o) => json!({
            "type": "object",
            "path": o.full_path,
            "objectId": o.object_id.to_string(),
            "size": o.size,
            "numParts": o.num_parts,
            "mimeType": o.mime_type,
            "checksum": o.checksum.map(|c| c.as_str().to_string()),
            "objectTags": o.object_tags,
        }),
        ListEntry::Directory { name } => json!({
            "type": "directory",
            "name": name,
        }),
    }
}

async fn cmd_init(bucket: String, part_size: u64) -> Result<Value> {
    let cwd = std::env::current_dir().context("get current dir")?;
    let config_path = cwd.join("omnio.toml");
    if config_path.exists() {
        anyhow::bail!("omnio.toml already exists in {}", cwd.display());
    }
    let config = Config {
        bucket: bucket.clone(),
        default_part_size: part_size,
    };
    write_config(&config_path, &config)?;

    let bucket_root = cwd.join("buckets").join(&bucket);
    let mut omnio = Omnio::open(bucket_root, part_size).await?;
    omnio.close().await?;

    Ok(json!({ "root": cwd.display().to_string(), "bucket": bucket }))
}

async fn cmd_put(args: PutArgs) -> Result<Value> {
    let (mut omnio, _ctx) = open_from_cwd().await?;
    let data = match &args.file {
        Some(path) => std::fs::read(path).with_context(|| format!("read {}", path.display()))?,
        None => {
            let mut buf = Vec::new();
            std::io::stdin().read_to_end(&mut buf).context("read stdin")?;
            buf
        }
    };
    let flag = WriteFlag::parse(&args.flag)?;
    let cancel = CancellationToken::new();
    let outcome = omnio
        .put_object(
            PutObjectInput {
                path: ObjectPath::parse(args.path)?,
                flag,
                data,
                part_size: args.part_size,
                mime_type: args.mime_type,
                object_tags: args.tags,
                description: args.description,
                user_metadata: None,
                timestamp: None,
            },
            &cancel,
        )
        .await?;
    omnio.close().await?;

    Ok(json!({
        "objectId": outcome.object_id.to_string(),
        "entityId": outcome.entity_id.to_string(),
        "size": outcome.size,
        "checksum": outcome.checksum.as_str(),
        "numParts": outcome.num_parts,
    }))
}

async fn cmd_get(args: GetArgs) -> Result<Value> {
    let (omnio, _ctx) = open_from_cwd().await?;
    let cancel = CancellationToken::new();
    let data = omnio.get_object(ObjectPath::parse(args.path)?, &cancel).await?;

    match &args.out {
        Some(path) => std::fs::write(path, &data).with_context(|| format!("write {}", path.display()))?,
        None if !args.json => std::io::stdout().write_all(&data).context("write stdout")?,
        None => anyhow::bail!("--json requires --out"),
    }

    Ok(json!({ "bytes": data.len() }))
}

async fn cmd_stat(args: PathArgs) -> Result<Value> {
    let (omnio, _ctx) = open_from_cwd().await?;
    let cancel = CancellationToken::new();
    let stat = omnio.stat(ObjectPath::parse(args.path)?, &cancel).await?;
    Ok(json!({ "isObject": stat.is_object, "isDirectory": stat.is_directory }))
}

async fn cmd_ls(args: LsArgs) -> Result<Value> {
    let (omnio, _ctx) = open_from_cwd().await?;
    let cancel = CancellationToken::new();
    let opts = ListOptions {
        dir: parse_dir(args.dir.as_deref()),
        is_object: None,
        skip: args.skip,
        take: args.take,
        order: list_order(),
    };
    let entries = if args.trash {
        omnio.list_in_trash(opts, &cancel).await?
    } else {
        omnio.list(opts, &cancel).await?
    };
    Ok(json!({ "entries": entries.into_iter().map(entry_to_json).collect::<Vec<_>>() }))
}

async fn cmd_rm(args: PathArgs) -> Result<Value> {
    let (omnio, _ctx) = open_from_cwd().await?;
    let cancel = CancellationToken::new();
    let (object_id, entity_id) = omnio
        .trash_object(ObjectPath::parse(args.path)?, None, &cancel)
        .await?;
    Ok(json!({ "objectId": object_id.to_string(), "entityId": entity_id.to_string() }))
}

async fn cmd_purge(args: PurgeArgs) -> Result<Value> {
    let (omnio, _ctx) = open_from_cwd().await?;
    let cancel = CancellationToken::new();
    let object_id = ObjectId::parse(&args.object_id)?;
    omnio.delete_object(object_id, &cancel).await?;
    Ok(json!({ "objectId": args.object_id }))
}

async fn cmd_mv(args: MoveArgs) -> Result<Value> {
    let (omnio, _ctx) = open_from_cwd().await?;
    let cancel = CancellationToken::new();
    omnio
        .move_object(
            ObjectPath::parse(args.src.clone())?,
            ObjectPath::parse(args.dst.clone())?,
            args.exclusive,
            None,
            &cancel,
        )
        .await?;
    Ok(json!({ "src": args.src, "dst": args.dst }))
}

async fn cmd_cp(args: MoveArgs) -> Result<Value> {
    let (omnio, _ctx) = open_from_cwd().await?;
    let cancel = CancellationToken::new();
    let object_id = omnio
        .copy_object(
            ObjectPath::parse(args.src.clone())?,
            ObjectPath::parse(args.dst.clone())?,
            args.exclusive,
            None,
            &cancel,
        )
        .await?;
    Ok(json!({ "src": args.src, "dst": args.dst, "objectId": object_id.to_string() }))
}

async fn cmd_search(args: SearchArgs) -> Result<Value> {
    let (omnio, _ctx) = open_from_cwd().await?;
    let cancel = CancellationToken::new();
    let hits = omnio
        .search(
            SearchOptions {
                dir: parse_dir(args.dir.as_deref()),
                query: args.query,
                skip: args.skip,
                take: args.take,
                recursive: args.recursive,
                score_threshold: f64::MIN,
            },
            &cancel,
        )
        .await?;
    let hits: Vec<Value> = hits
        .into_iter()
        .map(|hit| {
            json!({
                "path": hit.object.full_path,
                "objectId": hit.object.object_id.to_string(),
                "score": hit.score,
            })
        })
        .collect();
    Ok(json!({ "hits": hits }))
}

async fn cmd_doctor() -> Result<Value> {
    let (omnio, _ctx) = open_from_cwd().await?;
    let cancel = CancellationToken::new();
    let report = omnio.doctor(&cancel).await?;
    Ok(serde_json::to_value(report)?)
}

fn cmd_completions(shell: clap_complete::Shell) -> Result<()> {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut std::io::stdout());
    Ok(())
}
