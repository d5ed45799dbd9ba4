use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use colored::Colorize;
use serde_json::json;
use tidal_crypto::SigningKey;
use tidal_repo::Repo;
use tidal_store::{BlockKind, CommitNode, InMemoryBlockStore, Node, RootNode, SharedStore};
use tidal_sync::{compute_diff, load_archive, save_archive, BlockSet, Event, RecordProjection, Replica};
use tidal_types::{Cid, Collection, Did};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::cli::{Cli, Command, DemoArgs, InspectArgs, OutputFormat, ReplayArgs};
use crate::config::CliConfig;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = CliConfig::load(cli.config.as_deref())?;
    match cli.command {
        Command::Demo(args) => cmd_demo(&args, &config, cli.format),
        Command::Inspect(args) => cmd_inspect(&args, cli.format),
        Command::Replay(args) => cmd_replay(&args, &config, cli.format),
    }
}

// ---------------------------------------------------------------------------
// demo
// ---------------------------------------------------------------------------

pub struct DemoOutput {
    pub did: Did,
    pub base: PathBuf,
    pub base_head: Cid,
    pub base_blocks: usize,
    pub update: PathBuf,
    pub head: Cid,
    pub update_blocks: usize,
}

/// Write `entries` posts, archive the history, then add `extra` posts and a
/// follow that is immediately undone, and archive the difference.
pub fn build_demo(args: &DemoArgs, config: &CliConfig) -> anyhow::Result<DemoOutput> {
    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("creating {}", args.out_dir.display()))?;
    let store: SharedStore = Arc::new(InMemoryBlockStore::new());
    let mut repo = Repo::create(store.clone(), SigningKey::generate())?;
    let namespace = config.default_namespace.as_str();
    let cancel = CancellationToken::new();

    write_posts(&mut repo, namespace, 0..args.entries)?;
    let base_head = repo.cid();
    let base_set = compute_diff(&store, base_head, None, &config.sync, &cancel)?;
    let base = save_archive(&base_set, &args.out_dir.join("base.tda"))?;

    write_posts(&mut repo, namespace, args.entries..args.entries + args.extra)?;
    let friend = SigningKey::generate().did();
    repo.follow(friend.clone(), "friend")?;
    repo.unfollow(&friend)?;
    let update_set = compute_diff(&store, repo.cid(), Some(base_head), &config.sync, &cancel)?;
    let update = save_archive(&update_set, &args.out_dir.join("update.tda"))?;

    info!(did = %repo.did(), head = %repo.cid().short_hex(), "demo repository written");
    Ok(DemoOutput {
        did: repo.did().clone(),
        base: base.path,
        base_head,
        base_blocks: base.block_count,
        update: update.path,
        head: repo.cid(),
        update_blocks: update.block_count,
    })
}

fn write_posts(repo: &mut Repo, namespace: &str, range: std::ops::Range<usize>) -> anyhow::Result<()> {
    for i in range {
        let tid = repo.next_tid();
        repo.add_record(
            namespace,
            Collection::Posts,
            tid,
            json!({ "text": format!("post #{i}"), "created_at_us": tid.timestamp_us() }),
        )?;
    }
    Ok(())
}

fn cmd_demo(args: &DemoArgs, config: &CliConfig, format: OutputFormat) -> anyhow::Result<()> {
    let out = build_demo(args, config)?;
    match format {
        OutputFormat::Json => println!(
            "{}",
            json!({
                "did": out.did,
                "base": { "path": out.base, "head": out.base_head, "blocks": out.base_blocks },
                "update": { "path": out.update, "head": out.head, "blocks": out.update_blocks },
            })
        ),
        OutputFormat::Text => {
            println!("{} Demo repository {}", "✓".green().bold(), out.did.to_string().cyan());
            println!(
                "  base:   {} ({} blocks, head {})",
                out.base.display().to_string().bold(),
                out.base_blocks,
                out.base_head.short_hex().yellow()
            );
            println!(
                "  update: {} ({} blocks, head {})",
                out.update.display().to_string().bold(),
                out.update_blocks,
                out.head.short_hex().yellow()
            );
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// inspect
// ---------------------------------------------------------------------------

pub struct ArchiveSummary {
    pub root: Cid,
    pub owner: Did,
    pub prev: Option<Cid>,
    pub blocks: usize,
    pub kinds: BTreeMap<BlockKind, usize>,
}

pub fn inspect_archive(path: &Path) -> anyhow::Result<ArchiveSummary> {
    let set = load_archive(path).with_context(|| format!("reading {}", path.display()))?;
    let (owner, prev) = archive_owner(&set)?;
    let mut kinds = BTreeMap::new();
    for (_, block) in set.iter() {
        *kinds.entry(block.kind).or_insert(0) += 1;
    }
    Ok(ArchiveSummary {
        root: set.root(),
        owner,
        prev,
        blocks: set.len(),
        kinds,
    })
}

/// DID and parent commit of the head commit carried by an archive.
fn archive_owner(set: &BlockSet) -> anyhow::Result<(Did, Option<Cid>)> {
    let find = |cid: &Cid| set.iter().find(|(c, _)| c == cid).map(|(_, block)| block);
    let head = set.root();
    let commit_block = find(&head).context("archive does not carry its head commit")?;
    let commit = CommitNode::from_block(&head, commit_block)?;
    let root_block = find(&commit.root).context("archive does not carry the head root node")?;
    let root = RootNode::from_block(&commit.root, root_block)?;
    Ok((root.did, root.prev))
}

fn cmd_inspect(args: &InspectArgs, format: OutputFormat) -> anyhow::Result<()> {
    let summary = inspect_archive(&args.file)?;
    match format {
        OutputFormat::Json => {
            let kinds: BTreeMap<String, usize> =
                summary.kinds.iter().map(|(k, n)| (k.to_string(), *n)).collect();
            println!(
                "{}",
                json!({
                    "root": summary.root,
                    "owner": summary.owner,
                    "prev": summary.prev,
                    "blocks": summary.blocks,
                    "kinds": kinds,
                })
            );
        }
        OutputFormat::Text => {
            println!("Archive {}", args.file.display().to_string().bold());
            println!("  root:   {}", summary.root.to_hex().yellow());
            println!("  owner:  {}", summary.owner.to_string().cyan());
            match summary.prev {
                Some(prev) => println!("  prev:   {}", prev.to_hex().dimmed()),
                None => println!("  prev:   {}", "genesis".dimmed()),
            }
            println!("  blocks: {}", summary.blocks.to_string().bold());
            for (kind, count) in &summary.kinds {
                println!("    {:<14}{count}", kind.to_string());
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// replay
// ---------------------------------------------------------------------------

pub struct ReplayOutcome {
    pub replica: Replica,
    pub projection: RecordProjection,
    pub batches: Vec<(PathBuf, Vec<Event>)>,
}

/// Apply `base` and then each of `updates` to a fresh in-memory replica.
pub fn replay_archives(base: &Path, updates: &[PathBuf], config: &CliConfig) -> anyhow::Result<ReplayOutcome> {
    let first = load_archive(base).with_context(|| format!("reading {}", base.display()))?;
    let (owner, _) = archive_owner(&first)?;
    let store: SharedStore = Arc::new(InMemoryBlockStore::new());
    let mut replica = Replica::new(store, owner, config.sync.clone());
    let mut projection = RecordProjection::new();

    let mut batches = Vec::new();
    let events = replica
        .apply_blocks(&first, |e| {
            projection.apply(e);
        })
        .with_context(|| format!("applying {}", base.display()))?;
    batches.push((base.to_path_buf(), events));

    for path in updates {
        let set = load_archive(path).with_context(|| format!("reading {}", path.display()))?;
        let events = replica
            .apply_blocks(&set, |e| {
                projection.apply(e);
            })
            .with_context(|| format!("applying {}", path.display()))?;
        batches.push((path.clone(), events));
    }

    Ok(ReplayOutcome {
        replica,
        projection,
        batches,
    })
}

fn cmd_replay(args: &ReplayArgs, config: &CliConfig, format: OutputFormat) -> anyhow::Result<()> {
    let outcome = replay_archives(&args.base, &args.updates, config)?;
    let head = outcome.replica.head();
    match format {
        OutputFormat::Json => {
            let batches: Vec<_> = outcome
                .batches
                .iter()
                .map(|(path, events)| json!({ "archive": path, "events": events }))
                .collect();
            println!(
                "{}",
                json!({
                    "did": outcome.replica.did(),
                    "head": head,
                    "objects": outcome.projection.object_count(),
                    "follows": outcome.projection.follows().len(),
                    "batches": batches,
                })
            );
        }
        OutputFormat::Text => {
            for (path, events) in &outcome.batches {
                println!(
                    "{} {} ({} events)",
                    "==".dimmed(),
                    path.display().to_string().bold(),
                    events.len()
                );
                for event in events {
                    println!("  {}", paint(event));
                }
            }
            println!(
                "{} Replica of {} at {} ({} objects, {} follows)",
                "✓".green().bold(),
                outcome.replica.did().to_string().cyan(),
                head.map(|c| c.short_hex()).unwrap_or_default().yellow(),
                outcome.projection.object_count(),
                outcome.projection.follows().len()
            );
        }
    }
    Ok(())
}

fn paint(event: &Event) -> colored::ColoredString {
    let line = event.to_string();
    match event {
        Event::AddedObject { .. } | Event::AddedRelationship { .. } => line.green(),
        Event::UpdatedObject { .. } | Event::UpdatedRelationship { .. } => line.yellow(),
        Event::DeletedObject { .. } | Event::DeletedRelationship { .. } | Event::DeletedNamespace { .. } => {
            line.red()
        }
    }
}
