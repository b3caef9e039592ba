use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Local, Utc};
use clap::{Parser, Subcommand};
use prettytable::{Cell, Row, Table};
use std::fs::File;
use std::io::{BufRead, BufReader};
use tracing::{info, warn};

use newsroom_clusters::clustering::{ClusterFilter, NewItem, StoryCluster};
use newsroom_clusters::entity::{EntityKind, EventType, GazetteerEntry};
use newsroom_clusters::{logging, ClusterConfig, ClusterEngine, ClusterStore, Database};

#[derive(Parser)]
#[clap(name = "newsroom-clusters", about = "Cluster newsroom items into stories")]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import news items from a JSON Lines file
    Import {
        /// One JSON object per line
        #[clap(required = true)]
        file: String,
    },

    /// Assign every waiting item to a story cluster
    AssignPending {
        /// Only assign items of this site
        #[clap(short, long)]
        site: Option<String>,

        /// Maximum number of items to process
        #[clap(short, long)]
        limit: Option<usize>,
    },

    /// Recompute scores and trends of recent clusters
    Sweep {
        #[clap(short, long, required = true)]
        site: String,
    },

    /// Show the top stories of a site
    Top {
        #[clap(short, long, required = true)]
        site: String,

        #[clap(short, long)]
        limit: Option<usize>,

        /// Cluster ids already shown elsewhere on the page
        #[clap(short, long, num_args = 1..)]
        exclude: Vec<i64>,
    },

    /// List clusters of a site
    List {
        #[clap(short, long, required = true)]
        site: String,

        /// Filter by event type (e.g. injury, transfer, match-result)
        #[clap(short, long)]
        event_type: Option<EventType>,

        /// Minimum significance score
        #[clap(short, long)]
        min_dis: Option<i32>,

        /// Only clusters updated in the last N hours
        #[clap(long)]
        hours: Option<i64>,

        #[clap(short, long)]
        limit: Option<usize>,
    },

    /// Show one cluster with its latest items
    Show {
        #[clap(required = true)]
        id: i64,
    },

    /// Recompute derived fields of a cluster from its items
    Refresh {
        #[clap(required = true)]
        id: i64,
    },

    /// Add or replace a gazetteer alias
    AddAlias {
        #[clap(required = true)]
        alias: String,

        #[clap(required = true)]
        canonical: String,

        /// TEAM, LEAGUE, PLAYER or OTHER
        #[clap(short, long, default_value = "TEAM")]
        kind: String,

        /// Only apply the alias to this site
        #[clap(short, long)]
        site: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::configure_logging();

    let args = Cli::parse();

    let config = ClusterConfig::from_env()?;
    let db = Database::from_env().await?;

    let engine = ClusterEngine::new(db.clone(), config).await?;

    match args.command {
        Commands::Import { file } => {
            import_items(&db, &file).await?;
        }
        Commands::AssignPending { site, limit } => {
            let report = engine.assign_pending(site.as_deref(), limit).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Sweep { site } => {
            let report = engine.rescore_all(&site).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Top {
            site,
            limit,
            exclude,
        } => {
            let stories = engine.select_top_stories(&site, limit, &exclude).await?;
            if stories.is_empty() {
                println!("No top stories for site {}", site);
            }
            for (rank, story) in stories.iter().enumerate() {
                println!(
                    "{}. [{}] {} ({}, {})",
                    rank + 1,
                    story.cluster.dis,
                    story.cluster.title,
                    story.cluster.trend,
                    story
                        .cluster
                        .category
                        .map(|c| c.to_string())
                        .unwrap_or_default()
                );
                for item in &story.supporting_items {
                    println!("     - {} ({}) {}", item.title, item.source, item.url);
                }
            }
        }
        Commands::List {
            site,
            event_type,
            min_dis,
            hours,
            limit,
        } => {
            let filter = ClusterFilter {
                event_type,
                min_dis,
                since: hours.map(|h| Utc::now() - Duration::hours(h)),
                limit,
                ..ClusterFilter::for_site(&site)
            };
            let clusters = engine.list_clusters(&filter).await?;
            print_clusters(&clusters);
        }
        Commands::Show { id } => {
            let detail = engine.get_cluster(id).await?;
            print_clusters(std::slice::from_ref(&detail.cluster));

            let cluster = &detail.cluster;
            let entities: Vec<&str> = cluster.entities.iter().map(String::as_str).collect();
            println!("Entities: {}", entities.join(", "));
            println!(
                "Sources: {} ({} tier 1), velocity {:.1}/h",
                cluster.source_count, cluster.tier1_count, cluster.velocity
            );

            let mut table = Table::new();
            table.add_row(Row::new(vec![
                Cell::new("Item"),
                Cell::new("Published"),
                Cell::new("Source"),
                Cell::new("Title"),
            ]));
            for item in &detail.items {
                table.add_row(Row::new(vec![
                    Cell::new(&item.id.to_string()),
                    Cell::new(&format_time(&item.pub_date)),
                    Cell::new(&format!("{} (T{})", item.source, item.source_tier)),
                    Cell::new(&truncate(&item.title, 70)),
                ]));
            }
            table.printstd();
        }
        Commands::Refresh { id } => {
            let cluster = engine.refresh_cluster(id).await?;
            print_clusters(std::slice::from_ref(&cluster));
        }
        Commands::AddAlias {
            alias,
            canonical,
            kind,
            site,
        } => {
            // Stored only; engines started from now on pick it up
            let mut entry =
                GazetteerEntry::new(&alias, &canonical, EntityKind::from(kind.as_str()));
            if let Some(site) = site.as_deref() {
                entry = entry.for_site(site);
            }
            db.upsert_gazetteer_entry(&entry).await?;
            println!(
                "{} -> {} ({}, {})",
                entry.alias,
                entry.canonical,
                entry.kind,
                entry.site_id.as_deref().unwrap_or("all sites")
            );
        }
    }

    Ok(())
}

/// Reads one item per line; bad lines are logged and skipped
async fn import_items<S: ClusterStore>(store: &S, path: &str) -> Result<()> {
    let file = File::open(path).with_context(|| format!("cannot open {}", path))?;
    let mut imported = 0;
    let mut rejected = 0;

    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let item: NewItem = match serde_json::from_str(&line) {
            Ok(item) => item,
            Err(e) => {
                warn!("Line {}: invalid item: {}", index + 1, e);
                rejected += 1;
                continue;
            }
        };
        match store.insert_item(&item).await {
            Ok(_) => imported += 1,
            Err(e) => {
                warn!("Line {}: not stored: {}", index + 1, e);
                rejected += 1;
            }
        }
    }

    info!("Imported {} items from {} ({} rejected)", imported, path, rejected);
    Ok(())
}

fn print_clusters(clusters: &[StoryCluster]) {
    if clusters.is_empty() {
        println!("No clusters found");
        return;
    }

    let mut table = Table::new();
    table.add_row(Row::new(vec![
        Cell::new("ID"),
        Cell::new("DIS"),
        Cell::new("Trend"),
        Cell::new("Event"),
        Cell::new("Category"),
        Cell::new("Items"),
        Cell::new("Latest"),
        Cell::new("Title"),
    ]));

    for cluster in clusters {
        table.add_row(Row::new(vec![
            Cell::new(&cluster.id.to_string()),
            Cell::new(&cluster.dis.to_string()),
            Cell::new(cluster.trend.as_str()),
            Cell::new(cluster.event_type.as_str()),
            Cell::new(
                &cluster
                    .category
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ),
            Cell::new(&cluster.item_count.to_string()),
            Cell::new(&format_time(&cluster.latest_item)),
            Cell::new(&truncate(&cluster.title, 60)),
        ]));
    }

    table.printstd();
}

fn format_time(time: &DateTime<Utc>) -> String {
    time.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", cut)
}
