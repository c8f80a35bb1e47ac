use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use clap::{ArgGroup, Args, Parser, Subcommand};
use serde_json::json;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use call_analytics::aggregate::{aggregate_analyzed, ConversionClassifier, TeamReport};
use call_analytics::config::{Config, DEFAULT_CONFIG_FILE};
use call_analytics::extract::{ExtractionStats, Extractor};
use call_analytics::filter::{CallFilter, HeatBand, OutcomeCategory};
use call_analytics::models::{AnalyzedCall, ClientCalls};
use call_analytics::projection::project_unassigned;
use call_analytics::report::{self, ReportOptions};
use call_analytics::timeframe::{self, Timeframe};
use call_analytics::{db, export, ingest};

#[derive(Parser)]
#[command(name = "call-analytics")]
#[command(about = "HeatCheck sales call analytics per client and team member", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone)]
struct Scope {
    /// Client key, e.g. bright-smile
    #[arg(long)]
    client: String,
    #[arg(long, value_enum, default_value_t = Timeframe::Weekly)]
    timeframe: Timeframe,
    /// Window size in days; overrides --timeframe
    #[arg(
        long,
        conflicts_with = "timeframe",
        value_parser = clap::value_parser!(i64).range(0..=timeframe::MAX_SINCE_DAYS)
    )]
    since_days: Option<i64>,
    /// Only calls assigned to this team member
    #[arg(long)]
    member: Option<String>,
    /// Read calls from an import CSV instead of Postgres
    #[arg(long)]
    from_csv: Option<PathBuf>,
}

#[derive(Args, Debug, Clone, Default)]
struct FilterArgs {
    /// Case-insensitive search over prospect, need, objection and outcome
    #[arg(long)]
    search: Option<String>,
    #[arg(long, value_enum)]
    heat: Option<HeatBand>,
    #[arg(long, value_enum)]
    outcome: Option<OutcomeCategory>,
}

impl From<FilterArgs> for CallFilter {
    fn from(args: FilterArgs) -> Self {
        CallFilter {
            search: args.search,
            heat: args.heat,
            outcome: args.outcome,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    InitConfig {
        #[arg(long)]
        force: bool,
    },
    /// Create or upgrade the database schema
    InitDb,
    /// Load a demo client with calls in every analysis format
    Seed,
    /// Import calls from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Extract structured fields from one analysis text (stdin by default)
    #[command(group(
        ArgGroup::new("input")
            .args(["file", "text"])
            .multiple(false)
    ))]
    Extract {
        #[arg(long)]
        file: Option<PathBuf>,
        #[arg(long)]
        text: Option<String>,
    },
    /// List extracted calls
    Calls {
        #[command(flatten)]
        scope: Scope,
        #[command(flatten)]
        filter: FilterArgs,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Per-member performance
    Team {
        #[command(flatten)]
        scope: Scope,
        /// Also show the illustrative redistribution of unassigned calls
        #[arg(long)]
        projected: bool,
        #[arg(long)]
        json: bool,
    },
    /// Generate a markdown report
    Report {
        #[command(flatten)]
        scope: Scope,
        #[arg(long)]
        projected: bool,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Export extracted calls to CSV
    Export {
        #[command(flatten)]
        scope: Scope,
        #[command(flatten)]
        filter: FilterArgs,
        #[arg(long, default_value = "sales_call_analysis.csv")]
        out: PathBuf,
    },
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("failed to install logger: {err}");
    }
}

async fn connect(config: &Config) -> anyhow::Result<PgPool> {
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")
}

async fn load_scope(
    scope: &Scope,
    config: &Config,
) -> anyhow::Result<(ClientCalls, DateTime<Utc>)> {
    let now = Utc::now();
    let since = timeframe::window_start(now, scope.timeframe, scope.since_days);

    let dataset = match &scope.from_csv {
        Some(path) => {
            let rows = ingest::read_rows_from_path(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let mut dataset = ingest::client_calls(&rows, &scope.client)?;
            dataset.calls = timeframe::within_window(dataset.calls, since, now);
            if let Some(member) = scope.member.as_deref() {
                dataset.retain_member(member);
            }
            dataset
        }
        None => {
            let pool = connect(config).await?;
            db::fetch_client_calls(&pool, &scope.client, since, scope.member.as_deref()).await?
        }
    };

    info!(
        client = %dataset.client.key,
        calls = dataset.calls.len(),
        since = %since,
        "loaded calls"
    );
    Ok((dataset, since))
}

struct Analysis {
    dataset: ClientCalls,
    since: DateTime<Utc>,
    analyzed: Vec<AnalyzedCall>,
    stats: ExtractionStats,
    team: TeamReport,
}

async fn analyze_scope(scope: &Scope, config: &Config) -> anyhow::Result<Analysis> {
    let extractor = Extractor::with_rules(&config.extraction)?;
    let classifier = ConversionClassifier::new(&config.aggregation.conversion_keywords);

    let (dataset, since) = load_scope(scope, config).await?;
    let (analyzed, stats) = extractor.analyze(&dataset.calls);
    let team = aggregate_analyzed(&analyzed, &classifier);

    Ok(Analysis {
        dataset,
        since,
        analyzed,
        stats,
        team,
    })
}

fn report_title(scope: &Scope) -> String {
    match scope.since_days {
        Some(days) => format!(
            "Sales Call Analysis Report (last {} days)",
            days.clamp(1, timeframe::MAX_SINCE_DAYS)
        ),
        None => format!("{} Sales Call Analysis Report", scope.timeframe.label()),
    }
}

fn read_extract_input(file: Option<&Path>, text: Option<String>) -> anyhow::Result<String> {
    if let Some(text) = text {
        return Ok(text);
    }
    if let Some(path) = file {
        return std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()));
    }
    let mut buffer = String::new();
    std::io::stdin()
        .read_to_string(&mut buffer)
        .context("failed to read analysis text from stdin")?;
    Ok(buffer)
}

fn print_team(analysis: &Analysis, projected: Option<f64>, as_json: bool) -> anyhow::Result<()> {
    let rows = report::member_rows(&analysis.team, &analysis.dataset);
    let cohort = &analysis.team.cohort;
    let projection = projected.map(|share| project_unassigned(&analysis.team, share));

    if as_json {
        let members: Vec<_> = rows
            .iter()
            .map(|row| {
                json!({
                    "member_id": row.id,
                    "name": row.name,
                    "role": row.role,
                    "total_calls": row.metrics.total_calls,
                    "converted_calls": row.metrics.converted_calls,
                    "conversion_rate": row.metrics.conversion_rate(),
                    "average_heat_score": row.metrics.average_heat_score(),
                })
            })
            .collect();
        let output = json!({
            "client": analysis.dataset.client.key,
            "members": members,
            "cohort": {
                "total_calls": cohort.totals.total_calls,
                "converted_calls": cohort.totals.converted_calls,
                "conversion_rate": cohort.totals.conversion_rate(),
                "average_heat_score": cohort.totals.average_heat_score(),
                "unassigned_calls": cohort.unassigned_calls,
                "needs": cohort.needs,
                "objections": cohort.objections,
            },
            "projected_estimate": projection,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    if cohort.totals.total_calls == 0 {
        println!("No calls found for this window.");
    }

    println!("Team performance for {}:", analysis.dataset.client.business_name);
    for row in &rows {
        println!(
            "- {} ({}): {} calls, {} converted ({:.1}%), avg HeatCheck {}",
            row.name,
            row.role.as_deref().unwrap_or("no role"),
            row.metrics.total_calls,
            row.metrics.converted_calls,
            row.metrics.conversion_rate(),
            report::average_label(row.metrics.average_heat_score())
        );
    }
    println!(
        "Client total: {} calls ({} unassigned), {:.1}% conversion, avg HeatCheck {}",
        cohort.totals.total_calls,
        cohort.unassigned_calls,
        cohort.totals.conversion_rate(),
        report::average_label(cohort.totals.average_heat_score())
    );

    if let Some(projection) = projection {
        println!();
        println!("Projected (estimate, not for reporting):");
        for member in projection {
            let name = report::member_label(&analysis.dataset, member.member_id);
            println!(
                "- {}: {} actual + {} estimated calls, {:.1}% est. conversion",
                name,
                member.actual.total_calls,
                member.redistributed_calls,
                member.projected_conversion_rate()
            );
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    // init-config must work even when the existing file no longer parses.
    let config = if matches!(cli.command, Commands::InitConfig { .. }) {
        Config::default()
    } else {
        Config::load_or_default(&cli.config)
            .with_context(|| format!("failed to load {}", cli.config.display()))?
    };
    debug!(config = ?config, "configuration loaded");

    match cli.command {
        Commands::InitConfig { force } => {
            if cli.config.exists() && !force {
                bail!(
                    "{} already exists; pass --force to overwrite it",
                    cli.config.display()
                );
            }
            std::fs::write(&cli.config, Config::default_toml())
                .with_context(|| format!("failed to write {}", cli.config.display()))?;
            println!("Config written to {}.", cli.config.display());
        }
        Commands::InitDb => {
            let pool = connect(&config).await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let pool = connect(&config).await?;
            let inserted = db::seed(&pool).await?;
            println!("Seed data inserted ({inserted} new calls).");
        }
        Commands::Import { csv } => {
            let rows = ingest::read_rows_from_path(&csv)
                .with_context(|| format!("failed to read {}", csv.display()))?;
            let pool = connect(&config).await?;
            let inserted = db::import_rows(&pool, &rows).await?;
            println!("Inserted {inserted} calls from {}.", csv.display());
        }
        Commands::Extract { file, text } => {
            let extractor = Extractor::with_rules(&config.extraction)?;
            let input = read_extract_input(file.as_deref(), text)?;
            let extracted = extractor.extract(Some(input.as_str()));
            println!("{}", serde_json::to_string_pretty(&extracted)?);
        }
        Commands::Calls {
            scope,
            filter,
            limit,
        } => {
            let analysis = analyze_scope(&scope, &config).await?;
            let filter = CallFilter::from(filter);
            let calls = filter.apply(&analysis.analyzed);

            if calls.is_empty() {
                println!("No calls found for this window.");
                return Ok(());
            }

            println!("{} of {} calls:", calls.len().min(limit), calls.len());
            for call in calls.iter().take(limit) {
                let member = call
                    .call
                    .team_member_id
                    .and_then(|id| analysis.dataset.member_name(id));
                println!("{}", report::call_line(call, member));
            }
        }
        Commands::Team {
            scope,
            projected,
            json,
        } => {
            let analysis = analyze_scope(&scope, &config).await?;
            let share = projected.then_some(config.projection.redistribution_share);
            print_team(&analysis, share, json)?;
        }
        Commands::Report {
            scope,
            projected,
            out,
        } => {
            let analysis = analyze_scope(&scope, &config).await?;
            let options = ReportOptions {
                title: report_title(&scope),
                top_n: config.aggregation.top_n,
                high_performer_threshold: config.aggregation.high_performer_threshold,
                projection_share: projected.then_some(config.projection.redistribution_share),
            };
            let report = report::build_report(
                &analysis.dataset,
                analysis.since,
                &analysis.analyzed,
                &analysis.team,
                &analysis.stats,
                &options,
            );
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Export { scope, filter, out } => {
            let analysis = analyze_scope(&scope, &config).await?;
            let filter = CallFilter::from(filter);
            let calls = filter.apply(&analysis.analyzed);
            let file = std::fs::File::create(&out)
                .with_context(|| format!("failed to create {}", out.display()))?;
            export::write_calls_csv(std::io::BufWriter::new(file), &analysis.dataset, &calls)?;
            println!("Exported {} calls to {}.", calls.len(), out.display());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn init_config_parses_without_other_arguments() {
        let cli = Cli::try_parse_from(["call-analytics", "init-config", "--force"]).unwrap();
        assert!(matches!(cli.command, Commands::InitConfig { force: true }));
    }

    #[test]
    fn since_days_outside_range_is_rejected() {
        let parse = |days: &str| {
            Cli::try_parse_from([
                "call-analytics",
                "team",
                "--client",
                "bright-smile",
                "--since-days",
                days,
            ])
        };
        assert!(parse("100000000").is_err());
        assert!(parse("-3").is_err());
        let cli = parse("14").unwrap();
        let Commands::Team { scope, .. } = cli.command else {
            panic!("expected the team command");
        };
        assert_eq!(scope.since_days, Some(14));
        assert_eq!(report_title(&scope), "Sales Call Analysis Report (last 14 days)");
    }
}
