use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use arbiter::{load_positions, AnchorPolicy, Position, ReportWriter, UciEngine};
use chess_council::llm::ChatBackend;
use chess_council::protocols::MoveProtocol;
use chess_council::{
    Arena, ArenaSettings, CouncilConfig, DebateProtocol, ManagerProtocol, OpenAiChatClient,
    StructuredProtocol,
};
use clap::{Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "chess-council", about = "Score LLM move-proposal protocols against a chess engine")]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run every protocol over the position list and append a summary
    Run(RunArgs),
    /// Run a single protocol on a single position
    Probe(ProbeArgs),
}

#[derive(clap::Args, Debug, Default)]
struct RunArgs {
    /// Position list, one FEN per line
    #[arg(long)]
    positions: Option<PathBuf>,
    /// Only score the first N positions
    #[arg(long)]
    max_positions: Option<usize>,
    /// Summary file (appended)
    #[arg(long)]
    summary: Option<PathBuf>,
    /// Per-position JSONL report
    #[arg(long)]
    report: Option<PathBuf>,
    /// side-to-move, white or black
    #[arg(long)]
    anchor: Option<AnchorPolicy>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ProtocolKind {
    Structured,
    Debate,
    Manager,
}

#[derive(clap::Args, Debug)]
struct ProbeArgs {
    #[arg(long, value_enum)]
    protocol: ProtocolKind,
    #[arg(long)]
    fen: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let mut config =
        CouncilConfig::load(cli.config.as_deref()).context("failed to load configuration")?;

    match cli.command.unwrap_or(Command::Run(RunArgs::default())) {
        Command::Run(args) => {
            apply_run_overrides(&mut config, args);
            config.validate()?;
            run(config).await
        }
        Command::Probe(args) => {
            config.validate()?;
            probe(config, args).await
        }
    }
}

fn apply_run_overrides(config: &mut CouncilConfig, args: RunArgs) {
    if let Some(p) = args.positions {
        config.run.positions_path = p;
    }
    if let Some(n) = args.max_positions {
        config.run.max_positions = Some(n);
    }
    if let Some(p) = args.summary {
        config.run.summary_path = p;
    }
    if let Some(p) = args.report {
        config.run.report_path = Some(p);
    }
    if let Some(a) = args.anchor {
        config.run.anchor = a;
    }
}

fn backend(config: &CouncilConfig) -> Result<Arc<dyn ChatBackend>> {
    let client = OpenAiChatClient::new(
        &config.llm.base_url,
        config.api_key()?,
        config.llm.request_timeout(),
    )?;
    info!(endpoint = client.endpoint(), "language-model client ready");
    Ok(Arc::new(client))
}

async fn run(config: CouncilConfig) -> Result<()> {
    let mut positions = load_positions(&config.run.positions_path)?;
    if let Some(max) = config.run.max_positions {
        positions.truncate(max);
    }
    if positions.is_empty() {
        anyhow::bail!(
            "no positions found in {}",
            config.run.positions_path.display()
        );
    }

    let backend = backend(&config)?;
    let engine = UciEngine::start(config.engine.clone())
        .await
        .with_context(|| format!("failed to start engine {}", config.engine.path.display()))?;

    let protocols: Vec<Arc<dyn MoveProtocol>> = vec![
        Arc::new(StructuredProtocol::new(
            Arc::clone(&backend),
            &config.llm.proposer_model,
        )),
        Arc::new(DebateProtocol::new(
            Arc::clone(&backend),
            &config.llm.debater_model,
        )),
        Arc::new(ManagerProtocol::new(
            Arc::clone(&backend),
            &config.llm.manager_model,
            &config.llm.analyst_model,
        )),
    ];
    let arena = Arena::new(protocols, Arc::new(engine), ArenaSettings::from(&config.run));

    let mut writer = match &config.run.report_path {
        Some(path) => Some(
            ReportWriter::open(path)
                .with_context(|| format!("failed to open report {}", path.display()))?,
        ),
        None => None,
    };

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Ctrl-C received; finishing the current position");
            on_signal.cancel();
        }
    });

    let summary = arena
        .run(&positions, &cancel, |report| {
            if let Some(w) = writer.as_mut() {
                if let Err(e) = w.write(report) {
                    error!(error = %e, "failed to write position report");
                }
            }
        })
        .await;

    print!("{}", summary.render());
    summary
        .append_to(&config.run.summary_path)
        .with_context(|| format!("failed to append summary to {}", config.run.summary_path.display()))?;
    info!(path = %config.run.summary_path.display(), "summary appended");
    Ok(())
}

async fn probe(config: CouncilConfig, args: ProbeArgs) -> Result<()> {
    let position = Position::parse(&args.fen)?;
    let backend = backend(&config)?;

    let decided = match args.protocol {
        ProtocolKind::Structured => {
            StructuredProtocol::new(backend, &config.llm.proposer_model)
                .decide(&position)
                .await
        }
        ProtocolKind::Debate => {
            let outcome = DebateProtocol::new(backend, &config.llm.debater_model)
                .run(&position)
                .await;
            for entry in &outcome.transcript {
                println!("--- round {} / {} ---\n{}\n", entry.round, entry.speaker, entry.text);
            }
            outcome.mv.ok_or(chess_council::ProtocolError::NoMove)
        }
        ProtocolKind::Manager => {
            ManagerProtocol::new(
                backend,
                &config.llm.manager_model,
                &config.llm.analyst_model,
            )
            .decide(&position)
            .await
        }
    };

    match decided {
        Ok(mv) => println!("{mv}"),
        Err(e) => println!("no move ({}): {e}", e.kind()),
    }
    Ok(())
}
