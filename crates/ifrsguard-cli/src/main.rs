mod display;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use ifrsguard_ai::{DraftGenerator, ExtractiveGenerator, HttpGenerator};
use ifrsguard_core::{Answer, EngineConfig, InteractionOutput, TopicTag};
use ifrsguard_engine::{AuditWriter, Collaborators, Engine, RequestContext};
use ifrsguard_store::{AuditSink, DuckAuditStore, MemoryAuditLog, MemoryIndex};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ifrsguard", version)]
#[command(about = "Policy-guarded IFRS question answering and compliance review")]
struct Cli {
    /// Engine configuration (TOML). Defaults apply when omitted.
    #[arg(long, global = true, env = "IFRSGUARD_CONFIG")]
    config: Option<PathBuf>,

    /// Chunk corpus (JSON lines) used for retrieval and document lookup.
    #[arg(long, global = true, env = "IFRSGUARD_CORPUS")]
    corpus: Option<PathBuf>,

    /// DuckDB audit database. Interactions are kept in memory when omitted.
    #[arg(long, global = true, env = "IFRSGUARD_AUDIT_DB")]
    audit_db: Option<PathBuf>,

    /// Caller identity recorded in the audit trail.
    #[arg(long, global = true, env = "IFRSGUARD_USER", default_value = "cli")]
    user: String,

    /// OpenAI-compatible endpoint for draft generation. Extractive drafts otherwise.
    #[arg(long, global = true, env = "IFRSGUARD_LLM_URL")]
    llm_url: Option<String>,

    #[arg(long, global = true, env = "IFRSGUARD_LLM_MODEL", default_value = "gpt-4o-mini")]
    llm_model: String,

    #[arg(long, global = true, env = "IFRSGUARD_LLM_API_KEY", hide_env_values = true)]
    llm_api_key: Option<String>,

    /// Print results as JSON instead of cards.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Answer a question from the indexed standards
    Ask {
        question: String,
        /// Topic tag, e.g. ifrs13_measurement
        #[arg(long)]
        topic: Option<String>,
        /// Restrict retrieval to one standard, e.g. "IFRS 13"
        #[arg(long)]
        standard: Option<String>,
    },
    /// Review a document against a standard's checklist
    Analyze {
        document_id: String,
        #[arg(long, default_value = "IFRS 13")]
        standard: String,
    },
    /// Route a free-form message to ask or analyze
    Chat { message: String },
    /// List supported topic tags
    Topics,
    /// Check a candidate answer (JSON file) against the policy rules
    Validate { path: PathBuf },
    /// Inspect the audit trail
    Audit {
        #[command(subcommand)]
        command: AuditCommand,
    },
}

#[derive(Subcommand)]
enum AuditCommand {
    /// Most recent interactions
    Recent {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Counts by status and mean confidence
    Stats,
    /// Citations recorded for one interaction
    Citations { interaction_id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    info!("ifrsguard v{}", env!("CARGO_PKG_VERSION"));

    match &cli.command {
        Command::Topics => {
            let topics = TopicTag::ALL;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&topics)?);
            } else {
                display::print_topics(&topics);
            }
        }
        Command::Ask {
            question,
            topic,
            standard,
        } => {
            let engine = build_engine(&cli)?;
            let answer = engine
                .ask(&context(&cli), question, topic.as_deref(), standard.as_deref())
                .await?;
            emit(cli.json, &InteractionOutput::Answer(answer))?;
            report_audit_failures(&engine);
        }
        Command::Analyze {
            document_id,
            standard,
        } => {
            let engine = build_engine(&cli)?;
            let feedback = engine.analyze(&context(&cli), document_id, standard).await?;
            emit(cli.json, &InteractionOutput::Feedback(feedback))?;
            report_audit_failures(&engine);
        }
        Command::Chat { message } => {
            let engine = build_engine(&cli)?;
            let reply = engine.chat(&context(&cli), message).await?;
            if !cli.json {
                eprintln!("tool: {}", reply.intent.tool().unwrap_or("none"));
            }
            emit(cli.json, &reply.output)?;
            report_audit_failures(&engine);
        }
        Command::Validate { path } => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading candidate answer {}", path.display()))?;
            let candidate: Answer = serde_json::from_str(&content)
                .with_context(|| format!("parsing candidate answer {}", path.display()))?;
            let report = build_engine(&cli)?.validate_policy(&candidate);
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                display::print_policy_report(&report);
            }
        }
        Command::Audit { command } => run_audit(&cli, command)?,
    }
    Ok(())
}

fn context(cli: &Cli) -> RequestContext {
    RequestContext::new(cli.user.clone())
}

fn report_audit_failures(engine: &Engine) {
    let failures = engine.audit().failure_count();
    if failures > 0 {
        warn!(failures, "audit trail is incomplete for this run");
    }
}

fn run_audit(cli: &Cli, command: &AuditCommand) -> anyhow::Result<()> {
    let path = cli
        .audit_db
        .as_deref()
        .context("--audit-db (or IFRSGUARD_AUDIT_DB) is required to inspect the audit trail")?;
    let store = DuckAuditStore::open_persistent(path)
        .with_context(|| format!("opening audit database {}", path.display()))?;

    match command {
        AuditCommand::Recent { limit } => {
            let batches = store.recent(*limit)?;
            println!("{}", arrow::util::pretty::pretty_format_batches(&batches)?);
        }
        AuditCommand::Stats => {
            let stats = store.stats()?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                display::print_stats(&stats);
            }
        }
        AuditCommand::Citations { interaction_id } => {
            let citations = store.citations_for(interaction_id)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&citations)?);
            } else {
                println!("=== Citations for {interaction_id} ===");
                for citation in &citations {
                    println!("  {citation}");
                }
            }
        }
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> anyhow::Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(EngineConfig::default()),
    }
}

fn build_engine(cli: &Cli) -> anyhow::Result<Engine> {
    let config = load_config(cli.config.as_deref())?;
    let index = match &cli.corpus {
        Some(path) => Arc::new(
            MemoryIndex::load_jsonl(path)
                .with_context(|| format!("loading corpus {}", path.display()))?,
        ),
        None => {
            warn!("no corpus given, every answer will abstain");
            Arc::new(MemoryIndex::new())
        }
    };

    let sink: Arc<dyn AuditSink> = match &cli.audit_db {
        Some(path) => Arc::new(
            DuckAuditStore::open_persistent(path)
                .with_context(|| format!("opening audit database {}", path.display()))?,
        ),
        None => Arc::new(MemoryAuditLog::new()),
    };

    let generator: Arc<dyn DraftGenerator> = match &cli.llm_url {
        Some(url) => Arc::new(
            HttpGenerator::new(url, cli.llm_model.clone(), cli.llm_api_key.clone())
                .context("building HTTP generator")?,
        ),
        None => Arc::new(ExtractiveGenerator::new()),
    };

    let engine = Engine::new(
        config,
        Collaborators {
            search: index.clone(),
            documents: index,
            generator,
            audit: AuditWriter::new(sink),
        },
    )
    .context("invalid engine configuration")?;
    Ok(engine)
}

fn emit(json: bool, output: &InteractionOutput) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(output)?);
        return Ok(());
    }
    match output {
        InteractionOutput::Answer(answer) => display::print_answer_card(answer),
        InteractionOutput::Feedback(feedback) => display::print_feedback_card(feedback),
    }
    Ok(())
}
