use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use sme_plug_core::roles::{pretty_role, BUILTIN_ROLES};
use sme_plug_core::{
    AnalysisPayload, Backend, Config, CustomRoleBuilder, ExpertAnswer, HttpBackend,
    Provider, QueryOrchestrator, QueryOutcome, ResponseSlot,
};

mod app;
mod handler;
mod logging;
mod tui;
mod ui;

use app::App;
use tui::EventHandler;

#[derive(Parser)]
#[command(name = "smeplug", version)]
#[command(about = "Compare a domain-expert assistant against a generic model")]
struct Cli {
    /// Provider the backend should use (groq, openai)
    #[arg(long, global = true)]
    provider: Option<String>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask an expert role and the base model, then compare the answers
    Ask {
        /// Your question
        question: String,
        /// Expert role to consult
        #[arg(short, long, default_value = "SoftwareEngineer")]
        role: String,
    },
    /// Check whether the backend is reachable
    Health,
    /// Show the guardrails and roadmap of a role
    Rules {
        role: String,
    },
    /// List built-in and custom roles
    Roles,
    /// Generate and save a custom expert role
    CreateRole {
        /// Role name, e.g. MarineBiologist
        name: String,
        /// Document to ground the role in (PDF, TXT, MD)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Show or update the saved configuration
    Config {
        #[arg(long)]
        base_url: Option<String>,
        #[arg(long)]
        groq_key: Option<String>,
        #[arg(long)]
        openai_key: Option<String>,
        /// Pause between the expert and the base call
        #[arg(long)]
        pacing_ms: Option<u64>,
        #[arg(long)]
        health_interval_secs: Option<u64>,
        #[arg(long)]
        request_timeout_secs: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load().context("failed to load configuration")?;
    if let Some(provider) = &cli.provider {
        let Some(provider) = Provider::from_str(provider) else {
            bail!("unknown provider {provider:?}; expected groq or openai");
        };
        config.provider = Some(provider.as_str().to_string());
    }

    let Some(command) = cli.command else {
        logging::init_tui()?;
        return run_tui(&config).await;
    };
    logging::init_cli(cli.verbose)?;

    match command {
        Commands::Ask { question, role } => ask(&config, &question, &role).await,
        Commands::Health => health(&config).await,
        Commands::Rules { role } => rules(&config, &role).await,
        Commands::Roles => list_roles(&config).await,
        Commands::CreateRole { name, file } => create_role(&config, &name, file).await,
        Commands::Config {
            base_url,
            groq_key,
            openai_key,
            pacing_ms,
            health_interval_secs,
            request_timeout_secs,
        } => {
            let provider_changed = cli.provider.is_some();
            let updates = [
                base_url.is_some(),
                groq_key.is_some(),
                openai_key.is_some(),
                pacing_ms.is_some(),
                health_interval_secs.is_some(),
                request_timeout_secs.is_some(),
                provider_changed,
            ];
            if updates.iter().any(|u| *u) {
                config.base_url = base_url.or(config.base_url);
                config.groq_api_key = groq_key.or(config.groq_api_key);
                config.openai_api_key = openai_key.or(config.openai_api_key);
                config.pacing_ms = pacing_ms.or(config.pacing_ms);
                config.health_interval_secs = health_interval_secs.or(config.health_interval_secs);
                config.request_timeout_secs = request_timeout_secs.or(config.request_timeout_secs);
                config.save().context("failed to save configuration")?;
                println!("{}", "Configuration saved.".green());
            }
            show_config(&config);
            Ok(())
        }
    }
}

async fn run_tui(config: &Config) -> Result<()> {
    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut app = App::new(config)?;
    let mut events = EventHandler::new();

    let result = async {
        while !app.should_quit {
            terminal.draw(|frame| ui::render(&mut app, frame))?;
            match events.next().await {
                Some(event) => handler::handle_event(&mut app, event)?,
                None => break,
            }
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;

    app.shutdown();
    tui::restore()?;
    result
}

fn backend(config: &Config) -> Result<Arc<dyn Backend>> {
    let backend = HttpBackend::from_config(config).context("invalid backend configuration")?;
    Ok(Arc::new(backend))
}

async fn ask(config: &Config, question: &str, role: &str) -> Result<()> {
    let orchestrator = QueryOrchestrator::new(backend(config)?, config.pacing());

    println!(
        "🔍 Asking {} and the base model...\n",
        pretty_role(role).bold().cyan()
    );
    let outcome = orchestrator.submit_query(question, role).await?;
    let state = orchestrator.snapshot();

    print_slot(&pretty_role(role), &state.expert, true);
    print_slot("Base Model", &state.base, false);
    if let ResponseSlot::Success(analysis) = &state.analysis {
        print_analysis(analysis);
    }

    match outcome {
        QueryOutcome::Completed { .. } => Ok(()),
        QueryOutcome::ExpertFailed => bail!("the expert call failed"),
        QueryOutcome::BaseFailed => bail!("the base model call failed"),
        QueryOutcome::Superseded => bail!("the query was superseded"),
    }
}

fn print_slot(title: &str, slot: &ResponseSlot<ExpertAnswer>, expert: bool) {
    println!("{}", title.bold().green());
    println!("{}", "=".repeat(50).dimmed());
    match slot {
        ResponseSlot::Success(answer) => {
            if answer.out_of_scope {
                println!("{}", "Outside this role's scope".yellow());
            }
            println!("{}", answer.answer);
            if let Some(accuracy) = answer.accuracy {
                println!("\n{} {:.0}%", "Accuracy:".bold(), accuracy);
            }
            if expert && !answer.citations.is_empty() {
                println!("\n{}", "Citations:".bold().blue());
                for citation in &answer.citations {
                    println!("• {}", citation.dimmed());
                }
            }
        }
        ResponseSlot::Error(message) => println!("{}", message.red()),
        ResponseSlot::Empty | ResponseSlot::Loading => println!("{}", "(no answer)".dimmed()),
    }
    println!();
}

fn print_analysis(analysis: &AnalysisPayload) {
    println!("{}", "Hallucination Analysis".bold().magenta());
    println!("{}", "=".repeat(50).dimmed());
    if let Some(score) = analysis.hallucination_score {
        let score_text = format!("{score:.0}/100");
        let score_text = if score >= 60.0 {
            score_text.red()
        } else if score >= 30.0 {
            score_text.yellow()
        } else {
            score_text.green()
        };
        println!("{} {}\n", "Score:".bold(), score_text.bold());
    }
    println!("{}", analysis.analysis);
}

async fn health(config: &Config) -> Result<()> {
    let backend = backend(config)?;
    let url = config.base_url();

    match backend.health().await {
        Ok(report) if report.is_ok() => {
            println!("{} {}", "● online".green().bold(), url.dimmed());
            if let Some(provider) = report.llm_provider {
                println!("  LLM provider: {}", provider.cyan());
            }
            if let Some(dir) = report.chroma_db_dir {
                println!("  Vector store: {}", dir.dimmed());
            }
            Ok(())
        }
        Ok(report) => {
            println!("{} {} (status {:?})", "● degraded".yellow().bold(), url.dimmed(), report.status);
            bail!("backend is not healthy")
        }
        Err(err) => {
            println!("{} {}", "● offline".red().bold(), url.dimmed());
            println!("Make sure the backend is running: {}", "uvicorn app.main:app".bold());
            Err(err).context("health check failed")
        }
    }
}

async fn rules(config: &Config, role: &str) -> Result<()> {
    let rules = backend(config)?
        .role_rules(role)
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))
        .with_context(|| format!("could not load rules for {role}"))?;

    println!("\n{}", format!("🛡  {} guardrails", pretty_role(role)).bold().blue());
    println!("{}", "=".repeat(40).dimmed());
    if rules.expert_rules.is_empty() {
        println!("{}", "No guardrails.".dimmed());
    }
    for rule in &rules.expert_rules {
        println!("  • {rule}");
    }

    if !rules.roadmap.is_empty() {
        println!("\n{}", "Roadmap".bold().green());
        for (i, step) in rules.roadmap.iter().enumerate() {
            println!("  {}. {} {}", i + 1, step.step.yellow(), step.description);
        }
    }
    Ok(())
}

async fn list_roles(config: &Config) -> Result<()> {
    println!("\n{}", "📚 Expert Roles".bold().blue());
    println!("{}", "=".repeat(30).dimmed());
    for role in BUILTIN_ROLES {
        println!("  • {} {}", pretty_role(role), role.dimmed());
    }

    let builder = CustomRoleBuilder::new(backend(config)?);
    match builder.refresh_roles().await {
        Ok(custom) if custom.is_empty() => {
            println!("\n{}", "No custom roles yet. Create one with: smeplug create-role <name>".yellow());
        }
        Ok(custom) => {
            println!("\n{}", "Custom".bold().green());
            for role in custom {
                println!(
                    "  • {} ({} guardrails)",
                    role.role_name,
                    role.expert_rules.len().to_string().dimmed()
                );
            }
        }
        Err(err) => println!("\n{}: {}", "Could not load custom roles".red(), err.user_message()),
    }
    Ok(())
}

async fn create_role(config: &Config, name: &str, file: Option<PathBuf>) -> Result<()> {
    let builder = CustomRoleBuilder::new(backend(config)?);

    let mut status = builder.subscribe_status();
    let progress = tokio::spawn(async move {
        while status.changed().await.is_ok() {
            let current = status.borrow_and_update().clone();
            if current.is_busy() {
                println!("⏳ {}", current.label().dimmed());
            }
        }
    });

    let result = builder.create_custom_role_from_path(name, file.as_deref()).await;
    progress.abort();

    let role = result.with_context(|| format!("could not create role {name}"))?;
    println!("\n{} {}", "✓ Created".green().bold(), role.role_name.bold());
    println!("{}", role.core_directive);
    for rule in &role.expert_rules {
        println!("  • {rule}");
    }
    Ok(())
}

fn mask(key: &Option<String>) -> String {
    match key.as_deref() {
        None | Some("") => "(not set)".dimmed().to_string(),
        Some(key) if key.chars().count() <= 4 => "****".to_string(),
        Some(key) => {
            let tail: String = key.chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();
            format!("****{tail}")
        }
    }
}

fn show_config(config: &Config) {
    let credentials = config.credentials();
    println!("\n{}", "⚙  Configuration".bold().blue());
    println!("{}", "=".repeat(30).dimmed());
    println!("  base URL        {}", config.base_url());
    println!(
        "  provider        {}",
        config.provider().map(|p| p.display_name()).unwrap_or("backend default")
    );
    println!("  Groq key        {}", mask(&credentials.groq_key));
    println!("  OpenAI key      {}", mask(&credentials.openai_key));
    println!("  pacing          {} ms", config.pacing().as_millis());
    println!("  health interval {} s", config.health_interval().as_secs());
    println!("  request timeout {} s", config.request_timeout().as_secs());
    if let Ok(dir) = Config::config_dir() {
        println!("  config dir      {}", dir.display().to_string().dimmed());
    }
}
