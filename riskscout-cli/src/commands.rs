//! CLI subcommand handlers.

use crate::render;
use crate::{Commands, ConfigAction, OutputFormat};
use anyhow::Context;
use riskscout_core::research::ResearchPhase;
use riskscout_core::{
    ResearchCallback, ResearchOrchestrator, ResearchRequest, RiskRef, ScoutConfig, Topic,
    create_provider,
};
use riskscout_search::{PROVIDERS, build_provider_set};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Options collected from `riskscout research`.
#[derive(Debug, Clone)]
struct ResearchArgs {
    subject: String,
    keywords: Vec<String>,
    max_results: usize,
    region: Option<String>,
    risks: Vec<String>,
    provider: Option<String>,
    model: Option<String>,
    academic: bool,
    format: OutputFormat,
}

/// Handle a CLI subcommand.
pub async fn handle_command(command: Commands, workspace: &Path) -> anyhow::Result<()> {
    match command {
        Commands::Research {
            subject,
            keywords,
            max_results,
            region,
            risks,
            provider,
            model,
            academic,
            format,
        } => {
            let args = ResearchArgs {
                subject,
                keywords,
                max_results,
                region,
                risks,
                provider,
                model,
                academic,
                format,
            };
            handle_research(args, workspace).await
        }
        Commands::Providers => handle_providers(workspace),
        Commands::Config { action } => handle_config(action, workspace),
    }
}

/// Logs pipeline progress to stderr while a run is in flight.
struct ProgressLogger;

impl ResearchCallback for ProgressLogger {
    fn on_phase_change(&self, phase: ResearchPhase, progress: f32) {
        info!(phase = phase.as_str(), progress = %format!("{:.0}%", progress * 100.0), "Research progress");
    }

    fn on_branch_complete(&self, topic: Topic, sources_found: usize, search_failed: bool) {
        if search_failed {
            warn!(%topic, "Search branch failed");
        } else {
            info!(%topic, sources_found, "Search branch complete");
        }
    }

    fn on_key_points_merged(&self, before: usize, after: usize) {
        info!(before, after, "Key points merged");
    }
}

fn load(workspace: &Path) -> anyhow::Result<ScoutConfig> {
    Ok(riskscout_core::load_config(Some(workspace), None)?)
}

/// Apply command-line overrides on top of the loaded configuration.
fn apply_overrides(config: &mut ScoutConfig, args: &ResearchArgs) {
    if let Some(ref provider) = args.provider {
        config.search.provider = provider.clone();
    }
    if let Some(ref model) = args.model {
        config.llm.model = model.clone();
    }
    if args.academic {
        config.search.enable_academic = true;
    }
}

/// Parse `ID` or `ID:title` into a risk reference.
pub fn parse_risk(raw: &str) -> RiskRef {
    match raw.split_once(':') {
        Some((id, title)) => RiskRef::new(id.trim(), title.trim()),
        None => RiskRef::new(raw.trim(), ""),
    }
}

fn build_request(args: &ResearchArgs) -> ResearchRequest {
    let mut request = ResearchRequest::new(&args.subject)
        .with_keywords(args.keywords.clone())
        .with_max_results(args.max_results)
        .with_risks(args.risks.iter().map(|r| parse_risk(r)).collect());
    if let Some(ref region) = args.region {
        request = request.with_region(region);
    }
    request
}

async fn handle_research(args: ResearchArgs, workspace: &Path) -> anyhow::Result<()> {
    let mut config = load(workspace)?;
    apply_overrides(&mut config, &args);
    config.check()?;

    let request = build_request(&args);
    request.validate().context("Invalid research request")?;

    let llm = create_provider(&config.llm).context("Failed to set up LLM")?;
    let providers = build_provider_set(&config).context("Failed to set up search providers")?;
    let orchestrator = ResearchOrchestrator::with_llm(config, llm, providers)
        .context("Failed to set up research pipeline")?
        .with_callback(Arc::new(ProgressLogger));

    let report = orchestrator
        .research(&request)
        .await
        .context("Research run failed")?;

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Markdown => print!("{}", render::report_markdown(&report)),
    }
    Ok(())
}

fn handle_providers(workspace: &Path) -> anyhow::Result<()> {
    let config = load(workspace)?;
    println!("Search providers:");
    for provider in PROVIDERS {
        let mut marks = Vec::new();
        if provider.name == config.search.provider {
            marks.push("primary");
        }
        if config.search.enable_academic && provider.name == config.search.academic_provider {
            marks.push("academic");
        }
        if config.search.supplementary.enabled
            && provider.name == config.search.supplementary.provider
        {
            marks.push("supplementary");
        }
        let key = if provider.requires_key { " [key required]" } else { "" };
        let role = if marks.is_empty() {
            String::new()
        } else {
            format!(" ({})", marks.join(", "))
        };
        println!("  {:<18} {}{}{}", provider.name, provider.description, key, role);
    }
    Ok(())
}

fn handle_config(action: ConfigAction, workspace: &Path) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let config_path = init_config(workspace)?;
            println!("Configuration file at: {}", config_path.display());
            Ok(())
        }
        ConfigAction::Show => {
            let config = load(workspace)?;
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

/// Write the default configuration unless one already exists.
fn init_config(workspace: &Path) -> anyhow::Result<std::path::PathBuf> {
    let config_dir = workspace.join(".riskscout");
    std::fs::create_dir_all(&config_dir)?;

    let config_path = config_dir.join("config.toml");
    if config_path.exists() {
        info!(path = %config_path.display(), "Configuration file already exists");
        return Ok(config_path);
    }

    let toml_str = toml::to_string_pretty(&ScoutConfig::default())?;
    std::fs::write(&config_path, &toml_str)?;
    info!(path = %config_path.display(), "Created default configuration");
    Ok(config_path)
}
