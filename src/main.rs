use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use droidpilot_lib::agent_engine::engine::AgentEngine;
use droidpilot_lib::config;
use droidpilot_lib::errors::PilotResult;
use droidpilot_lib::executor::adb::AdbBridge;
use droidpilot_lib::llm::providers::openai_compatible::OpenAiCompatibleProvider;
use droidpilot_lib::perception::artifacts::ArtifactDirs;

#[derive(Parser)]
#[command(name = "droidpilot", version, about = "Drive an Android app from a natural-language task")]
struct Cli {
    /// Path to config.toml (otherwise looked up next to the binary, in the
    /// working directory, then in the user config dir).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the full task report as JSON instead of the summary line.
    #[arg(long)]
    json: bool,

    /// Task to perform, e.g. "open blinkit and search for watermelons".
    #[arg(required = true, num_args = 1..)]
    instruction: Vec<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Load .env file if present (ignore error if not found)
    let _ = dotenvy::dotenv();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("droidpilot: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> PilotResult<()> {
    let cfg = droidpilot_lib::with_startup_tracing(|| config::load_config(cli.config.as_deref()))?;
    droidpilot_lib::init_tracing(cfg.agent.debug_logging);
    cfg.log_summary();

    ArtifactDirs::new(&cfg.agent.screenshot_dir, &cfg.agent.ui_dump_dir).ensure()?;

    let bridge = AdbBridge::connect(&cfg.device).await?;
    let vision = OpenAiCompatibleProvider::from_config("huggingface", &cfg.vision)?;
    let engine = AgentEngine::new(cfg, Arc::new(bridge), Arc::new(vision));

    let instruction = cli.instruction.join(" ");
    let report = engine.run_task(&instruction).await;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.summary());
    }
    Ok(())
}
