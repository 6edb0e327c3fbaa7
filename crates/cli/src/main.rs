//! acolib command-line entry point: loads configuration from the
//! environment, wires an OpenAI-compatible LLM client and the universal
//! tools into an `Orchestrator`, runs one task, and prints the result.

use clap::Parser;
use llm::providers::{OpenAiClient, OpenAiConfig};
use llm::LlmClient;
use orchestrator::Orchestrator;
use std::sync::Arc;
use std::time::Duration;
use tooling::{Config, ToolRegistry};
use tracing::info;

/// Run one autonomous Plan/Act task.
#[derive(Parser, Debug)]
#[command(name = "acolib")]
#[command(about = "Decomposes a task into a plan, executes it, and prints the final answer")]
struct Args {
    /// The natural-language task to accomplish.
    #[arg(short, long)]
    task: String,

    /// Desired shape of the final answer (e.g. "markdown table", "json").
    #[arg(short, long)]
    output_format: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = Config::from_env();

    let log_format = tooling::logging::LogFormat::parse(&config.log_format);
    tooling::logging::init_subscriber(log_format, &config.log_level);

    if config.llm_api_key.is_empty() {
        anyhow::bail!("LLM_API_KEY is not set");
    }

    let mut openai_config = OpenAiConfig::new(&config.llm_api_key, &config.llm_base_url, &config.llm_model);
    openai_config.timeout = Duration::from_secs(config.llm_timeout_secs);
    openai_config.connect_timeout = Duration::from_secs(config.llm_connect_timeout_secs);

    let model = OpenAiClient::new(openai_config);
    let llm = Arc::new(LlmClient::new(Box::new(model), config.llm_client_config()));

    let domain_tools = ToolRegistry::new();
    let orchestrator = Orchestrator::new(llm, domain_tools, config);

    orchestrator.subscribe(
        orchestrator::TOPIC_PLAN_PROCESS,
        Arc::new(|event| {
            info!(topic = %event.topic, payload = %event.payload, "plan progress");
        }),
    );

    info!(task = %args.task, "starting run");
    let answer = orchestrator.execute(&args.task, args.output_format.as_deref()).await;
    println!("{answer}");

    Ok(())
}
