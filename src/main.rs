use anyhow::{Context, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use desk_agent::{
    agent::{AgentLoop, LoopOptions, TerminationReason},
    cli::Console,
    config::AgentConfig,
    conversation::ConversationState,
    llm::AnthropicProvider,
    logging,
    session::SessionRecorder,
    tools::{default_tools_with_browser, BrowserTool, ToolRegistry},
};

#[tokio::main]
async fn main() -> Result<()> {
    let config = AgentConfig::from_env().context("Invalid configuration")?;
    logging::init_logging(&config.log_dir)?;
    tracing::info!("Starting desk-agent with model {}", config.model);

    let console = Console::new();
    let api_key = config.require_api_key()?.to_string();

    let provider = Arc::new(AnthropicProvider::new(api_key)?.with_base_url(config.base_url.clone()));
    let browser = Arc::new(BrowserTool::new(config.webdriver_url.clone())?);
    let registry = ToolRegistry::new(default_tools_with_browser(&config, Arc::clone(&browser)))?;

    let recorder = match &config.session_dir {
        Some(root) => Some(SessionRecorder::create(root).context("Failed to create session directory")?),
        None => None,
    };

    // First Ctrl-C cancels the running turn and ends the session; a second one exits at once
    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling");
            interrupt.cancel();
        }
        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(130);
        }
    });

    let event_console = console.clone();
    let mut agent = AgentLoop::new(provider, registry, LoopOptions::from_config(&config))
        .with_cancellation(cancel.clone())
        .with_event_handler(move |event| event_console.print_event(event));
    if let Some(recorder) = &recorder {
        agent = agent.with_recorder(recorder.clone());
        console.print_system(&format!("Session directory: {}", recorder.dir().display()));
    }

    console.print_banner(&config.model, &agent.registry().names());

    let mut state = ConversationState::new();
    loop {
        let input = match console.read_input() {
            Ok(Some(input)) => input,
            Ok(None) => break,
            Err(e) => {
                tracing::error!("Failed to read user input: {}", e);
                console.print_error(&format!("Failed to read input: {}", e));
                continue;
            }
        };

        if cancel.is_cancelled() {
            break;
        }

        match input.to_lowercase().as_str() {
            "exit" | "quit" => {
                tracing::info!("User requested exit");
                console.print_system("Goodbye!");
                break;
            }
            "/save" => {
                match &recorder {
                    Some(recorder) => match recorder.save_history(&state) {
                        Ok(()) => console.print_system(&format!(
                            "Saved {} messages to {}",
                            state.len(),
                            recorder.history_path().display()
                        )),
                        Err(e) => console.print_error(&format!("Failed to save history: {}", e)),
                    },
                    None => console.print_system("No session directory configured (set AGENT_SESSION_DIR)"),
                }
                continue;
            }
            "" => continue,
            _ => {}
        }

        console.println();
        let outcome = agent.run(&input, state, config.max_turns).await;
        console.print_outcome(&outcome);
        let cancelled = matches!(outcome.reason, TerminationReason::Cancelled);
        state = outcome.state;

        console.println();
        console.print_separator();

        if cancelled {
            break;
        }
    }

    if let Err(e) = browser.close().await {
        tracing::warn!("Failed to close browser session: {:#}", e);
    }
    tracing::info!("Session ended with {} messages", state.len());
    Ok(())
}
