// Console front end for the chat relay.
//
// Reads one event per stdin line and prints replies to stdout. Set
// CONSOLE_CHAT_ID to change the chat used for lines without an `@<chat>`
// prefix; RUST_LOG controls log output (stderr).

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinSet;

use claude_chat_relay::console::{self, ConsoleSink, DEFAULT_CONSOLE_CHAT};
use claude_chat_relay::{ChatId, Invoker, Relay, RelayConfig};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = RelayConfig::from_env().context("invalid relay configuration")?;
    log::info!(
        "Starting claude-chat-relay {} ({:?} agent, {:?} approvals)",
        claude_chat_relay::VERSION,
        config.agent_mode,
        config.approval_mode
    );

    let default_chat = match std::env::var("CONSOLE_CHAT_ID") {
        Ok(value) => ChatId::new(
            value
                .trim()
                .parse()
                .with_context(|| format!("CONSOLE_CHAT_ID is not a chat id: {value}"))?,
        ),
        Err(_) => DEFAULT_CONSOLE_CHAT,
    };

    let invoker = Invoker::from_config(&config).context("failed to set up the agent")?;
    let relay = Arc::new(Relay::new(config, invoker, ConsoleSink::stdout()));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut tasks = JoinSet::new();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    log::info!("Input closed, waiting for running messages");
                    break;
                };
                let Some(event) = console::parse_line(&line, default_chat) else {
                    continue;
                };
                // Admitting here, in read order, fixes each chat's turn order
                let admitted = relay.admit(event);
                let relay = Arc::clone(&relay);
                tasks.spawn(async move { relay.dispatch(admitted).await });
            }
            Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                if let Err(e) = joined {
                    log::error!("Event task failed: {e}");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                log::info!("Interrupted, shutting down");
                tasks.abort_all();
                break;
            }
        }
    }

    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined
            && !e.is_cancelled()
        {
            log::error!("Event task failed: {e}");
        }
    }

    log::info!("Relay stopped");
    Ok(())
}
