//! Terminal client for a streaming assistant backend
//!
//! Reads one message per line from stdin and prints the assistant reply once
//! it has finished streaming. Lines starting with `/` are commands:
//! `/reset`, `/history <thread_id>` and `/quit`.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use assistant_stream::{ChatError, ChatSession, Config, Role};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "assistant_stream=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::load()?;
    tracing::info!("💬 Chatting with {}", config.base_url);

    let session = Arc::new(ChatSession::from_config(&config)?);

    let mut widgets = session.subscribe_widgets();
    tokio::spawn(async move {
        while let Some(widget) = widgets.recv().await {
            println!(
                "[widget:{}] {}",
                widget.template,
                serde_json::to_string(&widget.payload).unwrap_or_default()
            );
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match line.split_once(' ').unwrap_or((line, "")) {
            ("/quit", _) => break,
            ("/reset", _) => {
                session.reset_chat();
                println!("(conversation cleared)");
            }
            ("/history", thread_id) if !thread_id.trim().is_empty() => {
                match session.load_conversation_history(thread_id.trim()).await {
                    Ok(count) => {
                        for message in session.chat_messages() {
                            println!("{}: {}", speaker(message.role), message.content);
                        }
                        println!("({} messages loaded)", count);
                    }
                    Err(e) => eprintln!("{}", e),
                }
            }
            _ => match session.send_message(line).await {
                Ok(()) | Err(ChatError::Cancelled) => {
                    if let Some(reply) = session.messages().last().filter(|m| m.role == Role::Assistant) {
                        println!("{}: {}", speaker(reply.role), reply.content);
                    }
                    if let Some(error) = session.error() {
                        eprintln!("error: {}", error);
                    }
                }
                Err(e) => eprintln!("error: {}", e),
            },
        }
    }

    Ok(())
}

fn speaker(role: Role) -> &'static str {
    match role {
        Role::User => "you",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}
