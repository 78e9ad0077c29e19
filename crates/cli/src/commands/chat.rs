//! `tellerbot chat`: Single-message or interactive chat from the terminal.

use tellerbot_agent::{ChatReply, ChatRequest, ChatService};
use tellerbot_config::AppConfig;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

pub async fn run(
    message: Option<String>,
    conversation: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if !config.has_api_key() {
        eprintln!();
        eprintln!("  WARNING: No API key configured.");
        eprintln!("  Set TELLERBOT_API_KEY or OPENAI_API_KEY, or add api_key to");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
    }

    let service = ChatService::from_config(&config).await?;
    let max_chars = config.gateway.max_message_chars;

    if let Some(msg) = message {
        let request = ChatRequest::parse(&msg, conversation.as_deref(), max_chars)?;
        eprint!("  Thinking...");
        let reply = service.chat(request).await;
        eprint!("\r              \r");
        let reply = reply?;
        println!("{}", reply.response);
        eprintln!("{}", footer(&reply));
        return Ok(());
    }

    println!();
    println!("  Tellerbot: interactive mode");
    println!("  Model:        {}", config.default_model);
    println!("  Type your message and press Enter. Type 'exit' to quit.");
    println!();

    let mut conversation = conversation;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"  You > ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "exit" | "quit") {
            break;
        }

        let request = match ChatRequest::parse(line, conversation.as_deref(), max_chars) {
            Ok(r) => r,
            Err(e) => {
                eprintln!("  [Invalid] {e}");
                continue;
            }
        };

        match service.chat(request).await {
            Ok(reply) => {
                println!();
                for text in reply.response.lines() {
                    println!("  Advisor > {text}");
                }
                println!("  {}", footer(&reply));
                println!();
                conversation = Some(reply.conversation_id.to_string());
            }
            Err(e) => eprintln!("  [Error] {e}"),
        }
    }

    println!();
    println!("  Goodbye!");
    Ok(())
}

/// One-line summary printed after a reply.
fn footer(reply: &ChatReply) -> String {
    let mut flags = Vec::new();
    if reply.cached {
        flags.push("cached");
    }
    if reply.degraded {
        flags.push("degraded");
    }
    let flags = if flags.is_empty() {
        String::new()
    } else {
        format!(" [{}]", flags.join(", "))
    };
    format!(
        "(conversation {}, {} tokens){flags}",
        reply.conversation_id, reply.usage.total_tokens
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tellerbot_core::{ConversationId, Usage};

    fn reply(cached: bool, degraded: bool) -> ChatReply {
        ChatReply {
            response: "ok".into(),
            conversation_id: ConversationId::parse("c1").unwrap(),
            cached,
            degraded,
            usage: Usage::new(10, 5),
        }
    }

    #[test]
    fn footer_lists_flags() {
        assert_eq!(footer(&reply(false, false)), "(conversation c1, 15 tokens)");
        assert_eq!(
            footer(&reply(true, true)),
            "(conversation c1, 15 tokens) [cached, degraded]"
        );
    }
}
