//! `huddle chat`.

use anyhow::{Context, Result, bail};
use huddle_client::{ChatExit, fetch_history, render_history_line, run_chat};
use huddle_core::Username;
use huddle_core::logging::{LogFormat, init_subscriber};
use reqwest::Url;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::ChatArgs;

pub(crate) async fn run(args: ChatArgs) -> Result<()> {
    // the terminal is the UI; keep logs to warnings
    init_subscriber("warn", LogFormat::Compact);

    let server = Url::parse(&args.server)
        .with_context(|| format!("Invalid server url: {}", args.server))?;
    let mut stdin = BufReader::new(tokio::io::stdin());

    let username = match args.username {
        Some(name) => name,
        None => prompt_username(&mut stdin).await?,
    };
    let Ok(username) = Username::parse(username) else {
        bail!("a username is required");
    };

    match fetch_history(&server).await {
        Ok(entries) if entries.is_empty() => println!("No messages yet."),
        Ok(entries) => {
            println!("--- history ---");
            for entry in &entries {
                println!("{}", render_history_line(entry));
            }
            println!("---------------");
        }
        Err(e) => println!("Could not load message history: {e}"),
    }

    println!("Joining as {username}. Type 'exit' to leave.");
    let exit = run_chat(&server, &username, stdin, tokio::io::stdout())
        .await
        .context("Chat connection failed")?;
    match exit {
        ChatExit::UserExit => println!("Leaving the chat."),
        ChatExit::InputClosed => {}
        ChatExit::ServerClosed => println!("Disconnected."),
    }
    Ok(())
}

/// Ask for a username on the terminal. Surrounding whitespace is dropped.
async fn prompt_username<R: AsyncBufRead + Unpin>(input: &mut R) -> Result<String> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(b"Username: ").await?;
    stdout.flush().await?;

    let mut line = String::new();
    let _ = input.read_line(&mut line).await?;
    Ok(line.trim().to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn prompted_username_is_trimmed() {
        let mut input: &[u8] = b"  alice \nrest\n";
        assert_eq!(prompt_username(&mut input).await.unwrap(), "alice");
    }

    #[tokio::test]
    async fn prompt_at_eof_is_empty() {
        let mut input: &[u8] = b"";
        let name = prompt_username(&mut input).await.unwrap();
        assert!(Username::parse(name).is_err());
    }
}
