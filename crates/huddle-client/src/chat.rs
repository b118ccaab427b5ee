//! Interactive chat session.
//!
//! Two loops share one WebSocket: the input loop turns lines into text
//! frames, the receive loop prints text frames. Whichever stops first
//! cancels the other.

use std::time::Duration;

use futures::{Sink, SinkExt, Stream, StreamExt};
use reqwest::Url;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::errors::{ClientError, Result};

const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// What a line of input asks for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InputCommand {
    /// Send the line as a chat message.
    Send(String),
    /// Nothing to send.
    Skip,
    /// Leave the chat.
    Exit,
}

/// Why the chat ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChatExit {
    /// The user typed `exit`.
    UserExit,
    /// Input reached end of file.
    InputClosed,
    /// The server closed the connection or it dropped.
    ServerClosed,
}

/// Classify one input line. `exit` matches case-insensitively.
pub fn parse_input(line: &str) -> InputCommand {
    let line = line.strip_suffix('\n').unwrap_or(line);
    let line = line.strip_suffix('\r').unwrap_or(line);
    if line.eq_ignore_ascii_case("exit") {
        InputCommand::Exit
    } else if line.is_empty() {
        InputCommand::Skip
    } else {
        InputCommand::Send(line.to_owned())
    }
}

/// WebSocket URL for `username` on `server` (`http` → `ws`, `https` → `wss`).
pub fn ws_url(server: &Url, username: &str) -> Result<Url> {
    let scheme = match server.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => return Err(ClientError::InvalidUrl(format!("unsupported scheme {other}"))),
    };
    let mut url = server.clone();
    url.set_scheme(scheme)
        .map_err(|()| ClientError::InvalidUrl(server.to_string()))?;
    let _ = url
        .path_segments_mut()
        .map_err(|()| ClientError::InvalidUrl(server.to_string()))?
        .pop_if_empty()
        .push("ws")
        .push(username);
    Ok(url)
}

/// Connect as `username` and relay between the terminal and the hub.
pub async fn run_chat<R, W>(server: &Url, username: &str, input: R, output: W) -> Result<ChatExit>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let url = ws_url(server, username)?;
    let (ws, _response) = connect_async(url.as_str()).await?;
    info!(%url, "connected");

    let (mut sink, stream) = ws.split();
    let token = CancellationToken::new();
    let receiver = tokio::spawn(receive_loop(stream, output, token.clone()));

    let exit = input_loop(input, &mut sink, &token).await;
    token.cancel();
    let _ = tokio::time::timeout(CLOSE_TIMEOUT, sink.close()).await;

    match receiver.await {
        Ok(Err(e)) => debug!(error = %e, "receive loop failed"),
        Err(e) => debug!(error = %e, "receive task panicked"),
        Ok(Ok(())) => {}
    }
    exit
}

async fn input_loop<R, S>(input: R, sink: &mut S, token: &CancellationToken) -> Result<ChatExit>
where
    R: AsyncBufRead + Unpin,
    S: Sink<Message, Error = tungstenite::Error> + Unpin,
{
    let mut lines = input.lines();
    loop {
        let line = tokio::select! {
            () = token.cancelled() => return Ok(ChatExit::ServerClosed),
            line = lines.next_line() => line?,
        };
        let Some(line) = line else {
            return Ok(ChatExit::InputClosed);
        };
        match parse_input(&line) {
            InputCommand::Exit => return Ok(ChatExit::UserExit),
            InputCommand::Skip => {}
            InputCommand::Send(text) => {
                if let Err(e) = sink.send(Message::text(text)).await {
                    debug!(error = %e, "send failed");
                    return Ok(ChatExit::ServerClosed);
                }
            }
        }
    }
}

async fn receive_loop<S, W>(mut stream: S, mut output: W, token: CancellationToken) -> Result<()>
where
    S: Stream<Item = std::result::Result<Message, tungstenite::Error>> + Unpin,
    W: AsyncWrite + Unpin,
{
    let result = loop {
        let next = tokio::select! {
            () = token.cancelled() => break Ok(()),
            next = stream.next() => next,
        };
        match next {
            Some(Ok(Message::Text(text))) => {
                if let Err(e) = write_line(&mut output, text.as_str()).await {
                    break Err(e);
                }
            }
            Some(Ok(Message::Close(frame))) => {
                let notice = match frame {
                    Some(frame) if !frame.reason.is_empty() => {
                        format!("server closed the connection: {}", frame.reason.as_str())
                    }
                    _ => "server closed the connection".to_owned(),
                };
                break write_line(&mut output, &notice).await;
            }
            // binary frames carry audio this client does not play
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                debug!(error = %e, "connection dropped");
                break write_line(&mut output, "connection lost").await;
            }
            None => break Ok(()),
        }
    };
    token.cancel();
    result
}

async fn write_line<W: AsyncWrite + Unpin>(output: &mut W, line: &str) -> Result<()> {
    output.write_all(line.as_bytes()).await?;
    output.write_all(b"\n").await?;
    output.flush().await?;
    Ok(())
}
