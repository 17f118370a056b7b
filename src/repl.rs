//! Terminal chat front end.
//!
//! Reads one message per line, submits it, and prints the agent's reply as a
//! chat bubble. `/quit`, `/exit` or end of input leaves the loop.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::session::{ChatSession, SubmitOutcome, Turn};

const PROMPT: &str = "> ";
const TITLE: &str = "PartSelect Chat Agent";

/// Format a turn the way the chat shows it, e.g. `Agent: hi there`.
#[must_use]
pub fn render_turn(turn: &Turn) -> String {
    format!("{}: {}", turn.role().label(), turn.content())
}

/// Run the chat loop until the input ends or the user quits.
pub async fn run<R, W>(session: &ChatSession, input: R, mut output: W) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();

    output.write_all(format!("{TITLE}\n\n").as_bytes()).await?;

    loop {
        output.write_all(PROMPT.as_bytes()).await?;
        output.flush().await?;

        let Some(line) = lines.next_line().await? else {
            output.write_all(b"\n").await?;
            break;
        };

        if matches!(line.trim(), "/quit" | "/exit") {
            break;
        }

        session.set_pending_input(line);
        match session.submit_pending().await {
            SubmitOutcome::Ignored => {}
            SubmitOutcome::Busy => {
                output.write_all(b"...\n").await?;
            }
            SubmitOutcome::Replied(reply) => {
                output
                    .write_all(format!("{}\n\n", render_turn(&reply)).as_bytes())
                    .await?;
            }
        }
    }

    output.flush().await?;
    tracing::debug!(
        name: "chat.ended",
        session_id = %session.id(),
        turns = session.transcript().len(),
        "Chat ended"
    );
    Ok(())
}
