//! Console front-end — stdin/stdout chat on a single fixed thread.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::info;

use crate::agent::TurnExecutor;
use crate::error::ConsoleError;

/// Prompt printed before each line of operator input.
pub const PROMPT: &str = "Enter a message: ";

/// Thread id used for all console turns.
pub const CONSOLE_THREAD_ID: &str = "user_thread";

/// Read a line, take a turn on `thread_id`, print the reply, repeat.
///
/// Lines are passed through untouched (empty lines included). Returns `Ok`
/// when input reaches EOF; a failed turn ends the loop with its error.
pub async fn run_console<R, W>(
    turns: &TurnExecutor,
    thread_id: &str,
    input: R,
    mut output: W,
) -> Result<(), ConsoleError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();

    loop {
        output.write_all(PROMPT.as_bytes()).await?;
        output.flush().await?;

        let Some(line) = lines.next_line().await? else {
            info!("Console input closed");
            return Ok(());
        };

        let reply = turns.take_turn(thread_id, &line).await?;
        output.write_all(format!("{reply}\n\n").as_bytes()).await?;
        output.flush().await?;
    }
}
