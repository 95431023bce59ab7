// Line-oriented terminal front end for both modes.

use anyhow::{Context, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::info;

use crate::chat::ChatHandle;
use crate::conversation::Turn;
use crate::cover::CoverResolver;
use crate::dialogue::{DialogueHandle, DialogueState};
use crate::recommendations::render_cards;

pub const RESTART_COMMAND: &str = "/restart";

async fn print_turns<W: AsyncWrite + Unpin>(out: &mut W, turns: &[Turn]) -> Result<()> {
    for turn in turns {
        out.write_all(format!("{}: {}\n", turn.sender(), turn.text()).as_bytes())
            .await?;
    }
    out.flush().await.context("Failed to flush output")
}

/// Runs the recommendation dialogue until it completes or input ends.
pub async fn run_recommender<R, W>(
    dialogue: &DialogueHandle,
    covers: &CoverResolver,
    input: R,
    mut out: W,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    dialogue.start().await;
    let mut shown = 0;
    let mut lines = input.lines();

    loop {
        let snapshot = dialogue.snapshot().await;
        print_turns(&mut out, &snapshot.conversation.turns()[shown..]).await?;
        shown = snapshot.conversation.len();

        if snapshot.state == DialogueState::Complete {
            let cards = render_cards(&snapshot.recommendations, covers).await;
            for card in &cards {
                out.write_all(
                    format!(
                        "\n{} by {} [{}]\n{}\ncover: {}\n",
                        card.title, card.author, card.genre, card.synopsis, card.cover.url
                    )
                    .as_bytes(),
                )
                .await?;
            }
            out.write_all(b"\nEnjoy your new books!\n").await?;
            out.flush().await?;
            return Ok(());
        }

        let Some(line) = lines.next_line().await.context("Failed to read input")? else {
            info!("Input closed, leaving recommender");
            return Ok(());
        };

        if line.trim() == RESTART_COMMAND {
            dialogue.reset().await;
            shown = 0;
            continue;
        }
        dialogue.submit(&line).await;
    }
}

/// Runs free-form chat until input ends.
pub async fn run_chat<R, W>(chat: &ChatHandle, input: R, mut out: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    chat.start().await;
    let mut shown = 0;
    let mut lines = input.lines();

    loop {
        let snapshot = chat.snapshot().await;
        print_turns(&mut out, &snapshot.conversation.turns()[shown..]).await?;
        shown = snapshot.conversation.len();

        let Some(line) = lines.next_line().await.context("Failed to read input")? else {
            info!("Input closed, leaving chat");
            return Ok(());
        };

        if line.trim() == RESTART_COMMAND {
            chat.reset().await;
            shown = 0;
            continue;
        }
        chat.submit(&line).await;
    }
}
