use super::{Completion, LotteryWorkflow, WorkflowContext};
use crate::commit::WriteStep;
use crate::error::LotteryError;
use crate::ledger::{Receipt, WriteMethod};
use crate::request::WorkflowKind;
use crate::surface::{Embed, Presentation, Tone};
use async_trait::async_trait;
use tracing::info;

/// Calls `drawWinner()` and announces `winner()` to the channel.
#[derive(Debug, Clone, Copy, Default)]
pub struct DrawWorkflow;

#[async_trait]
impl LotteryWorkflow for DrawWorkflow {
    fn kind(&self) -> WorkflowKind {
        WorkflowKind::DrawWinner
    }

    fn capture_activity(&self) -> &'static str {
        "initiating lottery draw"
    }

    fn commit_activity(&self) -> &'static str {
        "drawing lottery"
    }

    async fn prompt(&self, ctx: &WorkflowContext<'_>) -> Result<Presentation, LotteryError> {
        let snapshot = ctx
            .reader
            .draw_snapshot(ctx.lottery, ctx.credential.address())
            .await?;
        ctx.validator
            .check_draw_state(snapshot.is_active, snapshot.participant_count)?;

        let description = format!(
            "Are you sure you want to draw the lottery winner?\n\n\
             **Your Tickets:** {}\n\
             **Total Tickets:** {}\n\
             **Unique Participants:** {}\n\
             **Prize Pool:** {} {}",
            snapshot.actor_tickets,
            snapshot.total_tickets,
            snapshot.participant_count,
            snapshot.prize_pool.format_units(ctx.config.token_decimals),
            ctx.config.token_symbol
        );
        Ok(Presentation::embed(
            Embed::new(Tone::Warning, "⚠️ Confirm Lottery Draw", description).stamped(),
        ))
    }

    fn processing(&self) -> Presentation {
        Presentation::embed(
            Embed::new(
                Tone::Pending,
                "⏳ Drawing Lottery...",
                "Please wait while the lottery winner is being drawn.",
            )
            .stamped(),
        )
    }

    fn cancelled(&self) -> Presentation {
        Presentation::text("❌ Lottery draw cancelled.")
    }

    async fn preflight(&self, ctx: &WorkflowContext<'_>) -> Result<(), LotteryError> {
        ctx.validator.check_draw(ctx.lottery).await
    }

    fn plan(&self, ctx: &WorkflowContext<'_>) -> Result<Vec<WriteStep>, LotteryError> {
        Ok(vec![WriteStep::new(
            "draw_winner",
            ctx.lottery.clone(),
            WriteMethod::DrawWinner,
        )])
    }

    async fn complete(
        &self,
        ctx: &WorkflowContext<'_>,
        _receipts: &[Receipt],
    ) -> Result<Completion, LotteryError> {
        let winner = ctx.reader.winner(ctx.lottery).await?;
        info!(actor = %ctx.actor, winner = %winner, "lottery winner drawn");

        let announcement = Embed::new(
            Tone::Celebration,
            "🎉 Lottery Winner",
            format!("The winner is: `{winner}`"),
        );
        Ok(Completion {
            presentation: Presentation::text("✅ Lottery drawn successfully!"),
            broadcast: Some(Presentation::embed(announcement).public()),
        })
    }
}
