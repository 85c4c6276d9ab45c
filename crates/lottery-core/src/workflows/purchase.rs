use super::{Completion, LotteryWorkflow, WorkflowContext};
use crate::commit::WriteStep;
use crate::error::LotteryError;
use crate::ledger::{Receipt, WriteMethod};
use crate::render::plural;
use crate::request::WorkflowKind;
use crate::surface::{Embed, Presentation, Tone};
use crate::types::TicketAmount;
use async_trait::async_trait;

/// Buys `ticket_amount` tickets at one token each: `approve` then `buyTicket`.
#[derive(Debug, Clone, Copy)]
pub struct PurchaseWorkflow {
    ticket_amount: TicketAmount,
}

impl PurchaseWorkflow {
    pub fn new(ticket_amount: TicketAmount) -> Self {
        Self { ticket_amount }
    }

    fn count(&self) -> u64 {
        self.ticket_amount.get()
    }
}

#[async_trait]
impl LotteryWorkflow for PurchaseWorkflow {
    fn kind(&self) -> WorkflowKind {
        WorkflowKind::PurchaseTickets {
            ticket_amount: self.ticket_amount,
        }
    }

    fn capture_activity(&self) -> &'static str {
        "initiating ticket purchase"
    }

    fn commit_activity(&self) -> &'static str {
        "buying tickets"
    }

    async fn prompt(&self, ctx: &WorkflowContext<'_>) -> Result<Presentation, LotteryError> {
        let count = self.count();
        let cost = ctx.validator.ticket_cost(self.ticket_amount)?;
        let embed = Embed::new(
            Tone::Warning,
            "⚠️ Confirm Ticket Purchase",
            format!(
                "Are you sure you want to buy {count} lottery ticket{} for {} {}?",
                plural(count),
                cost.format_units(ctx.config.token_decimals),
                ctx.config.token_symbol
            ),
        )
        .with_footer(format!("Ticket Amount: {count}"))
        .stamped();
        Ok(Presentation::embed(embed))
    }

    fn processing(&self) -> Presentation {
        let count = self.count();
        let verb = if count == 1 { " is" } else { "s are" };
        Presentation::embed(
            Embed::new(
                Tone::Pending,
                "⏳ Processing Purchase...",
                format!("Please wait while your {count} ticket{verb} being purchased."),
            )
            .stamped(),
        )
    }

    fn cancelled(&self) -> Presentation {
        Presentation::text("❌ Ticket purchase cancelled.")
    }

    async fn preflight(&self, ctx: &WorkflowContext<'_>) -> Result<(), LotteryError> {
        ctx.validator
            .check_funds(ctx.credential.address(), self.ticket_amount)
            .await
    }

    fn plan(&self, ctx: &WorkflowContext<'_>) -> Result<Vec<WriteStep>, LotteryError> {
        let cost = ctx.validator.ticket_cost(self.ticket_amount)?;
        Ok(vec![
            WriteStep::new(
                "approve",
                ctx.config.token_address.clone(),
                WriteMethod::Approve {
                    spender: ctx.lottery.clone(),
                    amount: cost,
                },
            ),
            WriteStep::new(
                "buy_ticket",
                ctx.lottery.clone(),
                WriteMethod::BuyTicket {
                    ticket_amount: self.ticket_amount,
                },
            ),
        ])
    }

    async fn complete(
        &self,
        _ctx: &WorkflowContext<'_>,
        _receipts: &[Receipt],
    ) -> Result<Completion, LotteryError> {
        let count = self.count();
        let embed = Embed::new(
            Tone::Success,
            "✅ Tickets Purchased",
            format!(
                "You have successfully bought {count} lottery ticket{}.",
                plural(count)
            ),
        )
        .stamped();
        Ok(Completion {
            presentation: Presentation::embed(embed),
            broadcast: None,
        })
    }
}
