use crate::error::LotteryError;
use crate::request::WorkflowKind;
use crate::types::TicketAmount;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub const BUY_LOTTERY_TICKET: &str = "buy-lottery-ticket";
pub const DRAW_LOTTERY: &str = "draw-lottery";
pub const TICKET_AMOUNT_OPTION: &str = "ticket-amount";

/// A parsed slash-command invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    BuyLotteryTicket { ticket_amount: TicketAmount },
    DrawLottery,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Self::BuyLotteryTicket { .. } => BUY_LOTTERY_TICKET,
            Self::DrawLottery => DRAW_LOTTERY,
        }
    }

    pub fn workflow_kind(&self) -> WorkflowKind {
        match *self {
            Self::BuyLotteryTicket { ticket_amount } => {
                WorkflowKind::PurchaseTickets { ticket_amount }
            }
            Self::DrawLottery => WorkflowKind::DrawWinner,
        }
    }

    /// Build a command from its name and raw option values.
    pub fn from_invocation(
        name: &str,
        options: &BTreeMap<String, Value>,
    ) -> Result<Self, LotteryError> {
        match name {
            BUY_LOTTERY_TICKET => {
                let raw = options.get(TICKET_AMOUNT_OPTION).ok_or_else(|| {
                    LotteryError::InvalidCommand(format!("missing option '{TICKET_AMOUNT_OPTION}'"))
                })?;
                let count = raw.as_u64().ok_or_else(|| {
                    LotteryError::InvalidCommand(format!(
                        "'{TICKET_AMOUNT_OPTION}' must be a positive integer, got {raw}"
                    ))
                })?;
                Ok(Self::BuyLotteryTicket {
                    ticket_amount: TicketAmount::new(count)?,
                })
            }
            DRAW_LOTTERY => Ok(Self::DrawLottery),
            other => Err(LotteryError::InvalidCommand(format!(
                "unknown command '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOptionDefinition {
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub value_type: String,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_value: Option<u64>,
}

/// Registration data for one slash command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandDefinition {
    pub name: String,
    pub description: String,
    pub options: Vec<CommandOptionDefinition>,
    /// Replies are visible to the invoker only.
    pub ephemeral: bool,
}

pub fn catalog() -> Vec<CommandDefinition> {
    vec![
        CommandDefinition {
            name: BUY_LOTTERY_TICKET.to_string(),
            description: "Buy tickets for the RLUSD lottery (1 RLUSD per ticket)".to_string(),
            options: vec![CommandOptionDefinition {
                name: TICKET_AMOUNT_OPTION.to_string(),
                description: "Number of tickets to buy".to_string(),
                value_type: "integer".to_string(),
                required: true,
                min_value: Some(1),
            }],
            ephemeral: true,
        },
        CommandDefinition {
            name: DRAW_LOTTERY.to_string(),
            description: "Draw the lottery winner (participants or owner only)".to_string(),
            options: Vec::new(),
            ephemeral: true,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn options(value: Value) -> BTreeMap<String, Value> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn parses_ticket_amount() {
        let command =
            Command::from_invocation(BUY_LOTTERY_TICKET, &options(json!({"ticket-amount": 3})))
                .unwrap();
        assert_eq!(
            command.workflow_kind(),
            WorkflowKind::PurchaseTickets {
                ticket_amount: TicketAmount::new(3).unwrap()
            }
        );
    }

    #[test]
    fn rejects_bad_ticket_amounts() {
        for raw in [
            json!({}),
            json!({"ticket-amount": 0}),
            json!({"ticket-amount": -2}),
            json!({"ticket-amount": "two"}),
        ] {
            let err = Command::from_invocation(BUY_LOTTERY_TICKET, &options(raw)).unwrap_err();
            assert!(matches!(err, LotteryError::InvalidCommand(_)));
        }
    }

    #[test]
    fn unknown_command_is_invalid() {
        assert!(Command::from_invocation("connect-wallet", &BTreeMap::new()).is_err());
        assert_eq!(
            Command::from_invocation(DRAW_LOTTERY, &BTreeMap::new()).unwrap(),
            Command::DrawLottery
        );
    }

    #[test]
    fn catalog_lists_both_commands() {
        let names: Vec<_> = catalog().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec![BUY_LOTTERY_TICKET, DRAW_LOTTERY]);
    }
}
