// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Commands a connected application can submit.
//!
//! A command travels as a JSON object with exactly one key naming the
//! command, e.g. `{"voteSubmission": {"proposalId": "...", "value": "VALUE_YES"}}`.
//! Only the fields the service inspects are typed; the rest of each payload
//! is carried through untouched.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::TransactionError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteSubmission {
    pub proposal_id: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Command {
    OrderSubmission(Value),
    OrderCancellation(Value),
    OrderAmendment(Value),
    WithdrawSubmission(Value),
    LiquidityProvisionSubmission(Value),
    ProposalSubmission(Value),
    VoteSubmission(VoteSubmission),
    DelegateSubmission(Value),
    UndelegateSubmission(Value),
    Transfer(Value),
    CancelTransfer(Value),
    AnnounceNode(Value),
}

/// Spam-protection bucket a command falls in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandCategory {
    Proposal,
    Vote,
    Delegation,
    Transfer,
    NodeAnnouncement,
    /// Commands only subject to proof-of-work.
    Other,
}

impl CommandCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandCategory::Proposal => "proposals",
            CommandCategory::Vote => "votes",
            CommandCategory::Delegation => "delegations",
            CommandCategory::Transfer => "transfers",
            CommandCategory::NodeAnnouncement => "node announcements",
            CommandCategory::Other => "other commands",
        }
    }
}

impl Command {
    pub fn from_value(value: &Value) -> Result<Self, TransactionError> {
        let object = value.as_object().ok_or_else(|| {
            TransactionError::InvalidCommand("the transaction must be a JSON object".to_string())
        })?;
        if object.len() != 1 {
            return Err(TransactionError::InvalidCommand(
                "the transaction must contain exactly one command".to_string(),
            ));
        }
        serde_json::from_value(value.clone())
            .map_err(|e| TransactionError::InvalidCommand(e.to_string()))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::OrderSubmission(_) => "orderSubmission",
            Command::OrderCancellation(_) => "orderCancellation",
            Command::OrderAmendment(_) => "orderAmendment",
            Command::WithdrawSubmission(_) => "withdrawSubmission",
            Command::LiquidityProvisionSubmission(_) => "liquidityProvisionSubmission",
            Command::ProposalSubmission(_) => "proposalSubmission",
            Command::VoteSubmission(_) => "voteSubmission",
            Command::DelegateSubmission(_) => "delegateSubmission",
            Command::UndelegateSubmission(_) => "undelegateSubmission",
            Command::Transfer(_) => "transfer",
            Command::CancelTransfer(_) => "cancelTransfer",
            Command::AnnounceNode(_) => "announceNode",
        }
    }

    pub fn category(&self) -> CommandCategory {
        match self {
            Command::ProposalSubmission(_) => CommandCategory::Proposal,
            Command::VoteSubmission(_) => CommandCategory::Vote,
            Command::DelegateSubmission(_) | Command::UndelegateSubmission(_) => {
                CommandCategory::Delegation
            }
            Command::Transfer(_) => CommandCategory::Transfer,
            Command::AnnounceNode(_) => CommandCategory::NodeAnnouncement,
            Command::OrderSubmission(_)
            | Command::OrderCancellation(_)
            | Command::OrderAmendment(_)
            | Command::WithdrawSubmission(_)
            | Command::LiquidityProvisionSubmission(_)
            | Command::CancelTransfer(_) => CommandCategory::Other,
        }
    }

    /// Pretty-printed JSON shown to the user during review.
    pub fn to_human_readable(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| self.name().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_and_categorizes_commands() {
        let vote = Command::from_value(&json!({
            "voteSubmission": {"proposalId": "p1", "value": "VALUE_YES"}
        }))
        .unwrap();
        assert_eq!(vote.category(), CommandCategory::Vote);
        assert_eq!(vote.name(), "voteSubmission");

        let undelegate =
            Command::from_value(&json!({"undelegateSubmission": {"nodeId": "n1"}})).unwrap();
        assert_eq!(undelegate.category(), CommandCategory::Delegation);

        let order = Command::from_value(&json!({"orderSubmission": {"marketId": "m"}})).unwrap();
        assert_eq!(order.category(), CommandCategory::Other);
    }

    #[test]
    fn rejects_malformed_commands() {
        assert!(Command::from_value(&json!("transfer")).is_err());
        assert!(Command::from_value(&json!({})).is_err());
        assert!(Command::from_value(&json!({"unknownCommand": {}})).is_err());
        assert!(Command::from_value(&json!({
            "transfer": {},
            "announceNode": {}
        }))
        .is_err());
        // Vote submissions need their proposal ID.
        assert!(Command::from_value(&json!({"voteSubmission": {"value": "VALUE_YES"}})).is_err());
    }

    #[test]
    fn human_readable_form_keeps_the_payload() {
        let transfer = Command::from_value(&json!({"transfer": {"amount": "10"}})).unwrap();
        let rendered = transfer.to_human_readable();
        assert!(rendered.contains("\"transfer\""));
        assert!(rendered.contains("\"amount\": \"10\""));
    }
}
