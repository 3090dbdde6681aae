use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Sender identifier reserved for system-minted reward transactions
pub const SYSTEM_SENDER: &str = "0";

/// Represents a transfer recorded in the ledger
///
/// No balance or identity checks are performed; the ledger records whatever
/// it is given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Transaction {
    /// Sender's identifier (`"0"` for system-minted rewards)
    pub sender: String,

    /// Recipient's identifier
    pub recipient: String,

    /// Amount being transferred
    pub amount: f64,
}

impl Transaction {
    /// Creates a new transaction
    ///
    /// # Arguments
    ///
    /// * `sender` - The sender's identifier
    /// * `recipient` - The recipient's identifier
    /// * `amount` - The amount to transfer
    ///
    /// # Returns
    ///
    /// A new Transaction instance
    pub fn new(sender: impl Into<String>, recipient: impl Into<String>, amount: f64) -> Self {
        Transaction {
            sender: sender.into(),
            recipient: recipient.into(),
            amount,
        }
    }

    /// Creates a mining reward transaction minted by the system sender
    ///
    /// # Arguments
    ///
    /// * `recipient` - The identifier of the miner
    /// * `amount` - The reward amount
    ///
    /// # Returns
    ///
    /// A new Transaction instance
    pub fn reward(recipient: impl Into<String>, amount: f64) -> Self {
        Transaction {
            sender: SYSTEM_SENDER.to_string(),
            recipient: recipient.into(),
            amount,
        }
    }

    /// Checks if the transaction is a system-minted reward
    pub fn is_reward(&self) -> bool {
        self.sender == SYSTEM_SENDER
    }
}
