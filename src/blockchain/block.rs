use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use utoipa::ToSchema;

use super::transaction::Transaction;

/// Sentinel recorded as the genesis block's `previous_hash`; never derived
/// from real block data
pub const GENESIS_PREVIOUS_HASH: &str = "1";

/// Proof recorded in the genesis block
///
/// Not itself the solution to any puzzle; the first mined block's proof is
/// searched against this constant.
pub const GENESIS_PROOF: u64 = 100;

/// Represents a block in the blockchain
///
/// Blocks are immutable once appended to the chain.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Block {
    /// Index of the block in the chain (1-based)
    pub index: u64,

    /// Seconds since the Unix epoch when the block was created
    pub timestamp: f64,

    /// List of transactions included in this block
    pub transactions: Vec<Transaction>,

    /// Proof of work solving the puzzle against the previous block's proof
    pub proof: u64,

    /// Hash of the previous block (hex), or the genesis sentinel
    pub previous_hash: String,
}

impl Block {
    /// Creates a new block stamped with the current wall-clock time
    ///
    /// # Arguments
    ///
    /// * `index` - The index of the block in the chain
    /// * `transactions` - The list of transactions to include in the block
    /// * `proof` - The proof of work
    /// * `previous_hash` - The hash of the previous block
    ///
    /// # Returns
    ///
    /// A new Block instance
    pub fn new(index: u64, transactions: Vec<Transaction>, proof: u64, previous_hash: String) -> Self {
        Block {
            index,
            timestamp: epoch_seconds(),
            transactions,
            proof,
            previous_hash,
        }
    }

    /// Creates the genesis block
    ///
    /// # Returns
    ///
    /// The fixed first block of every chain: index 1, no transactions, the
    /// constant proof and the previous-hash sentinel
    pub fn genesis() -> Self {
        Block::new(1, Vec::new(), GENESIS_PROOF, GENESIS_PREVIOUS_HASH.to_string())
    }

    /// Calculates the canonical hash of the block
    ///
    /// The block is first converted to a `serde_json::Value`, whose map keys
    /// are kept sorted, so two structurally-equal blocks always hash
    /// identically regardless of how they were constructed.
    ///
    /// # Returns
    ///
    /// The SHA-256 hash of the block as a lowercase hexadecimal string
    pub fn hash(&self) -> Result<String, serde_json::Error> {
        let value = serde_json::to_value(self)?;
        let canonical = serde_json::to_string(&value)?;

        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());

        Ok(hex::encode(hasher.finalize()))
    }
}

/// Current wall-clock time as fractional seconds since the Unix epoch
fn epoch_seconds() -> f64 {
    let now = Utc::now();
    now.timestamp() as f64 + f64::from(now.timestamp_subsec_micros()) / 1e6
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_genesis_block() {
        let genesis = Block::genesis();

        assert_eq!(genesis.index, 1);
        assert_eq!(genesis.proof, GENESIS_PROOF);
        assert_eq!(genesis.previous_hash, GENESIS_PREVIOUS_HASH);
        assert!(genesis.transactions.is_empty());
    }

    #[test]
    fn test_hash_shape() {
        let block = Block::new(
            2,
            vec![Transaction::new("a", "b", 10.0)],
            35293,
            "previous_hash".to_string(),
        );

        let hash = block.hash().unwrap();
        assert_eq!(hash.len(), 64); // SHA-256 hash is 64 characters in hex
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(hash, hash.to_lowercase());
    }

    #[test]
    fn test_hash_is_deterministic() {
        let block = Block::new(
            2,
            vec![Transaction::new("a", "b", 10.0)],
            35293,
            "previous_hash".to_string(),
        );

        assert_eq!(block.hash().unwrap(), block.hash().unwrap());

        // A clone holds equal content and must hash identically.
        let copy = block.clone();
        assert_eq!(block.hash().unwrap(), copy.hash().unwrap());
    }

    #[test]
    fn test_hash_ignores_field_order() {
        let block = Block {
            index: 2,
            timestamp: 1672574400.5,
            transactions: vec![Transaction::new("a", "b", 10.0)],
            proof: 35293,
            previous_hash: "previous_hash".to_string(),
        };

        // Same content with keys permuted, as a peer is free to send it.
        let permuted: Block = serde_json::from_str(
            r#"{"proof":35293,"previous_hash":"previous_hash","transactions":[{"amount":10.0,"recipient":"b","sender":"a"}],"index":2,"timestamp":1672574400.5}"#,
        )
        .unwrap();

        assert_eq!(block.hash().unwrap(), permuted.hash().unwrap());
    }

    #[test]
    fn test_hash_changes_with_content() {
        let block = Block::new(2, Vec::new(), 35293, "previous_hash".to_string());

        let mut tampered = block.clone();
        tampered.proof += 1;

        assert_ne!(block.hash().unwrap(), tampered.hash().unwrap());
    }
}
