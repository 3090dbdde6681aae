use std::collections::HashSet;
use std::sync::Mutex;

use log::{info, warn};
use thiserror::Error;

use super::block::Block;
use super::pow;
use super::transaction::Transaction;

/// Amount minted to the reward transaction of every mined block
pub const MINING_REWARD: f64 = 1.0;

/// Errors that can occur during blockchain operations
#[derive(Debug, Error)]
pub enum BlockchainError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid peer address: {0}")]
    InvalidPeer(String),
}

/// Chain and pending buffer, guarded by a single lock
///
/// Mining reads the last block while reconciliation may be replacing the
/// entire chain, so the two fields must never be locked independently.
#[derive(Debug)]
struct LedgerState {
    chain: Vec<Block>,
    pending_transactions: Vec<Transaction>,
}

/// Represents the blockchain of a single node
///
/// Constructed once at process start and passed explicitly to every caller;
/// all interior state is lock-guarded so one instance can be shared across
/// request handlers.
#[derive(Debug)]
pub struct Blockchain {
    /// Chain and pending transactions, guarded together
    state: Mutex<LedgerState>,

    /// Registered peer authorities (host:port)
    peers: Mutex<HashSet<String>>,

    /// This node's identifier, used as the default reward recipient
    node_id: String,
}

impl Blockchain {
    /// Creates a new blockchain with a genesis block
    ///
    /// # Arguments
    ///
    /// * `node_id` - This node's identifier
    ///
    /// # Returns
    ///
    /// A new Blockchain instance holding only the genesis block
    pub fn new(node_id: impl Into<String>) -> Self {
        let node_id = node_id.into();
        info!("Creating blockchain for node {}", node_id);

        Blockchain {
            state: Mutex::new(LedgerState {
                chain: vec![Block::genesis()],
                pending_transactions: Vec::new(),
            }),
            peers: Mutex::new(HashSet::new()),
            node_id,
        }
    }

    /// Gets this node's identifier
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Gets the last block in the chain
    ///
    /// # Returns
    ///
    /// A copy of the last block
    pub fn last_block(&self) -> Block {
        let state = self.state.lock().unwrap();
        // The chain is never empty: genesis is created in the constructor and
        // reconciliation only accepts longer chains.
        state.chain.last().unwrap().clone()
    }

    /// Adds a new transaction to the pending transactions
    ///
    /// # Arguments
    ///
    /// * `sender` - The sender's identifier
    /// * `recipient` - The recipient's identifier
    /// * `amount` - The amount to transfer
    ///
    /// # Returns
    ///
    /// The index of the block that will include this transaction
    pub fn add_transaction(
        &self,
        sender: impl Into<String>,
        recipient: impl Into<String>,
        amount: f64,
    ) -> u64 {
        let mut state = self.state.lock().unwrap();
        state
            .pending_transactions
            .push(Transaction::new(sender, recipient, amount));

        state.chain.last().unwrap().index + 1
    }

    /// Mines a new block with the pending transactions
    ///
    /// Snapshots the link targets under the lock, then runs the proof-of-work
    /// search with no lock held so reads stay responsive while it runs. The
    /// reward transaction is appended to the pending buffer just before the
    /// block is built, and the buffer is cleared into the block. If the chain
    /// was replaced while the search ran, the stale solution is discarded and
    /// the search restarts against the new tip, so an appended block always
    /// links the actual last block.
    ///
    /// # Arguments
    ///
    /// * `reward_recipient` - The identifier credited with the mining reward
    ///
    /// # Returns
    ///
    /// Result with the newly mined block
    pub fn mine_block(&self, reward_recipient: &str) -> Result<Block, BlockchainError> {
        loop {
            let (last_proof, previous_hash, next_index) = {
                let state = self.state.lock().unwrap();
                let last = state.chain.last().unwrap();
                (last.proof, last.hash()?, last.index + 1)
            };

            let proof = pow::solve(last_proof);

            let mut state = self.state.lock().unwrap();
            if state.chain.last().unwrap().hash()? != previous_hash {
                warn!(
                    "Discarding proof {} solved against a replaced tip",
                    proof
                );
                continue;
            }

            state
                .pending_transactions
                .push(Transaction::reward(reward_recipient, MINING_REWARD));

            let transactions = std::mem::take(&mut state.pending_transactions);
            let block = Block::new(next_index, transactions, proof, previous_hash);
            state.chain.push(block.clone());

            info!(
                "Mined block {} with {} transactions (proof {})",
                block.index,
                block.transactions.len(),
                block.proof
            );

            return Ok(block);
        }
    }

    /// Checks whether a chain satisfies the hash-link and proof-of-work
    /// invariants
    ///
    /// Walks the chain pairwise from the second block onward. The genesis
    /// block's own proof is a fixed constant, so the first mined block's
    /// proof is validated against that constant and nothing validates the
    /// constant itself. Chains with fewer than two blocks are vacuously
    /// valid. A block that cannot be hashed makes the chain invalid rather
    /// than raising an error.
    ///
    /// # Arguments
    ///
    /// * `chain` - The candidate chain, which need not belong to this node
    ///
    /// # Returns
    ///
    /// true if the chain is valid, false otherwise
    pub fn valid_chain(chain: &[Block]) -> bool {
        for pair in chain.windows(2) {
            let (last, block) = (&pair[0], &pair[1]);

            let last_hash = match last.hash() {
                Ok(hash) => hash,
                Err(err) => {
                    warn!("Failed to hash block {}: {}", last.index, err);
                    return false;
                }
            };

            if block.previous_hash != last_hash {
                return false;
            }

            if !pow::valid_proof(last.proof, block.proof) {
                return false;
            }
        }

        true
    }

    /// Resolves conflicts by adopting the longest valid candidate chain
    ///
    /// Candidates are scanned in the order supplied; one is adopted only if
    /// it is strictly longer than the current chain and every candidate
    /// adopted so far, so the first seen among equally long candidates wins.
    /// A candidate whose claimed length disagrees with its block count, or
    /// that fails validation, is skipped.
    ///
    /// # Arguments
    ///
    /// * `candidates` - Already-fetched `(length, chain)` pairs from peers
    ///
    /// # Returns
    ///
    /// true if the local chain was replaced, false otherwise
    pub fn reconcile(&self, candidates: &[(usize, Vec<Block>)]) -> bool {
        let mut state = self.state.lock().unwrap();

        let mut max_length = state.chain.len();
        let mut replacement: Option<&Vec<Block>> = None;

        for (length, chain) in candidates {
            if *length != chain.len() {
                warn!(
                    "Skipping candidate claiming length {} but holding {} blocks",
                    length,
                    chain.len()
                );
                continue;
            }

            if *length > max_length && Self::valid_chain(chain) {
                max_length = *length;
                replacement = Some(chain);
            }
        }

        match replacement {
            Some(chain) => {
                info!(
                    "Replacing local chain of length {} with peer chain of length {}",
                    state.chain.len(),
                    chain.len()
                );
                state.chain = chain.clone();
                true
            }
            None => false,
        }
    }

    /// Gets a lock-consistent snapshot of the chain
    ///
    /// # Returns
    ///
    /// A copy of all blocks and the chain length
    pub fn snapshot(&self) -> (Vec<Block>, usize) {
        let state = self.state.lock().unwrap();
        (state.chain.clone(), state.chain.len())
    }

    /// Gets all pending transactions
    ///
    /// # Returns
    ///
    /// A copy of the transactions awaiting inclusion in a block
    pub fn pending_transactions(&self) -> Vec<Transaction> {
        let state = self.state.lock().unwrap();
        state.pending_transactions.clone()
    }

    /// Validates this node's own chain
    ///
    /// # Returns
    ///
    /// true if the local chain is valid, false otherwise
    pub fn is_valid(&self) -> bool {
        let state = self.state.lock().unwrap();
        Self::valid_chain(&state.chain)
    }

    /// Registers a peer node
    ///
    /// # Arguments
    ///
    /// * `address` - The peer's address, either `host:port` or a URL like
    ///   `http://host:port/...`
    ///
    /// # Returns
    ///
    /// Result with the stored authority
    pub fn register_peer(&self, address: &str) -> Result<String, BlockchainError> {
        let authority = parse_authority(address)
            .ok_or_else(|| BlockchainError::InvalidPeer(address.to_string()))?;

        let mut peers = self.peers.lock().unwrap();
        if peers.insert(authority.clone()) {
            info!("Registered peer {}", authority);
        }

        Ok(authority)
    }

    /// Registers a batch of peer nodes
    ///
    /// Every address is parsed before any is stored, so a batch containing
    /// an invalid address leaves the registry unchanged.
    ///
    /// # Arguments
    ///
    /// * `addresses` - The peer addresses, either `host:port` or URLs
    ///
    /// # Returns
    ///
    /// Result with the total number of registered peers
    pub fn register_peers(&self, addresses: &[String]) -> Result<usize, BlockchainError> {
        let mut authorities = Vec::with_capacity(addresses.len());
        for address in addresses {
            let authority = parse_authority(address)
                .ok_or_else(|| BlockchainError::InvalidPeer(address.clone()))?;
            authorities.push(authority);
        }

        let mut peers = self.peers.lock().unwrap();
        for authority in authorities {
            if peers.insert(authority.clone()) {
                info!("Registered peer {}", authority);
            }
        }

        Ok(peers.len())
    }

    /// Gets all registered peers
    ///
    /// # Returns
    ///
    /// The peer authorities, sorted for reproducible output
    pub fn peers(&self) -> Vec<String> {
        let peers = self.peers.lock().unwrap();
        let mut list: Vec<String> = peers.iter().cloned().collect();
        list.sort();
        list
    }
}

/// Extracts the `host:port` authority from a peer address
fn parse_authority(address: &str) -> Option<String> {
    let rest = match address.split_once("://") {
        Some((_, rest)) => rest,
        None => address,
    };

    let authority = rest.split('/').next().unwrap_or("");
    if authority.is_empty() {
        None
    } else {
        Some(authority.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::block::{GENESIS_PREVIOUS_HASH, GENESIS_PROOF};
    use crate::blockchain::transaction::SYSTEM_SENDER;

    #[test]
    fn test_new_blockchain_starts_at_genesis() {
        let blockchain = Blockchain::new("node1");
        let (chain, length) = blockchain.snapshot();

        assert_eq!(length, 1);
        assert_eq!(chain[0].index, 1);
        assert_eq!(chain[0].proof, GENESIS_PROOF);
        assert_eq!(chain[0].previous_hash, GENESIS_PREVIOUS_HASH);
        assert!(blockchain.pending_transactions().is_empty());
    }

    #[test]
    fn test_add_transaction_returns_next_block_index() {
        let blockchain = Blockchain::new("node1");

        let block_index = blockchain.add_transaction("a", "b", 10.0);

        assert_eq!(block_index, 2);
        assert_eq!(blockchain.pending_transactions().len(), 1);
    }

    #[test]
    fn test_mine_block_includes_pending_and_reward() {
        let blockchain = Blockchain::new("node1");
        blockchain.add_transaction("a", "b", 10.0);

        let block = blockchain.mine_block("miner1").unwrap();

        assert_eq!(block.index, 2);
        assert_eq!(block.transactions.len(), 2); // appended transaction + reward

        let reward = &block.transactions[1];
        assert_eq!(reward.sender, SYSTEM_SENDER);
        assert_eq!(reward.recipient, "miner1");
        assert_eq!(reward.amount, MINING_REWARD);

        // The buffer is cleared exactly when the block is created.
        assert!(blockchain.pending_transactions().is_empty());

        let (chain, length) = blockchain.snapshot();
        assert_eq!(length, 2);
        assert_eq!(chain[1].previous_hash, chain[0].hash().unwrap());
    }

    #[test]
    fn test_mined_blocks_satisfy_proof_of_work() {
        let blockchain = Blockchain::new("node1");
        blockchain.mine_block("miner1").unwrap();
        blockchain.mine_block("miner1").unwrap();

        let (chain, _) = blockchain.snapshot();
        assert!(pow::valid_proof(chain[0].proof, chain[1].proof));
        assert!(pow::valid_proof(chain[1].proof, chain[2].proof));
        assert!(blockchain.is_valid());
    }

    #[test]
    fn test_valid_chain_accepts_mined_chain() {
        let blockchain = Blockchain::new("node1");
        blockchain.add_transaction("a", "b", 10.0);
        blockchain.mine_block("miner1").unwrap();

        let (chain, _) = blockchain.snapshot();
        assert!(Blockchain::valid_chain(&chain));
    }

    #[test]
    fn test_valid_chain_rejects_tampered_link() {
        let blockchain = Blockchain::new("node1");
        blockchain.mine_block("miner1").unwrap();

        let (mut chain, _) = blockchain.snapshot();
        chain[1].previous_hash = "0".repeat(64);

        assert!(!Blockchain::valid_chain(&chain));
    }

    #[test]
    fn test_valid_chain_rejects_tampered_proof() {
        let blockchain = Blockchain::new("node1");
        blockchain.mine_block("miner1").unwrap();

        let (mut chain, _) = blockchain.snapshot();
        chain[1].proof += 1;
        // Re-link so only the proof invariant is violated.
        chain[1].previous_hash = chain[0].hash().unwrap();

        assert!(!Blockchain::valid_chain(&chain));
    }

    #[test]
    fn test_valid_chain_vacuous_below_two_blocks() {
        assert!(Blockchain::valid_chain(&[]));
        assert!(Blockchain::valid_chain(&[Block::genesis()]));
    }

    #[test]
    fn test_reconcile_adopts_longer_valid_chain() {
        let short_node = Blockchain::new("node1");
        let long_node = Blockchain::new("node2");
        long_node.mine_block("miner2").unwrap();
        long_node.mine_block("miner2").unwrap();

        let (candidate, length) = long_node.snapshot();
        let replaced = short_node.reconcile(&[(length, candidate.clone())]);

        assert!(replaced);
        let (chain, new_length) = short_node.snapshot();
        assert_eq!(new_length, 3);
        assert_eq!(chain[2].previous_hash, candidate[1].hash().unwrap());
    }

    #[test]
    fn test_reconcile_keeps_chain_against_shorter_or_equal() {
        let node = Blockchain::new("node1");
        node.mine_block("miner1").unwrap();

        let other = Blockchain::new("node2");
        let (shorter, shorter_length) = other.snapshot();
        other.mine_block("miner2").unwrap();
        let (equal, equal_length) = other.snapshot();

        let before = node.snapshot().0;
        let replaced = node.reconcile(&[
            (shorter_length, shorter),
            (equal_length, equal),
        ]);

        assert!(!replaced);
        let after = node.snapshot().0;
        assert_eq!(before.len(), after.len());
        assert_eq!(before[1].previous_hash, after[1].previous_hash);
    }

    #[test]
    fn test_reconcile_skips_invalid_longer_chain() {
        let node = Blockchain::new("node1");

        let other = Blockchain::new("node2");
        other.mine_block("miner2").unwrap();
        let (mut candidate, length) = other.snapshot();
        candidate[1].previous_hash = "0".repeat(64);

        assert!(!node.reconcile(&[(length, candidate)]));
        assert_eq!(node.snapshot().1, 1);
    }

    #[test]
    fn test_reconcile_skips_length_mismatch() {
        let node = Blockchain::new("node1");

        let other = Blockchain::new("node2");
        other.mine_block("miner2").unwrap();
        let (candidate, _) = other.snapshot();

        // Claimed length overstates the candidate.
        assert!(!node.reconcile(&[(5, candidate)]));
        assert_eq!(node.snapshot().1, 1);
    }

    #[test]
    fn test_register_peer_parses_authority() {
        let blockchain = Blockchain::new("node1");

        let stored = blockchain.register_peer("http://127.0.0.1:5001/chain").unwrap();
        assert_eq!(stored, "127.0.0.1:5001");

        blockchain.register_peer("localhost:5002").unwrap();
        // Duplicate registration is a no-op.
        blockchain.register_peer("127.0.0.1:5001").unwrap();

        assert_eq!(blockchain.peers(), vec!["127.0.0.1:5001", "localhost:5002"]);
    }

    #[test]
    fn test_mine_during_chain_replacement_keeps_chain_valid() {
        use std::sync::Arc;

        let node = Arc::new(Blockchain::new("node1"));

        let other = Blockchain::new("node2");
        other.mine_block("miner2").unwrap();
        other.mine_block("miner2").unwrap();
        let (candidate, length) = other.snapshot();

        // Replace the chain while a mine may be in flight; whichever way the
        // two interleave, the surviving chain must satisfy its invariants.
        let miner = {
            let node = Arc::clone(&node);
            std::thread::spawn(move || node.mine_block("miner1").unwrap())
        };
        node.reconcile(&[(length, candidate)]);
        miner.join().unwrap();

        let (chain, len) = node.snapshot();
        assert!(len == 3 || len == 4);
        assert!(Blockchain::valid_chain(&chain));
    }

    #[test]
    fn test_register_peers_batch_is_all_or_nothing() {
        let blockchain = Blockchain::new("node1");

        let result = blockchain.register_peers(&[
            "127.0.0.1:5001".to_string(),
            "http://".to_string(),
        ]);

        assert!(result.is_err());
        assert!(blockchain.peers().is_empty());

        let total = blockchain
            .register_peers(&["127.0.0.1:5001".to_string(), "127.0.0.1:5002".to_string()])
            .unwrap();
        assert_eq!(total, 2);
        assert_eq!(blockchain.peers(), vec!["127.0.0.1:5001", "127.0.0.1:5002"]);
    }

    #[test]
    fn test_register_peer_rejects_empty_authority() {
        let blockchain = Blockchain::new("node1");

        assert!(blockchain.register_peer("").is_err());
        assert!(blockchain.register_peer("http://").is_err());
    }
}
