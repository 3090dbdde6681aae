// Blockchain module
//
// This module contains the core ledger implementation including:
// - Block structure and canonical hashing
// - Proof of work search and validation
// - Blockchain structure with pending transactions and peer registry
// - Transaction structure

pub mod block;
pub mod chain;
pub mod pow;
pub mod transaction;

// Re-export main components for easier access
pub use block::Block;
pub use chain::{Blockchain, BlockchainError};
pub use transaction::Transaction;
