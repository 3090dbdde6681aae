use actix_web::{web, HttpResponse, Responder};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::blockchain::{Block, Blockchain, Transaction};

use super::peer;

/// Data structure for the shared ledger state
pub type BlockchainData = web::Data<Blockchain>;

/// Response for the chain endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ChainResponse {
    /// The blocks in the chain
    pub chain: Vec<Block>,

    /// The length of the chain
    pub length: usize,
}

/// Request for the transaction endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct TransactionRequest {
    /// The sender's identifier
    pub sender: String,

    /// The recipient's identifier
    pub recipient: String,

    /// The amount to transfer
    pub amount: f64,
}

/// Response for the transaction endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct TransactionResponse {
    /// The message
    pub message: String,

    /// The index of the block that will include this transaction
    pub block_index: u64,
}

/// Request for the mine endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct MineRequest {
    /// The identifier credited with the reward; defaults to this node's id
    #[serde(default)]
    pub miner_address: Option<String>,
}

/// Response for the mine endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct MineResponse {
    /// The message
    pub message: String,

    /// The newly mined block
    pub block: Block,
}

/// Request for the node registration endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct RegisterNodesRequest {
    /// The peer addresses to register
    pub nodes: Vec<String>,
}

/// Response for the node registration endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct RegisterNodesResponse {
    /// The message
    pub message: String,

    /// The total number of registered peers
    pub total_nodes: usize,
}

/// Response for the resolve endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ResolveResponse {
    /// The message
    pub message: String,

    /// Whether the local chain was replaced
    pub replaced: bool,

    /// The authoritative chain after reconciliation
    pub chain: Vec<Block>,
}

/// Get the full blockchain
///
/// Returns the chain and its length; peers consume this during reconciliation
#[utoipa::path(
    get,
    path = "/chain",
    responses(
        (status = 200, description = "Chain retrieved successfully", body = ChainResponse)
    )
)]
pub async fn get_chain(blockchain: BlockchainData) -> impl Responder {
    let (chain, length) = blockchain.snapshot();

    HttpResponse::Ok().json(ChainResponse { chain, length })
}

/// Get all pending transactions
///
/// Returns all transactions waiting to be included in a block
#[utoipa::path(
    get,
    path = "/transactions/pending",
    responses(
        (status = 200, description = "Pending transactions retrieved successfully", body = Vec<Transaction>)
    )
)]
pub async fn get_pending_transactions(blockchain: BlockchainData) -> impl Responder {
    HttpResponse::Ok().json(blockchain.pending_transactions())
}

/// Create a new transaction
///
/// Adds a new transaction to the pending buffer
#[utoipa::path(
    post,
    path = "/transactions/new",
    request_body = TransactionRequest,
    responses(
        (status = 201, description = "Transaction created successfully", body = TransactionResponse)
    )
)]
pub async fn new_transaction(
    blockchain: BlockchainData,
    transaction_req: web::Json<TransactionRequest>,
) -> impl Responder {
    let block_index = blockchain.add_transaction(
        transaction_req.sender.clone(),
        transaction_req.recipient.clone(),
        transaction_req.amount,
    );

    let response = TransactionResponse {
        message: format!("Transaction will be added to Block {}", block_index),
        block_index,
    };

    HttpResponse::Created().json(response)
}

/// Mine a new block
///
/// Solves the proof-of-work puzzle and appends a block containing the
/// pending transactions plus the mining reward. The search runs on the
/// blocking thread pool so other requests stay responsive.
#[utoipa::path(
    post,
    path = "/mine",
    request_body = MineRequest,
    responses(
        (status = 200, description = "Block mined successfully", body = MineResponse),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn mine_block(
    blockchain: BlockchainData,
    mine_req: web::Json<MineRequest>,
) -> impl Responder {
    let recipient = mine_req
        .miner_address
        .clone()
        .unwrap_or_else(|| blockchain.node_id().to_string());

    let ledger = blockchain.clone();
    let mined = web::block(move || ledger.mine_block(&recipient)).await;

    match mined {
        Ok(Ok(block)) => {
            let response = MineResponse {
                message: "New block added".to_string(),
                block,
            };

            HttpResponse::Ok().json(response)
        }
        Ok(Err(err)) => HttpResponse::InternalServerError().json(serde_json::json!({
            "error": format!("Failed to mine block: {}", err)
        })),
        Err(err) => HttpResponse::InternalServerError().json(serde_json::json!({
            "error": format!("Mining task failed: {}", err)
        })),
    }
}

/// Check if the blockchain is valid
///
/// Validates the local chain's hash links and proofs of work
#[utoipa::path(
    get,
    path = "/validate",
    responses(
        (status = 200, description = "Chain validation status", body = bool)
    )
)]
pub async fn validate_chain(blockchain: BlockchainData) -> impl Responder {
    HttpResponse::Ok().json(blockchain.is_valid())
}

/// Register peer nodes
///
/// Adds the given addresses to the peer registry used by reconciliation.
/// The batch is all-or-nothing: an invalid address rejects the whole request
/// and registers none of it.
#[utoipa::path(
    post,
    path = "/nodes/register",
    request_body = RegisterNodesRequest,
    responses(
        (status = 201, description = "Peers registered successfully", body = RegisterNodesResponse),
        (status = 400, description = "Invalid peer address")
    )
)]
pub async fn register_nodes(
    blockchain: BlockchainData,
    register_req: web::Json<RegisterNodesRequest>,
) -> impl Responder {
    if register_req.nodes.is_empty() {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": "Please supply a non-empty list of nodes"
        }));
    }

    match blockchain.register_peers(&register_req.nodes) {
        Ok(total_nodes) => {
            let response = RegisterNodesResponse {
                message: "New nodes have been added".to_string(),
                total_nodes,
            };

            HttpResponse::Created().json(response)
        }
        Err(err) => HttpResponse::BadRequest().json(serde_json::json!({
            "error": format!("Failed to register peer: {}", err)
        })),
    }
}

/// Get all registered peers
///
/// Returns the peer authorities known to this node
#[utoipa::path(
    get,
    path = "/nodes",
    responses(
        (status = 200, description = "Peers retrieved successfully", body = Vec<String>)
    )
)]
pub async fn get_nodes(blockchain: BlockchainData) -> impl Responder {
    HttpResponse::Ok().json(blockchain.peers())
}

/// Resolve conflicts with peers
///
/// Fetches every registered peer's chain and adopts the longest valid one if
/// it is strictly longer than the local chain
#[utoipa::path(
    get,
    path = "/nodes/resolve",
    responses(
        (status = 200, description = "Reconciliation finished", body = ResolveResponse)
    )
)]
pub async fn resolve_conflicts(blockchain: BlockchainData) -> impl Responder {
    let candidates = peer::fetch_chains(&blockchain.peers()).await;
    let replaced = blockchain.reconcile(&candidates);

    let message = if replaced {
        "Our chain was replaced"
    } else {
        "Our chain is authoritative"
    };

    let (chain, _) = blockchain.snapshot();
    HttpResponse::Ok().json(ResolveResponse {
        message: message.to_string(),
        replaced,
        chain,
    })
}
