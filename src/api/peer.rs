//! Client used to fetch peer chains for reconciliation.

use std::time::Duration;

use futures::future::join_all;
use log::warn;
use serde::Deserialize;

use crate::blockchain::Block;

/// Shape of a peer's `/chain` response
#[derive(Debug, Deserialize)]
struct PeerChainResponse {
    length: usize,
    chain: Vec<Block>,
}

/// Fetches `(length, chain)` candidates from every registered peer
///
/// Unreachable peers and malformed responses are skipped with a warning;
/// fetching never fails as a whole.
///
/// # Arguments
///
/// * `peers` - The peer authorities (host:port) to query
///
/// # Returns
///
/// The candidates that could be fetched and decoded
pub async fn fetch_chains(peers: &[String]) -> Vec<(usize, Vec<Block>)> {
    let client = match reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
    {
        Ok(client) => client,
        Err(err) => {
            warn!("Failed to build peer HTTP client: {}", err);
            return Vec::new();
        }
    };

    let fetches = peers.iter().map(|peer| {
        let client = client.clone();
        async move {
            match fetch_chain(&client, peer).await {
                Ok(candidate) => Some(candidate),
                Err(err) => {
                    warn!("Skipping peer {}: {}", peer, err);
                    None
                }
            }
        }
    });

    join_all(fetches).await.into_iter().flatten().collect()
}

/// Fetches a single peer's chain
async fn fetch_chain(
    client: &reqwest::Client,
    peer: &str,
) -> Result<(usize, Vec<Block>), reqwest::Error> {
    let url = format!("http://{}/chain", peer);
    let response = client.get(&url).send().await?.error_for_status()?;
    let body: PeerChainResponse = response.json().await?;

    Ok((body.length, body.chain))
}
