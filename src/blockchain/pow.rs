use sha2::{Digest, Sha256};

/// Number of leading zero hex characters a valid proof digest must carry
pub const DIFFICULTY: usize = 4;

/// Validates a proof against the previous block's proof
///
/// Computes the SHA-256 digest of the two proofs' decimal representations
/// concatenated, and checks for the required number of leading zeros. Cheap
/// to run, unlike the search in [`solve`].
///
/// # Arguments
///
/// * `last_proof` - The previous block's proof
/// * `proof` - The candidate proof
///
/// # Returns
///
/// true if the candidate solves the puzzle, false otherwise
pub fn valid_proof(last_proof: u64, proof: u64) -> bool {
    let guess = format!("{}{}", last_proof, proof);
    let digest = hex::encode(Sha256::digest(guess.as_bytes()));

    digest.starts_with(&"0".repeat(DIFFICULTY))
}

/// Searches for a proof solving the puzzle against the previous proof
///
/// Tries candidates sequentially from zero until one validates. There is no
/// upper bound on the search, so this is CPU-bound and potentially
/// long-running: callers must run it off any latency-sensitive path and
/// outside any lock on ledger state.
///
/// # Arguments
///
/// * `last_proof` - The previous block's proof
///
/// # Returns
///
/// The first candidate for which `valid_proof(last_proof, candidate)` holds
pub fn solve(last_proof: u64) -> u64 {
    let mut proof = 0;
    while !valid_proof(last_proof, proof) {
        proof += 1;
    }

    proof
}
