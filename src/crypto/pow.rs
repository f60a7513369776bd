//! Proof-of-work solver for identity creation.
//!
//! The Exchange gates identity creation behind a hash puzzle: find a nonce
//! such that `SHA-256(challenge + ":" + nonce)` has at least `difficulty`
//! leading zero characters in hex. This raises the cost of mass identity
//! creation without requiring any server-side state per attempt.
//!
//! Known risk: there is no iteration cap. A pathological difficulty from a
//! hostile or misconfigured server stalls the solver indefinitely. We do not
//! silently cap it; the caller decides how long to wait.

use crate::crypto::sha256_hex;

/// Iterations between cooperative yields.
const YIELD_INTERVAL: u64 = 256;

/// Solve a proof-of-work challenge.
///
/// Candidate nonces are the decimal strings "0", "1", "2", ... in order, so
/// the returned nonce is the smallest (in search order) that satisfies the
/// difficulty predicate. Yields to the runtime every [`YIELD_INTERVAL`]
/// iterations so a long search never starves concurrent tasks.
pub async fn solve(challenge: &str, difficulty: u32) -> String {
    let mut counter: u64 = 0;
    loop {
        let nonce = counter.to_string();
        if meets_difficulty(&sha256_hex(format!("{challenge}:{nonce}").as_bytes()), difficulty) {
            return nonce;
        }
        counter += 1;
        if counter % YIELD_INTERVAL == 0 {
            tokio::task::yield_now().await;
        }
    }
}

/// True when `hash_hex` starts with at least `difficulty` zero characters.
pub fn meets_difficulty(hash_hex: &str, difficulty: u32) -> bool {
    hash_hex
        .bytes()
        .take(difficulty as usize)
        .all(|b| b == b'0')
        && hash_hex.len() >= difficulty as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::sha256_hex;

    #[tokio::test]
    async fn zero_difficulty_accepts_first_nonce() {
        assert_eq!(solve("anything", 0).await, "0");
    }

    #[tokio::test]
    async fn solution_satisfies_predicate() {
        let challenge = "agora-challenge-7f3a";
        let nonce = solve(challenge, 2).await;
        let hash = sha256_hex(format!("{challenge}:{nonce}").as_bytes());
        assert!(hash.starts_with("00"), "hash {hash} lacks 2 leading zeros");
    }

    #[tokio::test]
    async fn solution_is_minimal_in_search_order() {
        let challenge = "minimality";
        let nonce: u64 = solve(challenge, 2).await.parse().unwrap();
        for smaller in 0..nonce {
            let hash = sha256_hex(format!("{challenge}:{smaller}").as_bytes());
            assert!(
                !meets_difficulty(&hash, 2),
                "nonce {smaller} already satisfied the predicate"
            );
        }
    }

    #[test]
    fn difficulty_predicate_edges() {
        assert!(meets_difficulty("00ab", 2));
        assert!(!meets_difficulty("0ab0", 2));
        assert!(meets_difficulty("", 0));
        assert!(!meets_difficulty("0", 2));
    }
}
