pub use chain_types::hash::{double_sha256, H256};

/// Computes the Merkle path for `target` within `tx_hashes` (the block's
/// txids in order, little-endian).
///
/// Returns the sibling hashes bottom-up plus the target's position in the
/// original list. A target that is not in the block yields position `-1`
/// and whatever siblings were collected along the way (none, since no pair
/// ever matches).
pub fn merkle_path(tx_hashes: Vec<H256>, target: &H256) -> (Vec<H256>, i64) {
    let position = tx_hashes
        .iter()
        .position(|hash| hash == target)
        .map_or(-1, |p| p as i64);

    let mut merkle_proof = Vec::new();
    let mut current_hashes = tx_hashes;
    let mut current_target = target.clone();

    while current_hashes.len() > 1 {
        if current_hashes.len() % 2 == 1 {
            current_hashes.push(current_hashes[current_hashes.len() - 1].clone());
        }

        let mut new_hashes = Vec::with_capacity(current_hashes.len() / 2);

        for pair in current_hashes.chunks(2) {
            let parent = compute_hash(&pair[0], &pair[1]);
            if pair[0] == current_target {
                merkle_proof.push(pair[1].clone());
                current_target = parent.clone();
            } else if pair[1] == current_target {
                merkle_proof.push(pair[0].clone());
                current_target = parent.clone();
            }
            new_hashes.push(parent);
        }

        current_hashes = new_hashes;
    }

    (merkle_proof, position)
}

/// Folds a Merkle path back up to the root, pairing left or right by the
/// parity of the position at each level.
pub fn compute_root_from_merkle_proof(
    transaction_hash: &H256,
    transaction_position: usize,
    merkle_proof: &[H256],
) -> H256 {
    let mut current_hash = transaction_hash.clone();
    let mut current_position = transaction_position;

    for proof_hash in merkle_proof {
        if current_position % 2 == 0 {
            current_hash = compute_hash(&current_hash, proof_hash);
        } else {
            current_hash = compute_hash(proof_hash, &current_hash);
        }
        current_position /= 2;
    }

    current_hash
}

fn compute_hash(first_tx_hash: &H256, second_tx_hash: &H256) -> H256 {
    let mut concat_inputs = Vec::with_capacity(64);
    concat_inputs.extend(first_tx_hash.0);
    concat_inputs.extend(second_tx_hash.0);

    double_sha256(&concat_inputs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_hex(hex: &str) -> H256 {
        hex.parse().unwrap()
    }

    fn block_txids() -> Vec<H256> {
        vec![
            decode_hex("18afbf37d136ff62644b231fcde72f1fb8edd04a798fb00cb06360da635da275"),
            decode_hex("30b19832a5f4b952e151de77d96139987492becc8b6e1e914c4103cfbb06c01e"),
            decode_hex("b94ed12902e35b29dd53cf25e665b4d0bc92f22adbc383ad90566584902b061d"),
            decode_hex("1920e5d8a10018dc65308bb4d1f11d30b5406c6499688443bfcd1ef364206b14"),
            decode_hex("048f3897c16bdc59ec1187aa080a4b4aa5ec1afcb4b776cf8b8a214b01990a7b"),
            decode_hex("266a660e2be5f2fdf41ae21d5a29c4db6270b2686dfe3902bd2dd3bca3626d7c"),
            decode_hex("17c3b888226ce70908303eaecb88ba02aa5ab858fade8576261b1203c6885528"),
            decode_hex("8a06d54b8b411e99b7e4d60c330b8cde4feb23d62edfc25047c4d837dfb5b253"),
        ]
    }

    // Hash pairs of items recursively until a single value is obtained
    fn merkle_root_calculator(hash_list: &[H256]) -> H256 {
        if hash_list.len() == 1 {
            return hash_list[0].clone();
        }

        let mut new_hash_list = Vec::new();

        for i in (0..hash_list.len() - 1).step_by(2) {
            new_hash_list.push(compute_hash(&hash_list[i], &hash_list[i + 1]));
        }

        // If list length is odd, we must hash a last item twice
        if hash_list.len() % 2 == 1 {
            new_hash_list.push(compute_hash(
                &hash_list[hash_list.len() - 1],
                &hash_list[hash_list.len() - 1],
            ));
        }

        merkle_root_calculator(&new_hash_list)
    }

    #[test]
    fn merkle_root_calculation() {
        let expected_merkle_root =
            decode_hex("7c8708d1f517caf3082d95cf1f6ced11a009318338e720ecee58a2b4e643d56a");
        assert_eq!(merkle_root_calculator(&block_txids()), expected_merkle_root);
    }

    #[test]
    fn path_for_first_transaction() {
        let txids = block_txids();
        let target = txids[0].clone();
        let (proof, position) = merkle_path(txids, &target);
        assert_eq!(position, 0);
        assert_eq!(proof.len(), 3);
    }

    #[test]
    fn path_folds_back_to_root() {
        let txids = block_txids();
        let root = merkle_root_calculator(&txids);

        for (position, txid) in txids.iter().enumerate() {
            let (proof, reported) = merkle_path(txids.clone(), txid);
            assert_eq!(reported, position as i64);
            assert_eq!(compute_root_from_merkle_proof(txid, position, &proof), root);
        }
    }

    #[test]
    fn path_with_odd_transaction_count() {
        let txids: Vec<H256> = block_txids().into_iter().take(5).collect();
        let root = merkle_root_calculator(&txids);
        let target = txids[4].clone();

        let (proof, position) = merkle_path(txids, &target);
        assert_eq!(position, 4);
        assert_eq!(compute_root_from_merkle_proof(&target, 4, &proof), root);
    }

    #[test]
    fn missing_transaction_reports_negative_position() {
        let target =
            decode_hex("18afbf37d136ff62644b231fcde72f1fb8edd04a798fb00cb06360da635da270");
        let (proof, position) = merkle_path(block_txids(), &target);
        assert_eq!(position, -1);
        assert!(proof.is_empty());
    }

    #[test]
    fn single_transaction_block() {
        let txids = vec![block_txids()[0].clone()];
        let target = txids[0].clone();
        let (proof, position) = merkle_path(txids, &target);
        assert_eq!(position, 0);
        assert!(proof.is_empty());
    }
}
