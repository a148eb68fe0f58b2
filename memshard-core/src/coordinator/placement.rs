//! Chunk to node placement.
//!
//! Kept as a pure function of `(chunk_index, node_count)` so the fan-out code
//! never depends on how a node is chosen.

/// Static round-robin placement: chunk `i` lives on node `i mod node_count`.
///
/// Deterministic and stateless; the same index always maps to the same node
/// while the node list is unchanged. `node_count` must be non-zero.
pub fn node_for_chunk(chunk_index: usize, node_count: usize) -> usize {
    chunk_index % node_count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_robin_wraps_around() {
        let placed: Vec<usize> = (0..8).map(|index| node_for_chunk(index, 3)).collect();
        assert_eq!(placed, vec![0, 1, 2, 0, 1, 2, 0, 1]);
    }

    #[test]
    fn test_single_node_takes_everything() {
        assert!((0..16).all(|index| node_for_chunk(index, 1) == 0));
    }
}
