use super::*;

/// Builds a tree with no votes at all, so every head decision comes down to the root tie-break.
pub fn get_no_votes_test_definition() -> ForkChoiceTestDefinition {
    let balances = vec![0; 16];
    let find_head = |expected_head: u64| Operation::FindHead {
        justified_checkpoint: get_checkpoint(0),
        finalized_checkpoint: get_checkpoint(0),
        justified_state_balances: balances.clone(),
        expected_head: get_root(expected_head),
    };

    let operations = vec![
        // The anchor is the only block, so it is the head.
        find_head(0),
        // Add a block with a hash of 2.
        //
        //          0
        //         /
        //        2
        process_block(1, 2, 0),
        find_head(2),
        // Add a block with a hash of 1 that comes off the genesis block (this is a fork compared
        // to the previous block).
        //
        //          0
        //         / \
        //        2   1
        //
        // Both have zero weight, so the higher root (2) wins.
        process_block(1, 1, 0),
        find_head(2),
        // Extend the losing branch. Weight is still equal, so the branch starting at 2 keeps
        // winning regardless of its length.
        //
        //          0
        //         / \
        //        2   1
        //            |
        //            3
        process_block(2, 3, 1),
        find_head(2),
        // Add a block with a hash of 4 off the genesis block.
        //
        //          0
        //         /|\
        //        2 1 4
        //          |
        //          3
        process_block(1, 4, 0),
        find_head(4),
        // Extend 4 with 5 and make sure the head follows the best descendant.
        process_block(2, 5, 4),
        find_head(5),
        // Nothing is pruned below the threshold.
        Operation::Prune {
            finalized_root: get_root(0),
            prune_threshold: usize::MAX,
            expected_len: 6,
        },
        find_head(5),
    ];

    ForkChoiceTestDefinition {
        finalized_block_slot: Slot::new(0),
        current_slot: Slot::new(0),
        justified_checkpoint: get_checkpoint(0),
        finalized_checkpoint: get_checkpoint(0),
        operations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test() {
        let test = get_no_votes_test_definition();
        test.run();
    }
}
