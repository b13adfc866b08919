use super::*;

fn find_head(justified: u64, finalized: u64, expected_head: u64) -> Operation {
    Operation::FindHead {
        justified_checkpoint: get_checkpoint(justified),
        finalized_checkpoint: get_checkpoint(finalized),
        justified_state_balances: vec![1],
        expected_head: get_root(expected_head),
    }
}

fn invalid_find_head(justified: u64, finalized: u64) -> Operation {
    Operation::InvalidFindHead {
        justified_checkpoint: get_checkpoint(justified),
        finalized_checkpoint: get_checkpoint(finalized),
        justified_state_balances: vec![1],
    }
}

/// Blocks which disagree with the store's justified or finalized checkpoint are filtered from
/// the head search.
pub fn get_ffg_case_01_test_definition() -> ForkChoiceTestDefinition {
    let operations = vec![
        //          0
        //         / \
        //        1   3
        //        |
        //        2 <- justifies 1 at epoch 1
        process_block(1, 1, 0),
        Operation::ProcessBlock {
            slot: Slot::new(2),
            root: get_root(2),
            parent_root: get_root(1),
            justified_checkpoint: get_checkpoint(1),
            finalized_checkpoint: get_checkpoint(0),
            unrealized_justified_checkpoint: None,
        },
        process_block(1, 3, 0),
        // With a genesis justified checkpoint every block is viable and the tie-break picks 3.
        find_head(0, 0, 3),
        // Once 1 is justified only 2 agrees with the store.
        find_head(1, 0, 2),
        // An unknown justified root.
        invalid_find_head(9, 0),
        // Finalizing 1 leaves no block that agrees with the store.
        invalid_find_head(1, 1),
        // Finality never moves backwards.
        invalid_find_head(1, 0),
    ];

    ForkChoiceTestDefinition {
        finalized_block_slot: Slot::new(0),
        current_slot: Slot::new(0),
        justified_checkpoint: get_checkpoint(0),
        finalized_checkpoint: get_checkpoint(0),
        operations,
    }
}

/// Blocks from a past epoch are judged by their unrealized checkpoints.
pub fn get_ffg_case_02_test_definition() -> ForkChoiceTestDefinition {
    let operations = vec![
        //          0
        //         / \
        //        1   3
        //        |
        //        2 <- would justify 1 at the next epoch boundary
        process_block(1, 1, 0),
        Operation::ProcessBlock {
            slot: Slot::new(2),
            root: get_root(2),
            parent_root: get_root(1),
            justified_checkpoint: get_checkpoint(0),
            finalized_checkpoint: get_checkpoint(0),
            unrealized_justified_checkpoint: Some(get_checkpoint(1)),
        },
        process_block(3, 3, 0),
        find_head(0, 0, 3),
        find_head(1, 0, 2),
    ];

    ForkChoiceTestDefinition {
        finalized_block_slot: Slot::new(0),
        // Epoch 2, so every block above is from a previous epoch.
        current_slot: Slot::new(64),
        justified_checkpoint: get_checkpoint(0),
        finalized_checkpoint: get_checkpoint(0),
        operations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ffg_case_01() {
        let test = get_ffg_case_01_test_definition();
        test.run();
    }

    #[test]
    fn ffg_case_02() {
        let test = get_ffg_case_02_test_definition();
        test.run();
    }
}
