use super::*;

fn find_head(balances: &[u64], expected_head: u64) -> Operation {
    Operation::FindHead {
        justified_checkpoint: get_checkpoint(0),
        finalized_checkpoint: get_checkpoint(0),
        justified_state_balances: balances.to_vec(),
        expected_head: get_root(expected_head),
    }
}

fn attest(validator_index: usize, block_root: u64) -> Operation {
    Operation::ProcessAttestation {
        validator_index,
        block_root: get_root(block_root),
        target_epoch: Epoch::new(0),
    }
}

fn is_invalid(block_root: u64, is_invalid: bool) -> Operation {
    Operation::AssertExecutionStatus {
        block_root: get_root(block_root),
        is_invalid,
    }
}

/// Invalidating a head back to a known valid ancestor removes the invalid branch from the head
/// race and forbids building on it.
pub fn get_execution_status_test_definition_01() -> ForkChoiceTestDefinition {
    let balances = [2, 1];

    let operations = vec![
        //          0
        //         / \
        //        1   2
        //        |
        //        3
        process_block(1, 1, 0),
        process_block(1, 2, 0),
        process_block(2, 3, 1),
        attest(0, 3),
        attest(1, 2),
        find_head(&balances, 3),
        // The EL reports 3 as invalid, with 1 as the latest valid ancestor.
        Operation::InvalidatePayload {
            head_block_root: get_root(3),
            latest_valid_ancestor_root: Some(get_hash(1)),
        },
        is_invalid(3, true),
        is_invalid(1, false),
        is_invalid(2, false),
        // The invalid block loses its weight, which also leaves its ancestors.
        find_head(&balances, 2),
        Operation::AssertWeight {
            block_root: get_root(3),
            weight: 0,
        },
        Operation::AssertWeight {
            block_root: get_root(1),
            weight: 0,
        },
        Operation::AssertWeight {
            block_root: get_root(0),
            weight: 1,
        },
        // Children of an invalid block are rejected.
        Operation::InvalidProcessBlock {
            slot: Slot::new(3),
            root: get_root(4),
            parent_root: get_root(3),
        },
        // Validating 2 also validates the anchor.
        Operation::ValidatePayload {
            block_root: get_root(2),
        },
        find_head(&balances, 2),
    ];

    ForkChoiceTestDefinition {
        finalized_block_slot: Slot::new(0),
        current_slot: Slot::new(0),
        justified_checkpoint: get_checkpoint(0),
        finalized_checkpoint: get_checkpoint(0),
        operations,
    }
}

/// Invalidating a single block invalidates all of its descendants.
pub fn get_execution_status_test_definition_02() -> ForkChoiceTestDefinition {
    let balances = [5];

    let operations = vec![
        // 0 <- 1 <- 2 <- 3
        process_block(1, 1, 0),
        process_block(2, 2, 1),
        process_block(3, 3, 2),
        attest(0, 3),
        find_head(&balances, 3),
        Operation::InvalidatePayload {
            head_block_root: get_root(1),
            latest_valid_ancestor_root: None,
        },
        is_invalid(0, false),
        is_invalid(1, true),
        is_invalid(2, true),
        is_invalid(3, true),
        // With every descendant invalid, the anchor is the only viable head.
        find_head(&balances, 0),
        Operation::AssertWeight {
            block_root: get_root(0),
            weight: 0,
        },
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
    fn test_01() {
        let test = get_execution_status_test_definition_01();
        test.run();
    }

    #[test]
    fn test_02() {
        let test = get_execution_status_test_definition_02();
        test.run();
    }
}
