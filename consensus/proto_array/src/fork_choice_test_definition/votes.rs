use super::*;

fn find_head(balances: &[u64], expected_head: u64) -> Operation {
    Operation::FindHead {
        justified_checkpoint: get_checkpoint(0),
        finalized_checkpoint: get_checkpoint(0),
        justified_state_balances: balances.to_vec(),
        expected_head: get_root(expected_head),
    }
}

fn attest(validator_index: usize, block_root: u64, target_epoch: u64) -> Operation {
    Operation::ProcessAttestation {
        validator_index,
        block_root: get_root(block_root),
        target_epoch: Epoch::new(target_epoch),
    }
}

fn assert_weight(block_root: u64, weight: u64) -> Operation {
    Operation::AssertWeight {
        block_root: get_root(block_root),
        weight,
    }
}

pub fn get_votes_test_definition() -> ForkChoiceTestDefinition {
    let operations = vec![
        //          0
        //         / \
        //        1   2
        process_block(1, 1, 0),
        process_block(1, 2, 0),
        // Validator 0 (100) votes for 1, validator 1 (50) votes for 2.
        attest(0, 1, 0),
        attest(1, 2, 0),
        // Votes do not carry weight until the head is recomputed.
        assert_weight(1, 0),
        find_head(&[100, 50], 1),
        assert_weight(1, 100),
        assert_weight(2, 50),
        assert_weight(0, 150),
        // A new validator (100) joins block 2, which overtakes 1 with 150.
        attest(2, 2, 0),
        find_head(&[100, 50, 100], 2),
        assert_weight(1, 100),
        assert_weight(2, 150),
        assert_weight(0, 250),
        // A vote for an older target epoch is ignored.
        attest(2, 1, 0),
        find_head(&[100, 50, 100], 2),
        //          0
        //         / \
        //        1   2
        //        |
        //        3
        //
        // Validators 0 and 2 move to 3 in a later epoch.
        process_block(2, 3, 1),
        attest(0, 3, 1),
        attest(2, 3, 1),
        find_head(&[100, 50, 100], 3),
        assert_weight(3, 200),
        assert_weight(1, 200),
        assert_weight(2, 50),
        // The justified balance of validator 2 drops; weights follow it without any new vote.
        find_head(&[100, 50, 10], 3),
        assert_weight(3, 110),
        assert_weight(0, 160),
        // Validator 2 leaves the registry entirely.
        find_head(&[100, 50], 3),
        assert_weight(3, 100),
        assert_weight(1, 100),
        // Validator 0 loses most of its balance, and 2 wins.
        find_head(&[10, 50], 2),
        assert_weight(1, 10),
        assert_weight(2, 50),
        // Finalize block 1. Block 2 is not a descendant and is pruned.
        Operation::Prune {
            finalized_root: get_root(1),
            prune_threshold: 1,
            expected_len: 2,
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

/// A boosted block outweighs an attested sibling, and the boost is withdrawn on the next head
/// computation that does not carry it.
pub fn get_proposer_boost_test_definition() -> ForkChoiceTestDefinition {
    // Total active balance of 2036 gives a committee weight of 63 and a boost of 31.
    let mut balances = vec![32; 64];
    balances[0] = 20;

    let operations = vec![
        process_block(1, 1, 0),
        process_block(1, 2, 0),
        attest(0, 1, 0),
        find_head(&balances, 1),
        Operation::ProposerBoostFindHead {
            justified_checkpoint: get_checkpoint(0),
            finalized_checkpoint: get_checkpoint(0),
            justified_state_balances: balances.clone(),
            expected_head: get_root(2),
            proposer_boost_root: get_root(2),
        },
        assert_weight(2, 31),
        assert_weight(1, 20),
        find_head(&balances, 1),
        assert_weight(2, 0),
        assert_weight(0, 20),
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
        let test = get_votes_test_definition();
        test.run();
    }

    #[test]
    fn proposer_boost() {
        let test = get_proposer_boost_test_definition();
        test.run();
    }
}
