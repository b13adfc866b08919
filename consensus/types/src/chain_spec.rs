use crate::{Epoch, EthSpec, Slot};
use serde::{Deserialize, Serialize};

/// Holds all the "constants" for a BeaconChain that fork choice depends upon.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct ChainSpec {
    pub config_name: Option<String>,
    pub genesis_slot: Slot,
    pub far_future_epoch: Epoch,
    pub seconds_per_slot: u64,
    /// A block arriving within the first `seconds_per_slot / intervals_per_slot` seconds of its
    /// slot is considered timely.
    pub intervals_per_slot: u64,
    /// Percentage of the per-slot committee weight given to a timely proposal.
    ///
    /// Setting this to `None` disables proposer boost.
    pub proposer_score_boost: Option<u64>,
    pub max_effective_balance: u64,
    pub effective_balance_increment: u64,
}

impl ChainSpec {
    /// Returns a `ChainSpec` compatible with the Ethereum Foundation specification.
    pub fn mainnet() -> Self {
        Self {
            config_name: Some("mainnet".to_string()),
            genesis_slot: Slot::new(0),
            far_future_epoch: Epoch::new(u64::MAX),
            seconds_per_slot: 12,
            intervals_per_slot: 3,
            proposer_score_boost: Some(40),
            max_effective_balance: 32_000_000_000,
            effective_balance_increment: 1_000_000_000,
        }
    }

    /// Ethereum Foundation minimal spec, as defined in the eth2.0-specs repo.
    pub fn minimal() -> Self {
        Self {
            config_name: Some("minimal".to_string()),
            seconds_per_slot: 6,
            ..ChainSpec::mainnet()
        }
    }

    /// Returns the spec matching the preset of `E`.
    pub fn for_eth_spec<E: EthSpec>() -> Self {
        match E::spec_name() {
            crate::EthSpecId::Mainnet => Self::mainnet(),
            crate::EthSpecId::Minimal => Self::minimal(),
        }
    }
}

impl Default for ChainSpec {
    fn default() -> Self {
        Self::mainnet()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MinimalEthSpec;

    #[test]
    fn minimal_inherits_mainnet_fork_choice_params() {
        let spec = ChainSpec::for_eth_spec::<MinimalEthSpec>();
        assert_eq!(spec.seconds_per_slot, 6);
        assert_eq!(spec.proposer_score_boost, ChainSpec::mainnet().proposer_score_boost);
    }

    #[test]
    fn yaml_round_trip() {
        let spec = ChainSpec::mainnet();
        let yaml = serde_yaml::to_string(&spec).unwrap();
        assert_eq!(serde_yaml::from_str::<ChainSpec>(&yaml).unwrap(), spec);
    }
}
