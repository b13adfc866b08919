use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug};
use std::str::FromStr;

const MAINNET: &str = "mainnet";
const MINIMAL: &str = "minimal";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EthSpecId {
    Mainnet,
    Minimal,
}

impl FromStr for EthSpecId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            MAINNET => Ok(EthSpecId::Mainnet),
            MINIMAL => Ok(EthSpecId::Minimal),
            _ => Err(format!("Unknown eth spec: {}", s)),
        }
    }
}

impl fmt::Display for EthSpecId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EthSpecId::Mainnet => MAINNET,
            EthSpecId::Minimal => MINIMAL,
        };
        write!(f, "{}", s)
    }
}

/// Compile-time preset values which fork choice depends upon.
pub trait EthSpec: 'static + Default + Sync + Send + Clone + Debug + PartialEq + Eq {
    fn slots_per_epoch() -> u64;

    /// The number of slots that a block root is kept for in the state.
    fn slots_per_historical_root() -> usize;

    fn spec_name() -> EthSpecId;
}

/// Ethereum Foundation specifications.
#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct MainnetEthSpec;

impl EthSpec for MainnetEthSpec {
    fn slots_per_epoch() -> u64 {
        32
    }

    fn slots_per_historical_root() -> usize {
        8192
    }

    fn spec_name() -> EthSpecId {
        EthSpecId::Mainnet
    }
}

/// Ethereum Foundation minimal spec, as defined in the eth2.0-specs repo.
#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct MinimalEthSpec;

impl EthSpec for MinimalEthSpec {
    fn slots_per_epoch() -> u64 {
        8
    }

    fn slots_per_historical_root() -> usize {
        64
    }

    fn spec_name() -> EthSpecId {
        EthSpecId::Minimal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_ids_round_trip_through_strings() {
        for id in [EthSpecId::Mainnet, EthSpecId::Minimal] {
            assert_eq!(id.to_string().parse::<EthSpecId>(), Ok(id));
        }
        assert!("gnosis".parse::<EthSpecId>().is_err());
        assert_eq!(MinimalEthSpec::spec_name(), EthSpecId::Minimal);
    }
}
