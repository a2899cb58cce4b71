//! Run configuration and construction-time validation.
//!
//! A run either passes validation completely or is rejected before round 0;
//! there is no partial-failure mode. Protocol-level garbage is not an error
//! and never surfaces here.

use std::collections::BTreeSet;

use thiserror::Error;

use crate::common::crypto::PartyId;
use crate::constants::{MAX_PARTIES, MIN_PARTIES};
use crate::protocol::{AdversaryKind, Bit};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("number of corrupt parties must be less than total parties ({num_corrupt} >= {num_parties})")]
    TooManyCorrupt { num_corrupt: u32, num_parties: u32 },
    #[error("network needs at least 2 parties, got {0}")]
    TooFewParties(u32),
    #[error("network size {0} too large for efficient simulation (max 50)")]
    NetworkTooLarge(u32),
    #[error("sender identity {0} is outside 1..={1}")]
    SenderOutOfRange(PartyId, u32),
    #[error("a corrupt sender counts toward the corruption bound, but num_corrupt is 0")]
    CorruptSenderWithoutBudget,
    #[error("explicit corruption set is invalid: {0}")]
    BadCorruptionSet(String),
}

/// Inputs for one protocol run.
#[derive(Clone, Debug)]
pub struct SimulationConfig {
    /// Total parties `n`, identities `1..=n`.
    pub num_parties: u32,
    /// Corruption bound `f`; the protocol runs `f + 1` rounds.
    pub num_corrupt: u32,
    /// The bit the sender is broadcasting.
    pub input_bit: Bit,
    /// Whether the designated sender is among the corrupt parties.
    pub corrupt_sender: bool,
    /// Designated sender identity.
    pub sender: PartyId,
    /// Explicit corrupt identities; sampled when absent.
    pub corruption: Option<BTreeSet<PartyId>>,
    /// Strategy assigned to every corrupt party.
    pub adversary: AdversaryKind,
    /// Seed for corrupt-set sampling, for reproducible fixtures.
    pub seed: Option<u64>,
}

impl SimulationConfig {
    pub fn new(num_parties: u32, num_corrupt: u32, input_bit: Bit) -> Self {
        SimulationConfig {
            num_parties,
            num_corrupt,
            input_bit,
            corrupt_sender: false,
            sender: 1,
            corruption: None,
            adversary: AdversaryKind::Silent,
            seed: None,
        }
    }

    /// The single configuration gate, applied before any round runs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_parties < MIN_PARTIES {
            return Err(ConfigError::TooFewParties(self.num_parties));
        }
        if self.num_parties > MAX_PARTIES {
            return Err(ConfigError::NetworkTooLarge(self.num_parties));
        }
        if self.num_corrupt >= self.num_parties {
            return Err(ConfigError::TooManyCorrupt {
                num_corrupt: self.num_corrupt,
                num_parties: self.num_parties,
            });
        }
        if self.sender == 0 || self.sender > self.num_parties {
            return Err(ConfigError::SenderOutOfRange(self.sender, self.num_parties));
        }
        if self.corrupt_sender && self.num_corrupt == 0 {
            return Err(ConfigError::CorruptSenderWithoutBudget);
        }
        if let Some(set) = &self.corruption {
            if set.len() != self.num_corrupt as usize {
                return Err(ConfigError::BadCorruptionSet(format!(
                    "expected {} identities, got {}",
                    self.num_corrupt,
                    set.len()
                )));
            }
            if let Some(unknown) = set.iter().find(|id| **id == 0 || **id > self.num_parties) {
                return Err(ConfigError::BadCorruptionSet(format!(
                    "identity {unknown} is not in the network"
                )));
            }
            if set.contains(&self.sender) != self.corrupt_sender {
                return Err(ConfigError::BadCorruptionSet(
                    "sender membership must match corrupt_sender".into(),
                ));
            }
        }
        Ok(())
    }
}
