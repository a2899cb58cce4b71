use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use tokio::sync::mpsc;
use tracing::info;

use crate::common::crypto::{PartyId, SignatureAuthority};
use crate::config::{ConfigError, SimulationConfig};
use crate::constants::DEFAULT_CORRUPTION_DIVISOR;
use super::adversary::{AdversaryKind, AdversaryStrategy};
use super::message::{Bit, Round};
use super::node::{Honesty, NodeState};
use super::scheduler::{Envelope, RoundHistogram, RoundScheduler};

/// Final outputs of a run: one decision per party plus the per-round
/// delivery histogram. This is the whole surface reporting and test
/// harnesses consume.
#[derive(Debug)]
pub struct SimulationReport {
    pub decisions: BTreeMap<PartyId, Bit>,
    pub histogram: RoundHistogram,
    pub sender: PartyId,
    pub corrupt: BTreeSet<PartyId>,
}

impl SimulationReport {
    pub fn honest_parties(&self) -> Vec<PartyId> {
        self.decisions
            .keys()
            .copied()
            .filter(|id| !self.corrupt.contains(id))
            .collect()
    }

    pub fn corrupt_parties(&self) -> Vec<PartyId> {
        self.corrupt.iter().copied().collect()
    }

    pub fn honest_decisions(&self) -> Vec<Bit> {
        self.honest_parties()
            .iter()
            .map(|id| self.decisions[id])
            .collect()
    }
}

/// Drives one protocol run: seeds the sender, closes `f + 1` synchronous
/// rounds through the scheduler, then collects every party's decision.
pub struct Simulation {
    nodes: Vec<NodeState>,
    pending: Vec<Envelope>,
    rounds: usize,
    sender: PartyId,
    corrupt: BTreeSet<PartyId>,
}

impl Simulation {
    /// Builds a run using the configured built-in adversary kind.
    pub fn new(config: SimulationConfig) -> Result<Self, ConfigError> {
        let kind = config.adversary;
        Self::with_adversary(config, move |_| kind.build())
    }

    /// Builds a run with a caller-supplied strategy per corrupt party.
    pub fn with_adversary(
        config: SimulationConfig,
        strategy: impl Fn(PartyId) -> Box<dyn AdversaryStrategy>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let roster: Vec<PartyId> = (1..=config.num_parties).collect();
        let corrupt = select_corrupt(&config);
        let (authority, mut handles) = SignatureAuthority::generate(roster.iter().copied());
        let authority = Arc::new(authority);

        let mut nodes = Vec::with_capacity(roster.len());
        for &id in &roster {
            let honesty = if corrupt.contains(&id) {
                Honesty::Corrupt {
                    strategy: strategy(id),
                    roster: roster.clone(),
                    corrupt: corrupt.clone(),
                }
            } else {
                Honesty::Honest
            };
            let signer = handles.remove(&id).expect("one handle issued per party");
            nodes.push(NodeState::new(
                id,
                config.sender,
                honesty,
                signer,
                Arc::clone(&authority),
            ));
        }

        let sender_index = roster
            .iter()
            .position(|id| *id == config.sender)
            .expect("sender identity validated against the roster");
        let pending = nodes[sender_index].seed(config.input_bit);

        Ok(Simulation {
            nodes,
            pending,
            rounds: config.num_corrupt as usize + 1,
            sender: config.sender,
            corrupt,
        })
    }

    /// Runs rounds `0..=f` and collects decisions. Termination is
    /// structural: the round count is fixed at construction.
    pub async fn run(self) -> SimulationReport {
        let roster: Vec<PartyId> = self.nodes.iter().map(|node| node.id).collect();

        let mut events = BTreeMap::new();
        let mut replies = BTreeMap::new();
        for node in self.nodes {
            let (event_tx, event_rx) = mpsc::channel(8);
            let (reply_tx, reply_rx) = mpsc::channel(8);
            events.insert(node.id, event_tx);
            replies.insert(node.id, reply_rx);
            tokio::spawn(node.run(event_rx, reply_tx));
        }

        let mut scheduler = RoundScheduler::new(
            roster,
            events,
            replies,
            RoundHistogram::with_rounds(self.rounds),
        );

        let mut pending = self.pending;
        for round in 0..self.rounds {
            pending = scheduler.run_round(round as Round, pending).await;
        }
        // Traffic queued during round f has nowhere to go; it is dropped
        // with the scheduler.
        let decisions = scheduler.collect_decisions().await;
        info!(rounds = self.rounds, parties = decisions.len(), "run complete");

        SimulationReport {
            decisions,
            histogram: scheduler.histogram,
            sender: self.sender,
            corrupt: self.corrupt,
        }
    }
}

/// Honors an explicit corruption set, otherwise samples one: the sender
/// first when it is corrupt, the remainder drawn from the other parties.
fn select_corrupt(config: &SimulationConfig) -> BTreeSet<PartyId> {
    if let Some(set) = &config.corruption {
        return set.clone();
    }

    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut corrupt = BTreeSet::new();
    let mut budget = config.num_corrupt as usize;
    if config.corrupt_sender {
        corrupt.insert(config.sender);
        budget -= 1;
    }
    let candidates: Vec<PartyId> = (1..=config.num_parties)
        .filter(|id| *id != config.sender)
        .collect();
    corrupt.extend(candidates.choose_multiple(&mut rng, budget).copied());
    corrupt
}

/// Convenience entry point: corrupt `n / 3` parties unless told otherwise,
/// run, return the report. With a corrupt sender the deterministic
/// worst case is equivocation, so that is what it gets.
pub async fn run_simulation(
    num_parties: u32,
    input_bit: Bit,
    num_corrupt: Option<u32>,
    corrupt_sender: bool,
) -> Result<SimulationReport, ConfigError> {
    let num_corrupt = num_corrupt.unwrap_or(num_parties / DEFAULT_CORRUPTION_DIVISOR);
    let mut config = SimulationConfig::new(num_parties, num_corrupt, input_bit);
    config.corrupt_sender = corrupt_sender;
    if corrupt_sender {
        config.adversary = AdversaryKind::Equivocate;
    }
    Ok(Simulation::new(config)?.run().await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;

    #[tokio::test]
    async fn test_seeded_corruption_is_reproducible() {
        let mut config = SimulationConfig::new(10, 3, Bit::One);
        config.seed = Some(42);

        let first = Simulation::new(config.clone()).unwrap().run().await;
        let second = Simulation::new(config).unwrap().run().await;

        assert_eq!(first.corrupt, second.corrupt);
        assert_eq!(first.decisions, second.decisions);
        assert_eq!(first.histogram, second.histogram);
    }

    #[tokio::test]
    async fn test_explicit_corruption_set_is_honored() {
        let mut config = SimulationConfig::new(6, 2, Bit::One);
        config.corruption = Some([3, 5].into_iter().collect());

        let report = Simulation::new(config).unwrap().run().await;
        assert_eq!(report.corrupt_parties(), vec![3, 5]);
        assert_eq!(report.honest_parties(), vec![1, 2, 4, 6]);
    }

    #[tokio::test]
    async fn test_zero_corruption_runs_a_single_round() {
        let config = SimulationConfig::new(4, 0, Bit::Zero);

        let report = Simulation::new(config).unwrap().run().await;
        assert_eq!(report.histogram.num_rounds(), 1);
        assert_eq!(report.decisions.len(), 4);
        assert!(report.decisions.values().all(|bit| *bit == Bit::Zero));
        // One delivery per non-sender party.
        assert_eq!(report.histogram.rounds[0].zeros, 3);
    }

    #[tokio::test]
    async fn test_silent_corrupt_sender_defaults_everyone() {
        let mut config = SimulationConfig::new(2, 1, Bit::One);
        config.corrupt_sender = true;
        config.corruption = Some([1].into_iter().collect());

        let report = Simulation::new(config).unwrap().run().await;
        assert_eq!(report.decisions[&2], Bit::Zero);
        assert_eq!(report.histogram.num_rounds(), 2);
        assert_eq!(report.histogram.rounds[0].total(), 0);
    }

    #[tokio::test]
    async fn test_construction_rejects_bad_config() {
        let config = SimulationConfig::new(4, 4, Bit::One);
        let err = Simulation::new(config).err().unwrap();
        assert_eq!(
            err,
            ConfigError::TooManyCorrupt { num_corrupt: 4, num_parties: 4 }
        );
    }

    #[tokio::test]
    async fn test_run_simulation_defaults() {
        let report = run_simulation(9, Bit::One, None, false).await.unwrap();
        // f = 9 / 3 = 3 corrupt parties, f + 1 rounds.
        assert_eq!(report.corrupt.len(), 3);
        assert_eq!(report.histogram.num_rounds(), 4);
        assert!(!report.corrupt.contains(&report.sender));
    }
}
