pub mod adversary;
pub mod driver;
pub mod message;
pub mod node;
pub mod scheduler;

pub use adversary::*;
pub use driver::*;
pub use message::*;
pub use node::*;
pub use scheduler::*;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationConfig;

    #[tokio::test]
    async fn test_honest_sender_tolerates_f_corrupt() {
        // Arrange: n = 10, f = 3, honest sender broadcasting 1, with the
        // corrupt parties flooding duplicates and replays.
        let mut config = SimulationConfig::new(10, 3, Bit::One);
        config.adversary = AdversaryKind::Replay;
        config.seed = Some(7);

        // Act
        let report = Simulation::new(config).unwrap().run().await;

        // Assert: validity. Every honest party outputs the sender's bit.
        assert_eq!(report.honest_parties().len(), 7);
        assert!(report.honest_decisions().iter().all(|bit| *bit == Bit::One));

        // Assert: f + 1 rounds, round 0 delivering the sender's bit once
        // to each of the 9 other parties, forwarding traffic in rounds
        // 1 and 2, and a silent final round.
        assert_eq!(report.histogram.num_rounds(), 4);
        assert_eq!(report.histogram.rounds[0], RoundTally { zeros: 0, ones: 9 });
        assert!(report.histogram.rounds[1].ones > 0);
        assert!(report.histogram.rounds[2].ones > 0);
        assert_eq!(report.histogram.rounds[3].total(), 0);
    }

    #[tokio::test]
    async fn test_all_honest_minimal_round_count() {
        // f = 0 still takes round 0 to deliver the sender's bit.
        let config = SimulationConfig::new(4, 0, Bit::Zero);

        let report = Simulation::new(config).unwrap().run().await;

        assert_eq!(report.histogram.num_rounds(), 1);
        assert!(report.decisions.values().all(|bit| *bit == Bit::Zero));
    }

    #[tokio::test]
    async fn test_corrupt_sender_equivocation_stays_consistent() {
        // Arrange: the sender splits the honest parties and tells each
        // half a different bit; two colluders forward selectively.
        let mut config = SimulationConfig::new(10, 3, Bit::One);
        config.corrupt_sender = true;
        config.corruption = Some([1, 2, 3].into_iter().collect());
        config.adversary = AdversaryKind::Equivocate;

        // Act
        let report = Simulation::new(config).unwrap().run().await;

        // Assert: round 0 shows the split (3 zeros, 4 ones across the 7
        // honest parties), yet consistency holds: by round 1 every honest
        // party has seen both bits and defaults.
        assert_eq!(report.histogram.rounds[0], RoundTally { zeros: 3, ones: 4 });
        let decisions = report.honest_decisions();
        assert_eq!(decisions.len(), 7);
        assert!(decisions.iter().all(|bit| *bit == decisions[0]));
        assert_eq!(decisions[0], Bit::Zero);
    }

    #[tokio::test]
    async fn test_validity_under_every_strategy() {
        for kind in [
            AdversaryKind::Silent,
            AdversaryKind::Equivocate,
            AdversaryKind::Replay,
            AdversaryKind::DelayedHonest,
        ] {
            let mut config = SimulationConfig::new(7, 2, Bit::One);
            config.adversary = kind;
            config.seed = Some(11);

            let report = Simulation::new(config).unwrap().run().await;

            assert_eq!(
                report.histogram.num_rounds(),
                3,
                "termination under {kind:?}"
            );
            assert!(
                report.honest_decisions().iter().all(|bit| *bit == Bit::One),
                "validity under {kind:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_consistency_under_every_corrupt_sender_strategy() {
        for kind in [
            AdversaryKind::Silent,
            AdversaryKind::Equivocate,
            AdversaryKind::Replay,
            AdversaryKind::DelayedHonest,
        ] {
            let mut config = SimulationConfig::new(7, 2, Bit::One);
            config.corrupt_sender = true;
            config.corruption = Some([1, 2].into_iter().collect());
            config.adversary = kind;

            let report = Simulation::new(config).unwrap().run().await;

            let decisions = report.honest_decisions();
            assert_eq!(decisions.len(), 5);
            assert!(
                decisions.iter().all(|bit| *bit == decisions[0]),
                "consistency under {kind:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_custom_strategy_hook() {
        // A hand-rolled strategy through the factory constructor: honest
        // forwarding, but only of bit 1.
        struct OneSided {
            forwarded: bool,
        }
        impl AdversaryStrategy for OneSided {
            fn on_receive(
                &mut self,
                ctx: &AdversaryCtx<'_>,
                msg: &Message,
                _round: Round,
            ) -> Vec<Outbound> {
                if msg.bit != Bit::One || self.forwarded {
                    return Vec::new();
                }
                self.forwarded = true;
                vec![Outbound {
                    msg: Message::new(msg.bit, msg.chain.extend(msg.bit, ctx.signer)),
                    to: Recipients::AllOthers,
                }]
            }
        }

        let mut config = SimulationConfig::new(5, 1, Bit::One);
        config.corruption = Some([3].into_iter().collect());
        let simulation =
            Simulation::with_adversary(config, |_| Box::new(OneSided { forwarded: false }))
                .unwrap();

        let report = simulation.run().await;
        assert!(report.honest_decisions().iter().all(|bit| *bit == Bit::One));
    }
}
