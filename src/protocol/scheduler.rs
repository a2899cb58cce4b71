use std::collections::BTreeMap;

use tokio::sync::mpsc::{Receiver, Sender};
use tracing::debug;

use crate::common::crypto::PartyId;
use super::message::{Bit, Message, Round};

/// Where an outbound message is routed. `AllOthers` is the honest broadcast
/// rule; corrupt parties may aim at an explicit subset instead.
#[derive(Clone, Debug)]
pub enum Recipients {
    AllOthers,
    Only(Vec<PartyId>),
}

/// A queued send, tagged with its originator so routing never reflects a
/// message back at the party that forwarded it.
#[derive(Clone, Debug)]
pub struct Envelope {
    pub from: PartyId,
    pub to: Recipients,
    pub msg: Message,
}

/// Scheduler-to-party traffic. `Deliver` carries the round number so the
/// clock has a single writer; parties only ever read it.
#[derive(Debug)]
pub enum NodeEvent {
    Deliver { round: Round, messages: Vec<Message> },
    Decide,
}

#[derive(Debug)]
pub enum NodeReply {
    Forwards(Vec<Envelope>),
    Decision { id: PartyId, bit: Bit },
}

/// Deliveries observed in one round, split by bit value.
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub struct RoundTally {
    pub zeros: usize,
    pub ones: usize,
}

impl RoundTally {
    fn record(&mut self, bit: Bit) {
        match bit {
            Bit::Zero => self.zeros += 1,
            Bit::One => self.ones += 1,
        }
    }

    pub fn count(&self, bit: Bit) -> usize {
        match bit {
            Bit::Zero => self.zeros,
            Bit::One => self.ones,
        }
    }

    pub fn total(&self) -> usize {
        self.zeros + self.ones
    }
}

/// Delivery histogram indexed by round, `0..=f`. Injected into the
/// scheduler at construction so observability stays out of the node state
/// machine entirely.
#[derive(Clone, Default, PartialEq, Eq, Debug)]
pub struct RoundHistogram {
    pub rounds: Vec<RoundTally>,
}

impl RoundHistogram {
    pub fn with_rounds(rounds: usize) -> Self {
        RoundHistogram {
            rounds: vec![RoundTally::default(); rounds],
        }
    }

    fn record(&mut self, round: Round, bit: Bit) {
        self.rounds[round].record(bit);
    }

    pub fn num_rounds(&self) -> usize {
        self.rounds.len()
    }
}

/// Enforces the synchronous delivery model: everything queued during round
/// `r` is routed and delivered atomically, and no party sees round `r + 1`
/// traffic until every party has finished processing round `r`.
pub struct RoundScheduler {
    roster: Vec<PartyId>,
    events: BTreeMap<PartyId, Sender<NodeEvent>>,
    replies: BTreeMap<PartyId, Receiver<NodeReply>>,
    pub histogram: RoundHistogram,
}

impl RoundScheduler {
    pub fn new(
        roster: Vec<PartyId>,
        events: BTreeMap<PartyId, Sender<NodeEvent>>,
        replies: BTreeMap<PartyId, Receiver<NodeReply>>,
        histogram: RoundHistogram,
    ) -> Self {
        RoundScheduler {
            roster,
            events,
            replies,
            histogram,
        }
    }

    /// Delivers the previous round's queued sends to their recipients, then
    /// waits for every party's reply before handing back the traffic queued
    /// for the next round. Waiting on all replies is the round barrier.
    pub async fn run_round(&mut self, round: Round, outbound: Vec<Envelope>) -> Vec<Envelope> {
        let mut batches: BTreeMap<PartyId, Vec<Message>> = self
            .roster
            .iter()
            .map(|id| (*id, Vec::new()))
            .collect();

        for envelope in &outbound {
            for recipient in route(envelope, &self.roster) {
                self.histogram.record(round, envelope.msg.bit);
                batches
                    .get_mut(&recipient)
                    .expect("routing targets roster members")
                    .push(envelope.msg.clone());
            }
        }

        // Every party gets a delivery event, empty batches included, so the
        // barrier below collects exactly one reply per party.
        for (id, messages) in batches {
            self.events[&id]
                .send(NodeEvent::Deliver { round, messages })
                .await
                .expect("node task stopped before delivery");
        }

        let mut next = Vec::new();
        for rx in self.replies.values_mut() {
            let reply = rx.recv().await.expect("node task stopped mid-round");
            if let NodeReply::Forwards(forwards) = reply {
                next.extend(forwards);
            }
        }

        debug!(round, delivered = self.histogram.rounds[round].total(), "round closed");
        next
    }

    /// Asks every party for its output once the final round has closed.
    pub async fn collect_decisions(&mut self) -> BTreeMap<PartyId, Bit> {
        for tx in self.events.values() {
            tx.send(NodeEvent::Decide)
                .await
                .expect("node task stopped before decide");
        }

        let mut decisions = BTreeMap::new();
        for rx in self.replies.values_mut() {
            let reply = rx.recv().await.expect("node task stopped before decision");
            if let NodeReply::Decision { id, bit } = reply {
                decisions.insert(id, bit);
            }
        }
        decisions
    }
}

fn route(envelope: &Envelope, roster: &[PartyId]) -> Vec<PartyId> {
    match &envelope.to {
        Recipients::AllOthers => roster
            .iter()
            .copied()
            .filter(|id| *id != envelope.from)
            .collect(),
        Recipients::Only(ids) => ids
            .iter()
            .copied()
            .filter(|id| *id != envelope.from && roster.contains(id))
            .collect(),
    }
}
