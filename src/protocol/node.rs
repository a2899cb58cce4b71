use std::collections::{BTreeSet, HashSet};
use std::mem;
use std::sync::Arc;

use tokio::sync::mpsc::{Receiver, Sender};
use tracing::debug;

use crate::common::crypto::{PartyId, SignatureAuthority, SigningHandle};
use super::adversary::{AdversaryCtx, AdversaryStrategy};
use super::message::{Bit, Message, Round, SignatureChain};
use super::scheduler::{Envelope, NodeEvent, NodeReply, Recipients};

/*
    An honest party extracts a bit the first time it arrives under a valid
    chain of exactly round + 1 distinct signatures headed by the sender,
    then relays the chain extended with its own signature. Everything else
    -- bad signatures, wrong-length chains, duplicates, chains the party
    already signed -- is expected byzantine noise and is dropped silently.
*/

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Role {
    Sender,
    Receiver,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Phase {
    Idle,
    Extracting,
    Decided,
}

/// Whether the party follows the protocol or defers to an adversary
/// strategy. A corrupt party carries the roster and colluder set its
/// strategy is entitled to know about.
pub enum Honesty {
    Honest,
    Corrupt {
        strategy: Box<dyn AdversaryStrategy>,
        roster: Vec<PartyId>,
        corrupt: BTreeSet<PartyId>,
    },
}

/// Bits certified as originating from the sender. Grows monotonically over
/// a run and is bounded by {0, 1}.
#[derive(Clone, Default, Debug)]
pub struct ExtractedSet {
    bits: BTreeSet<Bit>,
}

impl ExtractedSet {
    /// Returns true if the bit was newly added.
    pub fn insert(&mut self, bit: Bit) -> bool {
        self.bits.insert(bit)
    }

    pub fn contains(&self, bit: Bit) -> bool {
        self.bits.contains(&bit)
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// The extracted bit, if exactly one was extracted.
    pub fn sole(&self) -> Option<Bit> {
        if self.bits.len() == 1 {
            self.bits.iter().next().copied()
        } else {
            None
        }
    }
}

/// Per-party protocol state machine.
pub struct NodeState {
    pub id: PartyId,
    pub role: Role,
    pub phase: Phase,
    pub extracted: ExtractedSet,
    sender: PartyId,
    honesty: Honesty,
    seen: HashSet<(Bit, Vec<PartyId>)>,
    outbound: Vec<Envelope>,
    signer: SigningHandle,
    authority: Arc<SignatureAuthority>,
}

impl NodeState {
    pub fn new(
        id: PartyId,
        sender: PartyId,
        honesty: Honesty,
        signer: SigningHandle,
        authority: Arc<SignatureAuthority>,
    ) -> Self {
        NodeState {
            id,
            role: if id == sender { Role::Sender } else { Role::Receiver },
            phase: Phase::Idle,
            extracted: ExtractedSet::default(),
            sender,
            honesty,
            seen: HashSet::new(),
            outbound: Vec::new(),
            signer,
            authority,
        }
    }

    pub fn is_corrupt(&self) -> bool {
        matches!(self.honesty, Honesty::Corrupt { .. })
    }

    /// Queues the sender's round-0 broadcast ahead of the first delivery:
    /// an honest sender extracts its own input and signs the length-1
    /// chain; a corrupt sender's opening move comes from its strategy.
    /// Receivers queue nothing.
    pub fn seed(&mut self, input: Bit) -> Vec<Envelope> {
        self.phase = Phase::Extracting;
        if self.role != Role::Sender {
            return Vec::new();
        }
        match &mut self.honesty {
            Honesty::Honest => {
                self.extracted.insert(input);
                let chain = SignatureChain::originate(input, &self.signer);
                vec![Envelope {
                    from: self.id,
                    to: Recipients::AllOthers,
                    msg: Message::new(input, chain),
                }]
            }
            Honesty::Corrupt { strategy, roster, corrupt } => {
                let ctx = AdversaryCtx {
                    id: self.id,
                    sender: self.sender,
                    roster: roster.as_slice(),
                    corrupt: &*corrupt,
                    signer: &self.signer,
                };
                let sends = strategy.initial_sends(&ctx, input);
                sends
                    .into_iter()
                    .map(|out| Envelope { from: self.id, to: out.to, msg: out.msg })
                    .collect()
            }
        }
    }

    /// The receive rule. Rejections are silent by design: malformed,
    /// stale, duplicate and replayed traffic is what a byzantine network
    /// looks like, not an error in this node.
    pub fn on_message(&mut self, msg: Message, round: Round) {
        if !msg.verify(&self.authority) {
            debug!(party = self.id, round, "dropping message with invalid chain");
            return;
        }
        if msg.chain.head() != Some(self.sender) {
            debug!(party = self.id, round, "dropping chain not headed by the sender");
            return;
        }
        if msg.chain.len() != round + 1 {
            debug!(
                party = self.id,
                round,
                chain_len = msg.chain.len(),
                "dropping round-ineligible chain"
            );
            return;
        }
        if !self.seen.insert(msg.dedup_key()) {
            return;
        }
        if msg.chain.contains(self.id) {
            return;
        }

        match &mut self.honesty {
            Honesty::Honest => {
                if self.extracted.insert(msg.bit) {
                    let extended = msg.chain.extend(msg.bit, &self.signer);
                    self.outbound.push(Envelope {
                        from: self.id,
                        to: Recipients::AllOthers,
                        msg: Message::new(msg.bit, extended),
                    });
                }
            }
            Honesty::Corrupt { strategy, roster, corrupt } => {
                let ctx = AdversaryCtx {
                    id: self.id,
                    sender: self.sender,
                    roster: roster.as_slice(),
                    corrupt: &*corrupt,
                    signer: &self.signer,
                };
                let sends = strategy.on_receive(&ctx, &msg, round);
                self.outbound.extend(
                    sends
                        .into_iter()
                        .map(|out| Envelope { from: self.id, to: out.to, msg: out.msg }),
                );
            }
        }
    }

    /// Extract-and-default output rule, applied once after the final
    /// round: the sole extracted bit if there is exactly one, otherwise
    /// the default. Ambiguity degrades to the default instead of failing.
    pub fn decide(&mut self) -> Bit {
        self.phase = Phase::Decided;
        self.extracted.sole().unwrap_or(Bit::Zero)
    }

    pub fn drain_outbound(&mut self) -> Vec<Envelope> {
        mem::take(&mut self.outbound)
    }

    /// Event loop for one party task: process each round's deliveries,
    /// hand the queued forwards back to the scheduler, and report the
    /// decision when asked.
    pub async fn run(mut self, mut events: Receiver<NodeEvent>, replies: Sender<NodeReply>) {
        while let Some(event) = events.recv().await {
            match event {
                NodeEvent::Deliver { round, messages } => {
                    if self.phase == Phase::Idle {
                        self.phase = Phase::Extracting;
                    }
                    for msg in messages {
                        self.on_message(msg, round);
                    }
                    let forwards = self.drain_outbound();
                    if replies.send(NodeReply::Forwards(forwards)).await.is_err() {
                        break;
                    }
                }
                NodeEvent::Decide => {
                    let bit = self.decide();
                    let _ = replies
                        .send(NodeReply::Decision { id: self.id, bit })
                        .await;
                    break;
                }
            }
        }
    }
}
