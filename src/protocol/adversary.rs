use std::collections::BTreeSet;
use std::mem;

use crate::common::crypto::{PartyId, SigningHandle};
use super::message::{Bit, Message, Round, SignatureChain};
use super::scheduler::Recipients;

/*
    A byzantine party may send anything it can sign: conflicting bits to
    disjoint audiences, duplicates, stale chains, or nothing at all. The
    one thing it cannot do is forge a signature for an identity whose
    signing handle it does not hold.
*/

/// What a corrupt party knows when choosing its sends: its own identity
/// and signing handle, the designated sender, the full roster, and which
/// parties are colluding with it.
pub struct AdversaryCtx<'a> {
    pub id: PartyId,
    pub sender: PartyId,
    pub roster: &'a [PartyId],
    pub corrupt: &'a BTreeSet<PartyId>,
    pub signer: &'a SigningHandle,
}

impl AdversaryCtx<'_> {
    /// Honest parties other than the sender, in identity order.
    pub fn honest_receivers(&self) -> Vec<PartyId> {
        self.roster
            .iter()
            .copied()
            .filter(|id| !self.corrupt.contains(id) && *id != self.sender)
            .collect()
    }
}

/// A send chosen by a strategy. Routing still refuses to reflect it back
/// at the corrupt originator.
pub struct Outbound {
    pub msg: Message,
    pub to: Recipients,
}

/// Behavior of a party under adversary control. Implementations must be
/// deterministic: a byzantine adversary is worst-case, not a coin flip.
pub trait AdversaryStrategy: Send {
    /// Round-0 sends, consulted only when the corrupt party is the
    /// designated sender.
    fn initial_sends(&mut self, _ctx: &AdversaryCtx<'_>, _input: Bit) -> Vec<Outbound> {
        Vec::new()
    }

    /// Reaction to a message that passed the receive-side validation rules.
    fn on_receive(&mut self, ctx: &AdversaryCtx<'_>, msg: &Message, round: Round) -> Vec<Outbound>;
}

/// Built-in strategies selectable from configuration.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AdversaryKind {
    Silent,
    Equivocate,
    Replay,
    DelayedHonest,
}

impl AdversaryKind {
    pub fn build(self) -> Box<dyn AdversaryStrategy> {
        match self {
            AdversaryKind::Silent => Box::new(Silent),
            AdversaryKind::Equivocate => Box::new(Equivocate::default()),
            AdversaryKind::Replay => Box::new(Replay::default()),
            AdversaryKind::DelayedHonest => Box::new(DelayedHonest::default()),
        }
    }
}

/// Drops everything, sends nothing.
#[derive(Default)]
pub struct Silent;

impl AdversaryStrategy for Silent {
    fn on_receive(&mut self, _ctx: &AdversaryCtx<'_>, _msg: &Message, _round: Round) -> Vec<Outbound> {
        Vec::new()
    }
}

/// As sender, splits the honest parties in two and tells each half a
/// different bit. As a receiver, forwards each bit only to the half the
/// conflicting bit was aimed at, keeping the audiences split as long as
/// possible.
#[derive(Default)]
pub struct Equivocate {
    forwarded: BTreeSet<Bit>,
}

impl Equivocate {
    fn halves(ctx: &AdversaryCtx<'_>) -> (Vec<PartyId>, Vec<PartyId>) {
        let honest = ctx.honest_receivers();
        let mid = honest.len() / 2;
        (honest[..mid].to_vec(), honest[mid..].to_vec())
    }
}

impl AdversaryStrategy for Equivocate {
    fn initial_sends(&mut self, ctx: &AdversaryCtx<'_>, _input: Bit) -> Vec<Outbound> {
        let (low, high) = Self::halves(ctx);
        vec![
            Outbound {
                msg: Message::new(Bit::Zero, SignatureChain::originate(Bit::Zero, ctx.signer)),
                to: Recipients::Only(low),
            },
            Outbound {
                msg: Message::new(Bit::One, SignatureChain::originate(Bit::One, ctx.signer)),
                to: Recipients::Only(high),
            },
        ]
    }

    fn on_receive(&mut self, ctx: &AdversaryCtx<'_>, msg: &Message, _round: Round) -> Vec<Outbound> {
        if !self.forwarded.insert(msg.bit) {
            return Vec::new();
        }
        let (low, high) = Self::halves(ctx);
        let targets = match msg.bit {
            Bit::Zero => low,
            Bit::One => high,
        };
        let extended = msg.chain.extend(msg.bit, ctx.signer);
        vec![Outbound {
            msg: Message::new(msg.bit, extended),
            to: Recipients::Only(targets),
        }]
    }
}

/// Forwards honestly but pads the network with duplicate copies and
/// replays its previous extension a round late, exercising the duplicate
/// and chain-length checks on every honest receiver.
#[derive(Default)]
pub struct Replay {
    forwarded: BTreeSet<Bit>,
    stale: Vec<Message>,
}

impl AdversaryStrategy for Replay {
    fn initial_sends(&mut self, ctx: &AdversaryCtx<'_>, input: Bit) -> Vec<Outbound> {
        let msg = Message::new(input, SignatureChain::originate(input, ctx.signer));
        self.stale.push(msg.clone());
        vec![
            Outbound { msg: msg.clone(), to: Recipients::AllOthers },
            Outbound { msg, to: Recipients::AllOthers },
        ]
    }

    fn on_receive(&mut self, ctx: &AdversaryCtx<'_>, msg: &Message, _round: Round) -> Vec<Outbound> {
        let mut sends: Vec<Outbound> = mem::take(&mut self.stale)
            .into_iter()
            .map(|stale| Outbound { msg: stale, to: Recipients::AllOthers })
            .collect();

        if self.forwarded.insert(msg.bit) {
            let extended = Message::new(msg.bit, msg.chain.extend(msg.bit, ctx.signer));
            self.stale.push(extended.clone());
            sends.push(Outbound { msg: extended.clone(), to: Recipients::AllOthers });
            sends.push(Outbound { msg: extended, to: Recipients::AllOthers });
        }
        sends
    }
}

/// Follows the honest extraction rule but releases its forwards at the
/// last legal moment. Round delivery is atomic, so the latest legal
/// release coincides with the on-time one; the strategy exists to pin
/// down that a maximally slow colluder gains nothing.
#[derive(Default)]
pub struct DelayedHonest {
    forwarded: BTreeSet<Bit>,
}

impl AdversaryStrategy for DelayedHonest {
    fn initial_sends(&mut self, ctx: &AdversaryCtx<'_>, input: Bit) -> Vec<Outbound> {
        vec![Outbound {
            msg: Message::new(input, SignatureChain::originate(input, ctx.signer)),
            to: Recipients::AllOthers,
        }]
    }

    fn on_receive(&mut self, ctx: &AdversaryCtx<'_>, msg: &Message, _round: Round) -> Vec<Outbound> {
        if !self.forwarded.insert(msg.bit) {
            return Vec::new();
        }
        vec![Outbound {
            msg: Message::new(msg.bit, msg.chain.extend(msg.bit, ctx.signer)),
            to: Recipients::AllOthers,
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::crypto::SignatureAuthority;

    #[test]
    fn test_silent_sends_nothing() {
        let roster: Vec<PartyId> = (1..=4).collect();
        let corrupt: BTreeSet<PartyId> = [2].into_iter().collect();
        let (_, handles) = SignatureAuthority::generate(roster.iter().copied());
        let ctx = AdversaryCtx {
            id: 2,
            sender: 1,
            roster: &roster,
            corrupt: &corrupt,
            signer: &handles[&2],
        };
        let msg = Message::new(Bit::One, SignatureChain::originate(Bit::One, &handles[&1]));

        let mut strategy = Silent;
        assert!(strategy.on_receive(&ctx, &msg, 0).is_empty());
        assert!(strategy.initial_sends(&ctx, Bit::One).is_empty());
    }

    #[test]
    fn test_equivocating_sender_splits_audience() {
        let roster: Vec<PartyId> = (1..=6).collect();
        let corrupt: BTreeSet<PartyId> = [1, 2].into_iter().collect();
        let (authority, handles) = SignatureAuthority::generate(roster.iter().copied());
        let ctx = AdversaryCtx {
            id: 1,
            sender: 1,
            roster: &roster,
            corrupt: &corrupt,
            signer: &handles[&1],
        };

        let mut strategy = Equivocate::default();
        let sends = strategy.initial_sends(&ctx, Bit::One);
        assert_eq!(sends.len(), 2);
        assert_ne!(sends[0].msg.bit, sends[1].msg.bit);

        let mut targeted = Vec::new();
        for send in &sends {
            assert!(send.msg.verify(&authority));
            match &send.to {
                Recipients::Only(ids) => targeted.extend(ids.iter().copied()),
                Recipients::AllOthers => panic!("equivocation must target subsets"),
            }
        }
        // Disjoint halves covering exactly the honest receivers.
        targeted.sort_unstable();
        assert_eq!(targeted, vec![3, 4, 5, 6]);
    }

    #[test]
    fn test_replay_duplicates_then_replays() {
        let roster: Vec<PartyId> = (1..=4).collect();
        let corrupt: BTreeSet<PartyId> = [2].into_iter().collect();
        let (_, handles) = SignatureAuthority::generate(roster.iter().copied());
        let ctx = AdversaryCtx {
            id: 2,
            sender: 1,
            roster: &roster,
            corrupt: &corrupt,
            signer: &handles[&2],
        };
        let first = Message::new(Bit::One, SignatureChain::originate(Bit::One, &handles[&1]));
        let second = Message::new(
            Bit::One,
            SignatureChain::originate(Bit::One, &handles[&1]).extend(Bit::One, &handles[&3]),
        );

        let mut strategy = Replay::default();
        let sends = strategy.on_receive(&ctx, &first, 0);
        // Fresh bit: two identical copies of the extension.
        assert_eq!(sends.len(), 2);
        assert_eq!(sends[0].msg, sends[1].msg);

        // Seen bit: only the stale replay of the previous extension.
        let replays = strategy.on_receive(&ctx, &second, 1);
        assert_eq!(replays.len(), 1);
        assert_eq!(replays[0].msg, sends[0].msg);
    }

    #[test]
    fn test_delayed_honest_forwards_each_bit_once() {
        let roster: Vec<PartyId> = (1..=4).collect();
        let corrupt: BTreeSet<PartyId> = [3].into_iter().collect();
        let (_, handles) = SignatureAuthority::generate(roster.iter().copied());
        let ctx = AdversaryCtx {
            id: 3,
            sender: 1,
            roster: &roster,
            corrupt: &corrupt,
            signer: &handles[&3],
        };
        let first = Message::new(Bit::One, SignatureChain::originate(Bit::One, &handles[&1]));
        let second = Message::new(
            Bit::One,
            SignatureChain::originate(Bit::One, &handles[&1]).extend(Bit::One, &handles[&2]),
        );

        let mut strategy = DelayedHonest::default();
        assert_eq!(strategy.on_receive(&ctx, &first, 0).len(), 1);
        assert!(strategy.on_receive(&ctx, &second, 1).is_empty());
    }
}
