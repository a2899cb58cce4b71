use std::fmt;

use sha2::{Digest as ShaDigest, Sha512};

use crate::common::crypto::{Digest, PartyId, Signature, SignatureAuthority, SigningHandle};

/*
    In round 0 the designated sender signs its input bit and sends it to
    every party. A party that receives a bit in round r under a valid chain
    of exactly r + 1 distinct signatures, the first of them the sender's,
    extracts the bit, appends its own signature and relays the extended
    chain in round r + 1. After round f each party outputs the extracted
    bit if it extracted exactly one, and the default bit otherwise.
*/

/// Synchronous round number, `0..=f`.
pub type Round = usize;

/// The single bit under broadcast.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Bit {
    Zero,
    One,
}

impl Bit {
    pub fn as_u8(self) -> u8 {
        match self {
            Bit::Zero => 0,
            Bit::One => 1,
        }
    }

    pub fn flip(self) -> Self {
        match self {
            Bit::Zero => Bit::One,
            Bit::One => Bit::Zero,
        }
    }
}

impl fmt::Display for Bit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

/// One signer's entry in a chain. The signature covers the bit together
/// with the signer sequence up to and including this entry.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ChainLink {
    pub signer: PartyId,
    pub sig: Signature,
}

/// Ordered, append-only sequence of signers over a bit. Chains are values:
/// [`SignatureChain::extend`] clones into a fresh chain, so a chain already
/// handed to a message is never mutated behind the recipient's back.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct SignatureChain {
    links: Vec<ChainLink>,
}

impl SignatureChain {
    /// Starts a length-1 chain, signed by the originator. Only chains
    /// originated by the designated sender survive receive-side validation.
    pub fn originate(bit: Bit, signer: &SigningHandle) -> Self {
        let id = signer.party();
        let sig = signer.sign(&signing_digest(bit, &[id]));
        SignatureChain {
            links: vec![ChainLink { signer: id, sig }],
        }
    }

    /// Returns a new chain with `signer`'s entry appended. `self` is left
    /// untouched.
    pub fn extend(&self, bit: Bit, signer: &SigningHandle) -> Self {
        let mut links = self.links.clone();
        let mut ids = self.signers();
        ids.push(signer.party());
        let sig = signer.sign(&signing_digest(bit, &ids));
        links.push(ChainLink {
            signer: signer.party(),
            sig,
        });
        SignatureChain { links }
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// The chain's first signer, i.e. the claimed originator.
    pub fn head(&self) -> Option<PartyId> {
        self.links.first().map(|link| link.signer)
    }

    pub fn contains(&self, id: PartyId) -> bool {
        self.links.iter().any(|link| link.signer == id)
    }

    pub fn signers(&self) -> Vec<PartyId> {
        self.links.iter().map(|link| link.signer).collect()
    }

    /// Full chain validation: non-empty, pairwise-distinct signers, and
    /// every link's signature verifying over the bit and its signer prefix.
    pub fn verify(&self, bit: Bit, authority: &SignatureAuthority) -> bool {
        if self.links.is_empty() {
            return false;
        }
        let ids = self.signers();
        for (i, id) in ids.iter().enumerate() {
            if ids[..i].contains(id) {
                return false;
            }
        }
        for (i, link) in self.links.iter().enumerate() {
            let digest = signing_digest(bit, &ids[..=i]);
            if !authority.verify(link.signer, &digest, &link.sig) {
                return false;
            }
        }
        true
    }
}

/// A bit paired with the chain certifying it. The signature over the whole
/// message by the chain's last signer is that signer's link.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Message {
    pub bit: Bit,
    pub chain: SignatureChain,
}

impl Message {
    pub fn new(bit: Bit, chain: SignatureChain) -> Self {
        Message { bit, chain }
    }

    pub fn verify(&self, authority: &SignatureAuthority) -> bool {
        self.chain.verify(self.bit, authority)
    }

    /// Identity for duplicate suppression: the bit plus the exact signer
    /// sequence, not the bit alone.
    pub fn dedup_key(&self) -> (Bit, Vec<PartyId>) {
        (self.bit, self.chain.signers())
    }
}

fn signing_digest(bit: Bit, signers: &[PartyId]) -> Digest {
    let mut hasher = Sha512::new();
    hasher.update([bit.as_u8()]);
    for id in signers {
        hasher.update(id.to_be_bytes());
    }
    let result = hasher.finalize();
    let mut digest = [0u8; 64];
    digest.copy_from_slice(&result[..]);
    digest
}
