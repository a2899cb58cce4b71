use std::collections::HashMap;

use ed25519_dalek::{ed25519::{self, signature::Signer}, SigningKey, VerifyingKey};
use rand::rngs::OsRng;

/// Party identity. Assigned `1..=n` at network construction.
pub type PartyId = u32;

pub type Digest = [u8; 64];

pub struct Keypair {
    pubkey: Pubkey,
    dalek_signer: SigningKey,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Pubkey {
    pub key: [u8; 32],
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Signature {
    pub sig: [u8; 64],
}

impl Keypair {
    pub fn new_pair() -> Self {
        let mut csprng = OsRng;
        let dalek_signer = SigningKey::generate(&mut csprng);
        let pubkey = Pubkey::from(&dalek_signer.verifying_key().to_bytes());

        Keypair {
            pubkey,
            dalek_signer,
        }
    }

    pub fn sign(&self, digest: &Digest) -> Signature {
        let sig = self
            .dalek_signer
            .sign(digest)
            .to_bytes();

        Signature { sig }
    }

    pub fn pubkey(&self) -> Pubkey {
        self.pubkey.clone()
    }
}

impl AsRef<[u8]> for Pubkey {
    fn as_ref(&self) -> &[u8] {
        &self.key
    }
}

impl From<&[u8; 32]> for Pubkey {
    fn from(bytes: &[u8; 32]) -> Self {
        let mut key = [0u8; 32];
        key.copy_from_slice(&bytes[..32]);
        Pubkey { key }
    }
}

impl Signature {
    pub fn verify(&self, signer: &Pubkey, digest: &Digest) -> bool {
        let dalek_sig = ed25519::Signature::from_bytes(&self.sig);
        let Ok(dalek_pubkey) = VerifyingKey::from_bytes(&signer.key) else {
            return false;
        };
        dalek_pubkey
            .verify_strict(digest, &dalek_sig)
            .is_ok()
    }
}

/// Verification directory for the whole network. The directory is shared
/// read-only; signing goes through per-party [`SigningHandle`]s handed out
/// once at key generation. Holding a handle is what models possession of
/// the private key: a party can sign arbitrary bodies under its own
/// identity but cannot produce a signature that verifies under anyone
/// else's.
pub struct SignatureAuthority {
    directory: HashMap<PartyId, Pubkey>,
}

/// Signing capability for a single party.
pub struct SigningHandle {
    party: PartyId,
    keypair: Keypair,
}

impl SignatureAuthority {
    /// Generates a keypair per party, returning the shared directory and
    /// one signing handle per identity.
    pub fn generate(
        parties: impl IntoIterator<Item = PartyId>,
    ) -> (Self, HashMap<PartyId, SigningHandle>) {
        let mut directory = HashMap::new();
        let mut handles = HashMap::new();
        for party in parties {
            let keypair = Keypair::new_pair();
            directory.insert(party, keypair.pubkey());
            handles.insert(party, SigningHandle { party, keypair });
        }
        (SignatureAuthority { directory }, handles)
    }

    pub fn verify(&self, party: PartyId, digest: &Digest, sig: &Signature) -> bool {
        match self.directory.get(&party) {
            Some(pubkey) => sig.verify(pubkey, digest),
            None => false,
        }
    }

    pub fn knows(&self, party: PartyId) -> bool {
        self.directory.contains_key(&party)
    }
}

impl SigningHandle {
    pub fn party(&self) -> PartyId {
        self.party
    }

    pub fn sign(&self, digest: &Digest) -> Signature {
        self.keypair.sign(digest)
    }
}
