//! Dolev-Strong byzantine broadcast over a synchronous round network.
//!
//! A designated sender disseminates a single bit to `n` parties while up to
//! `f < n` of them are byzantine. Signature chains bound how far a bit can
//! travel without picking up a fresh signer each round, which is what lets
//! every honest party settle on the same output after `f + 1` rounds:
//! consistency always, validity whenever the sender is honest.

pub mod common;
pub mod config;
pub mod protocol;

pub use common::crypto::{
    Keypair, PartyId, Pubkey, Signature, SignatureAuthority, SigningHandle,
};
pub use config::{ConfigError, SimulationConfig};
pub use protocol::*;

/// Simulation constants
pub mod constants {
    /// Smallest meaningful network: the sender plus one receiver.
    pub const MIN_PARTIES: u32 = 2;
    /// Ceiling on simulated network size; all-to-all forwarding is
    /// quadratic per round.
    pub const MAX_PARTIES: u32 = 50;
    /// `run_simulation` corrupts `n / DEFAULT_CORRUPTION_DIVISOR` parties
    /// when no explicit bound is given.
    pub const DEFAULT_CORRUPTION_DIVISOR: u32 = 3;
}
