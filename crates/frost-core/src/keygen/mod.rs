//! Distributed Key Generation (DKG) module
//!
//! Pedersen DKG over Feldman VSS, in two layers: [`Participant`] is the pure
//! per-party state machine, [`run_dkg`] and [`run_key_refresh`] drive it over
//! an authenticated relay.

mod dkg;
mod key_refresh;
mod messages;
mod participant;

pub use dkg::run_dkg;
pub use key_refresh::run_key_refresh;
pub use messages::*;
pub use participant::{Participant, SharingMode, DKG_LABEL};
