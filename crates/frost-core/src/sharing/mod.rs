//! Secret sharing primitives
//!
//! - Shamir (t, n) sharing with Lagrange interpolation
//! - Feldman verifiable secret sharing on top of it

pub mod feldman;
pub mod shamir;

pub use feldman::Feldman;
pub use shamir::{lagrange_coefficients, Polynomial, Shamir, Share};
