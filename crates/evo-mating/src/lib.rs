//! Crossover and mutation operators used to produce a new offspring genome
//! from the population's chosen parents.

pub mod crossover;
pub mod mutate;

pub use crossover::Crossover;
pub use mutate::{DuplicationMutator, FrameshiftMutator, GaussianMutator};
