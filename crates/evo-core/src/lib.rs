//! Genome, population, optimisation direction, and random-number primitives
//! shared by the rest of the evolve-server workspace.

pub mod genome;
pub mod optimize;
pub mod population;
pub mod rng;

pub use genome::{Circularity, Genome, UNSCORED_FITNESS};
pub use optimize::Optimize;
pub use population::{read_genomes_text, InsertError, Key, Population, ResizeMode, StartPopulation};
