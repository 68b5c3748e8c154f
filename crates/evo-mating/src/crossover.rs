//! Crossover strategies: combine two parent genomes into one offspring.

use evo_core::Genome;

/// Which crossover strategy `crossoverType` selects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Crossover {
    #[default]
    OnePoint,
    Average,
}

impl Crossover {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "OnePoint" => Some(Crossover::OnePoint),
            "Average" => Some(Crossover::Average),
            _ => None,
        }
    }

    /// Writes the result of mating `parent1` with `parent2` into `offspring`,
    /// whose gene count must match both parents'. Always mutates the
    /// offspring and reports one application, per the specification.
    pub fn apply(&self, offspring: &mut Genome, parent1: &Genome, parent2: &Genome) -> usize {
        let len = offspring.len();
        debug_assert_eq!(parent1.len(), len);
        debug_assert_eq!(parent2.len(), len);

        match self {
            Crossover::OnePoint => {
                let point = if len > 1 {
                    evo_core::rng::uniform_i64(1, len as i64 - 1) as usize
                } else {
                    len
                };
                for i in 0..point {
                    offspring.set_value(i, parent1.value(i));
                }
                for i in point..len {
                    offspring.set_value(i, parent2.value(i));
                }
            }
            Crossover::Average => {
                for i in 0..len {
                    offspring.set_value(i, (parent1.value(i) + parent2.value(i)) / 2.0);
                }
            }
        }
        1
    }
}
