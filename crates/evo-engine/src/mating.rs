//! Ties parent selection (`evo-selectors`) and the mating operators
//! (`evo-mating`) into the offspring-production step the GA loop calls
//! once per drained genome request.

use evo_core::{rng, Genome, Population};
use evo_mating::{Crossover, DuplicationMutator, FrameshiftMutator, GaussianMutator};
use evo_selectors::ChooseParent;

pub struct MatingConfig {
    pub choose_parent: ChooseParent,
    pub crossover: Crossover,
    pub crossover_chance: f64,
    pub multiple_gaussian: bool,
    pub gaussian: GaussianMutator,
    pub frameshift: FrameshiftMutator,
    pub duplication: DuplicationMutator,
}

/// Produces one new offspring from `population`, repeating the
/// select-crossover-mutate cycle until at least one mutation was applied.
/// Panics only if called against an empty population, which the GA loop
/// never does (it falls back to the start population while it has
/// members left).
pub fn produce_offspring(population: &Population, config: &MatingConfig) -> Genome {
    loop {
        let (_, parent1) = config
            .choose_parent
            .choose(population)
            .expect("produce_offspring requires a non-empty population");
        let mut offspring = parent1.clone();
        let mut applied = 0usize;

        if rng::bool_with_bias(config.crossover_chance) {
            if let Some((_, parent2)) = config.choose_parent.choose(population) {
                applied += config.crossover.apply(&mut offspring, parent1, parent2);
            }
        }

        applied += if config.multiple_gaussian {
            config.gaussian.mutate_multi(&mut offspring)
        } else {
            config.gaussian.mutate_single(&mut offspring)
        };
        applied += config.frameshift.mutate(&mut offspring);
        applied += config.duplication.mutate(&mut offspring);

        if applied > 0 {
            offspring.set_fitness(evo_core::UNSCORED_FITNESS);
            return offspring;
        }
    }
}
