//! Parent selection: choosing a genome (and its rank) from the population
//! to mate. Rank 0 is the worst individual, `len() - 1` the best; each mode
//! biases its draw over that range differently.

use evo_core::{rng, Genome, Population};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ChooseParent {
    Uniform,
    RankBased,
    SqrtBased,
    GammaBased { gamma: f64 },
}

impl ChooseParent {
    pub fn from_name(name: &str, gamma: f64) -> Option<Self> {
        match name {
            "Uniform" => Some(ChooseParent::Uniform),
            "RankBased" => Some(ChooseParent::RankBased),
            "SqrtBased" => Some(ChooseParent::SqrtBased),
            "GammaBased" => Some(ChooseParent::GammaBased { gamma }),
            _ => None,
        }
    }

    /// Picks a rank in `[0, population.len())`, biased by the selection
    /// mode, and returns that rank together with a reference to its genome.
    /// Returns `None` for an empty population.
    pub fn choose<'a>(&self, population: &'a Population) -> Option<(usize, &'a Genome)> {
        let n = population.len();
        if n == 0 {
            return None;
        }
        let max_rank = (n - 1) as i64;
        let rank = match self {
            ChooseParent::Uniform => rng::uniform_i64(0, max_rank),
            ChooseParent::RankBased => rng::rank_biased_i64(0, max_rank),
            ChooseParent::SqrtBased => rng::sqrt_biased_i64(0, max_rank),
            ChooseParent::GammaBased { gamma } => rng::gamma_biased_i64(0, max_rank, *gamma),
        } as usize;
        population.by_rank(rank).map(|(_, g)| (rank, g))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evo_core::{Circularity, Optimize};
    use rstest::rstest;

    fn population_of(fitnesses: &[f64]) -> Population {
        let mut pop = Population::new(fitnesses.len(), 0, Optimize::Maximize);
        for f in fitnesses {
            let mut g = Genome::new(vec![0.0], vec![1.0], vec![1.0], Circularity::Global(false));
            g.set_fitness(*f);
            pop.insert_genome(g).unwrap();
        }
        pop
    }

    #[test]
    fn empty_population_returns_none() {
        let pop = Population::new(4, 0, Optimize::Maximize);
        assert!(ChooseParent::Uniform.choose(&pop).is_none());
    }

    #[rstest]
    #[case(ChooseParent::Uniform)]
    #[case(ChooseParent::RankBased)]
    #[case(ChooseParent::SqrtBased)]
    #[case(ChooseParent::GammaBased { gamma: 2.0 })]
    fn every_mode_returns_a_rank_in_range(#[case] mode: ChooseParent) {
        let pop = population_of(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        for _ in 0..100 {
            let (rank, _) = mode.choose(&pop).unwrap();
            assert!(rank < pop.len());
        }
    }

    #[test]
    fn rank_based_favours_high_ranks_over_many_draws() {
        let pop = population_of(&(0..20).map(|i| i as f64).collect::<Vec<_>>());
        let mut high = 0;
        for _ in 0..3000 {
            let (rank, _) = ChooseParent::RankBased.choose(&pop).unwrap();
            if rank >= 15 {
                high += 1;
            }
        }
        assert!(high > 1500, "rank-biased draws should skew high: {high}");
    }

    #[test]
    fn from_name_maps_every_configured_mode() {
        assert_eq!(ChooseParent::from_name("Uniform", 1.0), Some(ChooseParent::Uniform));
        assert_eq!(ChooseParent::from_name("RankBased", 1.0), Some(ChooseParent::RankBased));
        assert_eq!(ChooseParent::from_name("SqrtBased", 1.0), Some(ChooseParent::SqrtBased));
        assert_eq!(
            ChooseParent::from_name("GammaBased", 0.5),
            Some(ChooseParent::GammaBased { gamma: 0.5 })
        );
        assert_eq!(ChooseParent::from_name("Bogus", 1.0), None);
    }
}
