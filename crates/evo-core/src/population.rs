//! The evolve population: a bounded, sorted-by-fitness container with
//! age-based eviction and a top-K immortal set, plus the unscored start
//! population it is seeded from.
//!
//! The evolve [`Population`] collapses the source's parallel `map` + `index`
//! sequence into one `BTreeMap`, per the design note in the specification:
//! a `BTreeMap` is already sorted, so no separate index needs to be kept in
//! sync with it. `ageList` and `immortalIndex` remain explicit because they
//! partition the keys by eviction eligibility, which a plain sorted map
//! cannot express.

use crate::genome::Genome;
use crate::optimize::Optimize;
use std::collections::{BTreeMap, VecDeque};

/// A key wrapper giving `f64` fitness a total order, so it can live in a
/// `BTreeMap`. Fitness is never expected to be NaN; `total_cmp` gives a
/// consistent (if unspecified) order even if it were.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Key(pub f64);

impl Eq for Key {}
impl Ord for Key {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.total_cmp(&other.0)
    }
}
impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl std::hash::Hash for Key {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

/// Why [`Population::insert_genome`] rejected a genome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertError {
    /// A genome with this exact sort key already exists. Fitness is a
    /// continuous double, so collisions are rare; losing one is cheaper
    /// than maintaining a secondary tiebreaker.
    DuplicateKey,
}

impl std::fmt::Display for InsertError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InsertError::DuplicateKey => write!(f, "duplicate sort key"),
        }
    }
}

impl std::error::Error for InsertError {}

/// How [`Population::resize`] should fabricate additional genomes when
/// growing the population beyond its current size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeMode {
    /// Clone the template genome and call [`Genome::randomise`] on the copy.
    Randomise,
    /// Clone the template genome and apply the given Gaussian-mutation
    /// closure repeatedly until at least one gene has changed.
    Mutate,
}

impl ResizeMode {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "RandomiseResize" => Some(ResizeMode::Randomise),
            "MutateResize" => Some(ResizeMode::Mutate),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct Population {
    map: BTreeMap<Key, Genome>,
    age_list: VecDeque<Key>,
    immortal: Vec<Key>,
    target_size: usize,
    keep: usize,
    optimize: Optimize,
    warned_duplicate_on_load: bool,
}

impl Population {
    pub fn new(target_size: usize, keep: usize, optimize: Optimize) -> Self {
        Population {
            map: BTreeMap::new(),
            age_list: VecDeque::new(),
            immortal: Vec::new(),
            target_size,
            keep,
            optimize,
            warned_duplicate_on_load: false,
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn optimize(&self) -> Optimize {
        self.optimize
    }

    pub fn target_size(&self) -> usize {
        self.target_size
    }

    pub fn keep(&self) -> usize {
        self.keep
    }

    /// Iterates genomes from worst (rank 0) to best (rank len-1), matching
    /// the ascending order of the sort key.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (f64, &Genome)> {
        self.map.iter().map(|(k, g)| (k.0, g))
    }

    /// Returns the genome at the given rank, where rank 0 is the worst and
    /// `len() - 1` is the best.
    pub fn by_rank(&self, rank: usize) -> Option<(f64, &Genome)> {
        self.map.iter().nth(rank).map(|(k, g)| (k.0, g))
    }

    pub fn best(&self) -> Option<&Genome> {
        self.map.values().next_back()
    }

    pub fn worst(&self) -> Option<&Genome> {
        self.map.values().next()
    }

    fn key_of(&self, genome: &Genome) -> Key {
        Key(self.optimize.key(genome.fitness()))
    }

    /// Attempts to insert a scored genome, per the insertion algorithm of
    /// the specification: reject on duplicate key, otherwise place the key
    /// in `immortalIndex` (if it qualifies for the top-K) or `ageList`, then
    /// trim from the front of `ageList` until the population is back within
    /// its target size.
    pub fn insert_genome(&mut self, genome: Genome) -> Result<(), InsertError> {
        let key = self.key_of(&genome);

        if self.map.contains_key(&key) {
            return Err(InsertError::DuplicateKey);
        }

        self.map.insert(key, genome);

        if self.keep == 0 {
            self.age_list.push_back(key);
        } else if self.immortal.len() < self.keep {
            let pos = self.immortal.partition_point(|k| *k < key);
            self.immortal.insert(pos, key);
        } else if key > self.immortal[0] {
            let displaced = self.immortal.remove(0);
            self.age_list.push_back(displaced);
            let pos = self.immortal.partition_point(|k| *k < key);
            self.immortal.insert(pos, key);
        } else {
            self.age_list.push_back(key);
        }

        self.trim();
        Ok(())
    }

    fn trim(&mut self) {
        while self.map.len() > self.target_size {
            match self.age_list.pop_front() {
                Some(evicted) => {
                    self.map.remove(&evicted);
                }
                None => {
                    // Logic-error branch: ageList emptied before the target
                    // size was reached. Self-repair by evicting the
                    // smallest remaining key and keep going.
                    tracing::error!(
                        "population age list exhausted before target size reached; \
                         evicting smallest key as a self-repair"
                    );
                    if let Some((&smallest, _)) = self.map.iter().next() {
                        self.map.remove(&smallest);
                        self.immortal.retain(|k| *k != smallest);
                    } else {
                        break;
                    }
                }
            }
        }
    }

    /// Rebuilds `ageList`/`immortalIndex` from the map alone, discarding
    /// arrival order. Used when an invariant check finds the auxiliary
    /// sequences inconsistent with the map (a logic error) and the only
    /// available repair is "the top K keys by value are immortal, the rest
    /// are age-ordered by key" rather than by original arrival time.
    pub fn rebuild_index(&mut self) {
        let mut keys: Vec<Key> = self.map.keys().copied().collect();
        keys.sort();
        let split = keys.len().saturating_sub(self.keep);
        self.age_list = keys[..split].iter().copied().collect();
        self.immortal = keys[split..].to_vec();
    }

    /// Checks the invariants of §3: unique ascending keys (guaranteed by
    /// the `BTreeMap`), `ageList` and `immortalIndex` disjoint and together
    /// covering every key, and every immortal key at least as large as
    /// every age-listed key.
    pub fn check_invariants(&self) -> bool {
        if self.age_list.len() + self.immortal.len() != self.map.len() {
            return false;
        }
        let age_set: std::collections::HashSet<Key> = self.age_list.iter().copied().collect();
        let immortal_set: std::collections::HashSet<Key> = self.immortal.iter().copied().collect();
        if !age_set.is_disjoint(&immortal_set) {
            return false;
        }
        if age_set.len() + immortal_set.len() != self.map.len() {
            return false;
        }
        if self.map.len() >= self.keep && self.immortal.len() != self.keep {
            return false;
        }
        if let (Some(min_immortal), Some(max_age)) = (
            self.immortal.iter().min(),
            self.age_list.iter().max(),
        ) {
            if min_immortal < max_age {
                return false;
            }
        }
        true
    }

    /// Applies [`Genome::randomise`] to every member. Only meaningful before
    /// any fitness has been assigned (e.g. the `randomiseModel` startup
    /// option) since it invalidates the sort key's correspondence with the
    /// genome's own fitness field; callers must not call this on a
    /// population already keyed by real scores.
    pub fn randomise_members(&mut self) {
        for genome in self.map.values_mut() {
            genome.randomise();
        }
    }

    /// Applies `circularMutation` to every member not carrying per-gene flags.
    pub fn set_global_circular(&mut self, flag: bool) {
        for genome in self.map.values_mut() {
            genome.set_global_circular(flag);
        }
    }

    /// Grows or shrinks the population to `new_target`, per §4.4's
    /// `ResizePopulation`. Growing clones the first (worst) genome as a
    /// template and assigns the copy a key strictly greater than the
    /// current maximum; shrinking repeatedly discards the smallest key.
    pub fn resize(&mut self, new_target: usize, mode: ResizeMode, mutate: impl Fn(&mut Genome) -> usize) {
        self.target_size = new_target;

        while self.map.len() < new_target {
            let Some(template) = self.map.values().next().cloned() else {
                break;
            };
            let mut child = template;
            match mode {
                ResizeMode::Randomise => child.randomise(),
                ResizeMode::Mutate => {
                    while mutate(&mut child) == 0 {}
                }
            }
            let next_key = self
                .map
                .keys()
                .next_back()
                .map(|k| Key(next_up(k.0)))
                .unwrap_or(Key(0.0));
            child.set_fitness(self.optimize.fitness_from_key(next_key.0));
            self.map.insert(next_key, child);
            self.age_list.push_back(next_key);
        }

        while self.map.len() > new_target {
            self.trim_smallest();
        }
    }

    fn trim_smallest(&mut self) {
        if let Some((&smallest, _)) = self.map.iter().next() {
            self.map.remove(&smallest);
            self.age_list.retain(|k| *k != smallest);
            self.immortal.retain(|k| *k != smallest);
        }
    }

    /// Loads `genomes` into the population, assigning each its fitness-derived
    /// key. A duplicate key is given a synthetic key drawn from U(0,1) and a
    /// one-time warning is logged, per `ReadPopulation`.
    pub fn load_with_synthetic_keys(&mut self, genomes: Vec<Genome>) {
        for mut genome in genomes {
            let mut key = self.key_of(&genome);
            if self.map.contains_key(&key) {
                if !self.warned_duplicate_on_load {
                    tracing::warn!("duplicate fitness key on population load; assigning synthetic keys");
                    self.warned_duplicate_on_load = true;
                }
                key = Key(crate::rng::uniform_f64(0.0, 1.0));
                genome.set_fitness(self.optimize.fitness_from_key(key.0));
            }
            self.map.insert(key, genome);
            if self.keep > 0 && self.immortal.len() < self.keep {
                let pos = self.immortal.partition_point(|k| *k < key);
                self.immortal.insert(pos, key);
            } else {
                self.age_list.push_back(key);
            }
        }
        self.trim();
    }

    /// Serialises the `n` best genomes, fittest first, prefixed by the
    /// count, per `WritePopulation`.
    pub fn write_text(&self, n: usize) -> String {
        let best: Vec<&Genome> = self.map.values().rev().take(n).collect();
        let mut out = format!("{}\n", best.len());
        for g in best {
            out.push_str(&g.serialize());
        }
        out
    }

    /// Ten-percentile statistics: the fitness at each decile boundary by
    /// rank, 0th (worst) through 100th (best).
    pub fn decile_stats(&self) -> Vec<f64> {
        if self.map.is_empty() {
            return Vec::new();
        }
        let values: Vec<f64> = self.map.values().map(Genome::fitness).collect();
        let n = values.len();
        (0..=10)
            .map(|decile| {
                let idx = ((n - 1) * decile / 10).min(n - 1);
                values[idx]
            })
            .collect()
    }
}

/// The starting population: genomes consumed strictly in file order, one
/// per dispatch, until exhausted. Unlike the evolve [`Population`] its
/// members all carry the same placeholder [`crate::genome::UNSCORED_FITNESS`]
/// key, so it cannot share the keyed structure without every insert past
/// the first colliding.
#[derive(Clone, Default)]
pub struct StartPopulation {
    genomes: Vec<Genome>,
    cursor: usize,
}

impl StartPopulation {
    pub fn new(genomes: Vec<Genome>) -> Self {
        StartPopulation { genomes, cursor: 0 }
    }

    pub fn len(&self) -> usize {
        self.genomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genomes.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.genomes.len().saturating_sub(self.cursor)
    }

    /// The gene count of the first loaded genome, used to validate the file
    /// against `genomeLength` before evolution starts.
    pub fn genome_length(&self) -> Option<usize> {
        self.genomes.first().map(Genome::len)
    }

    /// Takes the next genome in file order, advancing the cursor. Returns
    /// `None` once every member has been dispatched.
    pub fn take_next(&mut self) -> Option<Genome> {
        let genome = self.genomes.get(self.cursor).cloned()?;
        self.cursor += 1;
        Some(genome)
    }

    /// Grows or shrinks the pool to `new_target`, per §4.4's `ResizePopulation`
    /// run against the loaded starting file. Growing clones the first genome
    /// as a template; shrinking truncates from the end. Called once at
    /// startup, before any genome has been dispatched.
    pub fn resize(&mut self, new_target: usize, mode: ResizeMode, mutate: impl Fn(&mut Genome) -> usize) {
        while self.genomes.len() < new_target {
            let Some(template) = self.genomes.first().cloned() else {
                break;
            };
            let mut child = template;
            match mode {
                ResizeMode::Randomise => child.randomise(),
                ResizeMode::Mutate => {
                    while mutate(&mut child) == 0 {}
                }
            }
            self.genomes.push(child);
        }
        self.genomes.truncate(new_target);
    }

    /// Randomises every member's values in place, per `randomiseModel`.
    pub fn randomise_all(&mut self) {
        for genome in &mut self.genomes {
            genome.randomise();
        }
    }

    /// Applies `circularMutation` to every member not carrying per-gene flags.
    pub fn set_global_circular(&mut self, flag: bool) {
        for genome in &mut self.genomes {
            genome.set_global_circular(flag);
        }
    }
}

/// Parses the "N then N genome blocks" text format shared by the starting
/// population file and population/best-genome snapshots.
pub fn read_genomes_text(text: &str) -> evo_error::Result<Vec<Genome>> {
    let mut tokens = text.split_whitespace();
    let count: usize = tokens
        .next()
        .ok_or_else(|| evo_error::err!(Io: "empty genome file: expected a count"))?
        .parse()
        .map_err(|_| evo_error::err!(Io: "genome file count is not an integer"))?;

    (0..count).map(|_| Genome::deserialize(&mut tokens)).collect()
}

/// The next representable `f64` strictly greater than `x` (the "next
/// representable double" used by `ResizePopulation` to keep new keys
/// above the current maximum).
fn next_up(x: f64) -> f64 {
    if x.is_nan() || x == f64::INFINITY {
        return x;
    }
    if x == 0.0 {
        return f64::MIN_POSITIVE;
    }
    let bits = x.to_bits();
    let next_bits = if x > 0.0 { bits + 1 } else { bits - 1 };
    f64::from_bits(next_bits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genome::Circularity;

    fn scored(fitness: f64) -> Genome {
        let mut g = Genome::new(vec![0.0], vec![1.0], vec![1.0], Circularity::Global(false));
        g.set_fitness(fitness);
        g
    }

    #[test]
    fn minimal_end_to_end_evicts_the_worst() {
        let mut pop = Population::new(3, 0, Optimize::Maximize);
        for f in [1.0, 2.0, 3.0] {
            pop.insert_genome(scored(f)).unwrap();
        }
        pop.insert_genome(scored(4.0)).unwrap();
        assert_eq!(pop.len(), 3);
        assert!(pop.iter().all(|(k, _)| k != 1.0));
        assert!(pop.iter().any(|(k, _)| k == 4.0));
    }

    #[test]
    fn duplicate_fitness_is_rejected() {
        let mut pop = Population::new(10, 0, Optimize::Maximize);
        pop.insert_genome(scored(5.0)).unwrap();
        let result = pop.insert_genome(scored(5.0));
        assert_eq!(result, Err(InsertError::DuplicateKey));
        assert_eq!(pop.len(), 1);
    }

    #[test]
    fn immortality_protects_the_top_k() {
        let mut pop = Population::new(4, 2, Optimize::Maximize);
        for f in [5.0, 1.0, 3.0, 4.0, 2.0, 6.0] {
            pop.insert_genome(scored(f)).unwrap();
        }
        let keys: Vec<f64> = pop.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![2.0, 4.0, 5.0, 6.0]);
        assert!(pop.check_invariants());
    }

    #[test]
    fn minimizing_keeps_the_lowest_raw_fitness() {
        let mut pop = Population::new(2, 0, Optimize::Minimize);
        for f in [10.0, 5.0, 20.0] {
            pop.insert_genome(scored(f)).unwrap();
        }
        let mut fitnesses: Vec<f64> = pop.iter().map(|(_, g)| g.fitness()).collect();
        fitnesses.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(fitnesses, vec![5.0, 10.0]);
        assert_eq!(pop.best().unwrap().fitness(), 5.0);
    }

    #[test]
    fn resize_grows_from_a_template_and_shrinks_from_the_bottom() {
        let mut pop = Population::new(2, 0, Optimize::Maximize);
        pop.insert_genome(scored(1.0)).unwrap();
        pop.insert_genome(scored(2.0)).unwrap();
        pop.resize(4, ResizeMode::Randomise, |_| 0);
        assert_eq!(pop.len(), 4);
        pop.resize(1, ResizeMode::Randomise, |_| 0);
        assert_eq!(pop.len(), 1);
        assert_eq!(pop.best().unwrap().fitness(), pop.worst().unwrap().fitness());
    }

    #[test]
    fn rebuild_index_restores_invariants() {
        let mut pop = Population::new(5, 1, Optimize::Maximize);
        for f in [1.0, 2.0, 3.0] {
            pop.insert_genome(scored(f)).unwrap();
        }
        pop.age_list.clear();
        pop.immortal.clear();
        assert!(!pop.check_invariants());
        pop.rebuild_index();
        assert!(pop.check_invariants());
    }

    #[test]
    fn start_population_is_consumed_strictly_in_order() {
        let genomes = vec![scored(1.0), scored(2.0), scored(3.0)];
        let mut start = StartPopulation::new(genomes);
        assert_eq!(start.remaining(), 3);
        assert_eq!(start.take_next().unwrap().fitness(), 1.0);
        assert_eq!(start.take_next().unwrap().fitness(), 2.0);
        assert_eq!(start.take_next().unwrap().fitness(), 3.0);
        assert!(start.take_next().is_none());
        assert_eq!(start.remaining(), 0);
    }

    #[test]
    fn read_genomes_text_round_trips_with_write_text() {
        let mut pop = Population::new(3, 0, Optimize::Maximize);
        for f in [1.0, 2.0, 3.0] {
            pop.insert_genome(scored(f)).unwrap();
        }
        let text = pop.write_text(3);
        let parsed = read_genomes_text(&text).unwrap();
        assert_eq!(parsed.len(), 3);
        let mut fitnesses: Vec<f64> = parsed.iter().map(Genome::fitness).collect();
        fitnesses.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(fitnesses, vec![1.0, 2.0, 3.0]);
    }

    fn unscored() -> Genome {
        Genome::new(vec![0.0], vec![1.0], vec![0.1], Circularity::Global(false))
    }

    #[test]
    fn start_population_resize_grows_by_cloning_the_first_genome() {
        let mut start = StartPopulation::new(vec![unscored()]);
        start.resize(3, ResizeMode::Randomise, |_| 0);
        assert_eq!(start.len(), 3);
    }

    #[test]
    fn start_population_resize_shrinks_by_truncating() {
        let mut start = StartPopulation::new(vec![unscored(), unscored(), unscored()]);
        start.resize(1, ResizeMode::Randomise, |_| 0);
        assert_eq!(start.len(), 1);
    }

    #[test]
    fn set_global_circular_leaves_per_gene_genomes_untouched() {
        let mut g = Genome::new(vec![0.0], vec![1.0], vec![0.1], Circularity::PerGene(vec![false]));
        g.set_global_circular(true);
        assert!(!g.is_circular(0));

        let mut start = StartPopulation::new(vec![g]);
        start.set_global_circular(true);
    }
}
