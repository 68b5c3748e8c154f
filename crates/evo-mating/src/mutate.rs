//! Mutation operators applied to a single offspring genome: Gaussian
//! perturbation (single-gene or multi-gene), frameshift, and duplication.

use evo_core::{rng, Genome};

/// Adds Gaussian noise to one or more genes, honouring each gene's own
/// bounds via clamping, bouncing, or circular wrapping.
pub struct GaussianMutator {
    rate: f32,
    bounce: bool,
}

impl GaussianMutator {
    /// `rate` must be between 0.0 and 1.0. `bounce` selects the
    /// out-of-bounds policy used for non-circular genes that overshoot:
    /// reflection into range instead of clamping to the boundary.
    pub fn new(rate: f32, bounce: bool) -> Self {
        if !(0.0..=1.0).contains(&rate) {
            panic!("rate must be between 0.0 and 1.0");
        }
        GaussianMutator { rate, bounce }
    }

    /// Tests the rate once, mutates a single uniformly-chosen gene on
    /// success. Returns 1 if a mutation happened, else 0.
    pub fn mutate_single(&self, genome: &mut Genome) -> usize {
        if genome.is_empty() || !rng::bool_with_bias(self.rate as f64) {
            return 0;
        }
        let locus = rng::uniform_i64(0, genome.len() as i64 - 1) as usize;
        self.mutate_gene(genome, locus);
        1
    }

    /// Tests every gene independently against the rate. Returns the count
    /// of genes actually mutated.
    pub fn mutate_multi(&self, genome: &mut Genome) -> usize {
        let mut count = 0;
        for locus in 0..genome.len() {
            if rng::bool_with_bias(self.rate as f64) {
                self.mutate_gene(genome, locus);
                count += 1;
            }
        }
        count
    }

    fn mutate_gene(&self, genome: &mut Genome, locus: usize) {
        let lo = genome.lo(locus);
        let hi = genome.hi(locus);

        if genome.is_frozen(locus) {
            genome.set_value(locus, lo);
            return;
        }

        let step = rng::gaussian() * genome.sigma(locus);
        let candidate = genome.value(locus) + step;

        let resolved = if candidate < lo || candidate > hi {
            if genome.is_circular(locus) {
                wrap(candidate, lo, hi)
            } else if self.bounce {
                bounce(candidate, lo, hi)
            } else if candidate < lo {
                lo
            } else {
                hi
            }
        } else {
            candidate
        };

        genome.set_value(locus, resolved);
    }
}

/// Wraps `v` into `[lo, hi]` as if the interval were a circle.
fn wrap(v: f64, lo: f64, hi: f64) -> f64 {
    let width = hi - lo;
    if width <= 0.0 {
        return lo;
    }
    let mut offset = (v - lo) % width;
    if offset < 0.0 {
        offset += width;
    }
    lo + offset
}

/// Reflects `v` back into `[lo, hi]`, bouncing off each boundary like a
/// ball rather than teleporting across the interval.
fn bounce(v: f64, lo: f64, hi: f64) -> f64 {
    let width = hi - lo;
    if width <= 0.0 {
        return lo;
    }
    let period = 2.0 * width;
    let mut t = (v - lo) % period;
    if t < 0.0 {
        t += period;
    }
    if t > width {
        t = period - t;
    }
    lo + t
}

/// Deletes or inserts a gene by shifting values across the genome. Bounds
/// and sigma stay put; only the value vector moves.
pub struct FrameshiftMutator {
    rate: f32,
}

impl FrameshiftMutator {
    pub fn new(rate: f32) -> Self {
        if !(0.0..=1.0).contains(&rate) {
            panic!("rate must be between 0.0 and 1.0");
        }
        FrameshiftMutator { rate }
    }

    pub fn mutate(&self, genome: &mut Genome) -> usize {
        let len = genome.len();
        if len < 2 || !rng::bool_with_bias(self.rate as f64) {
            return 0;
        }
        let locus = rng::uniform_i64(0, len as i64 - 1) as usize;
        if rng::bool_with_bias(0.5) {
            for i in locus..len - 1 {
                let next = genome.value(i + 1);
                genome.set_value(i, next);
            }
        } else {
            for i in (locus..len - 1).rev() {
                let prev = genome.value(i);
                genome.set_value(i + 1, prev);
            }
        }
        1
    }
}

/// Copies a contiguous run of genes from one location over another,
/// possibly overlapping, truncated at the genome's end.
pub struct DuplicationMutator {
    rate: f32,
}

impl DuplicationMutator {
    pub fn new(rate: f32) -> Self {
        if !(0.0..=1.0).contains(&rate) {
            panic!("rate must be between 0.0 and 1.0");
        }
        DuplicationMutator { rate }
    }

    pub fn mutate(&self, genome: &mut Genome) -> usize {
        let len = genome.len();
        if len == 0 || !rng::bool_with_bias(self.rate as f64) {
            return 0;
        }
        let origin = rng::uniform_i64(0, len as i64 - 1) as usize;
        let max_run = (len - origin) as i64;
        let run = rng::uniform_i64(1, max_run) as usize;
        let dest = rng::uniform_i64(0, len as i64 - 1) as usize;

        let source: Vec<f64> = (origin..origin + run).map(|i| genome.value(i)).collect();
        let end = (dest + run).min(len);
        for (i, value) in (dest..end).zip(source) {
            genome.set_value(i, value);
        }
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evo_core::Circularity;
    use rstest::rstest;

    fn genome_with_values(values: &[f64], lo: f64, hi: f64) -> Genome {
        let len = values.len();
        let mut g = Genome::new(vec![lo; len], vec![hi; len], vec![1.0; len], Circularity::Global(false));
        for (i, v) in values.iter().enumerate() {
            g.set_value(i, *v);
        }
        g
    }

    #[test]
    fn frozen_gene_snaps_to_lower_bound() {
        let mutator = GaussianMutator::new(1.0, false);
        let mut g = Genome::new(vec![3.0], vec![3.0], vec![0.0], Circularity::Global(false));
        g.set_value(0, 3.0);
        mutator.mutate_gene(&mut g, 0);
        assert_eq!(g.value(0), 3.0);
    }

    #[rstest]
    #[case(false)]
    #[case(true)]
    fn clamped_or_bounced_gene_stays_in_bounds(#[case] bounce: bool) {
        let mutator = GaussianMutator::new(1.0, bounce);
        let mut g = genome_with_values(&[0.05; 20], 0.0, 1.0);
        for _ in 0..30 {
            mutator.mutate_multi(&mut g);
            for i in 0..g.len() {
                assert!((0.0..=1.0).contains(&g.value(i)), "value escaped bounds: {}", g.value(i));
            }
        }
    }

    #[test]
    fn circular_gene_wraps_instead_of_clamping() {
        let mutator = GaussianMutator::new(1.0, false);
        let mut g = Genome::new(vec![0.0], vec![1.0], vec![5.0], Circularity::Global(true));
        g.set_value(0, 0.9);
        for _ in 0..30 {
            mutator.mutate_gene(&mut g, 0);
            assert!((0.0..=1.0).contains(&g.value(0)));
        }
    }

    #[test]
    fn frameshift_preserves_length_and_multiset_membership() {
        let mutator = FrameshiftMutator::new(1.0);
        let original = [1.0, 2.0, 3.0, 4.0];
        let mut g = genome_with_values(&original, -100.0, 100.0);
        for _ in 0..50 {
            let applied = mutator.mutate(&mut g);
            assert_eq!(applied, 1);
            assert_eq!(g.len(), original.len());
            for v in g.values() {
                assert!(original.contains(v), "frameshift introduced a value not in the original genome: {v}");
            }
        }
    }

    #[test]
    fn duplication_copies_a_run_without_panicking_near_the_end() {
        let mutator = DuplicationMutator::new(1.0);
        let mut g = genome_with_values(&[1.0, 2.0, 3.0, 4.0, 5.0], -100.0, 100.0);
        for _ in 0..50 {
            mutator.mutate(&mut g);
            assert_eq!(g.len(), 5);
        }
    }
}
