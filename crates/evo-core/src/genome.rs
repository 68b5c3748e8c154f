//! A [`Genome`] is a fixed-length vector of real-valued genes, each with its
//! own bounds and Gaussian mutation step, plus a scalar fitness. It is a pure
//! value object: copyable, movable, and otherwise inert — all evolution logic
//! (mating, selection, eviction) lives in the crates built on top of it.

use crate::rng;
use evo_error::{Error, Result};
use std::cmp::Ordering;
use std::fmt;

/// Fitness has not yet been assigned by a worker.
pub const UNSCORED_FITNESS: f64 = f64::MIN;

/// Whether the circular-wrap mutation policy is tracked per gene or applies
/// uniformly to the whole genome. The source distinguishes these by genome
/// type (`IndividualCircularMutation` carries a circular column per gene);
/// everything else shares one flag.
#[derive(Clone, Debug, PartialEq)]
pub enum Circularity {
    Global(bool),
    PerGene(Vec<bool>),
}

impl Circularity {
    pub fn is_circular(&self, index: usize) -> bool {
        match self {
            Circularity::Global(flag) => *flag,
            Circularity::PerGene(flags) => flags.get(index).copied().unwrap_or(false),
        }
    }

    fn kind_name(&self) -> &'static str {
        match self {
            Circularity::Global(_) => "Individual",
            Circularity::PerGene(_) => "IndividualCircularMutation",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Genome {
    values: Vec<f64>,
    lo: Vec<f64>,
    hi: Vec<f64>,
    sigma: Vec<f64>,
    circular: Circularity,
    fitness: f64,
}

impl Genome {
    pub fn new(lo: Vec<f64>, hi: Vec<f64>, sigma: Vec<f64>, circular: Circularity) -> Self {
        let len = lo.len();
        assert_eq!(hi.len(), len, "lo/hi length mismatch");
        assert_eq!(sigma.len(), len, "lo/sigma length mismatch");
        let values = lo.clone();
        Genome {
            values,
            lo,
            hi,
            sigma,
            circular,
            fitness: UNSCORED_FITNESS,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn fitness(&self) -> f64 {
        self.fitness
    }

    pub fn set_fitness(&mut self, fitness: f64) {
        self.fitness = fitness;
    }

    pub fn is_scored(&self) -> bool {
        self.fitness != UNSCORED_FITNESS
    }

    pub fn value(&self, i: usize) -> f64 {
        self.values[i]
    }

    pub fn set_value(&mut self, i: usize, v: f64) {
        self.values[i] = v;
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut [f64] {
        &mut self.values
    }

    pub fn lo(&self, i: usize) -> f64 {
        self.lo[i]
    }

    pub fn hi(&self, i: usize) -> f64 {
        self.hi[i]
    }

    pub fn sigma(&self, i: usize) -> f64 {
        self.sigma[i]
    }

    pub fn is_frozen(&self, i: usize) -> bool {
        self.lo[i] >= self.hi[i]
    }

    pub fn is_circular(&self, i: usize) -> bool {
        self.circular.is_circular(i)
    }

    pub fn circularity(&self) -> &Circularity {
        &self.circular
    }

    /// Sets the global circular-mutation flag, per `SetGlobalCircularMutationFlag`.
    /// A no-op on a genome carrying per-gene flags: those already say more
    /// than a single global bit can.
    pub fn set_global_circular(&mut self, flag: bool) {
        if let Circularity::Global(current) = &mut self.circular {
            *current = flag;
        }
    }

    /// Reassigns every gene with sigma > 0 a fresh uniform draw in `[lo, hi]`.
    /// Frozen genes (sigma == 0) are left untouched.
    pub fn randomise(&mut self) {
        for i in 0..self.len() {
            if self.sigma[i] > 0.0 {
                self.values[i] = rng::uniform_f64(self.lo[i], self.hi[i]);
            }
        }
        self.fitness = UNSCORED_FITNESS;
    }

    pub fn clear(&mut self) {
        self.values.copy_from_slice(&self.lo);
        self.fitness = UNSCORED_FITNESS;
    }

    /// Serialises this genome in the starting-population text format:
    /// a genome-type line, a length line, one `gene low high sigma
    /// [circular]` row per gene, and a trailing `fitness 0 0 0 0` line.
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        out.push_str(self.circular.kind_name());
        out.push('\n');
        out.push_str(&self.len().to_string());
        out.push('\n');
        for i in 0..self.len() {
            match &self.circular {
                Circularity::Global(_) => {
                    out.push_str(&format!(
                        "{} {} {} {}\n",
                        self.values[i], self.lo[i], self.hi[i], self.sigma[i]
                    ));
                }
                Circularity::PerGene(flags) => {
                    out.push_str(&format!(
                        "{} {} {} {} {}\n",
                        self.values[i],
                        self.lo[i],
                        self.hi[i],
                        self.sigma[i],
                        if flags[i] { 1 } else { 0 }
                    ));
                }
            }
        }
        let fitness_field = if self.is_scored() { self.fitness } else { 0.0 };
        out.push_str(&format!("fitness {} 0 0 0\n", fitness_field));
        out
    }

    /// Parses one genome from a token stream positioned at a genome-type
    /// token, consuming through its trailing `fitness` line.
    pub fn deserialize<'a, I: Iterator<Item = &'a str>>(tokens: &mut I) -> Result<Genome> {
        let kind = tokens
            .next()
            .ok_or_else(|| evo_error::err!(Io: "unexpected end of input: expected genome type"))?;
        let per_gene_circular = kind == "IndividualCircularMutation";

        let length: usize = next_token(tokens, "genome length")?
            .parse()
            .map_err(|_| evo_error::err!(Io: "genome length is not an integer"))?;

        let mut values = Vec::with_capacity(length);
        let mut lo = Vec::with_capacity(length);
        let mut hi = Vec::with_capacity(length);
        let mut sigma = Vec::with_capacity(length);
        let mut circular_flags = Vec::with_capacity(length);

        for _ in 0..length {
            let value: f64 = parse_token(tokens, "gene value")?;
            let low: f64 = parse_token(tokens, "gene lower bound")?;
            let high: f64 = parse_token(tokens, "gene upper bound")?;
            let s: f64 = parse_token(tokens, "gene sigma")?;
            let circular = if per_gene_circular {
                let c: i32 = parse_token(tokens, "gene circular flag")?;
                c != 0
            } else {
                false
            };
            values.push(value);
            lo.push(low);
            hi.push(high);
            sigma.push(s);
            circular_flags.push(circular);
        }

        // Consume the trailing "fitness <value> 0 0 0" line; the value is
        // real fitness for a scored snapshot, and a literal 0 for an
        // unscored starting-population genome.
        next_token(tokens, "fitness keyword")?;
        let fitness: f64 = parse_token(tokens, "fitness value")?;
        for _ in 0..3 {
            next_token(tokens, "fitness field")?;
        }

        let circular = if per_gene_circular {
            Circularity::PerGene(circular_flags)
        } else {
            Circularity::Global(false)
        };

        Ok(Genome {
            values,
            lo,
            hi,
            sigma,
            circular,
            fitness,
        })
    }
}

fn next_token<'a, I: Iterator<Item = &'a str>>(tokens: &mut I, what: &str) -> Result<&'a str> {
    tokens
        .next()
        .ok_or_else(|| Error::Io { message: format!("unexpected end of input: expected {what}").into() })
}

fn parse_token<'a, I, T>(tokens: &mut I, what: &str) -> Result<T>
where
    I: Iterator<Item = &'a str>,
    T: std::str::FromStr,
{
    let tok = next_token(tokens, what)?;
    tok.parse()
        .map_err(|_| evo_error::err!(Io: "could not parse {what} from '{tok}'"))
}

impl PartialOrd for Genome {
    /// Genomes compare by fitness only; this ordering is for diagnostics,
    /// never for population membership (the population sorts by its own key).
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.fitness.partial_cmp(&other.fitness)
    }
}

impl fmt::Display for Genome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Genome(len={}, fitness={})", self.len(), self.fitness)
    }
}
