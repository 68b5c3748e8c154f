//! Loads the whitespace-token-oriented parameter file: find a named token,
//! read the next token as the typed value. A missing required key aborts
//! startup with an error naming the source line of the failing read, so
//! the process's exit code is stable across runs for the same bad file.

use evo_error::{config_err, Result};
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Clone, Debug, PartialEq)]
pub struct Preferences {
    pub genome_length: usize,
    pub population_size: usize,
    pub max_reproductions: u64,
    pub gaussian_mutation_chance: f64,
    pub frame_shift_mutation_chance: f64,
    pub duplication_mutation_chance: f64,
    pub crossover_chance: f64,
    pub parents_to_keep: usize,
    pub save_best_every: u64,
    pub save_pop_every: u64,
    pub output_stats_every: u64,
    pub only_keep_best_genome: bool,
    pub only_keep_best_population: bool,
    pub improvement_reproductions: u64,
    pub improvement_threshold: f64,
    pub multiple_gaussian: bool,
    pub randomise_model: bool,
    pub output_population_size: usize,
    pub watch_dog_timer_limit: u64,
    pub parent_selection: String,
    pub gamma: f64,
    pub crossover_type: String,
    pub circular_mutation: bool,
    pub bounce_mutation: bool,
    pub minimize_score: bool,
    pub resize_control: String,
    pub starting_population: Option<PathBuf>,
}

impl Preferences {
    /// Parses `text` into a `Preferences`, cross-checking the invariants the
    /// specification calls out (`parentsToKeep < populationSize`,
    /// `genomeLength > 0`, all chance parameters in `[0, 1]`) before
    /// returning.
    ///
    /// `cli_starting_population` overrides the parameter file's
    /// `startingPopulation` key, if any.
    pub fn parse(text: &str, cli_starting_population: Option<PathBuf>) -> Result<Preferences> {
        let tokens: Vec<&str> = text.split_whitespace().collect();

        let prefs = Preferences {
            genome_length: require_num(&tokens, "genomeLength", line!())?,
            population_size: require_num(&tokens, "populationSize", line!())?,
            max_reproductions: require_num(&tokens, "maxReproductions", line!())?,
            gaussian_mutation_chance: require_num(&tokens, "gaussianMutationChance", line!())?,
            frame_shift_mutation_chance: require_num(&tokens, "frameShiftMutationChance", line!())?,
            duplication_mutation_chance: require_num(&tokens, "duplicationMutationChance", line!())?,
            crossover_chance: require_num(&tokens, "crossoverChance", line!())?,
            parents_to_keep: require_num(&tokens, "parentsToKeep", line!())?,
            save_best_every: require_num(&tokens, "saveBestEvery", line!())?,
            save_pop_every: require_num(&tokens, "savePopEvery", line!())?,
            output_stats_every: require_num(&tokens, "outputStatsEvery", line!())?,
            only_keep_best_genome: require_bool(&tokens, "onlyKeepBestGenome", line!())?,
            only_keep_best_population: require_bool(&tokens, "onlyKeepBestPopulation", line!())?,
            improvement_reproductions: require_num(&tokens, "improvementReproductions", line!())?,
            improvement_threshold: require_num(&tokens, "improvementThreshold", line!())?,
            multiple_gaussian: require_bool(&tokens, "multipleGaussian", line!())?,
            randomise_model: require_bool(&tokens, "randomiseModel", line!())?,
            output_population_size: require_num(&tokens, "outputPopulationSize", line!())?,
            watch_dog_timer_limit: require_num(&tokens, "watchDogTimerLimit", line!())?,
            parent_selection: require_str(&tokens, "parentSelection", line!())?,
            gamma: require_num(&tokens, "gamma", line!())?,
            crossover_type: require_str(&tokens, "crossoverType", line!())?,
            circular_mutation: require_bool(&tokens, "circularMutation", line!())?,
            bounce_mutation: require_bool(&tokens, "bounceMutation", line!())?,
            minimize_score: require_bool(&tokens, "minimizeScore", line!())?,
            resize_control: require_str(&tokens, "resizeControl", line!())?,
            starting_population: cli_starting_population.or_else(|| {
                find_value(&tokens, "startingPopulation").map(PathBuf::from)
            }),
        };

        if prefs.parents_to_keep >= prefs.population_size {
            return Err(config_err!(
                line!(),
                "parentsToKeep ({}) must be less than populationSize ({})",
                prefs.parents_to_keep,
                prefs.population_size
            ));
        }

        if prefs.genome_length == 0 {
            return Err(config_err!(line!(), "genomeLength must be greater than 0"));
        }

        for (name, chance) in [
            ("gaussianMutationChance", prefs.gaussian_mutation_chance),
            ("frameShiftMutationChance", prefs.frame_shift_mutation_chance),
            ("duplicationMutationChance", prefs.duplication_mutation_chance),
            ("crossoverChance", prefs.crossover_chance),
        ] {
            if !(0.0..=1.0).contains(&chance) {
                return Err(config_err!(line!(), "{name} ({chance}) must be between 0.0 and 1.0"));
            }
        }

        Ok(prefs)
    }
}

fn find_value<'a>(tokens: &'a [&'a str], key: &str) -> Option<&'a str> {
    tokens.iter().position(|t| *t == key).and_then(|i| tokens.get(i + 1)).copied()
}

fn require_num<T: FromStr>(tokens: &[&str], key: &str, line: u32) -> Result<T> {
    let raw = find_value(tokens, key).ok_or_else(|| config_err!(line, "missing required parameter '{}'", key))?;
    raw.parse()
        .map_err(|_| config_err!(line, "parameter '{}' has invalid numeric value '{}'", key, raw))
}

fn require_str(tokens: &[&str], key: &str, line: u32) -> Result<String> {
    find_value(tokens, key)
        .map(str::to_string)
        .ok_or_else(|| config_err!(line, "missing required parameter '{}'", key))
}

fn require_bool(tokens: &[&str], key: &str, line: u32) -> Result<bool> {
    let raw = find_value(tokens, key).ok_or_else(|| config_err!(line, "missing required parameter '{}'", key))?;
    match raw {
        "0" | "false" | "False" => Ok(false),
        "1" | "true" | "True" => Ok(true),
        _ => Err(config_err!(line, "parameter '{}' has invalid boolean value '{}'", key, raw)),
    }
}
