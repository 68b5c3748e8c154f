//! Process entry point: parses the CLI, loads the parameter file, base XML
//! model, and starting population, then wires the session server and the
//! GA core loop together and runs them to completion.

mod cli;

use clap::Parser;
use cli::Cli;
use evo_core::{read_genomes_text, Optimize, Population, ResizeMode, StartPopulation};
use evo_engine::mating::MatingConfig;
use evo_engine::preferences::Preferences;
use evo_engine::{control, ga_loop::GaLoop, Control};
use evo_error::{config_err, ResultExt};
use evo_mating::{Crossover, DuplicationMutator, FrameshiftMutator, GaussianMutator};
use evo_net::{serve, SharedState};
use evo_selectors::ChooseParent;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::net::TcpListener;
use tokio::sync::watch;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => std::process::exit(0),
        Err(error) => {
            tracing::error!(%error, "evo-server exited with an error");
            std::process::exit(error.exit_code());
        }
    }
}

async fn run(cli: Cli) -> evo_error::Result<()> {
    if let Err(error) = rlimit::increase_nofile_limit(u64::MAX) {
        tracing::warn!(%error, "could not raise file-descriptor soft limit");
    }

    let output_dir = cli.resolved_output_directory();
    std::fs::create_dir_all(&output_dir).context("creating output directory")?;
    let log_file = std::fs::File::create(output_dir.join("log.txt")).context("creating log.txt")?;

    let parameter_text = std::fs::read_to_string(&cli.parameter_file).context("reading parameter file")?;
    let preferences = Preferences::parse(&parameter_text, Some(cli.starting_population.clone()))
        .context("parsing parameter file")?;

    let base_xml = std::fs::read(&cli.base_xml_file).context("reading base XML file")?;

    let starting_population_path = preferences
        .starting_population
        .clone()
        .expect("startingPopulation is always set: required on the CLI");
    let starting_population_text =
        std::fs::read_to_string(&starting_population_path).context("reading starting population file")?;
    let starting_genomes = read_genomes_text(&starting_population_text).context("parsing starting population file")?;
    let mut start_population = StartPopulation::new(starting_genomes);

    let resize_mode = ResizeMode::from_name(&preferences.resize_control)
        .ok_or_else(|| config_err!(line!(), "unrecognised resizeControl '{}'", preferences.resize_control))?;
    let resize_mutator = GaussianMutator::new(preferences.gaussian_mutation_chance as f32, preferences.bounce_mutation);

    if start_population.len() != preferences.population_size {
        tracing::info!(
            loaded = start_population.len(),
            wanted = preferences.population_size,
            "starting population size does not match populationSize, resizing"
        );
        start_population.resize(preferences.population_size, resize_mode, |g| resize_mutator.mutate_single(g));
    }
    if let Some(loaded_length) = start_population.genome_length() {
        if loaded_length != preferences.genome_length {
            return Err(config_err!(
                line!(),
                "starting population genome length {} does not match genomeLength {}",
                loaded_length,
                preferences.genome_length
            ));
        }
    }
    start_population.set_global_circular(preferences.circular_mutation);
    if preferences.randomise_model {
        start_population.randomise_all();
    }

    let optimize = Optimize::from_minimize_flag(preferences.minimize_score);
    let mut evolve_population = Population::new(preferences.population_size, preferences.parents_to_keep, optimize);
    evolve_population.set_global_circular(preferences.circular_mutation);

    let mating = MatingConfig {
        choose_parent: ChooseParent::from_name(&preferences.parent_selection, preferences.gamma)
            .ok_or_else(|| config_err!(line!(), "unrecognised parentSelection '{}'", preferences.parent_selection))?,
        crossover: Crossover::from_name(&preferences.crossover_type)
            .ok_or_else(|| config_err!(line!(), "unrecognised crossoverType '{}'", preferences.crossover_type))?,
        crossover_chance: preferences.crossover_chance,
        multiple_gaussian: preferences.multiple_gaussian,
        gaussian: resize_mutator,
        frameshift: FrameshiftMutator::new(preferences.frame_shift_mutation_chance as f32),
        duplication: DuplicationMutator::new(preferences.duplication_mutation_chance as f32),
    };

    let evolve_identifier = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    evo_engine::stats::report_evolve_identifier(evolve_identifier);

    let shared = Arc::new(SharedState::new(base_xml, evolve_identifier));

    let listener = TcpListener::bind(("0.0.0.0", cli.server_port)).await.context("binding server port")?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let server_shared = shared.clone();
    let server_task = tokio::spawn(async move { serve(listener, server_shared, shutdown_rx).await });

    let control = Control::new(cli.log_level);
    let mut control_rx = control::spawn_control_listeners(control.clone());

    let mut ga_loop = GaLoop::new(
        preferences,
        control,
        shared,
        evolve_population,
        start_population,
        mating,
        output_dir,
        log_file,
    );
    let result = ga_loop.run(&mut control_rx).await;

    let _ = shutdown_tx.send(true);
    if let Ok(Err(error)) = server_task.await {
        tracing::warn!(%error, "session server reported an I/O error on shutdown");
    }

    result
}
