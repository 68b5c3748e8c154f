#[cfg(test)]
mod ga_loop_tests {
    use evo_core::{Circularity, Genome, Optimize, Population, StartPopulation};
    use evo_engine::control::spawn_control_listeners;
    use evo_engine::ga_loop::GaLoop;
    use evo_engine::mating::MatingConfig;
    use evo_engine::preferences::Preferences;
    use evo_engine::Control;
    use evo_mating::{Crossover, DuplicationMutator, FrameshiftMutator, GaussianMutator};
    use evo_net::{serve, SharedState};
    use evo_selectors::ChooseParent;
    use evo_wire::{Command, DataFrame, Payload, RequestFrame};
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::watch;

    const MINIMAL_PREFS: &str = "
        genomeLength 1
        populationSize 3
        maxReproductions 1
        gaussianMutationChance 1
        frameShiftMutationChance 0
        duplicationMutationChance 0
        crossoverChance 0
        parentsToKeep 0
        saveBestEvery 1
        savePopEvery 1
        outputStatsEvery 1
        onlyKeepBestGenome 1
        onlyKeepBestPopulation 1
        improvementReproductions 0
        improvementThreshold 0.0
        multipleGaussian false
        randomiseModel 0
        outputPopulationSize 3
        watchDogTimerLimit 600
        parentSelection Uniform
        gamma 1.0
        crossoverType OnePoint
        circularMutation 0
        bounceMutation 1
        minimizeScore 0
        resizeControl RandomiseResize
    ";

    fn mating_config() -> MatingConfig {
        MatingConfig {
            choose_parent: ChooseParent::Uniform,
            crossover: Crossover::OnePoint,
            crossover_chance: 0.0,
            multiple_gaussian: false,
            gaussian: GaussianMutator::new(1.0, true),
            frameshift: FrameshiftMutator::new(0.0),
            duplication: DuplicationMutator::new(0.0),
        }
    }

    async fn read_frame(client: &mut TcpStream) -> DataFrame {
        let mut prefix = [0u8; evo_wire::LENGTH_PREFIX_LEN];
        client.read_exact(&mut prefix).await.unwrap();
        let len = evo_wire::decode_length_prefix(prefix);
        let mut body = vec![0u8; len];
        client.read_exact(&mut body).await.unwrap();
        DataFrame::decode(&body).unwrap()
    }

    async fn send_request(client: &mut TcpStream, frame: RequestFrame) {
        let encoded = frame.encode();
        client.write_all(&evo_wire::encode_length_prefix(encoded.len())).await.unwrap();
        client.write_all(&encoded).await.unwrap();
    }

    fn unscored_genome() -> Genome {
        Genome::new(vec![0.0], vec![1.0], vec![0.1], Circularity::Global(false))
    }

    /// A worker that requests a genome, scores it, and observes the score
    /// land in the population's final snapshot: the whole path of §4.8
    /// steps 3 and 4 driven end to end over a real socket.
    #[tokio::test]
    async fn a_dispatched_genome_round_trips_into_the_population_snapshot() {
        let preferences = Preferences::parse(MINIMAL_PREFS, None).unwrap();
        let evolve_identifier = 1_700_000_000u64;
        let shared = Arc::new(SharedState::new(b"<model/>".to_vec(), evolve_identifier));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let serve_shared = shared.clone();
        let server = tokio::spawn(async move { serve(listener, serve_shared, shutdown_rx).await });

        let mut client = TcpStream::connect(addr).await.unwrap();
        send_request(
            &mut client,
            RequestFrame {
                command: Command::RequestGenome,
                evolve_identifier,
                sender_ip: 0x7f000001,
                sender_port: 12345,
                run_id: 0,
                score: 0.0,
            },
        )
        .await;

        let evolve_population = Population::new(
            preferences.population_size,
            preferences.parents_to_keep,
            Optimize::from_minimize_flag(preferences.minimize_score),
        );
        let start_population = StartPopulation::new(vec![unscored_genome()]);

        let dir = TempDir::new().unwrap();
        let log_file = std::fs::File::create(dir.path().join("log.txt")).unwrap();
        let control = Control::new(0);
        let mut control_rx = spawn_control_listeners(control.clone());

        let mut ga_loop = GaLoop::new(
            preferences,
            control,
            shared.clone(),
            evolve_population,
            start_population,
            mating_config(),
            dir.path().to_path_buf(),
            log_file,
        );
        let ga_task = tokio::spawn(async move { ga_loop.run(&mut control_rx).await });

        let genome_frame = read_frame(&mut client).await;
        let run_id = genome_frame.run_id;
        assert!(matches!(genome_frame.payload, Payload::Genome(_)));

        send_request(
            &mut client,
            RequestFrame {
                command: Command::Score,
                evolve_identifier,
                sender_ip: 0,
                sender_port: 0,
                run_id,
                score: 2.5,
            },
        )
        .await;

        ga_task.await.unwrap().unwrap();
        let _ = shutdown_tx.send(true);
        let _ = server.await;

        let snapshot = std::fs::read_to_string(dir.path().join("Population_000000000001.txt")).unwrap();
        assert!(snapshot.contains("fitness 2.5 0 0 0"));
    }

    /// A score carrying a stale `evolveIdentifier` (from a previous server
    /// run) is discarded without ever reaching the population, matching the
    /// source's behaviour across a restart.
    #[tokio::test]
    async fn stale_evolve_identifier_is_discarded_without_stalling_the_loop() {
        let preferences = Preferences::parse(MINIMAL_PREFS, None).unwrap();
        let evolve_identifier = 1_700_000_000u64;
        let shared = Arc::new(SharedState::new(b"<model/>".to_vec(), evolve_identifier));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let serve_shared = shared.clone();
        let server = tokio::spawn(async move { serve(listener, serve_shared, shutdown_rx).await });

        let mut client = TcpStream::connect(addr).await.unwrap();
        send_request(
            &mut client,
            RequestFrame {
                command: Command::RequestGenome,
                evolve_identifier,
                sender_ip: 0,
                sender_port: 0,
                run_id: 0,
                score: 0.0,
            },
        )
        .await;

        let evolve_population = Population::new(
            preferences.population_size,
            preferences.parents_to_keep,
            Optimize::from_minimize_flag(preferences.minimize_score),
        );
        let start_population = StartPopulation::new(vec![unscored_genome()]);

        let dir = TempDir::new().unwrap();
        let log_file = std::fs::File::create(dir.path().join("log.txt")).unwrap();
        let control = Control::new(0);
        let mut control_rx = spawn_control_listeners(control.clone());

        let mut ga_loop = GaLoop::new(
            preferences,
            control,
            shared.clone(),
            evolve_population,
            start_population,
            mating_config(),
            dir.path().to_path_buf(),
            log_file,
        );
        let ga_task = tokio::spawn(async move { ga_loop.run(&mut control_rx).await });

        let genome_frame = read_frame(&mut client).await;
        let run_id = genome_frame.run_id;

        // Stale identifier: discarded, returnCount does not advance.
        send_request(
            &mut client,
            RequestFrame {
                command: Command::Score,
                evolve_identifier: evolve_identifier - 1,
                sender_ip: 0,
                sender_port: 0,
                run_id,
                score: 9.25,
            },
        )
        .await;

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!ga_task.is_finished());

        // Fresh identifier, same run id: accepted, the loop completes.
        send_request(
            &mut client,
            RequestFrame {
                command: Command::Score,
                evolve_identifier,
                sender_ip: 0,
                sender_port: 0,
                run_id,
                score: 9.25,
            },
        )
        .await;

        ga_task.await.unwrap().unwrap();
        let _ = shutdown_tx.send(true);
        let _ = server.await;

        let snapshot = std::fs::read_to_string(dir.path().join("Population_000000000001.txt")).unwrap();
        assert!(snapshot.contains("fitness 9.25 0 0 0"));
    }
}
