//! The single-threaded cooperative core: fast and slow periodic work, one
//! genome request drained, one score drained, idle yield. Everything else
//! in this crate exists to be called from here.

use crate::control::{Control, ControlEvent};
use crate::mating::{self, MatingConfig};
use crate::preferences::Preferences;
use crate::running_list::RunningList;
use crate::snapshot;
use crate::stats::{self, ProgressTracker};
use evo_core::{Population, StartPopulation};
use evo_error::Result;
use evo_net::SharedState;
use evo_wire::{DataFrame, Payload};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedReceiver;

const FAST_PERIOD: Duration = Duration::from_millis(100);
const SLOW_PERIOD: Duration = Duration::from_secs(100);
const IDLE_SLEEP: Duration = Duration::from_micros(1);

pub struct GaLoop {
    preferences: Preferences,
    control: Control,
    shared: Arc<SharedState>,
    evolve_population: Population,
    start_population: StartPopulation,
    running: RunningList,
    mating: MatingConfig,
    output_dir: PathBuf,
    log_file: std::fs::File,
    return_count: u64,
    progress: ProgressTracker,
    best_checkpoint: Option<f64>,
}

impl GaLoop {
    pub fn new(
        preferences: Preferences,
        control: Control,
        shared: Arc<SharedState>,
        evolve_population: Population,
        start_population: StartPopulation,
        mating: MatingConfig,
        output_dir: PathBuf,
        log_file: std::fs::File,
    ) -> Self {
        GaLoop {
            preferences,
            control,
            shared,
            evolve_population,
            start_population,
            running: RunningList::new(),
            mating,
            output_dir,
            log_file,
            return_count: 0,
            progress: ProgressTracker::new(),
            best_checkpoint: None,
        }
    }

    /// Runs until `returnCount` reaches `maxReproductions`, the shutdown
    /// flag is set, or a fatal I/O error occurs writing a required
    /// snapshot. Drives one full cooperative cycle per loop iteration.
    pub async fn run(&mut self, control_rx: &mut UnboundedReceiver<ControlEvent>) -> Result<()> {
        let mut last_fast = Instant::now();
        let mut last_slow = Instant::now();

        loop {
            if last_fast.elapsed() >= FAST_PERIOD {
                while let Ok(event) = control_rx.try_recv() {
                    crate::control::apply(&self.control, event);
                }
                self.progress.update(self.return_count, self.preferences.max_reproductions);
                last_fast = Instant::now();
            }

            if last_slow.elapsed() >= SLOW_PERIOD {
                let limit = Duration::from_secs(self.preferences.watch_dog_timer_limit);
                let evicted = self.running.evict_stale(limit);
                if evicted > 0 {
                    self.log(1, &format!("watchdog reclaimed {evicted} stale dispatch(es)"));
                }
                last_slow = Instant::now();
            }

            let mut did_work = false;

            if let Some(request) = self.shared.queues.pop_genome_request() {
                did_work = true;
                self.dispatch_genome(request);
            }

            if let Some(report) = self.shared.queues.pop_score() {
                did_work = true;
                self.ingest_score(report)?;
            }

            if self.return_count >= self.preferences.max_reproductions || self.control.is_stopped() {
                break;
            }

            if !did_work {
                tokio::time::sleep(IDLE_SLEEP).await;
            }
        }

        self.finish()
    }

    fn dispatch_genome(&mut self, request: evo_net::GenomeRequest) {
        let genome = if let Some(genome) = self.start_population.take_next() {
            genome
        } else if self.evolve_population.is_empty() {
            self.log(0, "no genomes available in either population, dropping req_gen_");
            return;
        } else {
            mating::produce_offspring(&self.evolve_population, &self.mating)
        };

        let run_id = self.running.record(genome.clone(), request.sender_ip, request.sender_port);
        let frame = DataFrame {
            evolve_identifier: self.shared.evolve_identifier,
            sender_ip: request.sender_ip,
            sender_port: request.sender_port,
            run_id,
            md5: self.shared.xml_md5,
            payload: Payload::Genome(genome.values().to_vec()),
        };
        if request.reply.send(frame.encode()).is_err() {
            self.log(1, &format!("run {run_id}: session closed before genome could be delivered"));
        }
    }

    fn ingest_score(&mut self, report: evo_net::ScoreReport) -> Result<()> {
        if report.evolve_identifier != self.shared.evolve_identifier {
            self.log(1, &format!("discarding score with stale evolveIdentifier {}", report.evolve_identifier));
            return Ok(());
        }
        let Some(entry) = self.running.take(report.run_id) else {
            self.log(1, &format!("discarding score for unknown run {}", report.run_id));
            return Ok(());
        };

        let mut genome = entry.genome;
        genome.set_fitness(report.score);

        if let Err(error) = self.evolve_population.insert_genome(genome) {
            self.log(1, &format!("run {}: {error} (score discarded)", report.run_id));
        }

        let best = self.evolve_population.best().map(|g| g.fitness());
        if let Some(best) = best {
            stats::report_best_score(best);
        }

        if self.preferences.output_stats_every > 0 && self.return_count % self.preferences.output_stats_every == 0 {
            let line = stats::format_decile_stats(&self.evolve_population);
            self.log(2, &line);
        }

        if self.preferences.save_best_every > 0
            && self.return_count % self.preferences.save_best_every == 0
            && best == Some(report.score)
        {
            if let Some(genome) = self.evolve_population.best() {
                if let Err(error) = snapshot::write_best_genome(&self.output_dir, self.return_count, genome) {
                    self.log(0, &format!("failed to write best-genome snapshot: {error}"));
                }
            }
        }

        if self.preferences.save_pop_every > 0 && self.return_count % self.preferences.save_pop_every == 0 {
            if let Err(error) = snapshot::write_population_snapshot(
                &self.output_dir,
                self.return_count,
                &self.evolve_population,
                self.preferences.output_population_size,
            ) {
                self.log(0, &format!("failed to write population snapshot: {error}"));
            }
        }

        if self.preferences.improvement_reproductions > 0
            && self.return_count % self.preferences.improvement_reproductions == 0
        {
            if let Some(best) = best {
                if let Some(previous) = self.best_checkpoint {
                    if (best - previous).abs() < self.preferences.improvement_threshold {
                        self.log(0, "insufficient improvement since last checkpoint, requesting shutdown");
                        self.control.request_stop();
                    }
                }
                self.best_checkpoint = Some(best);
            }
        }

        self.return_count += 1;
        stats::report_return_count(self.return_count);
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.shared.queues.disable_and_clear();

        if let Some(genome) = self.evolve_population.best() {
            snapshot::write_best_genome(&self.output_dir, self.return_count, genome)?;
        }
        snapshot::write_population_snapshot(
            &self.output_dir,
            self.return_count,
            &self.evolve_population,
            self.preferences.output_population_size,
        )?;

        if self.preferences.only_keep_best_genome {
            snapshot::keep_only_last_matching(&self.output_dir, "BestGenome_")?;
        }
        if self.preferences.only_keep_best_population {
            snapshot::keep_only_last_matching(&self.output_dir, "Population_")?;
        }

        self.log(0, &format!("evolution finished after {} reproductions", self.return_count));
        Ok(())
    }

    fn log(&mut self, level: usize, message: &str) {
        stats::log_line(&self.control, level, message);
        let _ = writeln!(self.log_file, "{message}");
    }
}
