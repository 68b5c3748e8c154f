//! On-disk outputs: `BestGenome_%012d.txt` and `Population_%012d.txt`
//! snapshots, plus the end-of-run pruning that keeps only the
//! lexicographically last of each when `onlyKeepBest*` is set.

use evo_core::{Genome, Population};
use evo_error::Result;
use std::path::{Path, PathBuf};

pub fn best_genome_filename(return_count: u64) -> String {
    format!("BestGenome_{return_count:012}.txt")
}

pub fn population_filename(return_count: u64) -> String {
    format!("Population_{return_count:012}.txt")
}

pub fn write_best_genome(dir: &Path, return_count: u64, genome: &Genome) -> Result<()> {
    let path = dir.join(best_genome_filename(return_count));
    let mut text = String::from("1\n");
    text.push_str(&genome.serialize());
    std::fs::write(path, text)?;
    Ok(())
}

pub fn write_population_snapshot(
    dir: &Path,
    return_count: u64,
    population: &Population,
    output_size: usize,
) -> Result<()> {
    let path = dir.join(population_filename(return_count));
    std::fs::write(path, population.write_text(output_size))?;
    Ok(())
}

/// Deletes every file in `dir` whose name starts with `prefix`, except the
/// lexicographically last, which the zero-padded run counter makes the
/// most recent.
pub fn keep_only_last_matching(dir: &Path, prefix: &str) -> Result<()> {
    let mut matches: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .map(|name| name.starts_with(prefix))
                .unwrap_or(false)
        })
        .collect();
    matches.sort();
    matches.pop();
    for stale in matches {
        if let Err(error) = std::fs::remove_file(&stale) {
            tracing::warn!(path = %stale.display(), %error, "failed to prune old snapshot");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use evo_core::{Circularity, Optimize};
    use tempfile::TempDir;

    #[test]
    fn best_genome_filename_is_zero_padded_to_twelve_digits() {
        assert_eq!(best_genome_filename(7), "BestGenome_000000000007.txt");
    }

    #[test]
    fn write_and_prune_best_genome_snapshots() {
        let dir = TempDir::new().unwrap();
        let genome = Genome::new(vec![0.0], vec![1.0], vec![1.0], Circularity::Global(false));
        write_best_genome(dir.path(), 1, &genome).unwrap();
        write_best_genome(dir.path(), 2, &genome).unwrap();
        write_best_genome(dir.path(), 3, &genome).unwrap();

        keep_only_last_matching(dir.path(), "BestGenome_").unwrap();

        let remaining: Vec<_> = std::fs::read_dir(dir.path()).unwrap().filter_map(|e| e.ok()).collect();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].file_name().to_str().unwrap(), best_genome_filename(3));
    }

    #[test]
    fn population_snapshot_writes_the_requested_number_of_best_genomes() {
        let dir = TempDir::new().unwrap();
        let mut pop = Population::new(5, 0, Optimize::Maximize);
        for f in [1.0, 2.0, 3.0] {
            let mut g = Genome::new(vec![0.0], vec![1.0], vec![1.0], Circularity::Global(false));
            g.set_fitness(f);
            pop.insert_genome(g).unwrap();
        }
        write_population_snapshot(dir.path(), 1, &pop, 2).unwrap();
        let text = std::fs::read_to_string(dir.path().join(population_filename(1))).unwrap();
        assert!(text.starts_with("2\n"));
    }
}
