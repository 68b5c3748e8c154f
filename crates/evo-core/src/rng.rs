//! Thread-local random number generation: uniform draws, a zero-mean unit
//! Gaussian, and the three biased integer draws used by parent selection
//! (rank-biased, sqrt-biased, gamma-biased).

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::cell::RefCell;
use std::sync::{Arc, LazyLock, Mutex};

static GLOBAL_RNG: LazyLock<Arc<Mutex<SmallRng>>> =
    LazyLock::new(|| Arc::new(Mutex::new(SmallRng::from_entropy())));

thread_local! {
    static TLS_RNG: RefCell<SmallRng> = RefCell::new({
        let mut global = GLOBAL_RNG.lock().unwrap();
        SmallRng::from_rng(&mut *global).expect("failed to seed thread-local rng")
    });
}

fn with_rng<R>(f: impl FnOnce(&mut SmallRng) -> R) -> R {
    TLS_RNG.with(|cell| f(&mut cell.borrow_mut()))
}

/// Reseeds the global RNG; new threads spawned afterwards derive their
/// thread-local generator from this seed. Exists for reproducible tests, not
/// for run-to-run reproducibility (see Non-goals).
pub fn set_seed(seed: u64) {
    let mut global = GLOBAL_RNG.lock().unwrap();
    *global = SmallRng::seed_from_u64(seed);
}

/// Uniform `f64` in `[lo, hi]`.
pub fn uniform_f64(lo: f64, hi: f64) -> f64 {
    if lo >= hi {
        return lo;
    }
    with_rng(|rng| rng.gen_range(lo..=hi))
}

/// Uniform `i64` in `[lo, hi]` inclusive.
pub fn uniform_i64(lo: i64, hi: i64) -> i64 {
    if lo >= hi {
        return lo;
    }
    with_rng(|rng| rng.gen_range(lo..=hi))
}

/// A fair-ish coin: `true` with probability `p`.
pub fn bool_with_bias(p: f64) -> bool {
    with_rng(|rng| rng.gen_bool(p.clamp(0.0, 1.0)))
}

/// A zero-mean, unit-variance Gaussian sample via the Box-Muller transform.
pub fn gaussian() -> f64 {
    with_rng(|rng| {
        let u1: f64 = rng.r#gen::<f64>().max(f64::MIN_POSITIVE);
        let u2: f64 = rng.r#gen();
        (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
    })
}

/// Rank-biased draw over `[lo, hi]`: probability of `k` is proportional to
/// `(hi - k + 1)`, so higher values are favoured linearly.
pub fn rank_biased_i64(lo: i64, hi: i64) -> i64 {
    if lo >= hi {
        return lo;
    }
    let span = (hi - lo + 1) as f64;
    let u: f64 = with_rng(|rng| rng.r#gen());
    let offset = (u * span * span).sqrt().floor() as i64;
    (hi - offset).clamp(lo, hi)
}

/// Sqrt-biased draw over `[lo, hi]`: favours higher `k` with probability
/// proportional to `sqrt(k - lo + 1)`.
pub fn sqrt_biased_i64(lo: i64, hi: i64) -> i64 {
    if lo >= hi {
        return lo;
    }
    let n = (hi - lo + 1) as usize;
    let weights: Vec<f64> = (1..=n).map(|k| (k as f64).sqrt()).collect();
    let total: f64 = weights.iter().sum();
    let mut target = with_rng(|rng| rng.r#gen::<f64>()) * total;
    for (i, w) in weights.iter().enumerate() {
        target -= w;
        if target <= 0.0 {
            return lo + i as i64;
        }
    }
    hi
}

/// Gamma-biased draw over `[lo, hi]`: `lo + floor((hi - lo + 1) * U^(1/gamma))`.
/// `gamma < 1` skews low, `gamma > 1` skews high.
pub fn gamma_biased_i64(lo: i64, hi: i64, gamma: f64) -> i64 {
    if lo >= hi {
        return lo;
    }
    let span = (hi - lo + 1) as f64;
    let u: f64 = with_rng(|rng| rng.r#gen());
    let shaped = u.powf(1.0 / gamma);
    let offset = (span * shaped).floor() as i64;
    (lo + offset).clamp(lo, hi)
}
