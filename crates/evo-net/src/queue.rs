//! The two concurrent FIFOs the session server produces into and the GA
//! loop drains: genome requests (deduplicated per session) and scores.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc::UnboundedSender;

/// A `req_gen_` waiting to be serviced. `reply` delivers the encoded
/// `genome` data frame back to the worker that asked for it; a send
/// failure means the session has already closed.
pub struct GenomeRequest {
    pub session_id: u64,
    pub sender_ip: u32,
    pub sender_port: u32,
    pub reply: UnboundedSender<Vec<u8>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ScoreReport {
    pub evolve_identifier: u64,
    pub run_id: u32,
    pub score: f64,
}

#[derive(Default)]
pub struct Queues {
    genome_requests: Mutex<VecDeque<GenomeRequest>>,
    pending_sessions: Mutex<HashSet<u64>>,
    scores: Mutex<VecDeque<ScoreReport>>,
    enabled: AtomicBool,
}

impl Queues {
    pub fn new() -> Self {
        Queues {
            genome_requests: Mutex::new(VecDeque::new()),
            pending_sessions: Mutex::new(HashSet::new()),
            scores: Mutex::new(VecDeque::new()),
            enabled: AtomicBool::new(true),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Disables further `req_gen_` intake and clears both queues. Called
    /// once by the GA loop on its way out.
    pub fn disable_and_clear(&self) {
        self.enabled.store(false, Ordering::SeqCst);
        self.genome_requests.lock().unwrap().clear();
        self.pending_sessions.lock().unwrap().clear();
        self.scores.lock().unwrap().clear();
    }

    /// Enqueues a genome request unless this session already has one
    /// outstanding, in which case the new one is silently dropped.
    pub fn push_genome_request(&self, request: GenomeRequest) {
        if !self.is_enabled() {
            return;
        }
        let mut pending = self.pending_sessions.lock().unwrap();
        if !pending.insert(request.session_id) {
            tracing::debug!(session_id = request.session_id, "duplicate req_gen_ ignored");
            return;
        }
        self.genome_requests.lock().unwrap().push_back(request);
    }

    pub fn pop_genome_request(&self) -> Option<GenomeRequest> {
        let request = self.genome_requests.lock().unwrap().pop_front()?;
        self.pending_sessions.lock().unwrap().remove(&request.session_id);
        Some(request)
    }

    pub fn push_score(&self, report: ScoreReport) {
        if !self.is_enabled() {
            return;
        }
        self.scores.lock().unwrap().push_back(report);
    }

    pub fn pop_score(&self) -> Option<ScoreReport> {
        self.scores.lock().unwrap().pop_front()
    }

    pub fn genome_requests_pending(&self) -> usize {
        self.genome_requests.lock().unwrap().len()
    }

    pub fn scores_pending(&self) -> usize {
        self.scores.lock().unwrap().len()
    }
}
