//! The shutdown flag shared between stdin, SIGINT, and the GA loop, plus
//! the log-level knob `stdin`'s `log<N>` line adjusts.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

#[derive(Clone)]
pub struct Control {
    stop: Arc<AtomicBool>,
    log_level: Arc<AtomicUsize>,
}

impl Control {
    pub fn new(initial_log_level: usize) -> Self {
        Control {
            stop: Arc::new(AtomicBool::new(false)),
            log_level: Arc::new(AtomicUsize::new(initial_log_level)),
        }
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    pub fn log_level(&self) -> usize {
        self.log_level.load(Ordering::SeqCst)
    }

    pub fn set_log_level(&self, level: usize) {
        self.log_level.store(level, Ordering::SeqCst);
    }
}

/// A line read from stdin or the SIGINT signal, delivered to the GA loop
/// through an unbounded channel so the loop can poll it cooperatively
/// instead of blocking on either source.
pub enum ControlEvent {
    Stop,
    SetLogLevel(usize),
}

/// Spawns the two tasks that feed stdin lines and SIGINT into `control`:
/// `stop` sets the shutdown flag, `log<N>` adjusts the log level, and a
/// SIGINT does exactly what `stop` does. Returns a receiver the GA loop
/// can poll without blocking, per the fast-periodic-work step of the loop.
pub fn spawn_control_listeners(control: Control) -> mpsc::UnboundedReceiver<ControlEvent> {
    let (tx, rx) = mpsc::unbounded_channel();

    let stdin_tx = tx.clone();
    tokio::spawn(async move {
        let stdin = tokio::io::stdin();
        let mut lines = BufReader::new(stdin).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if let Some(event) = parse_stdin_line(&line) {
                if stdin_tx.send(event).is_err() {
                    break;
                }
            }
        }
    });

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("received SIGINT, requesting shutdown");
            let _ = tx.send(ControlEvent::Stop);
        }
    });

    rx
}

fn parse_stdin_line(line: &str) -> Option<ControlEvent> {
    let line = line.trim();
    if line == "stop" {
        return Some(ControlEvent::Stop);
    }
    if let Some(level) = line.strip_prefix("log") {
        if let Ok(level) = level.parse::<usize>() {
            return Some(ControlEvent::SetLogLevel(level));
        }
    }
    None
}

/// Applies a drained `ControlEvent` to `control`.
pub fn apply(control: &Control, event: ControlEvent) {
    match event {
        ControlEvent::Stop => control.request_stop(),
        ControlEvent::SetLogLevel(level) => control.set_log_level(level),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_line_parses() {
        assert!(matches!(parse_stdin_line("stop"), Some(ControlEvent::Stop)));
    }

    #[test]
    fn log_level_line_parses_the_trailing_digit() {
        match parse_stdin_line("log2") {
            Some(ControlEvent::SetLogLevel(2)) => {}
            other => panic!("expected SetLogLevel(2), got a different event: {}", other.is_some()),
        }
    }

    #[test]
    fn unrecognised_line_is_ignored() {
        assert!(parse_stdin_line("whatever").is_none());
    }

    #[test]
    fn control_starts_unstopped_at_the_configured_log_level() {
        let control = Control::new(1);
        assert!(!control.is_stopped());
        assert_eq!(control.log_level(), 1);
        control.request_stop();
        assert!(control.is_stopped());
    }
}
