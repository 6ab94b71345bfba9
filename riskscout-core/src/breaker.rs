//! Circuit breaker and fallback guard for external dependencies.
//!
//! Every external dependency (the LLM backend, each search provider) owns
//! one [`Breaker`]. A breaker:
//! - Rejects calls without I/O while open
//! - Admits exactly one trial call once the reset timeout elapses
//! - Reports every state transition to a [`BreakerObserver`]
//!
//! [`Breaker::with_fallback`] turns any failure of the guarded call, not just
//! an open circuit, into a caller-supplied degraded value.

use crate::config::BreakerSettings;
use crate::error::BreakerError;
use std::fmt;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

// ---------------------------------------------------------------------------
// Circuit state machine
// ---------------------------------------------------------------------------

/// State of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CircuitState {
    /// Normal operation; calls are permitted.
    Closed,
    /// Too many failures; calls are blocked.
    Open { since: Instant },
    /// Recovery probe: one call is permitted to test the dependency.
    HalfOpen,
}

impl CircuitState {
    pub fn label(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open { .. } => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A recorded change of circuit state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    pub from: CircuitState,
    pub to: CircuitState,
}

/// A circuit breaker that trips after consecutive failures and recovers
/// after a timeout.
#[derive(Debug)]
pub struct CircuitBreaker {
    state: CircuitState,
    failure_count: usize,
    failure_threshold: usize,
    reset_timeout: Duration,
    trial_in_flight: bool,
    transitions: Vec<Transition>,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: usize, reset_timeout: Duration) -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            failure_threshold: failure_threshold.max(1),
            reset_timeout,
            trial_in_flight: false,
            transitions: Vec::new(),
        }
    }

    /// Whether a call is currently permitted.
    ///
    /// In half-open state only the first caller is admitted; later callers
    /// are rejected until the trial resolves.
    pub fn is_call_permitted(&mut self) -> bool {
        match self.state {
            CircuitState::Closed => true,
            CircuitState::Open { since } => {
                if since.elapsed() >= self.reset_timeout {
                    debug!("Circuit breaker transitioning to half-open");
                    self.transition(CircuitState::HalfOpen);
                    self.trial_in_flight = true;
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => {
                if self.trial_in_flight {
                    false
                } else {
                    self.trial_in_flight = true;
                    true
                }
            }
        }
    }

    /// Record a successful call.
    pub fn record_success(&mut self) {
        self.failure_count = 0;
        self.trial_in_flight = false;
        if self.state != CircuitState::Closed {
            debug!("Circuit breaker closing after successful probe");
            self.transition(CircuitState::Closed);
        }
    }

    /// Record a failed call.
    pub fn record_failure(&mut self) {
        self.trial_in_flight = false;
        match self.state {
            CircuitState::HalfOpen => {
                warn!("Trial call failed, circuit breaker re-opening");
                self.transition(CircuitState::Open {
                    since: Instant::now(),
                });
            }
            CircuitState::Closed => {
                self.failure_count += 1;
                if self.failure_count >= self.failure_threshold {
                    warn!(
                        failures = self.failure_count,
                        threshold = self.failure_threshold,
                        "Circuit breaker opening"
                    );
                    self.transition(CircuitState::Open {
                        since: Instant::now(),
                    });
                }
            }
            CircuitState::Open { .. } => {}
        }
    }

    /// Get the current state.
    pub fn state(&self) -> CircuitState {
        self.state
    }

    pub fn failure_count(&self) -> usize {
        self.failure_count
    }

    /// Drain transitions recorded since the last call.
    pub fn take_transitions(&mut self) -> Vec<Transition> {
        std::mem::take(&mut self.transitions)
    }

    fn transition(&mut self, to: CircuitState) {
        let from = self.state;
        self.state = to;
        self.transitions.push(Transition { from, to });
    }
}

// ---------------------------------------------------------------------------
// Observability hook
// ---------------------------------------------------------------------------

/// Receives every breaker state transition.
pub trait BreakerObserver: Send + Sync {
    fn on_state_change(&self, dependency: &str, from: CircuitState, to: CircuitState);
}

/// Default observer: logs transitions through `tracing`.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl BreakerObserver for TracingObserver {
    fn on_state_change(&self, dependency: &str, from: CircuitState, to: CircuitState) {
        info!(
            dependency,
            from = from.label(),
            to = to.label(),
            "Circuit state changed"
        );
    }
}

// ---------------------------------------------------------------------------
// Breaker
// ---------------------------------------------------------------------------

/// A named, shareable circuit breaker guarding one external dependency.
///
/// The state lives behind a single mutex held only between suspension
/// points, so concurrent branches can share one instance.
pub struct Breaker {
    name: String,
    circuit: Mutex<CircuitBreaker>,
    observer: Arc<dyn BreakerObserver>,
}

impl Breaker {
    pub fn new(name: impl Into<String>, failure_threshold: usize, reset_timeout: Duration) -> Self {
        Self {
            name: name.into(),
            circuit: Mutex::new(CircuitBreaker::new(failure_threshold, reset_timeout)),
            observer: Arc::new(TracingObserver),
        }
    }

    pub fn from_settings(name: impl Into<String>, settings: &BreakerSettings) -> Self {
        Self::new(
            name,
            settings.failure_threshold,
            Duration::from_secs(settings.reset_timeout_secs),
        )
    }

    pub fn with_observer(mut self, observer: Arc<dyn BreakerObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state()
    }

    /// Run `call` if the circuit admits it, recording the outcome.
    pub async fn guard<F, Fut, T, E>(&self, call: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let permitted = {
            let mut circuit = self.lock();
            let permitted = circuit.is_call_permitted();
            let transitions = circuit.take_transitions();
            drop(circuit);
            self.notify(transitions);
            permitted
        };

        if !permitted {
            debug!(dependency = %self.name, "Rejecting call, circuit open");
            return Err(BreakerError::Open {
                dependency: self.name.clone(),
            });
        }

        let mut pending = PendingCall {
            breaker: self,
            settled: false,
        };
        let result = call().await;
        pending.settled = true;

        match result {
            Ok(value) => {
                self.record(true);
                Ok(value)
            }
            Err(e) => {
                self.record(false);
                Err(BreakerError::Inner(e))
            }
        }
    }

    /// Run `call` through the breaker; on any failure return `fallback(err)`
    /// instead of propagating.
    pub async fn with_fallback<F, Fut, T, E, FB>(&self, call: F, fallback: FB) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        FB: FnOnce(BreakerError<E>) -> T,
    {
        match self.guard(call).await {
            Ok(value) => value,
            Err(e) => fallback(e),
        }
    }

    fn record(&self, success: bool) {
        let mut circuit = self.lock();
        if success {
            circuit.record_success();
        } else {
            circuit.record_failure();
        }
        let transitions = circuit.take_transitions();
        drop(circuit);
        self.notify(transitions);
    }

    fn notify(&self, transitions: Vec<Transition>) {
        for t in transitions {
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                self.observer.on_state_change(&self.name, t.from, t.to)
            }));
            if outcome.is_err() {
                error!(dependency = %self.name, "Breaker observer panicked; ignoring");
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, CircuitBreaker> {
        self.circuit.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl fmt::Debug for Breaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Breaker")
            .field("name", &self.name)
            .field("state", &self.state())
            .finish()
    }
}

/// Counts a call dropped before completion as a failure, so a cancelled
/// half-open trial cannot wedge the circuit.
struct PendingCall<'a> {
    breaker: &'a Breaker,
    settled: bool,
}

impl Drop for PendingCall<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.breaker.record(false);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
