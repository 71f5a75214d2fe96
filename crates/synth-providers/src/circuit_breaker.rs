use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use synth_core::CircuitBreakerConfig;

/// Per-provider circuit state (§4.A, §5 "per-process, convergence eventual").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Closed,
    Open,
    HalfOpen,
}

struct Inner {
    state: State,
    failures: VecDeque<Instant>,
    opened_at: Option<Instant>,
    half_open_probes_remaining: u32,
}

/// After `failure_threshold` failures inside `window`, the circuit opens for
/// `recovery_timeout`; a half-open window then admits a bounded number of
/// probe calls before fully closing again on success.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                state: State::Closed,
                failures: VecDeque::new(),
                opened_at: None,
                half_open_probes_remaining: 0,
            }),
        }
    }

    /// Returns `true` if a call should be allowed to proceed against this
    /// provider right now. Transitions Open -> HalfOpen once the cooldown
    /// has elapsed.
    pub fn allow_call(&self) -> bool {
        let mut inner = self.inner.lock();
        match inner.state {
            State::Closed => true,
            State::HalfOpen => inner.half_open_probes_remaining > 0,
            State::Open => {
                let elapsed = inner.opened_at.map(|t| t.elapsed()).unwrap_or(Duration::ZERO);
                if elapsed >= Duration::from_secs(self.config.recovery_timeout_secs) {
                    inner.state = State::HalfOpen;
                    inner.half_open_probes_remaining = self.config.half_open_probe_count;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            State::HalfOpen => {
                inner.half_open_probes_remaining = inner.half_open_probes_remaining.saturating_sub(1);
                if inner.half_open_probes_remaining == 0 {
                    inner.state = State::Closed;
                    inner.failures.clear();
                    inner.opened_at = None;
                }
            }
            State::Closed => {
                inner.failures.clear();
            }
            State::Open => {}
        }
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        let now = Instant::now();
        let window = Duration::from_secs(self.config.window_secs);

        match inner.state {
            State::HalfOpen => {
                inner.state = State::Open;
                inner.opened_at = Some(now);
                inner.failures.clear();
            }
            State::Closed | State::Open => {
                inner.failures.push_back(now);
                while let Some(front) = inner.failures.front() {
                    if now.duration_since(*front) > window {
                        inner.failures.pop_front();
                    } else {
                        break;
                    }
                }
                if inner.state == State::Closed
                    && inner.failures.len() as u32 >= self.config.failure_threshold
                {
                    inner.state = State::Open;
                    inner.opened_at = Some(now);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: 2,
            window_secs: 60,
            recovery_timeout_secs: 0,
            half_open_probe_count: 1,
        }
    }

    #[test]
    fn opens_after_threshold_failures() {
        let config = CircuitBreakerConfig {
            failure_threshold: 2,
            window_secs: 60,
            recovery_timeout_secs: 60,
            half_open_probe_count: 1,
        };
        let breaker = CircuitBreaker::new(config);
        assert!(breaker.allow_call());
        breaker.record_failure();
        assert!(breaker.allow_call());
        breaker.record_failure();
        assert!(!breaker.allow_call());
    }

    #[test]
    fn half_open_closes_on_probe_success() {
        let breaker = CircuitBreaker::new(fast_config());
        breaker.record_failure();
        breaker.record_failure();
        // recovery_timeout_secs = 0, so the next allow_call flips to half-open immediately.
        assert!(breaker.allow_call());
        breaker.record_success();
        assert!(breaker.allow_call());
    }
}
