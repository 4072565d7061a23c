//! Restart backoff.
//!
//! The delay for attempt `k` (0-based) is `min(base × 2^k, max)` plus jitter
//! drawn uniformly from `[0, 0.3 × delay)`. The base delay depends only on the
//! attempt index, so jitter never feeds back into later attempts.
//!
//! Randomness comes from a [`JitterSource`] so tests can pin it.

use rand::Rng;
use std::time::Duration;

/// Upper bound of the jitter, as a fraction of the clamped delay.
pub const JITTER_RATIO: f64 = 0.3;

/// Source of uniform samples in `[0, 1)`.
pub trait JitterSource: Send + Sync {
	fn sample(&self) -> f64;
}

/// Thread-local RNG.
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadRngJitter;

impl JitterSource for ThreadRngJitter {
	fn sample(&self) -> f64 {
		rand::rng().random::<f64>()
	}
}

/// Always zero: delays are exactly `min(base × 2^k, max)`.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoJitter;

impl JitterSource for NoJitter {
	fn sample(&self) -> f64 {
		0.0
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RestartPolicy {
	pub base: Duration,
	pub max: Duration,
	/// Restart attempts allowed before the failure becomes terminal.
	pub max_attempts: u32,
}

impl RestartPolicy {
	/// Whether another attempt may be scheduled after `restarts` attempts.
	pub fn allows(&self, restarts: u32) -> bool {
		restarts < self.max_attempts
	}

	pub fn delay(&self, attempt: u32, jitter: &dyn JitterSource) -> Duration {
		backoff(attempt, self.base, self.max, jitter)
	}
}

/// `min(base × 2^attempt, max)` without jitter.
pub fn base_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
	let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
	base.checked_mul(factor).map_or(max, |delay| delay.min(max))
}

pub fn backoff(attempt: u32, base: Duration, max: Duration, jitter: &dyn JitterSource) -> Duration {
	let delay = base_delay(attempt, base, max);
	// Samples outside [0, 1) would break the upper bound.
	let sample = jitter.sample();
	let sample = if sample.is_finite() { sample.clamp(0.0, 1.0 - f64::EPSILON) } else { 0.0 };
	delay + delay.mul_f64(JITTER_RATIO * sample)
}

#[cfg(test)]
mod tests {
	use super::*;

	struct Fixed(f64);

	impl JitterSource for Fixed {
		fn sample(&self) -> f64 {
			self.0
		}
	}

	const BASE: Duration = Duration::from_millis(100);
	const MAX: Duration = Duration::from_secs(5);

	#[test]
	fn doubles_until_cap() {
		assert_eq!(backoff(0, BASE, MAX, &NoJitter), Duration::from_millis(100));
		assert_eq!(backoff(1, BASE, MAX, &NoJitter), Duration::from_millis(200));
		assert_eq!(backoff(3, BASE, MAX, &NoJitter), Duration::from_millis(800));
		assert_eq!(backoff(6, BASE, MAX, &NoJitter), MAX);
		assert_eq!(backoff(u32::MAX, BASE, MAX, &NoJitter), MAX);
	}

	#[test]
	fn non_decreasing_without_jitter() {
		let mut prev = Duration::ZERO;
		for attempt in 0..64 {
			let delay = backoff(attempt, BASE, MAX, &NoJitter);
			assert!(delay >= prev, "attempt {} went down: {:?} < {:?}", attempt, delay, prev);
			prev = delay;
		}
	}

	#[test]
	fn jitter_stays_under_thirty_percent() {
		for attempt in 0..40 {
			let floor = base_delay(attempt, BASE, MAX);
			for sample in [0.0, 0.5, 0.999_999, 1.0, 7.0, f64::NAN] {
				let delay = backoff(attempt, BASE, MAX, &Fixed(sample));
				assert!(delay >= floor);
				assert!(delay.as_secs_f64() <= floor.as_secs_f64() * (1.0 + JITTER_RATIO) + 1e-6);
				assert!(delay.as_secs_f64() <= MAX.as_secs_f64() * (1.0 + JITTER_RATIO) + 1e-6);
			}
		}
	}

	#[test]
	fn random_jitter_respects_bounds() {
		for attempt in 0..20 {
			let floor = base_delay(attempt, BASE, MAX);
			for _ in 0..50 {
				let delay = backoff(attempt, BASE, MAX, &ThreadRngJitter);
				assert!(delay >= floor);
				assert!(delay.as_secs_f64() <= MAX.as_secs_f64() * (1.0 + JITTER_RATIO) + 1e-6);
			}
		}
	}

	#[test]
	fn base_above_max_is_clamped() {
		assert_eq!(backoff(0, Duration::from_secs(10), MAX, &NoJitter), MAX);
	}

	#[test]
	fn ceiling() {
		let policy = RestartPolicy { base: BASE, max: MAX, max_attempts: 3 };
		assert!(policy.allows(0));
		assert!(policy.allows(2));
		assert!(!policy.allows(3));
		assert!(!RestartPolicy { max_attempts: 0, ..policy }.allows(0));
	}
}
