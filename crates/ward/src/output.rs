use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Lines from stderr are stored with this tag.
pub const STDERR_TAG: &str = "[stderr] ";
/// Supervisor events recorded alongside child output.
pub const WARD_TAG: &str = "[ward] ";

/// Most recent output lines of the child, oldest evicted first.
///
/// Cheap to clone; clones share the same buffer. The stdout and stderr readers
/// push concurrently, each push holds the lock for the whole append.
#[derive(Clone)]
pub struct RingLogBuffer {
	inner: Arc<Mutex<Ring>>,
}

struct Ring {
	lines: VecDeque<String>,
	capacity: usize,
}

impl RingLogBuffer {
	pub fn new(capacity: usize) -> Self {
		let capacity = capacity.max(1);
		Self {
			inner: Arc::new(Mutex::new(Ring {
				lines: VecDeque::with_capacity(capacity),
				capacity,
			})),
		}
	}

	pub async fn push(&self, line: impl Into<String>) {
		let mut ring = self.inner.lock().await;
		if ring.lines.len() >= ring.capacity {
			ring.lines.pop_front();
		}
		ring.lines.push_back(line.into());
	}

	/// Up to `n` most recent lines, oldest first.
	pub async fn recent(&self, n: usize) -> Vec<String> {
		let ring = self.inner.lock().await;
		let skip = ring.lines.len().saturating_sub(n);
		ring.lines.iter().skip(skip).cloned().collect()
	}

	pub async fn clear(&self) {
		let mut ring = self.inner.lock().await;
		ring.lines = VecDeque::new();
	}

	/// Clears and changes the capacity in place, keeping clones attached.
	pub async fn reset(&self, capacity: usize) {
		let mut ring = self.inner.lock().await;
		ring.capacity = capacity.max(1);
		ring.lines = VecDeque::with_capacity(ring.capacity);
	}

	pub async fn len(&self) -> usize {
		self.inner.lock().await.lines.len()
	}

	pub async fn is_empty(&self) -> bool {
		self.len().await == 0
	}

	pub async fn capacity(&self) -> usize {
		self.inner.lock().await.capacity
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn keeps_last_lines_in_order() {
		let ring = RingLogBuffer::new(5);
		for i in 0..23 {
			ring.push(format!("line {}", i)).await;
			assert!(ring.len().await <= 5);
		}
		assert_eq!(ring.len().await, 5);
		for k in 0..=5 {
			let expected: Vec<String> = (23 - k..23).map(|i| format!("line {}", i)).collect();
			assert_eq!(ring.recent(k).await, expected);
		}
	}

	#[tokio::test]
	async fn recent_returns_everything_when_short() {
		let ring = RingLogBuffer::new(10);
		ring.push("a").await;
		ring.push("b").await;
		assert_eq!(ring.recent(50).await, vec!["a", "b"]);
		assert!(ring.recent(0).await.is_empty());
	}

	#[tokio::test]
	async fn clear_and_reset() {
		let ring = RingLogBuffer::new(3);
		let shared = ring.clone();
		shared.push("x").await;
		assert_eq!(ring.len().await, 1);

		ring.clear().await;
		assert!(shared.is_empty().await);

		ring.reset(2).await;
		for line in ["1", "2", "3"] {
			shared.push(line).await;
		}
		assert_eq!(ring.capacity().await, 2);
		assert_eq!(ring.recent(10).await, vec!["2", "3"]);
	}

	#[tokio::test]
	async fn concurrent_writers_never_exceed_capacity() {
		let ring = RingLogBuffer::new(64);
		let mut handles = Vec::new();
		for writer in 0..2 {
			let ring = ring.clone();
			handles.push(tokio::spawn(async move {
				for i in 0..500 {
					ring.push(format!("{}-{}", writer, i)).await;
				}
			}));
		}
		for handle in handles {
			handle.await.unwrap();
		}
		assert_eq!(ring.len().await, 64);
		let lines = ring.recent(64).await;
		for writer in 0..2 {
			let seq: Vec<u32> = lines
				.iter()
				.filter_map(|l| l.strip_prefix(&format!("{}-", writer)))
				.map(|n| n.parse().unwrap())
				.collect();
			assert!(seq.windows(2).all(|w| w[0] < w[1]), "writer {} out of order", writer);
		}
	}
}
