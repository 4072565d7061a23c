//! Best-effort uptime extraction from free-text output.
//!
//! The child reports uptime in a handful of phrasings. Lines are scanned
//! newest-first and the first line any matcher accepts wins; older mentions
//! are ignored. Nothing found means `0.0`, never an error.

use regex_lite::Regex;

/// Recognised phrasings, tried in order against each line.
pub const DEFAULT_PATTERNS: &[&str] = &[
	r"(?i)uptime:\s*(\d+(?:\.\d+)?)\s*s(?:ec(?:ond)?s?)?\b",
	r"(?i)running for:\s*(\d+(?:\.\d+)?)\s*s(?:ec(?:ond)?s?)?\b",
	r"(?i)alive:\s*(\d+(?:\.\d+)?)\s*s(?:ec(?:ond)?s?)?\b",
];

pub trait UptimeMatcher: Send + Sync {
	/// Seconds reported by `line`, if it is an uptime line.
	fn match_line(&self, line: &str) -> Option<f64>;
}

/// Matcher whose first capture group is the number of seconds.
pub struct RegexMatcher {
	regex: Regex,
}

impl RegexMatcher {
	pub fn new(pattern: &str) -> Result<Self, regex_lite::Error> {
		Ok(Self {
			regex: Regex::new(pattern)?,
		})
	}
}

impl UptimeMatcher for RegexMatcher {
	fn match_line(&self, line: &str) -> Option<f64> {
		let caps = self.regex.captures(line)?;
		caps.get(1)?.as_str().parse::<f64>().ok()
	}
}

pub struct UptimeExtractor {
	matchers: Vec<Box<dyn UptimeMatcher>>,
}

impl Default for UptimeExtractor {
	fn default() -> Self {
		let matchers = DEFAULT_PATTERNS
			.iter()
			.filter_map(|p| RegexMatcher::new(p).ok())
			.map(|m| Box::new(m) as Box<dyn UptimeMatcher>)
			.collect();
		Self { matchers }
	}
}

impl UptimeExtractor {
	pub fn new(matchers: Vec<Box<dyn UptimeMatcher>>) -> Self {
		Self { matchers }
	}

	/// Appends a matcher tried after the existing ones.
	pub fn with_matcher(mut self, matcher: impl UptimeMatcher + 'static) -> Self {
		self.matchers.push(Box::new(matcher));
		self
	}

	pub fn matcher_count(&self) -> usize {
		self.matchers.len()
	}

	pub fn extract<S: AsRef<str>>(&self, lines: &[S]) -> f64 {
		for line in lines.iter().rev() {
			let line = line.as_ref();
			if let Some(secs) = self.matchers.iter().find_map(|m| m.match_line(line)) {
				return secs;
			}
		}
		0.0
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn default_patterns_compile() {
		assert_eq!(UptimeExtractor::default().matcher_count(), DEFAULT_PATTERNS.len());
	}

	#[test]
	fn newest_line_wins() {
		let ex = UptimeExtractor::default();
		let lines = ["starting", "uptime: 5 seconds", "uptime: 12 seconds"];
		assert_eq!(ex.extract(&lines), 12.0);
	}

	#[test]
	fn no_match_is_zero() {
		let ex = UptimeExtractor::default();
		assert_eq!(ex.extract(&["booting", "listening on :8080"]), 0.0);
		assert_eq!(ex.extract::<&str>(&[]), 0.0);
	}

	#[test]
	fn phrasings_and_case() {
		let ex = UptimeExtractor::default();
		assert_eq!(ex.extract(&["UPTIME: 3.5 Seconds"]), 3.5);
		assert_eq!(ex.extract(&["Running for: 42 s"]), 42.0);
		assert_eq!(ex.extract(&["running for: 7s"]), 7.0);
		assert_eq!(ex.extract(&["alive: 9 seconds"]), 9.0);
		assert_eq!(ex.extract(&["[info] alive: 1 second"]), 1.0);
		assert_eq!(ex.extract(&["uptime: 8 secs"]), 8.0);
	}

	#[test]
	fn newer_non_matching_lines_are_skipped() {
		let ex = UptimeExtractor::default();
		let lines = ["alive: 4 seconds", "request served", "uptime: 2 seconds", "noise"];
		assert_eq!(ex.extract(&lines), 2.0);
	}

	#[test]
	fn rejects_near_misses() {
		let ex = UptimeExtractor::default();
		assert_eq!(ex.extract(&["uptime: 5 minutes"]), 0.0);
		assert_eq!(ex.extract(&["uptime 5 seconds"]), 0.0);
	}

	#[test]
	fn custom_matcher_is_tried_last() {
		struct Ticks;
		impl UptimeMatcher for Ticks {
			fn match_line(&self, line: &str) -> Option<f64> {
				line.strip_prefix("ticks=")?.parse::<f64>().ok().map(|t| t / 10.0)
			}
		}

		let ex = UptimeExtractor::default().with_matcher(Ticks);
		assert_eq!(ex.extract(&["ticks=150"]), 15.0);
		assert_eq!(ex.extract(&["uptime: 1 seconds", "ticks=150"]), 15.0);
	}
}
