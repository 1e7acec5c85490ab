use super::error::{LimitKind, PDFError, PDFResult};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Per-document resource limits.
///
/// Exceeding any of them fails the whole request with
/// [`PDFError::ResourceLimitExceeded`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtractionLimits {
    /// Maximum number of pages in the page tree
    pub max_pages: usize,
    /// Maximum size of any single decoded stream, in bytes
    pub max_decoded_bytes: usize,
    /// Wall-clock budget for the whole document, in milliseconds
    pub max_duration_ms: u64,
}

impl Default for ExtractionLimits {
    fn default() -> Self {
        ExtractionLimits {
            max_pages: 10_000,
            max_decoded_bytes: 100 * 1024 * 1024,
            max_duration_ms: 60_000,
        }
    }
}

impl ExtractionLimits {
    /// Limits that never trip.
    pub fn unlimited() -> Self {
        ExtractionLimits {
            max_pages: usize::MAX,
            max_decoded_bytes: usize::MAX,
            max_duration_ms: u64::MAX,
        }
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn with_max_decoded_bytes(mut self, max_decoded_bytes: usize) -> Self {
        self.max_decoded_bytes = max_decoded_bytes;
        self
    }

    pub fn with_max_duration_ms(mut self, max_duration_ms: u64) -> Self {
        self.max_duration_ms = max_duration_ms;
        self
    }

    /// Starts the wall-clock budget.
    pub fn start_deadline(&self) -> Deadline {
        Deadline::new(self.max_duration_ms)
    }
}

/// Wall-clock budget shared by every page of one document.
///
/// Cheap to copy into page workers; checking it only reads the clock.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    budget: Duration,
}

impl Deadline {
    pub fn new(max_duration_ms: u64) -> Self {
        Deadline {
            started: Instant::now(),
            budget: Duration::from_millis(max_duration_ms),
        }
    }

    /// Fails once the budget is spent.
    pub fn check(&self) -> PDFResult<()> {
        if self.started.elapsed() > self.budget {
            return Err(PDFError::limit(
                LimitKind::MaxDuration,
                format!("extraction exceeded {} ms", self.budget.as_millis()),
            ));
        }
        Ok(())
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let limits = ExtractionLimits::default();
        assert_eq!(limits.max_pages, 10_000);
        assert_eq!(limits.max_decoded_bytes, 100 * 1024 * 1024);
        assert_eq!(limits.max_duration_ms, 60_000);
    }

    #[test]
    fn test_json_uses_camel_case_and_defaults() {
        let limits: ExtractionLimits = serde_json::from_str(r#"{"maxPages": 3}"#).unwrap();
        assert_eq!(limits.max_pages, 3);
        assert_eq!(limits.max_duration_ms, 60_000);
    }

    #[test]
    fn test_deadline() {
        assert!(Deadline::new(60_000).check().is_ok());
        assert!(ExtractionLimits::unlimited().start_deadline().check().is_ok());

        let expired = Deadline::new(0);
        std::thread::sleep(Duration::from_millis(2));
        assert!(matches!(
            expired.check(),
            Err(PDFError::ResourceLimitExceeded {
                limit: LimitKind::MaxDuration,
                ..
            })
        ));
    }
}
