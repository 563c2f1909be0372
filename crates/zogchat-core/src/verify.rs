// Expected-recipient check: the creator may register a name, and the first
// peer to connect must declare a matching username. Each mismatch closes the
// link; after `max_attempts` mismatches the session is ended for good.

/// Default number of mismatched names tolerated before the session ends.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Lowercase a name and drop all whitespace, so "Jean Luc" matches "jeanluc".
pub fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Outcome of checking a declared username against the expected recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// No filter configured, or the names match.
    Accepted,
    /// Mismatch; the peer may try again `remaining` more times.
    Rejected { remaining: u32 },
    /// Mismatch and no attempts left.
    Exhausted,
}

#[derive(Debug, Clone)]
pub struct RecipientGuard {
    expected: Option<String>,
    failed_attempts: u32,
    max_attempts: u32,
}

impl Default for RecipientGuard {
    fn default() -> Self {
        RecipientGuard::new(None, DEFAULT_MAX_ATTEMPTS)
    }
}

impl RecipientGuard {
    /// Blank names count as "no filter". A zero cap is treated as one attempt.
    pub fn new(expected: Option<String>, max_attempts: u32) -> Self {
        let expected = expected
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty());
        RecipientGuard {
            expected,
            failed_attempts: 0,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn expected(&self) -> Option<&str> {
        self.expected.as_deref()
    }

    pub fn is_active(&self) -> bool {
        self.expected.is_some()
    }

    pub fn failed_attempts(&self) -> u32 {
        self.failed_attempts
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// A mismatch happened but the cap has not been reached.
    pub fn retry_pending(&self) -> bool {
        self.failed_attempts > 0 && self.failed_attempts < self.max_attempts
    }

    pub fn is_exhausted(&self) -> bool {
        self.failed_attempts >= self.max_attempts
    }

    pub fn check(&mut self, received: &str) -> Verdict {
        let Some(expected) = &self.expected else {
            return Verdict::Accepted;
        };

        if normalize(expected) == normalize(received) {
            self.failed_attempts = 0;
            return Verdict::Accepted;
        }

        self.failed_attempts = self.failed_attempts.saturating_add(1);
        if self.is_exhausted() {
            Verdict::Exhausted
        } else {
            Verdict::Rejected {
                remaining: self.max_attempts - self.failed_attempts,
            }
        }
    }

    pub fn reset(&mut self) {
        self.failed_attempts = 0;
    }
}
