//! Character-based token estimation.
//!
//! Exact tokenization is provider-specific; a fixed characters-per-token ratio
//! is deterministic and close enough for budgeting.

/// Estimates token counts from character counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenEstimator {
    chars_per_token: u32,
}

impl TokenEstimator {
    /// A ratio of zero is treated as one.
    pub fn new(chars_per_token: u32) -> Self {
        Self {
            chars_per_token: chars_per_token.max(1),
        }
    }

    /// `ceil(chars / chars_per_token)`.
    pub fn estimate(&self, text: &str) -> u32 {
        let chars = u32::try_from(text.chars().count()).unwrap_or(u32::MAX);
        chars.div_ceil(self.chars_per_token)
    }
}

impl Default for TokenEstimator {
    fn default() -> Self {
        Self::new(4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_rounds_up() {
        let est = TokenEstimator::new(4);
        assert_eq!(est.estimate(""), 0);
        assert_eq!(est.estimate("Hi"), 1);
        assert_eq!(est.estimate("abcd"), 1);
        assert_eq!(est.estimate("abcde"), 2);
    }

    #[test]
    fn test_counts_chars_not_bytes() {
        let est = TokenEstimator::new(1);
        assert_eq!(est.estimate("héllo"), 5);
    }

    #[test]
    fn test_zero_ratio_is_clamped() {
        assert_eq!(TokenEstimator::new(0).estimate("abc"), 3);
    }
}
