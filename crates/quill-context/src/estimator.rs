//! Token estimation.
//!
//! Budget math never needs exact tokenization; it needs a cheap, monotonic
//! estimate that every caller agrees on. [`HeuristicEstimator`] divides byte
//! length by four. An exact tokenizer can stand in behind the same trait
//! without changing any budget semantics.

/// Estimates the token cost of a piece of text.
///
/// Implementations must be pure and monotonic: appending text never lowers
/// the estimate.
pub trait TokenEstimator: Send + Sync {
    /// Estimated token count for `text`.
    fn estimate(&self, text: &str) -> usize;
}

/// `len / 4` floor estimate.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicEstimator;

impl TokenEstimator for HeuristicEstimator {
    fn estimate(&self, text: &str) -> usize {
        text.len() / 4
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn four_chars_per_token() {
        let est = HeuristicEstimator;
        assert_eq!(est.estimate(""), 0);
        assert_eq!(est.estimate("abc"), 0);
        assert_eq!(est.estimate("abcd"), 1);
        assert_eq!(est.estimate(&"x".repeat(4000)), 1000);
    }

    proptest! {
        #[test]
        fn appending_never_lowers_the_estimate(a in ".{0,200}", b in ".{0,200}") {
            let est = HeuristicEstimator;
            let combined = format!("{a}{b}");
            prop_assert!(est.estimate(&combined) >= est.estimate(&a));
        }
    }
}
