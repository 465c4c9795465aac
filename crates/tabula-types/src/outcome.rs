//! Explicit results for mutating operations.

use serde::{Deserialize, Serialize};

/// Result of a duplicate-safe add.
///
/// `inserted == 0` is a no-op: nothing was written. Failures are reported
/// through `Err`, never folded into this value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddOutcome {
    /// Records appended to the table.
    pub inserted: usize,
    /// Records dropped because their unique value already existed in the table.
    pub skipped_existing: usize,
    /// Records dropped because an earlier record in the same batch had the same unique value.
    pub skipped_in_batch: usize,
}

impl AddOutcome {
    pub fn is_noop(&self) -> bool {
        self.inserted == 0
    }

    pub fn skipped(&self) -> usize {
        self.skipped_existing + self.skipped_in_batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_outcome_noop() {
        let outcome = AddOutcome {
            inserted: 0,
            skipped_existing: 3,
            skipped_in_batch: 1,
        };
        assert!(outcome.is_noop());
        assert_eq!(outcome.skipped(), 4);

        let outcome = AddOutcome {
            inserted: 2,
            ..Default::default()
        };
        assert!(!outcome.is_noop());
    }
}
