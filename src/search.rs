// Brute forcing a single unknown byte.
//
// Each byte the attacks recover depends on the bytes recovered before it, so
// bytes are always found one after another. The 256 guesses for the current
// byte are independent though, and can be tried on several threads at once.
// Rayon's `find_map_first` stops handing out work once a match is found and
// always reports the match earliest in candidate order, so a parallel search
// returns exactly what a sequential one would.
use crate::AttackError;

use rayon::prelude::*;

use std::sync::atomic::{AtomicUsize, Ordering};

/// Return the first candidate for which `test` returns `true`.
pub fn find_candidate<F>(
    candidates: &[u8],
    parallel: bool,
    test: F,
) -> Result<Option<u8>, AttackError>
where
    F: Fn(u8) -> Result<bool, AttackError> + Sync,
{
    if parallel {
        return candidates
            .par_iter()
            .find_map_first(|&candidate| match test(candidate) {
                Ok(true) => Some(Ok(candidate)),
                Ok(false) => None,
                Err(e) => Some(Err(e)),
            })
            .transpose();
    }

    for &candidate in candidates {
        if test(candidate)? {
            return Ok(Some(candidate));
        }
    }
    Ok(None)
}

/// Counts oracle queries, failing once an optional budget is used up.
#[derive(Debug, Default)]
pub struct QueryCounter {
    count: AtomicUsize,
    limit: Option<usize>,
}

impl QueryCounter {
    pub fn new(limit: Option<usize>) -> Self {
        Self {
            count: AtomicUsize::new(0),
            limit,
        }
    }

    /// Record one query, erroring if it would go over budget.
    pub fn record(&self) -> Result<(), AttackError> {
        let n_queries = self.count.fetch_add(1, Ordering::Relaxed) + 1;
        match self.limit {
            Some(limit) if n_queries > limit => Err(AttackError::QueryBudgetExhausted { limit }),
            _ => Ok(()),
        }
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }
}
