use crate::error::{SyncError, SyncResult};

/// Outcome of one fetch call.
///
/// Failures that only affect one provider or one object are collected in
/// `errors` instead of aborting the call.
#[derive(Debug, Default)]
pub struct FetchResult {
    /// Objects fetched and applied.
    pub fetched: usize,
    /// Providers that were asked for their digest listing.
    pub providers_contacted: usize,
    /// Non-fatal failures, in the order they happened.
    pub errors: Vec<SyncError>,
}

impl FetchResult {
    /// Returns `true` if nothing went wrong.
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }

    /// The fetched count, or all collected errors combined.
    pub fn into_result(self) -> SyncResult<usize> {
        if self.errors.is_empty() {
            Ok(self.fetched)
        } else {
            Err(SyncError::Aggregate(self.errors))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_result_defaults() {
        let f = FetchResult::default();
        assert_eq!(f.fetched, 0);
        assert!(f.is_complete());
        assert_eq!(f.into_result().unwrap(), 0);
    }

    #[test]
    fn errors_fold_into_aggregate() {
        let f = FetchResult {
            fetched: 3,
            providers_contacted: 2,
            errors: vec![SyncError::Transport("gone".into())],
        };
        assert!(!f.is_complete());
        match f.into_result() {
            Err(SyncError::Aggregate(errors)) => assert_eq!(errors.len(), 1),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
