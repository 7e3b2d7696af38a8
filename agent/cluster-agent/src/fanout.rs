use crate::error::{ProviderError, ProviderResult};
use futures::stream::{FuturesUnordered, StreamExt};
use log::debug;
use std::future::Future;

/// Decides which error a fan-out reports when more than one unit fails.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ErrorPolicy {
    /// Report the first failure to complete and discard the rest.
    FirstWins,
    /// Report a single error listing every failure.
    CollectAll,
}

impl Default for ErrorPolicy {
    fn default() -> Self {
        Self::FirstWins
    }
}

impl ErrorPolicy {
    fn report(self, mut errors: Vec<ProviderError>, total: usize) -> ProviderError {
        match self {
            ErrorPolicy::CollectAll if errors.len() > 1 => {
                let kind = errors[0].kind();
                let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
                ProviderError::new_with_context(
                    kind,
                    format!(
                        "{} of {} operations failed: {}",
                        errors.len(),
                        total,
                        messages.join("; ")
                    ),
                )
            }
            _ => errors.swap_remove(0),
        }
    }
}

/// Runs `work` once for every item, all units concurrently, and waits until every unit has
/// finished. A failing unit never cancels the others.
///
/// On success the results are returned in the order of `items`, independent of the order in
/// which the units completed. If any unit failed, one error is returned as decided by `policy`.
pub async fn fan_out<'a, T, R, F, Fut>(
    items: &'a [T],
    policy: ErrorPolicy,
    work: F,
) -> ProviderResult<Vec<R>>
where
    F: Fn(&'a T) -> Fut,
    Fut: Future<Output = ProviderResult<R>>,
{
    let mut pending: FuturesUnordered<_> = items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let unit = work(item);
            async move { (index, unit.await) }
        })
        .collect();

    let mut results = Vec::with_capacity(items.len());
    let mut errors = Vec::new();
    while let Some((index, result)) = pending.next().await {
        match result {
            Ok(value) => results.push((index, value)),
            Err(e) => {
                debug!("Unit {} of {} failed: {}", index + 1, items.len(), e);
                errors.push(e);
            }
        }
    }

    if !errors.is_empty() {
        return Err(policy.report(errors, items.len()));
    }
    results.sort_by_key(|(index, _)| *index);
    Ok(results.into_iter().map(|(_, value)| value).collect())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::ErrorKind;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn fail(i: usize) -> ProviderError {
        ProviderError::new_with_context(ErrorKind::Remote, format!("unit {} failed", i))
    }

    #[tokio::test]
    async fn one_failure_all_units_complete() {
        let completed = AtomicUsize::new(0);
        let items: Vec<usize> = (0..8).collect();
        let result = fan_out(&items, ErrorPolicy::FirstWins, |i| {
            let completed = &completed;
            async move {
                // Make the failing unit finish first.
                tokio::time::sleep(Duration::from_millis(if *i == 3 { 1 } else { 20 })).await;
                completed.fetch_add(1, Ordering::SeqCst);
                if *i == 3 {
                    Err(fail(*i))
                } else {
                    Ok(*i)
                }
            }
        })
        .await;
        assert_eq!(completed.load(Ordering::SeqCst), 8);
        let err = result.unwrap_err();
        assert_eq!(err.context(), Some("unit 3 failed"));
    }

    #[tokio::test]
    async fn results_keep_input_order() {
        let items: Vec<u64> = vec![30, 10, 20];
        let result = fan_out(&items, ErrorPolicy::FirstWins, |delay| async move {
            tokio::time::sleep(Duration::from_millis(*delay)).await;
            Ok(*delay)
        })
        .await
        .unwrap();
        assert_eq!(result, vec![30, 10, 20]);
    }

    #[tokio::test]
    async fn first_completed_error_wins() {
        let items: Vec<u64> = vec![40, 5, 20];
        let err = fan_out(&items, ErrorPolicy::FirstWins, |delay| async move {
            tokio::time::sleep(Duration::from_millis(*delay)).await;
            Err::<(), _>(fail(*delay as usize))
        })
        .await
        .unwrap_err();
        assert_eq!(err.context(), Some("unit 5 failed"));
    }

    #[tokio::test]
    async fn collect_all_lists_every_failure() {
        let items: Vec<usize> = (0..4).collect();
        let err = fan_out(&items, ErrorPolicy::CollectAll, |i| async move {
            if i % 2 == 0 {
                Err(fail(*i))
            } else {
                Ok(())
            }
        })
        .await
        .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("2 of 4 operations failed"));
        assert!(message.contains("unit 0 failed"));
        assert!(message.contains("unit 2 failed"));
    }

    #[tokio::test]
    async fn empty_input() {
        let items: Vec<usize> = Vec::new();
        let result = fan_out(&items, ErrorPolicy::FirstWins, |i| async move { Ok(*i) })
            .await
            .unwrap();
        assert!(result.is_empty());
    }
}
