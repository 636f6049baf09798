//! Batched per-symbol fan-out.
//!
//! Symbols are split into contiguous batches. Every symbol in a batch runs as
//! its own task with a deadline; the batch completes when all of them have
//! settled, then the scheduler pauses before the next batch. A failing task
//! is counted and logged, never propagated.

use futures::future::join_all;
use serde::{Serialize, Serializer};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};
use tsm_common::{Validate, ValidationError, ValidationResult};

use crate::data::{FetchError, Symbol};

/// Batch sizing and pacing.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub batch_size: usize,
    /// Pause between batches, not after the last one
    pub inter_batch_delay: Duration,
    /// Deadline for a single symbol's fetch and score
    pub fetch_timeout: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            inter_batch_delay: Duration::from_millis(500),
            fetch_timeout: Duration::from_secs(8),
        }
    }
}

impl Validate for BatchConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.batch_size == 0 {
            return Err(ValidationError::invalid("batch_size", "must be greater than 0"));
        }
        if self.fetch_timeout.is_zero() {
            return Err(ValidationError::invalid("fetch_timeout", "must be greater than 0"));
        }
        Ok(())
    }
}

/// A symbol that could not be processed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymbolFailure {
    pub symbol: Symbol,
    #[serde(serialize_with = "serialize_display")]
    pub error: FetchError,
}

fn serialize_display<S: Serializer>(error: &FetchError, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(error)
}

/// Outcome of one batched run.
#[derive(Debug, Clone)]
pub struct BatchRun<T> {
    /// Symbols attempted
    pub processed: usize,
    /// Symbols that failed
    pub errors: usize,
    /// Produced results, in symbol order
    pub results: Vec<T>,
    pub failures: Vec<SymbolFailure>,
    /// Batches started
    pub batches: usize,
    /// Stopped early by cancellation
    pub cancelled: bool,
}

impl<T> Default for BatchRun<T> {
    fn default() -> Self {
        Self {
            processed: 0,
            errors: 0,
            results: Vec::new(),
            failures: Vec::new(),
            batches: 0,
            cancelled: false,
        }
    }
}

/// Runs per-symbol tasks in paced, concurrent batches.
#[derive(Debug, Clone)]
pub struct BatchScheduler {
    config: BatchConfig,
}

impl BatchScheduler {
    pub fn new(config: BatchConfig) -> Result<Self, ValidationError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Run `task` once for every symbol.
    ///
    /// `Ok(Some(_))` is collected, `Ok(None)` counts as processed with no
    /// result, `Err(_)` is counted as an error. Cancellation stops new
    /// batches from starting; the batch in flight runs to completion and
    /// everything gathered so far is returned.
    pub async fn run<T, F, Fut>(
        &self,
        symbols: &[Symbol],
        cancel: &CancellationToken,
        task: F,
    ) -> BatchRun<T>
    where
        T: Send + 'static,
        F: Fn(Symbol) -> Fut,
        Fut: Future<Output = Result<Option<T>, FetchError>> + Send + 'static,
    {
        let mut run = BatchRun::default();
        let total_batches = symbols.len().div_ceil(self.config.batch_size);
        let timeout = self.config.fetch_timeout;

        for (index, batch) in symbols.chunks(self.config.batch_size).enumerate() {
            if cancel.is_cancelled() {
                run.cancelled = true;
                break;
            }

            if index > 0 && !self.config.inter_batch_delay.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        run.cancelled = true;
                        break;
                    }
                    _ = tokio::time::sleep(self.config.inter_batch_delay) => {}
                }
            }

            run.batches += 1;
            debug!(
                batch = index + 1,
                total_batches,
                size = batch.len(),
                "Starting batch"
            );

            let handles: Vec<_> = batch
                .iter()
                .map(|symbol| {
                    let fut = task(symbol.clone());
                    let span = info_span!("symbol", symbol = %symbol);
                    tokio::spawn(
                        async move {
                            tokio::time::timeout(timeout, fut)
                                .await
                                .unwrap_or(Err(FetchError::Timeout(timeout)))
                        }
                        .instrument(span),
                    )
                })
                .collect();

            let settled = join_all(handles).await;

            for (symbol, outcome) in batch.iter().zip(settled) {
                run.processed += 1;
                let outcome =
                    outcome.unwrap_or_else(|join_err| Err(FetchError::Task(join_err.to_string())));

                match outcome {
                    Ok(Some(result)) => run.results.push(result),
                    Ok(None) => {}
                    Err(error) => {
                        warn!(
                            symbol = %symbol,
                            error = %error,
                            recoverable = error.is_recoverable(),
                            "Symbol failed"
                        );
                        run.errors += 1;
                        run.failures.push(SymbolFailure {
                            symbol: symbol.clone(),
                            error,
                        });
                    }
                }
            }
        }

        if run.cancelled {
            info!(
                processed = run.processed,
                remaining = symbols.len() - run.processed,
                "Batch run cancelled"
            );
        }

        run
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn symbols(n: usize) -> Vec<Symbol> {
        (0..n)
            .map(|i| Symbol::new(format!("SYM{:02}", i)).unwrap())
            .collect()
    }

    fn scheduler(batch_size: usize, delay_ms: u64) -> BatchScheduler {
        BatchScheduler::new(BatchConfig {
            batch_size,
            inter_batch_delay: Duration::from_millis(delay_ms),
            fetch_timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[test]
    fn test_rejects_zero_batch_size() {
        let err = BatchScheduler::new(BatchConfig {
            batch_size: 0,
            ..BatchConfig::default()
        })
        .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidValue { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_batches_and_pacing() {
        let run = scheduler(10, 500)
            .run(&symbols(25), &CancellationToken::new(), |s| async move {
                Ok(Some(s))
            })
            .await;

        assert_eq!(run.batches, 3);
        assert_eq!(run.processed, 25);
        assert_eq!(run.errors, 0);
        assert_eq!(run.results.len(), 25);
        // Results keep symbol order
        assert_eq!(run.results[0].as_str(), "SYM00");
        assert_eq!(run.results[24].as_str(), "SYM24");
        assert!(!run.cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_inter_batch_delay_only_between_batches() {
        let start = tokio::time::Instant::now();
        scheduler(10, 500)
            .run(&symbols(25), &CancellationToken::new(), |_| async {
                Ok(Some(()))
            })
            .await;
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(1_000));
        assert!(elapsed < Duration::from_millis(1_500));
    }

    #[tokio::test]
    async fn test_failure_is_isolated() {
        let run = scheduler(10, 0)
            .run(&symbols(25), &CancellationToken::new(), |s| async move {
                if s.as_str() == "SYM06" {
                    Err(FetchError::Network("reset".into()))
                } else {
                    Ok(Some(s))
                }
            })
            .await;

        assert_eq!(run.processed, 25);
        assert_eq!(run.errors, 1);
        assert_eq!(run.results.len(), 24);
        assert_eq!(run.failures[0].symbol.as_str(), "SYM06");
    }

    #[tokio::test]
    async fn test_none_is_not_an_error() {
        let run = scheduler(4, 0)
            .run(&symbols(6), &CancellationToken::new(), |_| async {
                Ok(None::<()>)
            })
            .await;
        assert_eq!(run.processed, 6);
        assert_eq!(run.errors, 0);
        assert!(run.results.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_symbol_times_out() {
        let sched = BatchScheduler::new(BatchConfig {
            batch_size: 3,
            inter_batch_delay: Duration::ZERO,
            fetch_timeout: Duration::from_secs(2),
        })
        .unwrap();

        let run = sched
            .run(&symbols(3), &CancellationToken::new(), |s| async move {
                if s.as_str() == "SYM01" {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                }
                Ok(Some(s))
            })
            .await;

        assert_eq!(run.results.len(), 2);
        assert_eq!(run.failures[0].error, FetchError::Timeout(Duration::from_secs(2)));
    }

    #[tokio::test]
    async fn test_panicking_task_counts_as_error() {
        let run = scheduler(5, 0)
            .run(&symbols(5), &CancellationToken::new(), |s| async move {
                if s.as_str() == "SYM02" {
                    panic!("boom");
                }
                Ok(Some(s))
            })
            .await;
        assert_eq!(run.errors, 1);
        assert!(matches!(run.failures[0].error, FetchError::Task(_)));
        assert_eq!(run.results.len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_keeps_partial_results() {
        let cancel = CancellationToken::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let trigger = cancel.clone();
        let counter = calls.clone();
        let run = scheduler(10, 500)
            .run(&symbols(25), &cancel, move |s| {
                let trigger = trigger.clone();
                let counter = counter.clone();
                async move {
                    // Cancel while the first batch is in flight
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        trigger.cancel();
                    }
                    Ok(Some(s))
                }
            })
            .await;

        assert!(run.cancelled);
        assert_eq!(run.batches, 1);
        assert_eq!(run.processed, 10);
        assert_eq!(run.results.len(), 10);
        assert_eq!(calls.load(Ordering::SeqCst), 10);
    }

    #[tokio::test]
    async fn test_already_cancelled_runs_nothing() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let run = scheduler(10, 0)
            .run(&symbols(5), &cancel, |s| async move { Ok(Some(s)) })
            .await;
        assert!(run.cancelled);
        assert_eq!(run.processed, 0);
        assert_eq!(run.batches, 0);
    }
}
