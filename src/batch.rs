//! Batch evaluation of many records against one forest or rule set.
//!
//! Records are split into fixed-size chunks and the chunks are handed out
//! to scoped worker threads. The forest or rule set is shared by reference
//! and never mutated, and every record gets its own evaluation state, so
//! the output is identical to evaluating the records one by one, in input
//! order.

use crate::figs::{Forest, TraceResult, evaluate_claim};
use crate::rules::{RuleExecutionResult, RuleItem, execute_rules};
use crate::value::Record;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
    /// Records per chunk. `0` is treated as `1`.
    pub chunk_size: usize,
    /// Worker threads; `0` uses the available parallelism.
    pub threads: usize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self { chunk_size: 256, threads: 0 }
    }
}

impl BatchOptions {
    fn worker_count(&self, chunks: usize) -> usize {
        let wanted = if self.threads == 0 {
            std::thread::available_parallelism().map(NonZeroUsize::get).unwrap_or(1)
        } else {
            self.threads
        };
        wanted.clamp(1, chunks.max(1))
    }
}

/// Timing for a batch run.
#[derive(Debug, Default, Clone)]
pub struct BatchMetrics {
    /// Wall time for the whole batch.
    pub total: Duration,
    pub records: usize,
    pub chunks: usize,
    pub workers: usize,
}

/// Batch output bundled with timing information.
#[derive(Debug, Clone)]
pub struct BatchRun<T> {
    pub results: Vec<T>,
    pub metrics: BatchMetrics,
}

/// Score every record against `forest`.
pub fn evaluate_batch(records: &[Record], forest: &Forest, options: &BatchOptions) -> Vec<TraceResult> {
    evaluate_batch_with_metrics(records, forest, options).results
}

pub fn evaluate_batch_with_metrics(
    records: &[Record],
    forest: &Forest,
    options: &BatchOptions,
) -> BatchRun<TraceResult> {
    run_chunked(records, options, |record| evaluate_claim(record, forest))
}

/// Run every rule in `rules` against every record.
pub fn execute_batch(records: &[Record], rules: &[RuleItem], options: &BatchOptions) -> Vec<RuleExecutionResult> {
    execute_batch_with_metrics(records, rules, options).results
}

pub fn execute_batch_with_metrics(
    records: &[Record],
    rules: &[RuleItem],
    options: &BatchOptions,
) -> BatchRun<RuleExecutionResult> {
    run_chunked(records, options, |record| execute_rules(record, rules))
}

fn run_chunked<T, F>(records: &[Record], options: &BatchOptions, eval: F) -> BatchRun<T>
where
    T: Send,
    F: Fn(&Record) -> T + Sync,
{
    let start = Instant::now();
    let chunks: Vec<&[Record]> = records.chunks(options.chunk_size.max(1)).collect();
    let workers = options.worker_count(chunks.len());

    let mut slots: Vec<Option<Vec<T>>> = Vec::with_capacity(chunks.len());
    slots.resize_with(chunks.len(), || None);

    if workers <= 1 {
        for (slot, chunk) in slots.iter_mut().zip(&chunks) {
            *slot = Some(chunk.iter().map(&eval).collect());
        }
    } else {
        // Workers pull chunk indices from a shared counter and return
        // (index, results) pairs; the slots restore input order.
        let next = AtomicUsize::new(0);
        let (next, chunks, eval) = (&next, &chunks, &eval);
        let finished: Vec<Vec<(usize, Vec<T>)>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..workers)
                .map(|_| {
                    scope.spawn(move || {
                        let mut done: Vec<(usize, Vec<T>)> = Vec::new();
                        loop {
                            let idx = next.fetch_add(1, Ordering::Relaxed);
                            let Some(chunk) = chunks.get(idx) else { break };
                            done.push((idx, chunk.iter().map(eval).collect()));
                        }
                        done
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
                .collect()
        });
        for (idx, results) in finished.into_iter().flatten() {
            slots[idx] = Some(results);
        }
    }

    let results: Vec<T> = slots.into_iter().flatten().flatten().collect();
    let metrics = BatchMetrics { total: start.elapsed(), records: records.len(), chunks: chunks.len(), workers };
    tracing::debug!(
        records = metrics.records,
        chunks = metrics.chunks,
        workers,
        elapsed = ?metrics.total,
        "batch finished"
    );

    BatchRun { results, metrics }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::figs::parse_forest;
    use crate::rules::{KnownFields, Severity, compile_expression};
    use crate::value::ClaimValue;

    const MODEL: &str = "\
Amount <= 1000.500 (Tree #0 root)
\tVal: -0.300 (leaf)
\tCountry is Yes (split)
\t\tVal: 0.800 (leaf)
\t\tVal: 0.200 (leaf)
\t+
Prior <= 0.500 (Tree #1 root)
\tVal: -0.100 (leaf)
\tVal: 0.400 (leaf)
";

    fn records(n: usize) -> Vec<Record> {
        (0..n)
            .map(|i| {
                let mut r = Record::new();
                r.insert("Amount".into(), ClaimValue::Number((i * 97 % 2000) as f64));
                r.insert("Country".into(), ClaimValue::Number((i % 2) as f64));
                r.insert("Prior".into(), ClaimValue::Boolean(i % 3 == 0));
                r
            })
            .collect()
    }

    #[test]
    fn parallel_matches_sequential() {
        let forest = parse_forest(MODEL).unwrap();
        let records = records(103);
        let sequential: Vec<TraceResult> = records.iter().map(|r| evaluate_claim(r, &forest)).collect();

        for (chunk_size, threads) in [(1, 4), (7, 3), (256, 0), (10, 1), (0, 2)] {
            let options = BatchOptions { chunk_size, threads };
            assert_eq!(evaluate_batch(&records, &forest, &options), sequential, "chunk {chunk_size} threads {threads}");
        }
    }

    #[test]
    fn rules_batch_preserves_order() {
        let fields = KnownFields::new(["Amount", "Country"]);
        let compiled = compile_expression("Amount > 1000 AND Country = 1", &fields, Severity::High);
        let records = records(50);
        let run = execute_batch_with_metrics(&records, &compiled.rules, &BatchOptions { chunk_size: 4, threads: 3 });

        assert_eq!(run.metrics.records, 50);
        assert_eq!(run.metrics.chunks, 13);
        assert_eq!(run.metrics.workers, 3);
        for (record, result) in records.iter().zip(&run.results) {
            assert_eq!(result, &execute_rules(record, &compiled.rules));
        }
    }

    #[test]
    fn empty_batch() {
        let forest = parse_forest(MODEL).unwrap();
        let run = evaluate_batch_with_metrics(&[], &forest, &BatchOptions::default());
        assert!(run.results.is_empty());
        assert_eq!(run.metrics.chunks, 0);
        assert_eq!(run.metrics.workers, 1);
    }
}
