//! Multi-configuration pipeline
//!
//! Forwards `run` and `watch` to every member pipeline, sequentially, and
//! aggregates their outcomes into one callback invocation per round.

use std::sync::{Arc, Mutex, MutexGuard};

use super::{BuildCallback, BuildError, BuildSummary, Pipeline, Stats, WatchHandle, WatchOptions};
use crate::errors::{PackrigError, Result};

/// A composite of independently bootstrapped pipelines
#[derive(Debug)]
pub struct MultiPipeline {
    pipelines: Vec<Pipeline>,
}

type CycleOutcome = std::result::Result<BuildSummary, BuildError>;

fn aggregate(outcomes: Vec<CycleOutcome>) -> std::result::Result<Stats, BuildError> {
    let total = outcomes.len();
    let mut summaries = Vec::with_capacity(total);
    let mut errors = Vec::new();
    for outcome in outcomes {
        match outcome {
            Ok(summary) => summaries.push(summary),
            Err(err) => errors.push(err),
        }
    }
    if errors.is_empty() {
        Ok(Stats::Multi(summaries))
    } else {
        Err(BuildError::Multi { total, errors })
    }
}

/// Lock shared watch state, recovering it if a callback panicked while it
/// was held
fn lock_shared<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        tracing::warn!("multi-pipeline callback panicked earlier; resuming with its state");
        mutex.clear_poison();
        poisoned.into_inner()
    })
}

/// Latest outcome of each member, released once every member reported
struct WatchRound {
    latest: Vec<Option<CycleOutcome>>,
    callback: BuildCallback,
}

impl WatchRound {
    fn record(&mut self, index: usize, outcome: CycleOutcome) {
        if let Some(slot) = self.latest.get_mut(index) {
            *slot = Some(outcome);
        }
        if self.latest.iter().all(Option::is_some) {
            let outcomes = self.latest.iter().flatten().cloned().collect();
            (self.callback)(aggregate(outcomes));
        }
    }
}

impl MultiPipeline {
    pub fn new(pipelines: Vec<Pipeline>) -> Self {
        Self { pipelines }
    }

    pub fn pipelines(&self) -> &[Pipeline] {
        &self.pipelines
    }

    pub fn pipelines_mut(&mut self) -> &mut [Pipeline] {
        &mut self.pipelines
    }

    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }

    /// Run every member once; `callback` receives the aggregate outcome
    pub fn run(&self, mut callback: BuildCallback) {
        let outcomes = Arc::new(Mutex::new(Vec::with_capacity(self.pipelines.len())));
        for pipeline in &self.pipelines {
            let sink = outcomes.clone();
            pipeline.run(Box::new(move |outcome| {
                let outcome = outcome.and_then(|stats| match stats {
                    Stats::Single(summary) => Ok(summary),
                    Stats::Multi(_) => Err(BuildError::Failed {
                        message: "nested multi-pipeline outcome".to_string(),
                    }),
                });
                lock_shared(&sink).push(outcome);
            }));
        }

        let collected = std::mem::take(&mut *lock_shared(&outcomes));
        callback(aggregate(collected));
    }

    /// Watch every member with its own options
    ///
    /// `callback` fires once all members finished their first cycle and then
    /// again after each later member cycle, with every member's latest result.
    pub fn watch(&self, options: &[WatchOptions], callback: BuildCallback) -> Result<WatchHandle> {
        if options.len() != self.pipelines.len() {
            return Err(PackrigError::InvalidArgument {
                argument: "watchOptions".to_string(),
                reason: format!(
                    "expected {} entries, got {}",
                    self.pipelines.len(),
                    options.len()
                ),
            });
        }

        let round = Arc::new(Mutex::new(WatchRound {
            latest: vec![None; self.pipelines.len()],
            callback,
        }));
        let handles = self
            .pipelines
            .iter()
            .zip(options)
            .enumerate()
            .map(|(index, (pipeline, watch_options))| {
                let round = round.clone();
                pipeline.watch_cycles(
                    watch_options,
                    Box::new(move |outcome| {
                        lock_shared(&round).record(index, outcome);
                    }),
                )
            })
            .collect();
        Ok(WatchHandle::merge(handles))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::backend::ManualBackend;
    use crate::pipeline::DryRunBackend;
    use std::panic::{catch_unwind, AssertUnwindSafe};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use crate::value::{OptionMap, OptionValue};

    fn member(name: &str) -> Pipeline {
        let mut options = OptionMap::new();
        options.insert("name".to_string(), OptionValue::from(name));
        Pipeline::new("/work", options, Arc::new(DryRunBackend::new()))
    }

    #[test]
    fn test_run_aggregates_members_once() {
        let multi = MultiPipeline::new(vec![member("a"), member("b")]);
        let calls = Arc::new(Mutex::new(Vec::new()));
        let sink = calls.clone();
        multi.run(Box::new(move |outcome| sink.lock().unwrap().push(outcome)));

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        match &calls[0] {
            Ok(Stats::Multi(summaries)) => {
                let names: Vec<_> = summaries.iter().map(|s| s.name.clone()).collect();
                assert_eq!(names, vec![Some("a".to_string()), Some("b".to_string())]);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_watch_reports_after_every_member_cycled() {
        let multi = MultiPipeline::new(vec![member("a"), member("b")]);
        let calls = Arc::new(Mutex::new(0));
        let counter = calls.clone();
        let mut handle = multi
            .watch(
                &[WatchOptions::default(), WatchOptions::default()],
                Box::new(move |outcome| {
                    assert!(outcome.is_ok());
                    *counter.lock().unwrap() += 1;
                }),
            )
            .unwrap();

        assert_eq!(*calls.lock().unwrap(), 1);
        assert_eq!(handle.session_count(), 2);
        handle.close().unwrap();
        assert!(handle.is_closed());
    }

    #[test]
    fn test_watch_rejects_mismatched_options() {
        let multi = MultiPipeline::new(vec![member("a"), member("b")]);
        let err = multi
            .watch(&[WatchOptions::default()], Box::new(|_| {}))
            .unwrap_err();
        assert!(matches!(err, PackrigError::InvalidArgument { .. }));
    }

    #[test]
    fn test_watch_keeps_reporting_after_a_panicking_callback() {
        let backend = Arc::new(ManualBackend::default());
        let members = ["a", "b"]
            .into_iter()
            .map(|name| {
                let mut options = OptionMap::new();
                options.insert("name".to_string(), OptionValue::from(name));
                Pipeline::new("/work", options, backend.clone())
            })
            .collect();
        let multi = MultiPipeline::new(members);

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let _handle = multi
            .watch(
                &[WatchOptions::default(), WatchOptions::default()],
                Box::new(move |outcome| {
                    assert!(outcome.is_ok());
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        panic!("listener crashed on the first round");
                    }
                }),
            )
            .unwrap();

        backend.cycle(0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        let first_round = catch_unwind(AssertUnwindSafe(|| backend.cycle(1)));
        assert!(first_round.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        backend.cycle(0);
        backend.cycle(1);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
