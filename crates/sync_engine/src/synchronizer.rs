//! Demand-driven pull loop.
//!
//! A consumer asks a producer for a time-set; while the producer's cache
//! cannot answer it, the owning component is advanced one `update()` at a
//! time. The loop stops early when the owner is already updating (a cyclic
//! pull) or has finished, when part of the request lies before the first
//! cached record, or when the retry budget runs out. None of these stops is
//! an error: the caller extrapolates and a diagnostic is recorded.

use contracts::{
    ComponentStatus, Diagnostic, DiagnosticLevel, ExtrapolationReason, ItemId, LinkError,
    TimeSet, DEFAULT_RETRY_LIMIT,
};
use tracing::{error, instrument, trace, warn};

/// Producer-side state observable while a pull is in progress
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SyncState {
    /// Not being pulled
    #[default]
    Idle,
    /// Owner is being advanced on behalf of a pull
    Updating,
    /// Last pull ended with an extrapolated answer
    Extrapolating(ExtrapolationReason),
}

/// What the pull loop needs from the producer it drives
pub trait Advance {
    /// Cached data already covers every time of `query`
    fn covers(&self, query: &TimeSet) -> bool;

    /// Part of `query` lies before the first cached record, where no update
    /// can reach
    fn precedes(&self, query: &TimeSet) -> bool;

    /// Status of the owning component; `None` for producers without one
    fn owner_status(&self) -> Option<ComponentStatus>;

    /// Run one `update()` of the owning component
    fn advance(&mut self) -> Result<(), LinkError>;

    /// Observe a state change of the producer
    fn transition(&mut self, _state: SyncState) {}
}

/// Outcome of [`PullSynchronizer::pull`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PullReport {
    /// `update()` calls issued
    pub updates: usize,
    /// Why the loop gave up before coverage was reached
    pub stopped: Option<ExtrapolationReason>,
    pub diagnostics: Vec<Diagnostic>,
}

impl PullReport {
    pub fn is_covered(&self) -> bool {
        self.stopped.is_none()
    }
}

/// Bounded update loop shared by every producer of a composition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PullSynchronizer {
    retry_limit: usize,
}

impl Default for PullSynchronizer {
    fn default() -> Self {
        Self {
            retry_limit: DEFAULT_RETRY_LIMIT,
        }
    }
}

impl PullSynchronizer {
    /// `retry_limit` of zero is raised to one
    pub fn new(retry_limit: usize) -> Self {
        Self {
            retry_limit: retry_limit.max(1),
        }
    }

    pub fn retry_limit(&self) -> usize {
        self.retry_limit
    }

    /// Advance `target` until it covers `query` or a stop condition is hit.
    ///
    /// # Errors
    /// Only a failed owner or an error returned by `update()` aborts the pull.
    #[instrument(
        level = "trace",
        name = "pull_synchronizer_pull",
        skip(self, item, target, query),
        fields(item = %item, times = query.len())
    )]
    pub fn pull<A: Advance>(
        &self,
        item: &ItemId,
        target: &mut A,
        query: &TimeSet,
    ) -> Result<PullReport, LinkError> {
        let mut report = PullReport::default();

        if target.covers(query) {
            target.transition(SyncState::Idle);
            return Ok(report);
        }

        loop {
            let Some(status) = target.owner_status() else {
                // Nothing can advance an ownerless producer
                trace!(item = %item, "producer has no owner");
                return Ok(report);
            };

            let stop = match status {
                ComponentStatus::Updating => Some(self.busy(item, query, &mut report)),
                ComponentStatus::Done => Some(self.finished(item, query, &mut report)),
                ComponentStatus::Failed => {
                    target.transition(SyncState::Idle);
                    return Err(LinkError::component_failed(
                        item.as_str(),
                        "owner reported failure during pull",
                    ));
                }
                ComponentStatus::Idle if target.precedes(query) => {
                    Some(self.out_of_range(item, query, &mut report))
                }
                ComponentStatus::Idle if report.updates >= self.retry_limit => {
                    Some(self.exhausted(item, query, &mut report))
                }
                ComponentStatus::Idle => None,
            };

            if let Some(reason) = stop {
                report.stopped = Some(reason);
                target.transition(SyncState::Extrapolating(reason));
                return Ok(report);
            }

            target.transition(SyncState::Updating);
            if let Err(e) = target.advance() {
                target.transition(SyncState::Idle);
                return Err(e);
            }
            report.updates += 1;

            if target.covers(query) {
                target.transition(SyncState::Idle);
                return Ok(report);
            }
        }
    }

    fn busy(&self, item: &ItemId, query: &TimeSet, report: &mut PullReport) -> ExtrapolationReason {
        warn!(item = %item, "owner is already updating, answering from cache");
        report.diagnostics.push(Diagnostic::new(
            DiagnosticLevel::Warning,
            item.clone(),
            ExtrapolationReason::Busy,
            query.clone(),
            "owner busy; values extrapolated from cache",
        ));
        ExtrapolationReason::Busy
    }

    fn finished(
        &self,
        item: &ItemId,
        query: &TimeSet,
        report: &mut PullReport,
    ) -> ExtrapolationReason {
        warn!(item = %item, "owner finished before covering request");
        report.diagnostics.push(Diagnostic::new(
            DiagnosticLevel::Warning,
            item.clone(),
            ExtrapolationReason::OwnerFinished,
            query.clone(),
            "owner done; values extrapolated from cache",
        ));
        ExtrapolationReason::OwnerFinished
    }

    fn out_of_range(
        &self,
        item: &ItemId,
        query: &TimeSet,
        report: &mut PullReport,
    ) -> ExtrapolationReason {
        warn!(item = %item, "request starts before cached range, answering from cache");
        report.diagnostics.push(Diagnostic::new(
            DiagnosticLevel::Warning,
            item.clone(),
            ExtrapolationReason::OutOfRange,
            query.clone(),
            "request precedes first cached record; values extrapolated from cache",
        ));
        ExtrapolationReason::OutOfRange
    }

    fn exhausted(
        &self,
        item: &ItemId,
        query: &TimeSet,
        report: &mut PullReport,
    ) -> ExtrapolationReason {
        let reason = ExtrapolationReason::RetryLimit {
            attempts: report.updates,
        };
        error!(
            item = %item,
            attempts = report.updates,
            "retry limit reached before covering request"
        );
        report.diagnostics.push(Diagnostic::new(
            DiagnosticLevel::Error,
            item.clone(),
            reason,
            query.clone(),
            format!(
                "no coverage after {} updates; values extrapolated from cache",
                report.updates
            ),
        ));
        reason
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Producer whose cache spans `first..=now` and grows by `step` per update
    struct FakeProducer {
        first: Option<f64>,
        now: f64,
        step: f64,
        status: Option<ComponentStatus>,
        updates: usize,
        transitions: Vec<SyncState>,
        fail_on_update: bool,
    }

    impl FakeProducer {
        fn new(step: f64) -> Self {
            Self {
                first: None,
                now: 0.0,
                step,
                status: Some(ComponentStatus::Idle),
                updates: 0,
                transitions: Vec::new(),
                fail_on_update: false,
            }
        }
    }

    impl Advance for FakeProducer {
        fn covers(&self, query: &TimeSet) -> bool {
            query.latest().is_none_or(|t| t <= self.now) && !self.precedes(query)
        }

        fn precedes(&self, query: &TimeSet) -> bool {
            self.first
                .zip(query.earliest())
                .is_some_and(|(first, t)| t < first)
        }

        fn owner_status(&self) -> Option<ComponentStatus> {
            self.status
        }

        fn advance(&mut self) -> Result<(), LinkError> {
            if self.fail_on_update {
                return Err(LinkError::component_failed("fake", "boom"));
            }
            self.updates += 1;
            self.now += self.step;
            Ok(())
        }

        fn transition(&mut self, state: SyncState) {
            self.transitions.push(state);
        }
    }

    #[test]
    fn test_advances_until_covered() {
        let mut fake = FakeProducer::new(1.0);
        let report = PullSynchronizer::default()
            .pull(&"p".into(), &mut fake, &TimeSet::single(3.0))
            .unwrap();

        assert!(report.is_covered());
        assert_eq!(report.updates, 3);
        assert_eq!(fake.updates, 3);
        assert_eq!(fake.transitions.last(), Some(&SyncState::Idle));
    }

    #[test]
    fn test_covered_request_issues_no_update() {
        let mut fake = FakeProducer::new(1.0);
        fake.now = 10.0;
        let report = PullSynchronizer::default()
            .pull(&"p".into(), &mut fake, &TimeSet::single(4.0))
            .unwrap();
        assert_eq!(report.updates, 0);
        assert!(report.diagnostics.is_empty());
    }

    #[test]
    fn test_retry_limit_is_exact() {
        // A producer that never advances its cache
        let mut fake = FakeProducer::new(0.0);
        let report = PullSynchronizer::new(1000)
            .pull(&"p".into(), &mut fake, &TimeSet::single(1.0))
            .unwrap();

        assert_eq!(fake.updates, 1000);
        assert_eq!(report.updates, 1000);
        assert_eq!(
            report.stopped,
            Some(ExtrapolationReason::RetryLimit { attempts: 1000 })
        );
        assert_eq!(report.diagnostics.len(), 1);
        assert_eq!(report.diagnostics[0].level, DiagnosticLevel::Error);
    }

    #[test]
    fn test_busy_owner_is_not_updated() {
        let mut fake = FakeProducer::new(1.0);
        fake.status = Some(ComponentStatus::Updating);
        let report = PullSynchronizer::default()
            .pull(&"p".into(), &mut fake, &TimeSet::single(5.0))
            .unwrap();

        assert_eq!(fake.updates, 0);
        assert_eq!(report.stopped, Some(ExtrapolationReason::Busy));
        assert_eq!(report.diagnostics[0].level, DiagnosticLevel::Warning);
        assert_eq!(
            fake.transitions,
            vec![SyncState::Extrapolating(ExtrapolationReason::Busy)]
        );
    }

    #[test]
    fn test_done_owner_extrapolates() {
        let mut fake = FakeProducer::new(1.0);
        fake.status = Some(ComponentStatus::Done);
        let report = PullSynchronizer::default()
            .pull(&"p".into(), &mut fake, &TimeSet::single(5.0))
            .unwrap();
        assert_eq!(report.stopped, Some(ExtrapolationReason::OwnerFinished));
        assert_eq!(fake.updates, 0);
    }

    #[test]
    fn test_request_before_first_record_is_not_advanced() {
        let mut fake = FakeProducer::new(1.0);
        fake.first = Some(0.0);
        let report = PullSynchronizer::default()
            .pull(&"p".into(), &mut fake, &TimeSet::instants([-0.5, 2.0]))
            .unwrap();

        assert_eq!(fake.updates, 0);
        assert_eq!(report.stopped, Some(ExtrapolationReason::OutOfRange));
        assert_eq!(report.diagnostics.len(), 1);
        assert_eq!(report.diagnostics[0].level, DiagnosticLevel::Warning);
        assert_eq!(
            fake.transitions,
            vec![SyncState::Extrapolating(ExtrapolationReason::OutOfRange)]
        );
    }

    #[test]
    fn test_failed_owner_is_an_error() {
        let mut fake = FakeProducer::new(1.0);
        fake.status = Some(ComponentStatus::Failed);
        let err = PullSynchronizer::default()
            .pull(&"p".into(), &mut fake, &TimeSet::single(5.0))
            .unwrap_err();
        assert!(matches!(err, LinkError::ComponentFailed { .. }));
    }

    #[test]
    fn test_update_error_propagates() {
        let mut fake = FakeProducer::new(1.0);
        fake.fail_on_update = true;
        let result = PullSynchronizer::default().pull(&"p".into(), &mut fake, &TimeSet::single(5.0));
        assert!(result.is_err());
        assert_eq!(fake.transitions.last(), Some(&SyncState::Idle));
    }

    #[test]
    fn test_ownerless_producer_answers_directly() {
        let mut fake = FakeProducer::new(1.0);
        fake.status = None;
        let report = PullSynchronizer::default()
            .pull(&"p".into(), &mut fake, &TimeSet::single(5.0))
            .unwrap();
        assert_eq!(report.updates, 0);
        assert!(report.is_covered());
    }

    #[test]
    fn test_zero_limit_raised_to_one() {
        assert_eq!(PullSynchronizer::new(0).retry_limit(), 1);
    }
}
