//! Mock components for tests and the demo composition.
//!
//! Update counters are shared `Arc<AtomicUsize>` handles so callers can
//! observe how often the pull loop advanced a component after handing it
//! over to a [`crate::Composition`].

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use contracts::{ComponentStatus, LinkError, TimeRecord, TimeSet, Values};
use tracing::trace;

use crate::component::{LinkableComponent, UpdateContext};

/// Publishes `intercept + slope * t` per element at `start, start + step, ...`
#[derive(Debug)]
pub struct RampComponent {
    id: String,
    output: String,
    start: f64,
    step: f64,
    slope: Vec<f64>,
    intercept: Vec<f64>,
    end: Option<f64>,
    status: ComponentStatus,
    updates: Arc<AtomicUsize>,
}

impl RampComponent {
    pub fn new(id: impl Into<String>, output: impl Into<String>, start: f64, step: f64) -> Self {
        Self {
            id: id.into(),
            output: output.into(),
            start,
            step,
            slope: vec![1.0],
            intercept: vec![0.0],
            end: None,
            status: ComponentStatus::Idle,
            updates: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// One slope per element; intercepts are resized to match
    pub fn with_slope(mut self, slope: Vec<f64>) -> Self {
        self.intercept.resize(slope.len(), 0.0);
        self.slope = slope;
        self
    }

    pub fn with_intercept(mut self, intercept: Vec<f64>) -> Self {
        self.slope.resize(intercept.len(), 0.0);
        self.intercept = intercept;
        self
    }

    /// Last time published before reporting `Done`
    pub fn with_end(mut self, end: f64) -> Self {
        self.end = Some(end);
        self
    }

    pub fn update_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.updates)
    }

    pub fn value_at(&self, t: f64) -> Values {
        Values::Scalar(
            self.slope
                .iter()
                .zip(&self.intercept)
                .map(|(slope, intercept)| intercept + slope * t)
                .collect(),
        )
    }
}

impl LinkableComponent for RampComponent {
    fn id(&self) -> &str {
        &self.id
    }

    fn status(&self) -> ComponentStatus {
        self.status
    }

    fn update(&mut self, ctx: &mut UpdateContext<'_>) -> Result<(), LinkError> {
        self.updates.fetch_add(1, Ordering::SeqCst);

        let next = match ctx.last_published(&self.output)? {
            Some(last) => last + self.step,
            None => self.start,
        };
        if self.end.is_some_and(|end| next > end) {
            self.status = ComponentStatus::Done;
            return Ok(());
        }

        trace!(component = %self.id, t = next, "ramp step");
        ctx.publish(&self.output, TimeRecord::new(next, self.value_at(next)))?;

        if self.end.is_some_and(|end| next + self.step > end) {
            self.status = ComponentStatus::Done;
        }
        Ok(())
    }
}

/// Never publishes anything; reports a configurable status
#[derive(Debug)]
pub struct StalledComponent {
    id: String,
    status: ComponentStatus,
    updates: Arc<AtomicUsize>,
}

impl StalledComponent {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: ComponentStatus::Idle,
            updates: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_status(mut self, status: ComponentStatus) -> Self {
        self.status = status;
        self
    }

    pub fn update_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.updates)
    }
}

impl LinkableComponent for StalledComponent {
    fn id(&self) -> &str {
        &self.id
    }

    fn status(&self) -> ComponentStatus {
        self.status
    }

    fn update(&mut self, _ctx: &mut UpdateContext<'_>) -> Result<(), LinkError> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Publishes `base + gain * input` where the input is pulled at the time
/// about to be published. Two of these wired to each other form a
/// bidirectional link.
#[derive(Debug)]
pub struct CoupledComponent {
    id: String,
    input: String,
    output: String,
    start: f64,
    step: f64,
    base: f64,
    gain: f64,
    updates: Arc<AtomicUsize>,
    extrapolated_inputs: Arc<AtomicUsize>,
}

impl CoupledComponent {
    pub fn new(
        id: impl Into<String>,
        input: impl Into<String>,
        output: impl Into<String>,
        start: f64,
        step: f64,
    ) -> Self {
        Self {
            id: id.into(),
            input: input.into(),
            output: output.into(),
            start,
            step,
            base: 0.0,
            gain: 1.0,
            updates: Arc::new(AtomicUsize::new(0)),
            extrapolated_inputs: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_response(mut self, base: f64, gain: f64) -> Self {
        self.base = base;
        self.gain = gain;
        self
    }

    pub fn update_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.updates)
    }

    /// Pulls of the input that came back extrapolated
    pub fn extrapolation_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.extrapolated_inputs)
    }
}

impl LinkableComponent for CoupledComponent {
    fn id(&self) -> &str {
        &self.id
    }

    fn status(&self) -> ComponentStatus {
        ComponentStatus::Idle
    }

    fn update(&mut self, ctx: &mut UpdateContext<'_>) -> Result<(), LinkError> {
        self.updates.fetch_add(1, Ordering::SeqCst);

        let next = match ctx.last_published(&self.output)? {
            Some(last) => last + self.step,
            None => self.start,
        };

        let pulled = ctx.pull(&self.input, &TimeSet::single(next))?;
        if pulled.is_extrapolated() {
            self.extrapolated_inputs.fetch_add(1, Ordering::SeqCst);
        }

        let response = match pulled.values.row(0).and_then(Values::as_scalars) {
            Some(inputs) => inputs
                .iter()
                .map(|&x| {
                    if x == contracts::DEFAULT_MISSING {
                        self.base
                    } else {
                        self.base + self.gain * x
                    }
                })
                .collect(),
            None => vec![self.base],
        };

        ctx.publish(&self.output, TimeRecord::new(next, Values::Scalar(response)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Composition;
    use contracts::{Coverage, ExtrapolationReason, ItemDescription, ValueDefinition};

    fn scalar_output(id: &str) -> ItemDescription {
        ItemDescription::output(id, ValueDefinition::scalar(id), 1)
    }

    fn scalar_input(id: &str) -> ItemDescription {
        ItemDescription::input(id, ValueDefinition::scalar(id), 1)
    }

    #[test]
    fn test_ramp_finishes_at_end() {
        let mut composition = Composition::default();
        let owner = composition.add_component(RampComponent::new("ramp", "q", 0.0, 1.0).with_end(2.0));
        let q = composition.add_item(Some(owner), scalar_output("q")).unwrap();
        let input = composition.add_item(None, scalar_input("q_in")).unwrap();
        composition.connect(input, q).unwrap();

        let pulled = composition.get_values(input, &TimeSet::single(5.0)).unwrap();
        assert_eq!(pulled.updates, 3);
        assert_eq!(
            pulled.coverage,
            Coverage::Extrapolated(ExtrapolationReason::OwnerFinished)
        );
        assert_eq!(pulled.values.scalar(0, 0), Some(2.0));
        assert_eq!(composition.component_status(owner), Some(ComponentStatus::Done));
    }

    #[test]
    fn test_bidirectional_pair_terminates() {
        let mut composition = Composition::default();
        let left = CoupledComponent::new("left", "left_in", "left_out", 0.0, 1.0)
            .with_response(1.0, 0.5);
        let right = CoupledComponent::new("right", "right_in", "right_out", 0.0, 1.0)
            .with_response(2.0, 0.5);
        let right_busy = right.extrapolation_counter();

        let l = composition.add_component(left);
        let r = composition.add_component(right);
        let left_out = composition.add_item(Some(l), scalar_output("left_out")).unwrap();
        let left_in = composition.add_item(Some(l), scalar_input("left_in")).unwrap();
        let right_out = composition.add_item(Some(r), scalar_output("right_out")).unwrap();
        let right_in = composition.add_item(Some(r), scalar_input("right_in")).unwrap();
        composition.connect(left_in, right_out).unwrap();
        composition.connect(right_in, left_out).unwrap();

        let probe = composition.add_item(None, scalar_input("probe")).unwrap();
        composition.connect(probe, left_out).unwrap();

        let pulled = composition.get_values(probe, &TimeSet::single(0.0)).unwrap();
        assert!(pulled.coverage.is_satisfied());
        // right saw left busy and used base only: right_out(0) = 2, left_out(0) = 1 + 0.5 * 2
        assert_eq!(pulled.values.scalar(0, 0), Some(2.0));
        assert_eq!(right_busy.load(Ordering::SeqCst), 1);
        assert!(composition
            .events()
            .iter()
            .any(|d| d.reason == ExtrapolationReason::Busy));
    }

    #[test]
    fn test_ramp_values_per_element() {
        let ramp = RampComponent::new("ramp", "q", 0.0, 1.0)
            .with_slope(vec![1.0, -1.0])
            .with_intercept(vec![10.0, 0.0]);
        assert_eq!(ramp.value_at(2.0), Values::Scalar(vec![12.0, -2.0]));
    }
}
