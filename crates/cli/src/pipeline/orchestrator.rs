//! Demo orchestrator: builds the built-in composition and drives it.
//!
//! ```text
//! ramp ──► flow ──► flow_scaled ──► flow_mean [──► flow_avg] ──► trigger
//!                   (linear)        (mean)       (window)
//! left_out ◄──► right_out   (optional coupled pair, observed by coupled_probe)
//! ```
//!
//! Runs synchronously; the `demo` command moves it onto a blocking task.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use contracts::{
    AdapterSpec, EngineConfig, ItemDescription, Reduction, TimeSet, ValueDefinition,
};
use observability::PullMetricsAggregator;
use sync_engine::{Composition, CoupledComponent, ItemHandle, RampComponent};
use tracing::{debug, info};

use super::{DemoStats, StepRow};
use crate::error::{CliError, Result};

/// Demo configuration
#[derive(Debug, Clone)]
pub struct DemoConfig {
    pub engine: EngineConfig,
    pub start: f64,
    pub end: f64,
    pub step: f64,
    pub ramp_step: f64,
    pub ramp_end: Option<f64>,
    pub elements: usize,
    pub factor: f64,
    pub offset: f64,
    pub average_window: Option<f64>,
    pub coupled: bool,
}

impl DemoConfig {
    /// Reject ranges the pull loop cannot walk
    pub fn check(&self) -> Result<()> {
        if !(self.step.is_finite() && self.step > 0.0) {
            return Err(CliError::invalid_argument(format!(
                "step must be > 0, got {}",
                self.step
            )));
        }
        if !(self.ramp_step.is_finite() && self.ramp_step > 0.0) {
            return Err(CliError::invalid_argument(format!(
                "ramp step must be > 0, got {}",
                self.ramp_step
            )));
        }
        if self.end < self.start {
            return Err(CliError::invalid_argument(format!(
                "end ({}) must not precede start ({})",
                self.end, self.start
            )));
        }
        if self.elements == 0 {
            return Err(CliError::invalid_argument("elements must be >= 1"));
        }
        Ok(())
    }

    /// Pulled times `start, start + step, ..., <= end`
    pub fn pull_times(&self) -> Vec<f64> {
        let count = ((self.end - self.start) / self.step + 1e-9).floor() as usize + 1;
        (0..count)
            .map(|i| self.start + i as f64 * self.step)
            .collect()
    }
}

/// Handles of the built composition
struct DemoGraph {
    trigger: ItemHandle,
    probe: Option<ItemHandle>,
}

/// Demo orchestrator
pub struct DemoPipeline {
    config: DemoConfig,
}

impl DemoPipeline {
    pub fn new(config: DemoConfig) -> Self {
        Self { config }
    }

    /// Build the composition, pull every requested time, then detach the
    /// trigger to reclaim its adapter chain.
    pub fn run(self) -> Result<DemoStats> {
        self.config.check()?;
        let started = Instant::now();

        let mut composition = Composition::new(self.config.engine.clone());
        let (graph, ramp_updates) = self.build(&mut composition)?;
        composition.validate_all()?;
        info!(
            items = composition.items().count(),
            linkages = composition.linkages().count(),
            "demo composition ready"
        );

        let mut stats = DemoStats::default();
        let mut aggregator = PullMetricsAggregator::new();

        for t in self.config.pull_times() {
            let times = TimeSet::single(t);

            let pulled = composition.get_values(graph.trigger, &times)?;
            aggregator.update(&pulled);
            debug!(t, coverage = pulled.coverage.label(), updates = pulled.updates, "trigger pulled");
            stats.rows.push(StepRow::from_pulled(t, &pulled));

            if let Some(probe) = graph.probe {
                let pulled = composition.get_values(probe, &times)?;
                aggregator.update(&pulled);
                stats.coupled_rows.push(StepRow::from_pulled(t, &pulled));
            }
        }

        stats.ramp_updates = ramp_updates.load(Ordering::SeqCst);
        stats.dropped_events = composition.events().dropped_count();
        stats.events = composition.drain_events();

        if let Some(linkage) = composition.linkage_of(graph.trigger) {
            stats.reclaimed_adapters = composition.detach(linkage)?.len();
        }

        stats.metrics = aggregator.summary();
        stats.duration = started.elapsed();
        info!(
            pulls = stats.metrics.total_pulls,
            extrapolated = stats.metrics.extrapolated_pulls,
            reclaimed = stats.reclaimed_adapters,
            "demo finished"
        );
        Ok(stats)
    }

    fn build(
        &self,
        composition: &mut Composition,
    ) -> Result<(DemoGraph, Arc<AtomicUsize>)> {
        let config = &self.config;

        let slopes: Vec<f64> = (1..=config.elements).map(|i| i as f64).collect();
        // The averaging window reaches back before the first pulled time
        let ramp_start = config.start - config.average_window.unwrap_or(0.0);
        let mut ramp = RampComponent::new("ramp", "flow", ramp_start, config.ramp_step)
            .with_slope(slopes);
        if let Some(end) = config.ramp_end {
            ramp = ramp.with_end(end);
        }
        let ramp_updates = ramp.update_counter();
        let ramp = composition.add_component(ramp);

        let flow = composition.add_item(
            Some(ramp),
            ItemDescription::output("flow", ValueDefinition::scalar("flow"), config.elements)
                .with_caption("ramp output"),
        )?;
        let scaled = composition.add_adapter_from_spec(
            flow,
            "flow_scaled",
            &AdapterSpec::LinearConversion {
                factor: config.factor,
                offset: config.offset,
            },
        )?;
        let mut tail = composition.add_adapter_from_spec(
            scaled,
            "flow_mean",
            &AdapterSpec::ElementReduce {
                op: Reduction::Mean,
            },
        )?;
        if let Some(window) = config.average_window {
            tail = composition.add_adapter_from_spec(
                tail,
                "flow_avg",
                &AdapterSpec::TimeAverage { window },
            )?;
        }

        let trigger = composition.add_item(
            None,
            ItemDescription::input("trigger", ValueDefinition::scalar("flow"), 1),
        )?;
        composition.connect(trigger, tail)?;

        let probe = if config.coupled {
            Some(self.build_coupled(composition)?)
        } else {
            None
        };

        Ok((DemoGraph { trigger, probe }, ramp_updates))
    }

    /// Two components that each pull the other's output before publishing
    fn build_coupled(&self, composition: &mut Composition) -> Result<ItemHandle> {
        let config = &self.config;
        let scalar = |id: &str| ValueDefinition::scalar(id);

        let left = composition.add_component(
            CoupledComponent::new("left", "left_in", "left_out", config.start, config.step)
                .with_response(1.0, 0.5),
        );
        let right = composition.add_component(
            CoupledComponent::new("right", "right_in", "right_out", config.start, config.step)
                .with_response(2.0, 0.5),
        );

        let left_out = composition.add_item(Some(left), ItemDescription::output("left_out", scalar("level"), 1))?;
        let left_in = composition.add_item(Some(left), ItemDescription::input("left_in", scalar("level"), 1))?;
        let right_out = composition.add_item(Some(right), ItemDescription::output("right_out", scalar("level"), 1))?;
        let right_in = composition.add_item(Some(right), ItemDescription::input("right_in", scalar("level"), 1))?;
        composition.connect(left_in, right_out)?;
        composition.connect(right_in, left_out)?;

        let probe = composition.add_item(None, ItemDescription::input("coupled_probe", scalar("level"), 1))?;
        composition.connect(probe, left_out)?;
        Ok(probe)
    }
}
