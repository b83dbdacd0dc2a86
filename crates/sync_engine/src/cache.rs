//! Time-ascending record cache with interpolation and extrapolation.
//!
//! Records live in a `VecDeque` ordered by stamp:
//! - appends happen at the back as the owning component advances
//! - trimming pops from the front
//! - lookups are binary searches (`partition_point`)

use std::collections::VecDeque;
use std::fmt;

use contracts::{
    CacheConfig, ExtrapolationPolicy, InterpolationPolicy, ItemId, ItemShape, LinkError, Time,
    TimeRecord, TimeSet, ValueSet, Values,
};
use tracing::{debug, trace};

use crate::interpolation::{blend, weighted_sum};

/// How a sampled value was obtained, ordered from best to worst
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SampleQuality {
    /// A record with exactly the requested time
    Exact,
    /// A neighbouring record reused under a non-interpolating policy
    Held,
    /// Blended between two bracketing records
    Interpolated,
    /// Produced outside the cached range
    Extrapolated,
}

impl SampleQuality {
    #[inline]
    pub fn is_extrapolated(self) -> bool {
        self == Self::Extrapolated
    }
}

/// Value array answered for one requested time
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub values: Values,
    pub quality: SampleQuality,
}

impl Sample {
    fn new(values: Values, quality: SampleQuality) -> Self {
        Self { values, quality }
    }
}

/// Result of [`TimeRecordCache::insert`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// New latest record
    Appended,
    /// Replaced the record carrying the same stamp
    Replaced,
}

/// Ordered record cache owned by exactly one producer or adapter consumer slot
pub struct TimeRecordCache {
    item: ItemId,
    shape: ItemShape,
    config: CacheConfig,
    records: VecDeque<TimeRecord>,
    replaced_count: u64,
    trimmed_count: u64,
}

impl fmt::Debug for TimeRecordCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimeRecordCache")
            .field("item", &self.item)
            .field("len", &self.records.len())
            .field("first", &self.first_stamp())
            .field("last", &self.last_stamp())
            .field("interpolation", &self.config.interpolation)
            .finish()
    }
}

impl TimeRecordCache {
    /// Create an empty cache.
    ///
    /// # Errors
    /// `UnsupportedInterpolation` if `config` asks for linear interpolation
    /// of a kind that cannot blend.
    pub fn new(item: ItemId, shape: ItemShape, config: CacheConfig) -> Result<Self, LinkError> {
        if config.interpolation == InterpolationPolicy::Linear && !shape.kind().supports_linear() {
            return Err(LinkError::UnsupportedInterpolation { kind: shape.kind() });
        }

        Ok(Self {
            item,
            shape,
            config,
            records: VecDeque::new(),
            replaced_count: 0,
            trimmed_count: 0,
        })
    }

    /// Append a record.
    ///
    /// A record stamped like the latest one replaces it; an earlier one is
    /// rejected with `TimeOrdering`.
    pub fn insert(&mut self, record: TimeRecord) -> Result<InsertOutcome, LinkError> {
        self.check_shape(record.values())?;

        if let Some(last) = self.records.back_mut() {
            if record.stamp() < last.stamp() {
                return Err(LinkError::TimeOrdering {
                    item: self.item.to_string(),
                    record_time: record.stamp(),
                    last_time: last.stamp(),
                });
            }
            if record.stamp() == last.stamp() {
                trace!(item = %self.item, stamp = record.stamp(), "replacing latest record");
                *last = record;
                self.replaced_count += 1;
                return Ok(InsertOutcome::Replaced);
            }
        }

        self.records.push_back(record);
        Ok(InsertOutcome::Appended)
    }

    /// Whether `time` can be answered without extrapolating
    pub fn can_satisfy(&self, time: &Time) -> bool {
        let (Some(first), Some(last)) = (self.first_stamp(), self.last_stamp()) else {
            return false;
        };

        match self.config.interpolation {
            InterpolationPolicy::UseLast => first <= time.end(),
            InterpolationPolicy::Linear | InterpolationPolicy::Nearest => {
                first <= time.stamp() && time.end() <= last
            }
        }
    }

    /// Whether every time of `set` can be answered without extrapolating
    pub fn can_satisfy_set(&self, set: &TimeSet) -> bool {
        set.times().iter().all(|time| self.can_satisfy(time))
    }

    /// Whether some time of `set` lies before the first record.
    ///
    /// Records are only ever appended, so later records cannot cover it.
    pub fn precedes(&self, set: &TimeSet) -> bool {
        let Some(first) = self.first_stamp() else {
            return false;
        };

        set.times().iter().any(|time| match self.config.interpolation {
            InterpolationPolicy::UseLast => time.end() < first,
            InterpolationPolicy::Linear | InterpolationPolicy::Nearest => time.stamp() < first,
        })
    }

    /// Value valid at `time`
    pub fn value_at(&self, time: &Time) -> Result<Sample, LinkError> {
        if self.records.is_empty() {
            return Ok(Sample::new(
                self.shape.definition.missing_values(self.shape.element_count),
                SampleQuality::Extrapolated,
            ));
        }

        if time.is_instant() {
            return self.point(time.stamp());
        }

        if let Some(record) = self.exact_span(time) {
            return Ok(Sample::new(record.values().clone(), SampleQuality::Exact));
        }

        match self.config.interpolation {
            InterpolationPolicy::Linear => self.span_mean(time.stamp(), time.end()),
            InterpolationPolicy::Nearest | InterpolationPolicy::UseLast => self.point(time.end()),
        }
    }

    /// Values for every time of `set`, plus the worst quality among them
    pub fn values_at(&self, set: &TimeSet) -> Result<(ValueSet, SampleQuality), LinkError> {
        let mut values = ValueSet::new();
        let mut worst = SampleQuality::Exact;

        for time in set.times() {
            let sample = self.value_at(time)?;
            worst = worst.max(sample.quality);
            values.push(*time, sample.values);
        }

        Ok((values, worst))
    }

    /// Drop records stamped strictly before `upto`, always keeping the latest one.
    pub fn trim(&mut self, upto: f64) -> usize {
        let mut removed = 0;
        while self.records.len() > 1 && self.records.front().is_some_and(|r| r.stamp() < upto) {
            self.records.pop_front();
            removed += 1;
        }

        if removed > 0 {
            self.trimmed_count += removed as u64;
            debug!(item = %self.item, upto, removed, "trimmed cache");
        }
        removed
    }

    /// Drop records stamped at or after `from`
    pub fn truncate_from(&mut self, from: f64) -> usize {
        let mut removed = 0;
        while self.records.back().is_some_and(|r| r.stamp() >= from) {
            self.records.pop_back();
            removed += 1;
        }
        removed
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn item(&self) -> &ItemId {
        &self.item
    }

    pub fn shape(&self) -> &ItemShape {
        &self.shape
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn records(&self) -> impl Iterator<Item = &TimeRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn first_stamp(&self) -> Option<f64> {
        self.records.front().map(TimeRecord::stamp)
    }

    pub fn last_stamp(&self) -> Option<f64> {
        self.records.back().map(TimeRecord::stamp)
    }

    /// Number of same-stamp corrections accepted
    pub fn replaced_count(&self) -> u64 {
        self.replaced_count
    }

    /// Number of records discarded by [`Self::trim`]
    pub fn trimmed_count(&self) -> u64 {
        self.trimmed_count
    }

    fn check_shape(&self, values: &Values) -> Result<(), LinkError> {
        if values.kind() != self.shape.kind() {
            return Err(LinkError::ValueKindMismatch {
                item: self.item.to_string(),
                expected: self.shape.kind(),
                actual: values.kind(),
            });
        }
        if values.len() != self.shape.element_count {
            return Err(LinkError::ValueCountMismatch {
                item: self.item.to_string(),
                expected: self.shape.element_count,
                actual: values.len(),
            });
        }
        Ok(())
    }

    /// Index of the first record stamped at or after `stamp`
    #[inline]
    fn lower_bound(&self, stamp: f64) -> usize {
        self.records.partition_point(|r| r.stamp() < stamp)
    }

    fn exact_span(&self, time: &Time) -> Option<&TimeRecord> {
        self.records
            .get(self.lower_bound(time.stamp()))
            .filter(|record| record.time() == *time)
    }

    fn point(&self, t: f64) -> Result<Sample, LinkError> {
        let index = self.lower_bound(t);
        let above = self.records.get(index);
        if let Some(record) = above.filter(|r| r.stamp() == t) {
            return Ok(Sample::new(record.values().clone(), SampleQuality::Exact));
        }
        let below = index.checked_sub(1).and_then(|i| self.records.get(i));

        match (below, above) {
            (Some(below), Some(above)) => self.between(t, below, above),
            (Some(_), None) => self.extrapolate(t, Side::After),
            (None, Some(_)) => self.extrapolate(t, Side::Before),
            (None, None) => Ok(Sample::new(
                self.shape.definition.missing_values(self.shape.element_count),
                SampleQuality::Extrapolated,
            )),
        }
    }

    fn between(&self, t: f64, below: &TimeRecord, above: &TimeRecord) -> Result<Sample, LinkError> {
        match self.config.interpolation {
            InterpolationPolicy::Linear => {
                let factor = (t - below.stamp()) / (above.stamp() - below.stamp());
                let values = blend(
                    below.values(),
                    above.values(),
                    factor,
                    &self.shape.definition,
                )?;
                Ok(Sample::new(values, SampleQuality::Interpolated))
            }
            InterpolationPolicy::Nearest => {
                let nearest = if t - below.stamp() <= above.stamp() - t {
                    below
                } else {
                    above
                };
                Ok(Sample::new(nearest.values().clone(), SampleQuality::Held))
            }
            InterpolationPolicy::UseLast => {
                Ok(Sample::new(below.values().clone(), SampleQuality::Held))
            }
        }
    }

    fn extrapolate(&self, t: f64, side: Side) -> Result<Sample, LinkError> {
        let len = self.records.len();
        let (near, far) = match side {
            Side::After => (self.records.back(), len.checked_sub(2).and_then(|i| self.records.get(i))),
            Side::Before => (self.records.front(), self.records.get(1)),
        };
        let Some(near) = near else {
            return Ok(Sample::new(
                self.shape.definition.missing_values(self.shape.element_count),
                SampleQuality::Extrapolated,
            ));
        };

        let values = match (self.config.extrapolation, far) {
            (ExtrapolationPolicy::Linear { relaxation }, Some(far))
                if self.config.interpolation == InterpolationPolicy::Linear =>
            {
                // Position on the line through `far` and `near`, pulled towards `near`
                let along = (t - far.stamp()) / (near.stamp() - far.stamp());
                let factor = 1.0 + (1.0 - relaxation) * (along - 1.0);
                blend(far.values(), near.values(), factor, &self.shape.definition)?
            }
            _ => near.values().clone(),
        };

        Ok(Sample::new(values, SampleQuality::Extrapolated))
    }

    fn span_mean(&self, start: f64, end: f64) -> Result<Sample, LinkError> {
        let mut knots = vec![start];
        knots.extend(
            self.records
                .iter()
                .map(TimeRecord::stamp)
                .filter(|&stamp| stamp > start && stamp < end),
        );
        knots.push(end);

        let samples = knots
            .iter()
            .map(|&t| self.point(t))
            .collect::<Result<Vec<_>, _>>()?;

        // Trapezoidal weights of the piecewise-linear signal
        let width = end - start;
        let mut weights = vec![0.0; knots.len()];
        for (i, pair) in knots.windows(2).enumerate() {
            let half = (pair[1] - pair[0]) / (2.0 * width);
            weights[i] += half;
            weights[i + 1] += half;
        }

        let rows: Vec<(f64, &Values)> = weights
            .iter()
            .copied()
            .zip(samples.iter().map(|s| &s.values))
            .collect();
        let values = weighted_sum(&rows, &self.shape.definition)?;
        let quality = samples
            .iter()
            .map(|s| s.quality)
            .fold(SampleQuality::Interpolated, SampleQuality::max);

        Ok(Sample::new(values, quality))
    }
}

#[derive(Debug, Clone, Copy)]
enum Side {
    Before,
    After,
}
