//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 配置文件 → 组合 → 拉取 的端到端测试
//! - 同步引擎核心性质 (排序、插值、重试上限、忙重入、孤儿回收、环检测)
//! - 墙钟超时包装 (spawn_blocking + timeout)

#[cfg(test)]
mod support {
    use contracts::{ItemDescription, ValueDefinition};

    pub fn scalar_output(id: &str) -> ItemDescription {
        ItemDescription::output(id, ValueDefinition::scalar(id), 1)
    }

    pub fn scalar_input(id: &str) -> ItemDescription {
        ItemDescription::input(id, ValueDefinition::scalar(id), 1)
    }
}

#[cfg(test)]
mod contract_tests {
    use contracts::{AdapterSpec, ItemDescription, Reduction, ValueDefinition};

    #[test]
    fn test_adapter_spec_json_shape() {
        let spec: AdapterSpec =
            serde_json::from_str(r#"{"kind":"element_reduce","op":"mean"}"#).unwrap();
        assert_eq!(
            spec,
            AdapterSpec::ElementReduce {
                op: Reduction::Mean
            }
        );
    }

    #[test]
    fn test_item_description_round_trip() {
        let description =
            ItemDescription::output("flow", ValueDefinition::scalar("flow"), 4).with_caption("Flow");
        let json = serde_json::to_string(&description).unwrap();
        let back: ItemDescription = serde_json::from_str(&json).unwrap();
        assert_eq!(back, description);
    }
}

#[cfg(test)]
mod settings_e2e_tests {
    use std::io::Write;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use config_loader::ConfigLoader;
    use contracts::{Coverage, DiagnosticLevel, ExtrapolationReason, TimeSet};
    use sync_engine::{Composition, StalledComponent};

    use crate::support::{scalar_input, scalar_output};

    /// Settings file -> composition -> pull, with the wall-clock guard a
    /// caller is expected to put around the synchronous pull loop.
    #[tokio::test]
    async fn test_settings_file_drives_retry_limit() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(b"[engine]\nretry_limit = 5\nevent_log_capacity = 8\n")
            .unwrap();
        let settings = ConfigLoader::load_from_path(file.path()).unwrap();

        let task = tokio::task::spawn_blocking(move || {
            let mut composition = Composition::new(settings.engine);
            let stalled = StalledComponent::new("stalled");
            let updates = stalled.update_counter();
            let owner = composition.add_component(stalled);
            let out = composition.add_item(Some(owner), scalar_output("out")).unwrap();
            let input = composition.add_item(None, scalar_input("in")).unwrap();
            composition.connect(input, out).unwrap();

            let pulled = composition.get_values(input, &TimeSet::single(1.0)).unwrap();
            (pulled, updates.load(Ordering::SeqCst), composition.events().error_count())
        });

        let (pulled, updates, errors) = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("pull timed out")
            .unwrap();

        assert_eq!(updates, 5);
        assert_eq!(
            pulled.coverage,
            Coverage::Extrapolated(ExtrapolationReason::RetryLimit { attempts: 5 })
        );
        assert_eq!(pulled.diagnostics[0].level, DiagnosticLevel::Error);
        assert_eq!(errors, 1);
    }

    #[tokio::test]
    async fn test_json_settings_select_use_last() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        file.write_all(br#"{"engine":{"cache":{"interpolation":"use_last"}}}"#)
            .unwrap();
        let settings = ConfigLoader::load_from_path(file.path()).unwrap();

        let mut composition = Composition::new(settings.engine);
        let out = composition.add_item(None, scalar_output("out")).unwrap();
        let input = composition.add_item(None, scalar_input("in")).unwrap();
        composition.connect(input, out).unwrap();
        composition
            .publish(out, contracts::TimeRecord::new(0.0, contracts::Values::Scalar(vec![1.0])))
            .unwrap();
        composition
            .publish(out, contracts::TimeRecord::new(2.0, contracts::Values::Scalar(vec![3.0])))
            .unwrap();

        // no blending between records under use-last
        let pulled = composition.get_values(input, &TimeSet::single(1.0)).unwrap();
        assert_eq!(pulled.values.scalar(0, 0), Some(1.0));
        assert!(pulled.coverage.is_satisfied());
    }
}

#[cfg(test)]
mod property_tests {
    use std::sync::atomic::Ordering;

    use contracts::{
        CacheConfig, ComponentStatus, Coverage, DiagnosticLevel, ExtrapolationReason,
        InterpolationPolicy, LinkError, TimeRecord, TimeSet, Values,
    };
    use sync_engine::{Composition, InsertOutcome, ItemHandle, RampComponent, StalledComponent};

    use crate::support::{scalar_input, scalar_output};

    fn record(t: f64, v: f64) -> TimeRecord {
        TimeRecord::new(t, Values::Scalar(vec![v]))
    }

    /// Ownerless producer with one consumer
    fn source(composition: &mut Composition, cache: Option<CacheConfig>) -> (ItemHandle, ItemHandle) {
        let out = match cache {
            Some(cache) => composition
                .add_output_with_cache(None, scalar_output("src"), cache)
                .unwrap(),
            None => composition.add_item(None, scalar_output("src")).unwrap(),
        };
        let input = composition.add_item(None, scalar_input("sink")).unwrap();
        composition.connect(input, out).unwrap();
        (out, input)
    }

    #[test]
    fn test_cache_ordering_and_replacement() {
        let mut composition = Composition::default();
        let (out, _) = source(&mut composition, None);

        for (t, v) in [(0.0, 1.0), (1.0, 2.0), (2.0, 3.0)] {
            assert_eq!(composition.publish(out, record(t, v)).unwrap(), InsertOutcome::Appended);
        }
        assert_eq!(
            composition.publish(out, record(2.0, 9.0)).unwrap(),
            InsertOutcome::Replaced
        );

        let cache = composition.item(out).unwrap().cache().unwrap();
        assert_eq!(cache.len(), 3);
        let stamps: Vec<_> = cache.records().map(|r| r.stamp()).collect();
        assert_eq!(stamps, vec![0.0, 1.0, 2.0]);

        let err = composition.publish(out, record(1.5, 0.0)).unwrap_err();
        assert!(matches!(err, LinkError::TimeOrdering { .. }));
    }

    #[test]
    fn test_boundaries_exact_and_midpoint() {
        let mut composition = Composition::default();
        let (out, input) = source(&mut composition, None);
        composition.publish(out, record(0.0, 10.0)).unwrap();
        composition.publish(out, record(10.0, 20.0)).unwrap();

        let pulled = composition
            .get_values(input, &TimeSet::instants([0.0, 5.0, 10.0]))
            .unwrap();
        assert_eq!(pulled.values.scalar(0, 0), Some(10.0));
        assert_eq!(pulled.values.scalar(1, 0), Some(15.0));
        assert_eq!(pulled.values.scalar(2, 0), Some(20.0));
        assert!(pulled.coverage.is_satisfied());
        assert!(composition.can_satisfy(input, &TimeSet::single(7.5)).unwrap());
        assert!(!composition.can_satisfy(input, &TimeSet::single(12.0)).unwrap());
    }

    #[test]
    fn test_use_last_after_range_holds_and_reports() {
        let mut composition = Composition::default();
        let cache = CacheConfig::default().with_interpolation(InterpolationPolicy::UseLast);
        let (out, input) = source(&mut composition, Some(cache));
        composition.publish(out, record(0.0, 10.0)).unwrap();
        composition.publish(out, record(10.0, 20.0)).unwrap();

        let pulled = composition.get_values(input, &TimeSet::single(25.0)).unwrap();
        assert_eq!(pulled.values.scalar(0, 0), Some(20.0));
        assert_eq!(
            pulled.coverage,
            Coverage::Extrapolated(ExtrapolationReason::OutOfRange)
        );
        assert_eq!(pulled.diagnostics.len(), 1);
        assert_eq!(composition.events().warning_count(), 1);
    }

    #[test]
    fn test_retry_bound_default_limit() {
        let mut composition = Composition::default();
        let stalled = StalledComponent::new("stalled");
        let updates = stalled.update_counter();
        let owner = composition.add_component(stalled);
        let out = composition.add_item(Some(owner), scalar_output("out")).unwrap();
        let input = composition.add_item(None, scalar_input("in")).unwrap();
        composition.connect(input, out).unwrap();

        let pulled = composition.get_values(input, &TimeSet::single(3.0)).unwrap();

        assert_eq!(updates.load(Ordering::SeqCst), 1000);
        assert_eq!(pulled.updates, 1000);
        assert_eq!(
            pulled.coverage,
            Coverage::Extrapolated(ExtrapolationReason::RetryLimit { attempts: 1000 })
        );
        assert!(pulled
            .diagnostics
            .iter()
            .any(|d| d.level == DiagnosticLevel::Error));
        // nothing was ever published: missing values come back
        assert_eq!(pulled.values.scalar(0, 0), Some(contracts::DEFAULT_MISSING));
    }

    #[test]
    fn test_busy_owner_gets_zero_updates() {
        let mut composition = Composition::default();
        let busy = StalledComponent::new("busy").with_status(ComponentStatus::Updating);
        let updates = busy.update_counter();
        let owner = composition.add_component(busy);
        let out = composition.add_item(Some(owner), scalar_output("out")).unwrap();
        let input = composition.add_item(None, scalar_input("in")).unwrap();
        composition.connect(input, out).unwrap();
        composition.publish(out, record(0.0, 4.0)).unwrap();

        let pulled = composition.get_values(input, &TimeSet::single(8.0)).unwrap();
        assert_eq!(updates.load(Ordering::SeqCst), 0);
        assert_eq!(pulled.updates, 0);
        assert_eq!(pulled.coverage, Coverage::Extrapolated(ExtrapolationReason::Busy));
        assert_eq!(pulled.values.scalar(0, 0), Some(4.0));
    }

    #[test]
    fn test_ramp_advances_on_demand() {
        let mut composition = Composition::default();
        let ramp = RampComponent::new("ramp", "q", 0.0, 0.25).with_slope(vec![2.0]);
        let updates = ramp.update_counter();
        let owner = composition.add_component(ramp);
        let q = composition.add_item(Some(owner), scalar_output("q")).unwrap();
        let input = composition.add_item(None, scalar_input("q_in")).unwrap();
        composition.connect(input, q).unwrap();

        let pulled = composition.get_values(input, &TimeSet::single(1.1)).unwrap();
        // records at 0, 0.25, ..., 1.25
        assert_eq!(updates.load(Ordering::SeqCst), 6);
        assert!(pulled.coverage.is_satisfied());
        let value = pulled.values.scalar(0, 0).unwrap();
        assert!((value - 2.2).abs() < 1e-12, "got {value}");
    }
}

#[cfg(test)]
mod linkage_tests {
    use contracts::{AdapterSpec, ItemDescription, LinkError, Reduction, TimeSet, ValueDefinition};
    use sync_engine::{Composition, ItemHandle, RampComponent};

    use crate::support::scalar_input;

    fn vector_ramp(composition: &mut Composition) -> Result<ItemHandle, LinkError> {
        let owner = composition.add_component(
            RampComponent::new("ramp", "flow", 0.0, 1.0).with_slope(vec![1.0, 3.0]),
        );
        composition.add_item(
            Some(owner),
            ItemDescription::output("flow", ValueDefinition::scalar("flow"), 2),
        )
    }

    #[test]
    fn test_two_stage_chain_is_reclaimed() {
        let mut composition = Composition::default();
        let producer = vector_ramp(&mut composition).unwrap();
        let a = composition
            .add_adapter_from_spec(
                producer,
                "a",
                &AdapterSpec::LinearConversion {
                    factor: 10.0,
                    offset: 1.0,
                },
            )
            .unwrap();
        let b = composition
            .add_adapter_from_spec(a, "b", &AdapterSpec::ElementReduce { op: Reduction::Sum })
            .unwrap();
        let consumer = composition.add_item(None, scalar_input("consumer")).unwrap();
        let linkage = composition.connect(consumer, b).unwrap();

        assert_eq!(
            composition.linkage(linkage).unwrap().chain(),
            &[producer, a, b, consumer]
        );
        assert!(composition.is_valid(linkage));

        // (10 * 2 + 1) + (10 * 6 + 1) at t = 2
        let pulled = composition.get_values(consumer, &TimeSet::single(2.0)).unwrap();
        assert_eq!(pulled.values.scalar(0, 0), Some(82.0));

        let reclaimed = composition.detach(linkage).unwrap();
        assert_eq!(reclaimed, vec![b, a]);
        assert!(!composition.contains_item(a));
        assert!(!composition.contains_item(b));
        let root = composition.item(producer).unwrap();
        assert_eq!(root.dependents().count(), 0);
        assert!(root.cache().is_some_and(|c| !c.is_empty()));
    }

    #[test]
    fn test_cycle_is_rejected() {
        let mut composition = Composition::default();
        let producer = vector_ramp(&mut composition).unwrap();
        let scale = AdapterSpec::LinearConversion {
            factor: 1.0,
            offset: 0.0,
        };
        let a = composition.add_adapter_from_spec(producer, "a", &scale).unwrap();
        let b = composition.add_adapter_from_spec(a, "b", &scale).unwrap();
        composition.rewire_adaptee(a, b).unwrap();

        let consumer = composition
            .add_item(
                None,
                ItemDescription::input("consumer", ValueDefinition::scalar("flow"), 2),
            )
            .unwrap();
        let err = composition.connect(consumer, b).unwrap_err();
        assert!(matches!(err, LinkError::BrokenChain { .. }), "got {err}");
        assert!(composition.linkage_of(consumer).is_none());
    }

    #[test]
    fn test_consumers_of_one_adapter_are_isolated() {
        let mut composition = Composition::default();
        let producer = vector_ramp(&mut composition).unwrap();
        let mean = composition
            .add_adapter_from_spec(producer, "mean", &AdapterSpec::ElementReduce { op: Reduction::Mean })
            .unwrap();
        let early = composition.add_item(None, scalar_input("early")).unwrap();
        let late = composition.add_item(None, scalar_input("late")).unwrap();
        composition.connect(early, mean).unwrap();
        composition.connect(late, mean).unwrap();

        // mean of t and 3t is 2t
        let late_first = composition.get_values(late, &TimeSet::single(4.0)).unwrap();
        let early_then = composition.get_values(early, &TimeSet::single(1.0)).unwrap();
        let late_again = composition.get_values(late, &TimeSet::single(4.0)).unwrap();

        assert_eq!(late_first.values.scalar(0, 0), Some(8.0));
        assert_eq!(early_then.values.scalar(0, 0), Some(2.0));
        assert_eq!(late_again.values.scalar(0, 0), Some(8.0));
    }

    #[test]
    fn test_describe_rebuilds_item_elsewhere() {
        let mut composition = Composition::default();
        let producer = vector_ramp(&mut composition).unwrap();
        let json = serde_json::to_string(&composition.describe(producer).unwrap()).unwrap();

        let mut other = Composition::default();
        let description: ItemDescription = serde_json::from_str(&json).unwrap();
        let rebuilt = other.add_item(None, description).unwrap();
        assert_eq!(
            other.item(rebuilt).unwrap().shape(),
            composition.item(producer).unwrap().shape()
        );
    }
}

#[cfg(test)]
mod bidirectional_tests {
    use std::time::Duration;

    use contracts::{ExtrapolationReason, TimeSet};
    use sync_engine::{Composition, CoupledComponent};

    use crate::support::{scalar_input, scalar_output};

    #[tokio::test]
    async fn test_coupled_pair_finishes_within_deadline() {
        let task = tokio::task::spawn_blocking(|| {
            let mut composition = Composition::default();
            let left = composition.add_component(
                CoupledComponent::new("left", "left_in", "left_out", 0.0, 1.0).with_response(1.0, 0.5),
            );
            let right = composition.add_component(
                CoupledComponent::new("right", "right_in", "right_out", 0.0, 1.0).with_response(0.0, 0.5),
            );
            let left_out = composition.add_item(Some(left), scalar_output("left_out")).unwrap();
            let left_in = composition.add_item(Some(left), scalar_input("left_in")).unwrap();
            let right_out = composition.add_item(Some(right), scalar_output("right_out")).unwrap();
            let right_in = composition.add_item(Some(right), scalar_input("right_in")).unwrap();
            composition.connect(left_in, right_out).unwrap();
            composition.connect(right_in, left_out).unwrap();

            let probe = composition.add_item(None, scalar_input("probe")).unwrap();
            composition.connect(probe, left_out).unwrap();

            let mut covered = 0;
            for step in 0..20 {
                let pulled = composition
                    .get_values(probe, &TimeSet::single(step as f64))
                    .unwrap();
                if pulled.coverage.is_satisfied() {
                    covered += 1;
                }
            }
            let busy = composition
                .events()
                .iter()
                .filter(|d| d.reason == ExtrapolationReason::Busy)
                .count();
            (covered, busy)
        });

        let (covered, busy) = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("bidirectional pulls did not terminate")
            .unwrap();
        assert_eq!(covered, 20);
        assert_eq!(busy, 20);
    }
}
