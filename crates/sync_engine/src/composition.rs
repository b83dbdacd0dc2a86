//! Composition: arena of components, exchange items and linkages.
//!
//! Pull path for `get_values(consumer, times)`:
//! 1. follow the consumer's provider handle
//! 2. adapters resolve their own times and pull their adaptee recursively
//! 3. the root producer runs the [`PullSynchronizer`] loop against its owner
//! 4. answers flow back down, each adapter memoising per requesting dependent

use std::collections::{hash_map::Entry, BTreeSet, HashMap};
use std::fmt;

use contracts::{
    AdapterSpec, CacheConfig, ComponentStatus, Coverage, Diagnostic, DiagnosticLevel,
    EngineConfig, ExtrapolationReason, InterpolationPolicy, ItemDescription, ItemId, ItemRole,
    ItemShape, LinkError, Pulled, TimeRecord, TimeSet, ValueKind,
};
use slab::Slab;
use tracing::{debug, instrument, warn};

use crate::adapter::{self, RecordAdapter, StageShapes};
use crate::cache::{InsertOutcome, TimeRecordCache};
use crate::component::{LinkableComponent, UpdateContext};
use crate::events::EventLog;
use crate::item::{
    Adapter, ComponentHandle, Consumer, ExchangeItem, ItemHandle, Node, Producer,
};
use crate::linkage::Linkage;
use crate::synchronizer::{Advance, PullSynchronizer, SyncState};

pub(crate) struct ComponentSlot {
    id: String,
    /// `None` while the component is inside `update()`
    component: Option<Box<dyn LinkableComponent>>,
    updates: usize,
}

/// Owner of every item, component and linkage taking part in a run
pub struct Composition {
    pub(crate) items: Slab<ExchangeItem>,
    pub(crate) ids: HashMap<ItemId, ItemHandle>,
    pub(crate) components: Slab<ComponentSlot>,
    pub(crate) linkages: Slab<Linkage>,
    config: EngineConfig,
    synchronizer: PullSynchronizer,
    events: EventLog,
}

impl fmt::Debug for Composition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Composition")
            .field("items", &self.items.len())
            .field("components", &self.components.len())
            .field("linkages", &self.linkages.len())
            .field("retry_limit", &self.synchronizer.retry_limit())
            .field("events", &self.events)
            .finish()
    }
}

impl Default for Composition {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Composition {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            items: Slab::new(),
            ids: HashMap::new(),
            components: Slab::new(),
            linkages: Slab::new(),
            synchronizer: PullSynchronizer::new(config.retry_limit),
            events: EventLog::new(config.event_log_capacity),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn synchronizer(&self) -> PullSynchronizer {
        self.synchronizer
    }

    // ===== Components =====

    pub fn add_component<C>(&mut self, component: C) -> ComponentHandle
    where
        C: LinkableComponent + 'static,
    {
        let id = component.id().to_string();
        let key = self.components.insert(ComponentSlot {
            id,
            component: Some(Box::new(component)),
            updates: 0,
        });
        ComponentHandle(key)
    }

    /// Status of a component; `Updating` while it is inside `update()`
    pub fn component_status(&self, handle: ComponentHandle) -> Option<ComponentStatus> {
        let slot = self.components.get(handle.0)?;
        Some(
            slot.component
                .as_ref()
                .map_or(ComponentStatus::Updating, |c| c.status()),
        )
    }

    pub fn component_id(&self, handle: ComponentHandle) -> Option<&str> {
        self.components.get(handle.0).map(|slot| slot.id.as_str())
    }

    /// `update()` calls issued on a component so far
    pub fn component_updates(&self, handle: ComponentHandle) -> Option<usize> {
        self.components.get(handle.0).map(|slot| slot.updates)
    }

    pub fn components(&self) -> impl Iterator<Item = ComponentHandle> + '_ {
        self.components.iter().map(|(key, _)| ComponentHandle(key))
    }

    /// Advance a component once outside of any pull
    pub fn update_component(&mut self, handle: ComponentHandle) -> Result<(), LinkError> {
        self.run_update(handle, None)
    }

    pub(crate) fn run_update(
        &mut self,
        handle: ComponentHandle,
        requesting: Option<ItemHandle>,
    ) -> Result<(), LinkError> {
        let slot = self
            .components
            .get_mut(handle.0)
            .ok_or_else(|| LinkError::UnknownComponent {
                component: handle.to_string(),
            })?;
        let Some(mut component) = slot.component.take() else {
            return Err(LinkError::component_failed(
                slot.id.as_str(),
                "component is already updating",
            ));
        };
        slot.updates += 1;
        debug!(component = %slot.id, updates = slot.updates, "advancing component");
        metrics::counter!("timelink_component_updates_total", "component" => slot.id.clone())
            .increment(1);

        let result = component.update(&mut UpdateContext::new(self, handle, requesting));

        if let Some(slot) = self.components.get_mut(handle.0) {
            slot.component = Some(component);
        }
        result
    }

    // ===== Items =====

    /// Create an item from its declarative description.
    ///
    /// Outputs get the engine's default cache policy; linear interpolation
    /// is downgraded to use-last for kinds that cannot blend.
    pub fn add_item(
        &mut self,
        owner: Option<ComponentHandle>,
        description: ItemDescription,
    ) -> Result<ItemHandle, LinkError> {
        match description.role {
            ItemRole::Output => {
                let cache = self.default_cache_for(description.shape.kind());
                self.add_output_with_cache(owner, description, cache)
            }
            ItemRole::Input => {
                self.check_new_item(owner, &description.id)?;
                Ok(self.insert_item(ExchangeItem {
                    id: description.id,
                    caption: description.caption,
                    shape: description.shape,
                    owner,
                    requested: description.time_set,
                    node: Node::Consumer(Consumer::default()),
                }))
            }
        }
    }

    /// Create an output item with an explicit cache policy, honoured strictly
    pub fn add_output_with_cache(
        &mut self,
        owner: Option<ComponentHandle>,
        description: ItemDescription,
        cache: CacheConfig,
    ) -> Result<ItemHandle, LinkError> {
        if description.role != ItemRole::Output {
            return Err(LinkError::Other(format!(
                "'{}' is not described as an output",
                description.id
            )));
        }
        self.check_new_item(owner, &description.id)?;
        let cache = TimeRecordCache::new(description.id.clone(), description.shape.clone(), cache)?;

        Ok(self.insert_item(ExchangeItem {
            id: description.id,
            caption: description.caption,
            shape: description.shape,
            owner,
            requested: description.time_set,
            node: Node::Producer(Producer {
                cache,
                state: SyncState::Idle,
                dependents: BTreeSet::new(),
                earliest_requested: HashMap::new(),
            }),
        }))
    }

    /// Wrap `adaptee` in a transformation stage
    pub fn add_adapter(
        &mut self,
        adaptee: ItemHandle,
        id: impl Into<ItemId>,
        stage: Box<dyn RecordAdapter>,
    ) -> Result<ItemHandle, LinkError> {
        let id = id.into();
        self.check_new_item(None, &id)?;

        let upstream = self.item(adaptee)?;
        if upstream.role() != ItemRole::Output {
            return Err(LinkError::incompatible(
                upstream.id.as_str(),
                id.as_str(),
                "an input item cannot be adapted",
            ));
        }
        let input = upstream.shape.clone();
        let output = stage.output_shape(&input)?;
        let cache_config = self.default_cache_for(output.kind());
        debug!(adapter = %id, kind = stage.kind(), adaptee = %upstream.id, "adding adapter");

        let handle = self.insert_item(ExchangeItem {
            id,
            caption: String::new(),
            shape: output.clone(),
            owner: None,
            requested: TimeSet::new(),
            node: Node::Adapter(Adapter {
                adaptee: Some(adaptee),
                stage,
                shapes: StageShapes { input, output },
                cache_config,
                caches: HashMap::new(),
                dependents: BTreeSet::new(),
            }),
        });
        if let Some(dependents) = self.items[adaptee.0].dependents_mut() {
            dependents.insert(handle);
        }
        Ok(handle)
    }

    /// Wrap `adaptee` in a built-in stage
    pub fn add_adapter_from_spec(
        &mut self,
        adaptee: ItemHandle,
        id: impl Into<ItemId>,
        spec: &AdapterSpec,
    ) -> Result<ItemHandle, LinkError> {
        self.add_adapter(adaptee, id, adapter::build(spec)?)
    }

    /// Declarative description of an item
    pub fn describe(&self, handle: ItemHandle) -> Result<ItemDescription, LinkError> {
        let item = self.item(handle)?;
        Ok(ItemDescription {
            id: item.id.clone(),
            caption: item.caption.clone(),
            role: item.role(),
            shape: item.shape.clone(),
            time_set: item.requested.clone(),
        })
    }

    pub fn find_item(&self, id: &str) -> Option<ItemHandle> {
        self.ids.get(id).copied()
    }

    pub fn item(&self, handle: ItemHandle) -> Result<&ExchangeItem, LinkError> {
        self.items
            .get(handle.0)
            .ok_or_else(|| LinkError::unknown_item(handle))
    }

    pub fn items(&self) -> impl Iterator<Item = (ItemHandle, &ExchangeItem)> {
        self.items.iter().map(|(key, item)| (ItemHandle(key), item))
    }

    pub fn contains_item(&self, handle: ItemHandle) -> bool {
        self.items.contains(handle.0)
    }

    pub fn sync_state(&self, handle: ItemHandle) -> Option<SyncState> {
        self.items.get(handle.0).and_then(ExchangeItem::sync_state)
    }

    /// Append a record to a producer's cache
    pub fn publish(
        &mut self,
        handle: ItemHandle,
        record: TimeRecord,
    ) -> Result<InsertOutcome, LinkError> {
        let item = self
            .items
            .get_mut(handle.0)
            .ok_or_else(|| LinkError::unknown_item(handle))?;
        let Node::Producer(producer) = &mut item.node else {
            return Err(LinkError::Other(format!(
                "'{}' is not a producer",
                item.id
            )));
        };

        let outcome = producer.cache.insert(record)?;
        observability::record_cache_depth(item.id.as_str(), producer.cache.len());
        Ok(outcome)
    }

    // ===== Pull protocol =====

    /// Whether `times` can be answered for `consumer` without advancing or
    /// extrapolating anything
    pub fn can_satisfy(&self, consumer: ItemHandle, times: &TimeSet) -> Result<bool, LinkError> {
        let item = self.item(consumer)?;
        let mut current = item
            .provider()
            .ok_or_else(|| LinkError::NotConnected {
                item: item.id.to_string(),
            })?;
        let mut query = times.clone();

        for _ in 0..=self.items.len() {
            let item = self.item(current)?;
            match &item.node {
                Node::Producer(producer) => return Ok(producer.cache.can_satisfy_set(&query)),
                Node::Adapter(adapter) => {
                    query = adapter.stage.resolve_times(&query);
                    current = adapter.adaptee.ok_or_else(|| LinkError::MissingAdaptee {
                        adapter: item.id.to_string(),
                    })?;
                }
                Node::Consumer(_) => {
                    return Err(LinkError::broken_chain(
                        item.id.as_str(),
                        "an input item cannot provide values",
                    ))
                }
            }
        }

        Err(LinkError::broken_chain(
            self.item(consumer)?.id.as_str(),
            "provider chain does not terminate at a producer",
        ))
    }

    /// Pull values for `consumer` at every time of `times`.
    ///
    /// Busy owners, exhausted retries and finished owners degrade to an
    /// extrapolated answer reported through [`Pulled::coverage`].
    #[instrument(
        level = "debug",
        name = "composition_get_values",
        skip(self, consumer, times),
        fields(consumer = %consumer, times = times.len())
    )]
    pub fn get_values(&mut self, consumer: ItemHandle, times: &TimeSet) -> Result<Pulled, LinkError> {
        let item = self
            .items
            .get_mut(consumer.0)
            .ok_or_else(|| LinkError::unknown_item(consumer))?;
        let id = item.id.clone();
        let Node::Consumer(state) = &item.node else {
            return Err(LinkError::Other(format!("'{id}' is not an input item")));
        };
        let provider = state
            .provider
            .ok_or_else(|| LinkError::NotConnected { item: id.to_string() })?;
        item.requested = times.clone();

        let pulled = self.pull_from(provider, consumer, times, 0)?;

        for diagnostic in &pulled.diagnostics {
            observability::record_diagnostic(diagnostic);
            self.events.record(diagnostic.clone());
        }
        observability::record_pull(id.as_str(), &pulled.coverage, pulled.updates);
        Ok(pulled)
    }

    fn pull_from(
        &mut self,
        provider: ItemHandle,
        requester: ItemHandle,
        times: &TimeSet,
        depth: usize,
    ) -> Result<Pulled, LinkError> {
        let item = self.item(provider)?;
        if depth > self.items.len() {
            return Err(LinkError::broken_chain(
                item.id.as_str(),
                "provider chain does not terminate at a producer",
            ));
        }

        if item.is_producer() {
            self.pull_producer(provider, requester, times)
        } else if item.is_adapter() {
            self.pull_adapter(provider, requester, times, depth)
        } else {
            Err(LinkError::broken_chain(
                item.id.as_str(),
                "an input item cannot provide values",
            ))
        }
    }

    fn pull_producer(
        &mut self,
        handle: ItemHandle,
        requester: ItemHandle,
        times: &TimeSet,
    ) -> Result<Pulled, LinkError> {
        let synchronizer = self.synchronizer;
        let id = self.item(handle)?.id.clone();
        let report = synchronizer.pull(
            &id,
            &mut ProducerTarget {
                composition: self,
                item: handle,
            },
            times,
        )?;

        let item = self
            .items
            .get_mut(handle.0)
            .ok_or_else(|| LinkError::unknown_item(&id))?;
        item.requested = times.clone();
        let Node::Producer(producer) = &mut item.node else {
            return Err(LinkError::broken_chain(id.as_str(), "producer replaced during pull"));
        };

        let (values, quality) = producer.cache.values_at(times)?;
        let mut diagnostics = report.diagnostics;
        let coverage = match report.stopped {
            Some(reason) => Coverage::Extrapolated(reason),
            None if quality.is_extrapolated() => {
                warn!(item = %id, "request answered outside cached range");
                diagnostics.push(Diagnostic::new(
                    DiagnosticLevel::Warning,
                    id.clone(),
                    ExtrapolationReason::OutOfRange,
                    times.clone(),
                    "values extrapolated outside cached range",
                ));
                producer.state = SyncState::Extrapolating(ExtrapolationReason::OutOfRange);
                Coverage::Extrapolated(ExtrapolationReason::OutOfRange)
            }
            None => Coverage::Satisfied,
        };

        if let Some(earliest) = times.earliest() {
            producer.earliest_requested.insert(requester, earliest);
        }
        // A dependent that has never pulled may still ask for anything cached
        let all_pulled = producer
            .dependents
            .iter()
            .all(|dependent| producer.earliest_requested.contains_key(dependent));
        if let Some(keep) = producer.cache.config().keep_history.filter(|_| all_pulled) {
            if let Some(floor) = producer.earliest_requested.values().copied().reduce(f64::min) {
                producer.cache.trim(floor - keep);
            }
        }
        observability::record_cache_depth(id.as_str(), producer.cache.len());

        Ok(Pulled {
            values,
            coverage,
            updates: report.updates,
            diagnostics,
        })
    }

    fn pull_adapter(
        &mut self,
        handle: ItemHandle,
        requester: ItemHandle,
        times: &TimeSet,
        depth: usize,
    ) -> Result<Pulled, LinkError> {
        let (adaptee, resolved) = {
            let item = self.item(handle)?;
            let Node::Adapter(adapter) = &item.node else {
                return Err(LinkError::broken_chain(item.id.as_str(), "not an adapter"));
            };
            let adaptee = adapter.adaptee.ok_or_else(|| LinkError::MissingAdaptee {
                adapter: item.id.to_string(),
            })?;
            (adaptee, adapter.stage.resolve_times(times))
        };

        let Pulled {
            values,
            coverage,
            updates,
            diagnostics,
        } = self.pull_from(adaptee, handle, &resolved, depth + 1)?;

        let item = self
            .items
            .get_mut(handle.0)
            .ok_or_else(|| LinkError::unknown_item(handle))?;
        item.requested = times.clone();
        let id = item.id.clone();
        let Node::Adapter(adapter) = &mut item.node else {
            return Err(LinkError::broken_chain(id.as_str(), "adapter replaced during pull"));
        };

        let mut adapted =
            adapter
                .stage
                .adapt_records(&values.into_records(), times, &adapter.shapes)?;
        adapted.sort_by(|a, b| a.stamp().total_cmp(&b.stamp()));

        let cache = match adapter.caches.entry(requester) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(TimeRecordCache::new(
                id,
                adapter.shapes.output.clone(),
                adapter.cache_config,
            )?),
        };
        // Re-queries of earlier times supersede the memo
        if let Some(first) = adapted.first() {
            cache.truncate_from(first.stamp());
        }
        for record in adapted {
            cache.insert(record)?;
        }
        let (values, _) = cache.values_at(times)?;
        if let Some(earliest) = times.earliest() {
            cache.trim(earliest);
        }

        Ok(Pulled {
            values,
            coverage,
            updates,
            diagnostics,
        })
    }

    // ===== Events =====

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<Diagnostic> {
        self.events.drain()
    }

    // ===== Internals =====

    fn default_cache_for(&self, kind: ValueKind) -> CacheConfig {
        let cache = self.config.cache;
        if cache.interpolation == InterpolationPolicy::Linear && !kind.supports_linear() {
            cache.with_interpolation(InterpolationPolicy::UseLast)
        } else {
            cache
        }
    }

    fn check_new_item(&self, owner: Option<ComponentHandle>, id: &ItemId) -> Result<(), LinkError> {
        if let Some(owner) = owner {
            if !self.components.contains(owner.0) {
                return Err(LinkError::UnknownComponent {
                    component: owner.to_string(),
                });
            }
        }
        if self.ids.contains_key(id) {
            return Err(LinkError::DuplicateItem {
                item: id.to_string(),
            });
        }
        Ok(())
    }

    fn insert_item(&mut self, item: ExchangeItem) -> ItemHandle {
        let id = item.id.clone();
        let handle = ItemHandle(self.items.insert(item));
        self.ids.insert(id, handle);
        handle
    }

    /// Drop an item from the arena and the id index
    pub(crate) fn remove_item(&mut self, handle: ItemHandle) -> Option<ExchangeItem> {
        let item = self.items.try_remove(handle.0)?;
        self.ids.remove(&item.id);
        Some(item)
    }

    pub(crate) fn output_shape_of(&self, handle: ItemHandle) -> Result<&ItemShape, LinkError> {
        let item = self.item(handle)?;
        match item.role() {
            ItemRole::Output => Ok(&item.shape),
            ItemRole::Input => Err(LinkError::incompatible(
                item.id.as_str(),
                "",
                "an input item cannot provide values",
            )),
        }
    }
}

/// Producer as seen by the pull loop
struct ProducerTarget<'a> {
    composition: &'a mut Composition,
    item: ItemHandle,
}

impl ProducerTarget<'_> {
    fn producer_mut(&mut self) -> Option<&mut Producer> {
        match &mut self.composition.items.get_mut(self.item.0)?.node {
            Node::Producer(producer) => Some(producer),
            _ => None,
        }
    }

    fn owner(&self) -> Option<ComponentHandle> {
        self.composition.items.get(self.item.0)?.owner
    }
}

impl Advance for ProducerTarget<'_> {
    fn covers(&self, query: &TimeSet) -> bool {
        self.composition
            .items
            .get(self.item.0)
            .and_then(ExchangeItem::cache)
            .is_some_and(|cache| cache.can_satisfy_set(query))
    }

    fn precedes(&self, query: &TimeSet) -> bool {
        self.composition
            .items
            .get(self.item.0)
            .and_then(ExchangeItem::cache)
            .is_some_and(|cache| cache.precedes(query))
    }

    fn owner_status(&self) -> Option<ComponentStatus> {
        self.composition.component_status(self.owner()?)
    }

    fn advance(&mut self) -> Result<(), LinkError> {
        let owner = self.owner().ok_or_else(|| {
            LinkError::component_failed(self.item.to_string(), "producer lost its owner")
        })?;
        self.composition.run_update(owner, Some(self.item))
    }

    fn transition(&mut self, state: SyncState) {
        if let Some(producer) = self.producer_mut() {
            producer.state = state;
        }
    }
}
