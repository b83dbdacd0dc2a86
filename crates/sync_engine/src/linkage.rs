//! Linkages: explicit `[producer, adapter*, consumer]` chains.
//!
//! Creation walks provider pointers from the consumer to the root producer
//! and rejects revisits, so a linkage never describes a cycle. Detaching
//! reclaims adapters that are left without dependents, walking upward until
//! an item that still feeds someone else, or the root producer.

use std::collections::HashSet;

use contracts::{ItemRole, LinkError};
use tracing::{debug, info, instrument};

use crate::composition::Composition;
use crate::item::{ItemHandle, LinkageHandle, Node};

/// Ordered chain of handles, root producer first, consumer last
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Linkage {
    chain: Vec<ItemHandle>,
}

impl Linkage {
    pub fn chain(&self) -> &[ItemHandle] {
        &self.chain
    }

    /// Root producer
    pub fn producer(&self) -> ItemHandle {
        self.chain[0]
    }

    pub fn consumer(&self) -> ItemHandle {
        self.chain[self.chain.len() - 1]
    }

    /// Adapter stages between producer and consumer, upstream first
    pub fn adapters(&self) -> &[ItemHandle] {
        &self.chain[1..self.chain.len() - 1]
    }
}

impl Composition {
    /// Connect `consumer` to `provider` and record the resulting chain.
    ///
    /// # Errors
    /// - `AlreadyConnected` if the consumer already has a provider
    /// - `BrokenChain` if the provider chain revisits an item or reaches an input
    /// - `MissingAdaptee` if an adapter on the way has no adaptee
    ///
    /// The connection is rolled back on failure.
    #[instrument(level = "debug", name = "linkage_connect", skip(self))]
    pub fn connect(
        &mut self,
        consumer: ItemHandle,
        provider: ItemHandle,
    ) -> Result<LinkageHandle, LinkError> {
        let provider_item = self.item(provider)?;
        if provider_item.role() != ItemRole::Output {
            return Err(LinkError::incompatible(
                provider_item.id().as_str(),
                self.item(consumer)?.id().as_str(),
                "an input item cannot provide values",
            ));
        }

        let item = self
            .items
            .get_mut(consumer.0)
            .ok_or_else(|| LinkError::unknown_item(consumer))?;
        let Node::Consumer(state) = &mut item.node else {
            return Err(LinkError::Other(format!(
                "'{}' is not an input item",
                item.id
            )));
        };
        if let Some(existing) = state.provider {
            return Err(LinkError::AlreadyConnected {
                item: item.id.to_string(),
                provider: existing.to_string(),
            });
        }
        state.provider = Some(provider);
        if let Some(dependents) = self.items[provider.0].dependents_mut() {
            dependents.insert(consumer);
        }

        let chain = match self.trace_chain(consumer) {
            Ok(chain) => chain,
            Err(e) => {
                self.unlink(consumer);
                return Err(e);
            }
        };

        let handle = LinkageHandle(self.linkages.insert(Linkage { chain }));
        if let Node::Consumer(state) = &mut self.items[consumer.0].node {
            state.linkage = Some(handle);
        }
        debug!(linkage = %handle, "linkage created");
        Ok(handle)
    }

    /// Remove a linkage and reclaim orphaned adapters.
    ///
    /// Returns the reclaimed adapter handles, nearest to the consumer first.
    #[instrument(level = "debug", name = "linkage_detach", skip(self))]
    pub fn detach(&mut self, handle: LinkageHandle) -> Result<Vec<ItemHandle>, LinkError> {
        let linkage = self
            .linkages
            .try_remove(handle.0)
            .ok_or_else(|| LinkError::Other(format!("unknown {handle}")))?;

        let mut current = self.unlink(linkage.consumer());
        let mut reclaimed = Vec::new();

        while let Some(candidate) = current {
            let orphan = self
                .items
                .get(candidate.0)
                .is_some_and(|item| item.is_adapter() && item.dependents().next().is_none());
            if !orphan {
                break;
            }

            let Some(adapter) = self.remove_item(candidate) else {
                break;
            };
            current = adapter.adaptee();
            if let Some(upstream) = current.and_then(|h| self.items.get_mut(h.0)) {
                upstream.release(candidate);
            }
            reclaimed.push(candidate);
        }

        if !reclaimed.is_empty() {
            info!(linkage = %handle, reclaimed = reclaimed.len(), "reclaimed orphan adapters");
        }
        observability::record_adapters_reclaimed(reclaimed.len());
        Ok(reclaimed)
    }

    /// Whether every neighbouring pair of the chain is still linked and compatible
    pub fn is_valid(&self, handle: LinkageHandle) -> bool {
        self.validate_linkage(handle).is_ok()
    }

    /// Like [`Self::is_valid`], naming the first problem found
    pub fn validate_linkage(&self, handle: LinkageHandle) -> Result<(), LinkError> {
        let linkage = self
            .linkages
            .get(handle.0)
            .ok_or_else(|| LinkError::Other(format!("unknown {handle}")))?;
        let chain = linkage.chain();

        for &stage in linkage.adapters() {
            let item = self.item(stage)?;
            if item.is_adapter() && item.adaptee().is_none() {
                return Err(LinkError::MissingAdaptee {
                    adapter: item.id().to_string(),
                });
            }
        }

        let root = self.item(linkage.producer())?;
        if !root.is_producer() {
            return Err(LinkError::broken_chain(
                root.id().as_str(),
                "chain does not start at a producer",
            ));
        }

        for pair in chain.windows(2) {
            let (upstream, downstream) = (pair[0], pair[1]);
            let up = self.item(upstream)?;
            let down = self.item(downstream)?;

            if !up.dependents().any(|h| h == downstream) {
                return Err(LinkError::broken_chain(
                    down.id().as_str(),
                    format!("not registered as a dependent of '{}'", up.id()),
                ));
            }

            match &down.node {
                Node::Adapter(adapter) => {
                    if adapter.adaptee != Some(upstream) {
                        return Err(LinkError::broken_chain(
                            down.id().as_str(),
                            format!("adaptee is no longer '{}'", up.id()),
                        ));
                    }
                    let output = adapter.stage.output_shape(up.shape())?;
                    if !output.matches(down.shape()) {
                        return Err(LinkError::incompatible(
                            up.id().as_str(),
                            down.id().as_str(),
                            "adapter output shape changed",
                        ));
                    }
                }
                Node::Consumer(consumer) => {
                    if consumer.provider != Some(upstream) {
                        return Err(LinkError::broken_chain(
                            down.id().as_str(),
                            format!("provider is no longer '{}'", up.id()),
                        ));
                    }
                    if !up.shape().matches(down.shape()) {
                        return Err(LinkError::incompatible(
                            up.id().as_str(),
                            down.id().as_str(),
                            format!(
                                "provides {} {:?} elements, expected {} {:?}",
                                up.shape().element_count,
                                up.shape().kind(),
                                down.shape().element_count,
                                down.shape().kind()
                            ),
                        ));
                    }
                }
                Node::Producer(_) => {
                    return Err(LinkError::broken_chain(
                        down.id().as_str(),
                        "a producer cannot sit downstream",
                    ))
                }
            }
        }

        Ok(())
    }

    /// Validate every linkage before a run
    pub fn validate_all(&self) -> Result<(), LinkError> {
        for (key, _) in self.linkages.iter() {
            self.validate_linkage(LinkageHandle(key))?;
        }
        Ok(())
    }

    /// Point an adapter at a different adaptee.
    ///
    /// No cycle check happens here; linkage creation rejects cyclic chains.
    pub fn rewire_adaptee(
        &mut self,
        adapter: ItemHandle,
        adaptee: ItemHandle,
    ) -> Result<(), LinkError> {
        let input = self.output_shape_of(adaptee)?.clone();
        let item = self.item(adapter)?;
        let Node::Adapter(state) = &item.node else {
            return Err(LinkError::Other(format!("'{}' is not an adapter", item.id())));
        };
        let output = state.stage.output_shape(&input)?;
        let previous = state.adaptee;

        if let Some(previous) = previous.and_then(|h| self.items.get_mut(h.0)) {
            previous.release(adapter);
        }
        if let Some(dependents) = self.items[adaptee.0].dependents_mut() {
            dependents.insert(adapter);
        }

        let item = &mut self.items[adapter.0];
        item.shape = output.clone();
        if let Node::Adapter(state) = &mut item.node {
            state.adaptee = Some(adaptee);
            state.shapes.input = input;
            state.shapes.output = output;
            state.caches.clear();
        }
        debug!(adapter = %adapter, adaptee = %adaptee, "adapter rewired");
        Ok(())
    }

    /// Remove an output item (producer or adapter) from the composition.
    ///
    /// Consumers fed directly by it are disconnected and their linkages
    /// dropped. Adapters wrapping it stay in place without an adaptee:
    /// pulling through them fails with `MissingAdaptee` until they are
    /// rewired or detached.
    #[instrument(level = "debug", name = "linkage_remove_output", skip(self))]
    pub fn remove_output(&mut self, handle: ItemHandle) -> Result<Vec<LinkageHandle>, LinkError> {
        let item = self.item(handle)?;
        if item.role() != ItemRole::Output {
            return Err(LinkError::Other(format!(
                "'{}' is not an output item",
                item.id()
            )));
        }
        let dependents: Vec<ItemHandle> = item.dependents().collect();

        let mut dropped = Vec::new();
        for dependent in dependents {
            let Some(item) = self.items.get_mut(dependent.0) else {
                continue;
            };
            match &mut item.node {
                Node::Adapter(adapter) => {
                    adapter.adaptee = None;
                    adapter.caches.clear();
                }
                Node::Consumer(consumer) => {
                    let linkage = consumer.linkage;
                    self.unlink(dependent);
                    if let Some(linkage) = linkage {
                        self.linkages.try_remove(linkage.0);
                        dropped.push(linkage);
                    }
                }
                Node::Producer(_) => {}
            }
        }

        if let Some(removed) = self.remove_item(handle) {
            if let Some(upstream) = removed.adaptee().and_then(|h| self.items.get_mut(h.0)) {
                upstream.release(handle);
            }
            info!(item = %removed.id(), dropped = dropped.len(), "output removed");
        }
        Ok(dropped)
    }

    pub fn linkage(&self, handle: LinkageHandle) -> Option<&Linkage> {
        self.linkages.get(handle.0)
    }

    pub fn linkages(&self) -> impl Iterator<Item = (LinkageHandle, &Linkage)> {
        self.linkages
            .iter()
            .map(|(key, linkage)| (LinkageHandle(key), linkage))
    }

    /// Linkage currently ending at `consumer`
    pub fn linkage_of(&self, consumer: ItemHandle) -> Option<LinkageHandle> {
        match &self.items.get(consumer.0)?.node {
            Node::Consumer(state) => state.linkage,
            _ => None,
        }
    }

    /// Walk consumer -> root producer, returning the chain root first
    fn trace_chain(&self, consumer: ItemHandle) -> Result<Vec<ItemHandle>, LinkError> {
        let mut chain = vec![consumer];
        let mut visited = HashSet::from([consumer]);
        let mut current = self
            .item(consumer)?
            .provider()
            .ok_or_else(|| LinkError::NotConnected {
                item: consumer.to_string(),
            })?;

        loop {
            let item = self.item(current)?;
            if !visited.insert(current) {
                return Err(LinkError::broken_chain(
                    item.id().as_str(),
                    "provider chain revisits an item",
                ));
            }
            chain.push(current);

            match &item.node {
                Node::Producer(_) => break,
                Node::Adapter(adapter) => {
                    current = adapter.adaptee.ok_or_else(|| LinkError::MissingAdaptee {
                        adapter: item.id().to_string(),
                    })?;
                }
                Node::Consumer(_) => {
                    return Err(LinkError::broken_chain(
                        item.id().as_str(),
                        "an input item cannot provide values",
                    ))
                }
            }
        }

        chain.reverse();
        Ok(chain)
    }

    /// Disconnect a consumer from its provider, returning the former provider
    fn unlink(&mut self, consumer: ItemHandle) -> Option<ItemHandle> {
        let provider = match &mut self.items.get_mut(consumer.0)?.node {
            Node::Consumer(state) => {
                state.linkage = None;
                state.provider.take()
            }
            _ => None,
        }?;
        if let Some(item) = self.items.get_mut(provider.0) {
            item.release(consumer);
        }
        Some(provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{AdapterSpec, ItemDescription, Reduction, TimeSet, ValueDefinition, ValueKind};

    fn composition_with_source() -> (Composition, ItemHandle) {
        let mut composition = Composition::default();
        let producer = composition
            .add_item(
                None,
                ItemDescription::output("p", ValueDefinition::scalar("p"), 3),
            )
            .unwrap();
        (composition, producer)
    }

    fn scale(composition: &mut Composition, adaptee: ItemHandle, id: &str) -> ItemHandle {
        composition
            .add_adapter_from_spec(
                adaptee,
                id,
                &AdapterSpec::LinearConversion {
                    factor: 2.0,
                    offset: 0.0,
                },
            )
            .unwrap()
    }

    fn input(composition: &mut Composition, id: &str, count: usize) -> ItemHandle {
        composition
            .add_item(None, ItemDescription::input(id, ValueDefinition::scalar(id), count))
            .unwrap()
    }

    #[test]
    fn test_chain_is_root_first() {
        let (mut composition, p) = composition_with_source();
        let a = scale(&mut composition, p, "a");
        let b = scale(&mut composition, a, "b");
        let c = input(&mut composition, "c", 3);

        let handle = composition.connect(c, b).unwrap();
        let linkage = composition.linkage(handle).unwrap();
        assert_eq!(linkage.chain(), &[p, a, b, c]);
        assert_eq!(linkage.adapters(), &[a, b]);
        assert_eq!(composition.linkage_of(c), Some(handle));
        assert!(composition.is_valid(handle));
    }

    #[test]
    fn test_detach_reclaims_two_stage_chain() {
        let (mut composition, p) = composition_with_source();
        let a = scale(&mut composition, p, "a");
        let b = scale(&mut composition, a, "b");
        let c = input(&mut composition, "c", 3);
        let handle = composition.connect(c, b).unwrap();

        let reclaimed = composition.detach(handle).unwrap();
        assert_eq!(reclaimed, vec![b, a]);
        assert!(!composition.contains_item(a));
        assert!(!composition.contains_item(b));
        assert!(composition.contains_item(p));
        assert_eq!(composition.item(p).unwrap().dependents().count(), 0);
        assert_eq!(composition.item(c).unwrap().provider(), None);
        assert!(composition.find_item("a").is_none());
    }

    #[test]
    fn test_detach_keeps_shared_adapter() {
        let (mut composition, p) = composition_with_source();
        let a = scale(&mut composition, p, "a");
        let b = scale(&mut composition, a, "b");
        let c = input(&mut composition, "c", 3);
        let d = input(&mut composition, "d", 3);
        let via_b = composition.connect(c, b).unwrap();
        composition.connect(d, a).unwrap();

        let reclaimed = composition.detach(via_b).unwrap();
        assert_eq!(reclaimed, vec![b]);
        assert!(composition.contains_item(a));
        assert_eq!(composition.item(a).unwrap().dependents().collect::<Vec<_>>(), vec![d]);
    }

    #[test]
    fn test_cycle_rejected_via_rewire() {
        let (mut composition, p) = composition_with_source();
        let a = scale(&mut composition, p, "a");
        let b = scale(&mut composition, a, "b");
        composition.rewire_adaptee(a, b).unwrap();

        let c = input(&mut composition, "c", 3);
        let err = composition.connect(c, b).unwrap_err();
        assert!(matches!(err, LinkError::BrokenChain { .. }));
        // Rolled back
        assert_eq!(composition.item(c).unwrap().provider(), None);
        assert!(!composition.item(b).unwrap().dependents().any(|h| h == c));
    }

    #[test]
    fn test_already_connected() {
        let (mut composition, p) = composition_with_source();
        let c = input(&mut composition, "c", 3);
        composition.connect(c, p).unwrap();
        let err = composition.connect(c, p).unwrap_err();
        assert!(matches!(err, LinkError::AlreadyConnected { .. }));
    }

    #[test]
    fn test_shape_mismatch_is_invalid() {
        let (mut composition, p) = composition_with_source();
        let mean = composition
            .add_adapter_from_spec(p, "mean", &AdapterSpec::ElementReduce { op: Reduction::Mean })
            .unwrap();
        let wrong = input(&mut composition, "wrong", 3);
        let right = input(&mut composition, "right", 1);

        let bad = composition.connect(wrong, mean).unwrap();
        let good = composition.connect(right, mean).unwrap();
        assert!(!composition.is_valid(bad));
        assert!(composition.is_valid(good));
        assert!(matches!(
            composition.validate_all(),
            Err(LinkError::IncompatibleItems { .. })
        ));
    }

    #[test]
    fn test_rewire_invalidates_existing_linkage() {
        let (mut composition, p) = composition_with_source();
        let other = composition
            .add_item(
                None,
                ItemDescription::output("other", ValueDefinition::scalar("other"), 3),
            )
            .unwrap();
        let a = scale(&mut composition, p, "a");
        let c = input(&mut composition, "c", 3);
        let handle = composition.connect(c, a).unwrap();

        composition.rewire_adaptee(a, other).unwrap();
        assert!(!composition.is_valid(handle));
        assert!(composition.item(p).unwrap().dependents().next().is_none());
    }

    #[test]
    fn test_removed_producer_leaves_adapter_without_adaptee() {
        let (mut composition, p) = composition_with_source();
        let a = scale(&mut composition, p, "a");
        let b = scale(&mut composition, a, "b");
        let c = input(&mut composition, "c", 3);
        let d = input(&mut composition, "d", 3);
        let via_b = composition.connect(c, b).unwrap();
        let direct = composition.connect(d, p).unwrap();

        let dropped = composition.remove_output(p).unwrap();
        assert_eq!(dropped, vec![direct]);
        assert!(!composition.contains_item(p));
        assert_eq!(composition.item(d).unwrap().provider(), None);
        assert_eq!(composition.linkage_of(d), None);
        assert_eq!(composition.item(a).unwrap().adaptee(), None);

        assert!(!composition.is_valid(via_b));
        assert!(matches!(
            composition.validate_linkage(via_b),
            Err(LinkError::MissingAdaptee { adapter }) if adapter == "a"
        ));
        assert!(matches!(
            composition.get_values(c, &TimeSet::single(0.0)),
            Err(LinkError::MissingAdaptee { .. })
        ));
        assert!(matches!(
            composition.can_satisfy(c, &TimeSet::single(0.0)),
            Err(LinkError::MissingAdaptee { .. })
        ));

        let e = input(&mut composition, "e", 3);
        assert!(matches!(
            composition.connect(e, b),
            Err(LinkError::MissingAdaptee { .. })
        ));
        assert_eq!(composition.item(e).unwrap().provider(), None);

        // The dangling chain can still be detached
        assert_eq!(composition.detach(via_b).unwrap(), vec![b, a]);
    }

    #[test]
    fn test_remove_output_rejects_inputs() {
        let (mut composition, _) = composition_with_source();
        let c = input(&mut composition, "c", 3);
        assert!(composition.remove_output(c).is_err());
        assert!(composition.contains_item(c));
    }

    #[test]
    fn test_input_cannot_provide() {
        let (mut composition, _) = composition_with_source();
        let c = input(&mut composition, "c", 3);
        let d = input(&mut composition, "d", 3);
        assert!(matches!(
            composition.connect(c, d),
            Err(LinkError::IncompatibleItems { .. })
        ));

        let text = ItemDescription::output("t", ValueDefinition::new("t", ValueKind::Text), 1);
        let t = composition.add_item(None, text).unwrap();
        let err = composition
            .add_adapter_from_spec(
                t,
                "t_scaled",
                &AdapterSpec::LinearConversion {
                    factor: 1.0,
                    offset: 0.0,
                },
            )
            .unwrap_err();
        assert!(matches!(err, LinkError::IncompatibleItems { .. }));
    }
}
