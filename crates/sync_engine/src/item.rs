//! Exchange items stored in the composition arena.
//!
//! Items never point at each other directly; every relation (owner,
//! provider, adaptee, dependents) is a handle into the arenas of
//! [`crate::Composition`].

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use contracts::{CacheConfig, ItemId, ItemRole, ItemShape, TimeSet};

use crate::adapter::{RecordAdapter, StageShapes};
use crate::cache::TimeRecordCache;
use crate::synchronizer::SyncState;

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub(crate) usize);

        impl $name {
            /// Raw arena index
            pub fn index(self) -> usize {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }
    };
}

handle!(
    /// Stable index of an exchange item
    ItemHandle,
    "item"
);
handle!(
    /// Stable index of a registered component
    ComponentHandle,
    "component"
);
handle!(
    /// Stable index of a linkage
    LinkageHandle,
    "linkage"
);

/// One node of the dataflow graph
pub struct ExchangeItem {
    pub(crate) id: ItemId,
    pub(crate) caption: String,
    pub(crate) shape: ItemShape,
    pub(crate) owner: Option<ComponentHandle>,
    /// Last time-set requested by (consumers) or served to (providers) this item
    pub(crate) requested: TimeSet,
    pub(crate) node: Node,
}

pub(crate) enum Node {
    Producer(Producer),
    Adapter(Adapter),
    Consumer(Consumer),
}

/// Output item backed by its own cache
pub(crate) struct Producer {
    pub(crate) cache: TimeRecordCache,
    pub(crate) state: SyncState,
    /// Direct consumers and wrapping adapters
    pub(crate) dependents: BTreeSet<ItemHandle>,
    /// Earliest stamp each dependent asked for in its last pull
    pub(crate) earliest_requested: HashMap<ItemHandle, f64>,
}

/// Transformation stage wrapping one adaptee
pub(crate) struct Adapter {
    pub(crate) adaptee: Option<ItemHandle>,
    pub(crate) stage: Box<dyn RecordAdapter>,
    pub(crate) shapes: StageShapes,
    pub(crate) cache_config: CacheConfig,
    /// Adapted records memoised per requesting dependent
    pub(crate) caches: HashMap<ItemHandle, TimeRecordCache>,
    pub(crate) dependents: BTreeSet<ItemHandle>,
}

/// Input item requesting values from exactly one provider
#[derive(Default)]
pub(crate) struct Consumer {
    pub(crate) provider: Option<ItemHandle>,
    pub(crate) linkage: Option<LinkageHandle>,
}

impl ExchangeItem {
    pub fn id(&self) -> &ItemId {
        &self.id
    }

    pub fn caption(&self) -> &str {
        &self.caption
    }

    pub fn shape(&self) -> &ItemShape {
        &self.shape
    }

    pub fn owner(&self) -> Option<ComponentHandle> {
        self.owner
    }

    pub fn requested(&self) -> &TimeSet {
        &self.requested
    }

    /// Adapters expose values like outputs do
    pub fn role(&self) -> ItemRole {
        match self.node {
            Node::Producer(_) | Node::Adapter(_) => ItemRole::Output,
            Node::Consumer(_) => ItemRole::Input,
        }
    }

    pub fn is_adapter(&self) -> bool {
        matches!(self.node, Node::Adapter(_))
    }

    pub fn is_producer(&self) -> bool {
        matches!(self.node, Node::Producer(_))
    }

    /// Provider of a consumer
    pub fn provider(&self) -> Option<ItemHandle> {
        match &self.node {
            Node::Consumer(consumer) => consumer.provider,
            _ => None,
        }
    }

    /// Adaptee of an adapter
    pub fn adaptee(&self) -> Option<ItemHandle> {
        match &self.node {
            Node::Adapter(adapter) => adapter.adaptee,
            _ => None,
        }
    }

    /// Consumers and adapters fed by this item
    pub fn dependents(&self) -> impl Iterator<Item = ItemHandle> + '_ {
        let set = match &self.node {
            Node::Producer(producer) => Some(&producer.dependents),
            Node::Adapter(adapter) => Some(&adapter.dependents),
            Node::Consumer(_) => None,
        };
        set.into_iter().flatten().copied()
    }

    /// Cache of a producer
    pub fn cache(&self) -> Option<&TimeRecordCache> {
        match &self.node {
            Node::Producer(producer) => Some(&producer.cache),
            _ => None,
        }
    }

    /// Pull-loop state of a producer
    pub fn sync_state(&self) -> Option<SyncState> {
        match &self.node {
            Node::Producer(producer) => Some(producer.state),
            _ => None,
        }
    }

    /// Kind of an adapter stage
    pub fn adapter_kind(&self) -> Option<&'static str> {
        match &self.node {
            Node::Adapter(adapter) => Some(adapter.stage.kind()),
            _ => None,
        }
    }

    pub(crate) fn dependents_mut(&mut self) -> Option<&mut BTreeSet<ItemHandle>> {
        match &mut self.node {
            Node::Producer(producer) => Some(&mut producer.dependents),
            Node::Adapter(adapter) => Some(&mut adapter.dependents),
            Node::Consumer(_) => None,
        }
    }

    /// Forget everything kept on behalf of `dependent`
    pub(crate) fn release(&mut self, dependent: ItemHandle) {
        match &mut self.node {
            Node::Producer(producer) => {
                producer.dependents.remove(&dependent);
                producer.earliest_requested.remove(&dependent);
            }
            Node::Adapter(adapter) => {
                adapter.dependents.remove(&dependent);
                adapter.caches.remove(&dependent);
            }
            Node::Consumer(_) => {}
        }
    }
}

impl fmt::Debug for ExchangeItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let node = match &self.node {
            Node::Producer(_) => "producer",
            Node::Adapter(_) => "adapter",
            Node::Consumer(_) => "consumer",
        };
        f.debug_struct("ExchangeItem")
            .field("id", &self.id)
            .field("node", &node)
            .field("owner", &self.owner)
            .field("element_count", &self.shape.element_count)
            .finish()
    }
}
