//! Owning components and the context they advance in.

use contracts::{ComponentStatus, ItemId, LinkError, Pulled, TimeRecord, TimeSet};

use crate::cache::InsertOutcome;
use crate::composition::Composition;
use crate::item::{ComponentHandle, ItemHandle};

/// A model that owns exchange items and advances in time on demand
pub trait LinkableComponent: Send {
    fn id(&self) -> &str;

    fn status(&self) -> ComponentStatus;

    /// Advance until at least one new record was published for
    /// `ctx.requesting()`, or as far as the component can go.
    fn update(&mut self, ctx: &mut UpdateContext<'_>) -> Result<(), LinkError>;
}

/// Access a component has to the composition while it is being updated.
///
/// The component itself is out of its slot for the duration, so any pull
/// that reaches one of its own outputs sees it as `Updating`.
pub struct UpdateContext<'a> {
    composition: &'a mut Composition,
    component: ComponentHandle,
    requesting: Option<ItemHandle>,
}

impl<'a> UpdateContext<'a> {
    pub(crate) fn new(
        composition: &'a mut Composition,
        component: ComponentHandle,
        requesting: Option<ItemHandle>,
    ) -> Self {
        Self {
            composition,
            component,
            requesting,
        }
    }

    pub fn component(&self) -> ComponentHandle {
        self.component
    }

    /// Output whose pull triggered this update
    pub fn requesting(&self) -> Option<&ItemId> {
        self.requesting
            .and_then(|handle| self.composition.item(handle).ok())
            .map(|item| item.id())
    }

    /// Publish a record into an output owned by this component
    pub fn publish(&mut self, item: &str, record: TimeRecord) -> Result<InsertOutcome, LinkError> {
        let handle = self.owned(item)?;
        self.composition.publish(handle, record)
    }

    /// Pull values for an input owned by this component
    pub fn pull(&mut self, item: &str, times: &TimeSet) -> Result<Pulled, LinkError> {
        let handle = self.owned(item)?;
        self.composition.get_values(handle, times)
    }

    /// Latest stamp published on an owned output
    pub fn last_published(&self, item: &str) -> Result<Option<f64>, LinkError> {
        let handle = self.owned(item)?;
        Ok(self
            .composition
            .item(handle)?
            .cache()
            .and_then(|cache| cache.last_stamp()))
    }

    fn owned(&self, item: &str) -> Result<ItemHandle, LinkError> {
        let handle = self
            .composition
            .find_item(item)
            .ok_or_else(|| LinkError::unknown_item(item))?;
        if self.composition.item(handle)?.owner() != Some(self.component) {
            return Err(LinkError::Other(format!(
                "item '{item}' is not owned by {}",
                self.component
            )));
        }
        Ok(handle)
    }
}
