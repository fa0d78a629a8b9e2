//! Local, argument and static slots.

use crate::error::{VmError, VmResult};
use crate::reference_counter::ReferenceCounter;
use crate::stack_item::StackItem;
use std::cell::RefCell;
use std::rc::Rc;

/// A fixed-size vector of stack items. CALL-created contexts share their
/// caller's slots, so the storage is behind a shared handle.
#[derive(Debug, Clone)]
pub struct Slot {
    items: Rc<RefCell<Vec<StackItem>>>,
    reference_counter: ReferenceCounter,
}

impl Slot {
    /// A slot of `count` Null entries.
    pub fn new(count: usize, reference_counter: ReferenceCounter) -> Slot {
        let items = vec![StackItem::Null; count];
        for item in &items {
            reference_counter.add_stack_reference(item);
        }
        Slot {
            items: Rc::new(RefCell::new(items)),
            reference_counter,
        }
    }

    /// A slot initialized from `items` (used for arguments).
    pub fn from_items(items: Vec<StackItem>, reference_counter: ReferenceCounter) -> Slot {
        for item in &items {
            reference_counter.add_stack_reference(item);
        }
        Slot {
            items: Rc::new(RefCell::new(items)),
            reference_counter,
        }
    }

    /// Entry count.
    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    /// Whether the slot has no entries.
    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }

    /// Reads the entry at `index`.
    pub fn get(&self, index: usize) -> VmResult<StackItem> {
        let items = self.items.borrow();
        items.get(index).cloned().ok_or_else(|| {
            VmError::out_of_range(format!("slot index {index} out of range {}", items.len()))
        })
    }

    /// Replaces the entry at `index`.
    pub fn set(&self, index: usize, item: StackItem) -> VmResult<()> {
        let mut items = self.items.borrow_mut();
        if index >= items.len() {
            return Err(VmError::out_of_range(format!(
                "slot index {index} out of range {}",
                items.len()
            )));
        }
        self.reference_counter.add_stack_reference(&item);
        let old = std::mem::replace(&mut items[index], item);
        self.reference_counter.remove_stack_reference(&old);
        Ok(())
    }

    /// Releases every entry's reference. Called once when the owning
    /// context unloads (shared slots release on the last unload only).
    pub fn clear_references(&self) {
        for item in self.items.borrow_mut().drain(..) {
            self.reference_counter.remove_stack_reference(&item);
        }
    }

    /// Whether two handles share storage.
    pub fn same_identity(&self, other: &Slot) -> bool {
        Rc::ptr_eq(&self.items, &other.items)
    }

    /// Whether another live handle shares this storage. Contexts release
    /// slot references only once the last sharer unloads.
    pub fn is_shared(&self) -> bool {
        Rc::strong_count(&self.items) > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_set_bounds() {
        let slot = Slot::new(2, ReferenceCounter::new());
        assert!(slot.get(0).unwrap().is_null());
        slot.set(1, StackItem::from_int(5)).unwrap();
        assert_eq!(slot.get(1).unwrap().as_int().unwrap(), 5.into());
        assert!(slot.get(2).is_err());
        assert!(slot.set(2, StackItem::Null).is_err());
    }

    #[test]
    fn references_follow_contents() {
        let rc = ReferenceCounter::new();
        let slot = Slot::new(2, rc.clone());
        assert_eq!(rc.count(), 2);
        slot.set(0, StackItem::from_int(1)).unwrap();
        assert_eq!(rc.count(), 2);
        slot.clear_references();
        assert_eq!(rc.count(), 0);
    }
}
