//! Array and Struct interiors.

use super::next_item_id;
use crate::stack_item::StackItem;
use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;

/// The shared interior of an ordered, mutable item sequence. Clones share
/// the interior; identity is the allocation, not the contents.
#[derive(Debug, Clone)]
pub struct ArrayItem {
    id: usize,
    items: Rc<RefCell<Vec<StackItem>>>,
}

impl ArrayItem {
    /// Creates a fresh sequence with a new identity.
    pub fn new(items: Vec<StackItem>) -> ArrayItem {
        ArrayItem {
            id: next_item_id(),
            items: Rc::new(RefCell::new(items)),
        }
    }

    /// The identity of this allocation.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Element count.
    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    /// Whether the sequence is empty.
    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }

    /// Immutable view of the elements.
    pub fn borrow(&self) -> Ref<'_, Vec<StackItem>> {
        self.items.borrow()
    }

    /// Mutable view of the elements.
    pub fn borrow_mut(&self) -> RefMut<'_, Vec<StackItem>> {
        self.items.borrow_mut()
    }

    /// Whether two handles share one allocation.
    pub fn same_identity(&self, other: &ArrayItem) -> bool {
        Rc::ptr_eq(&self.items, &other.items)
    }
}

/// A Struct shares the Array interior but differs in equality (structural)
/// and clone (deep copy) semantics, handled at the `StackItem` level.
#[derive(Debug, Clone)]
pub struct StructItem {
    id: usize,
    items: Rc<RefCell<Vec<StackItem>>>,
}

impl StructItem {
    /// Creates a fresh struct with a new identity.
    pub fn new(items: Vec<StackItem>) -> StructItem {
        StructItem {
            id: next_item_id(),
            items: Rc::new(RefCell::new(items)),
        }
    }

    /// The identity of this allocation.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Element count.
    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    /// Whether the struct has no fields.
    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }

    /// Immutable view of the fields.
    pub fn borrow(&self) -> Ref<'_, Vec<StackItem>> {
        self.items.borrow()
    }

    /// Mutable view of the fields.
    pub fn borrow_mut(&self) -> RefMut<'_, Vec<StackItem>> {
        self.items.borrow_mut()
    }

    /// Whether two handles share one allocation.
    pub fn same_identity(&self, other: &StructItem) -> bool {
        Rc::ptr_eq(&self.items, &other.items)
    }
}
