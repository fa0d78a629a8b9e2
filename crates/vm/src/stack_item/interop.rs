//! Opaque host handles.

use super::next_item_id;
use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

/// An opaque handle to a host object (storage iterator, script container).
/// Never serializable; equality is identity.
#[derive(Clone)]
pub struct InteropItem {
    id: usize,
    name: &'static str,
    value: Rc<RefCell<dyn Any>>,
}

impl InteropItem {
    /// Wraps a host value.
    pub fn new<T: Any>(name: &'static str, value: T) -> InteropItem {
        InteropItem {
            id: next_item_id(),
            name,
            value: Rc::new(RefCell::new(value)),
        }
    }

    /// The identity of this handle.
    pub fn id(&self) -> usize {
        self.id
    }

    /// The host-assigned interface name.
    pub fn interface_name(&self) -> &'static str {
        self.name
    }

    /// Runs `f` with a mutable view of the wrapped value when it is a `T`.
    pub fn with_value_mut<T: Any, R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let mut borrowed = self.value.borrow_mut();
        borrowed.downcast_mut::<T>().map(f)
    }

    /// Runs `f` with a shared view of the wrapped value when it is a `T`.
    pub fn with_value<T: Any, R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        let borrowed = self.value.borrow();
        borrowed.downcast_ref::<T>().map(f)
    }

    /// Whether two handles share one allocation.
    pub fn same_identity(&self, other: &InteropItem) -> bool {
        Rc::ptr_eq(&self.value, &other.value)
    }
}

impl std::fmt::Debug for InteropItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "InteropItem({}, id={})", self.name, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downcasting() {
        let item = InteropItem::new("counter", 41u32);
        item.with_value_mut::<u32, _>(|v| *v += 1).unwrap();
        assert_eq!(item.with_value::<u32, _>(|v| *v), Some(42));
        assert_eq!(item.with_value::<String, _>(|_| ()), None);
    }

    #[test]
    fn identity() {
        let a = InteropItem::new("x", 1u8);
        let b = a.clone();
        let c = InteropItem::new("x", 1u8);
        assert!(a.same_identity(&b));
        assert!(!a.same_identity(&c));
    }
}
