//! System.Iterator.* syscall handlers.

use super::storage_syscalls::{project_found_entry, ITERATOR_INTERFACE};
use super::EngineHost;
use crate::storage::StorageIterator;
use neo_vm::{ExecutionEngine, StackItem, VmError, VmResult};

fn with_iterator<R>(
    engine: &mut ExecutionEngine,
    f: impl FnOnce(&mut StorageIterator) -> R,
) -> VmResult<R> {
    let item = engine.pop()?;
    let StackItem::InteropInterface(handle) = &item else {
        return Err(item.type_mismatch("InteropInterface"));
    };
    if handle.interface_name() != ITERATOR_INTERFACE {
        return Err(VmError::invalid_argument(format!(
            "expected an iterator, got {}",
            handle.interface_name()
        )));
    }
    handle
        .with_value_mut::<StorageIterator, _>(f)
        .ok_or_else(|| VmError::invalid_argument("not a storage iterator"))
}

pub fn next(_host: &mut EngineHost, engine: &mut ExecutionEngine) -> VmResult<()> {
    let advanced = with_iterator(engine, |iterator| iterator.next())?;
    engine.push(StackItem::from_bool(advanced))
}

pub fn value(_host: &mut EngineHost, engine: &mut ExecutionEngine) -> VmResult<()> {
    let current = with_iterator(engine, |iterator| {
        iterator.current().map(|entry| (entry, iterator.options()))
    })?;
    let ((key, value), options) = current
        .ok_or_else(|| VmError::invalid_operation("iterator has no current element"))?;
    let item = project_found_entry(key, value, options)?;
    engine.push(item)
}
