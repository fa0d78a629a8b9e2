//! Reference counting with cycle reclamation.
//!
//! Every reference an item holds — a stack position, a slot entry, or a
//! containment edge inside a compound — counts toward one engine-wide
//! total bounded by `MaxStackSize`. Compound and buffer items are tracked
//! with their containment graph; items whose stack references drop to zero
//! become reclamation candidates, and unreachable strongly connected
//! components (cycles included) are reclaimed by a Tarjan pass.

use crate::stack_item::StackItem;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use tracing::trace;

#[derive(Debug)]
struct Tracked {
    /// Keeps the interior alive for graph traversal during collection.
    item: StackItem,
    /// References from evaluation stacks, result stack, and slots.
    stack_refs: usize,
    /// Containment edges by parent id, with multiplicity.
    parent_refs: HashMap<usize, usize>,
}

#[derive(Debug, Default)]
struct Inner {
    total: usize,
    tracked: HashMap<usize, Tracked>,
    zero_referred: HashSet<usize>,
}

/// Shared reference counter for one engine instance.
#[derive(Debug, Clone, Default)]
pub struct ReferenceCounter {
    inner: Rc<RefCell<Inner>>,
}

impl ReferenceCounter {
    /// Creates an empty counter.
    pub fn new() -> ReferenceCounter {
        ReferenceCounter::default()
    }

    /// Total live references (stack + containment).
    pub fn count(&self) -> usize {
        self.inner.borrow().total
    }

    /// Number of tracked compound/buffer items.
    pub fn tracked_items(&self) -> usize {
        self.inner.borrow().tracked.len()
    }

    /// Records that `item` gained a stack or slot reference.
    pub fn add_stack_reference(&self, item: &StackItem) {
        let mut inner = self.inner.borrow_mut();
        inner.total += 1;
        if let Some(id) = item.compound_id() {
            register(&mut inner, item);
            if let Some(tracked) = inner.tracked.get_mut(&id) {
                tracked.stack_refs += 1;
            }
            inner.zero_referred.remove(&id);
        }
    }

    /// Records that `item` lost a stack or slot reference.
    pub fn remove_stack_reference(&self, item: &StackItem) {
        let mut inner = self.inner.borrow_mut();
        inner.total = inner.total.saturating_sub(1);
        if let Some(id) = item.compound_id() {
            if let Some(tracked) = inner.tracked.get_mut(&id) {
                tracked.stack_refs = tracked.stack_refs.saturating_sub(1);
                if tracked.stack_refs == 0 {
                    inner.zero_referred.insert(id);
                }
            }
        }
    }

    /// Records that `child` was stored into the compound `parent_id`.
    pub fn add_reference(&self, child: &StackItem, parent_id: usize) {
        let mut inner = self.inner.borrow_mut();
        inner.total += 1;
        if let Some(child_id) = child.compound_id() {
            register(&mut inner, child);
            if let Some(tracked) = inner.tracked.get_mut(&child_id) {
                *tracked.parent_refs.entry(parent_id).or_insert(0) += 1;
            }
        }
    }

    /// Records that `child` was removed from the compound `parent_id`.
    pub fn remove_reference(&self, child: &StackItem, parent_id: usize) {
        let mut inner = self.inner.borrow_mut();
        inner.total = inner.total.saturating_sub(1);
        if let Some(child_id) = child.compound_id() {
            let mut orphaned = false;
            if let Some(tracked) = inner.tracked.get_mut(&child_id) {
                if let Some(count) = tracked.parent_refs.get_mut(&parent_id) {
                    *count -= 1;
                    if *count == 0 {
                        tracked.parent_refs.remove(&parent_id);
                    }
                }
                orphaned = tracked.stack_refs == 0;
            }
            if orphaned {
                inner.zero_referred.insert(child_id);
            }
        }
    }

    /// Reclaims unreachable items (including cycles) and returns the
    /// resulting total reference count.
    pub fn check_zero_referred(&self) -> usize {
        let mut inner = self.inner.borrow_mut();
        if !inner.zero_referred.is_empty() {
            collect_garbage(&mut inner);
        }
        inner.total
    }

    /// Whether the given compound id is still tracked (test hook).
    pub fn is_tracked(&self, id: usize) -> bool {
        self.inner.borrow().tracked.contains_key(&id)
    }
}

/// Registers a compound and its subtree, counting containment edges.
/// Idempotent per item: an already-tracked compound only contributes the
/// edges its parent adds explicitly.
fn register(inner: &mut Inner, item: &StackItem) {
    let Some(id) = item.compound_id() else {
        return;
    };
    if inner.tracked.contains_key(&id) {
        return;
    }
    inner.tracked.insert(
        id,
        Tracked {
            item: item.clone(),
            stack_refs: 0,
            parent_refs: HashMap::new(),
        },
    );
    for child in item.children() {
        inner.total += 1;
        if let Some(child_id) = child.compound_id() {
            register(inner, &child);
            if let Some(tracked) = inner.tracked.get_mut(&child_id) {
                *tracked.parent_refs.entry(id).or_insert(0) += 1;
            }
        }
    }
}

/// Tarjan SCC over the candidate closure; dead components are unlinked.
fn collect_garbage(inner: &mut Inner) {
    // The subgraph under consideration: every tracked item reachable from
    // a zero-referred candidate through containment edges.
    let mut subgraph: HashSet<usize> = HashSet::new();
    let mut worklist: Vec<usize> = inner
        .zero_referred
        .iter()
        .copied()
        .filter(|id| inner.tracked.contains_key(id))
        .collect();
    while let Some(id) = worklist.pop() {
        if !subgraph.insert(id) {
            continue;
        }
        if let Some(tracked) = inner.tracked.get(&id) {
            for child in tracked.item.children() {
                if let Some(child_id) = child.compound_id() {
                    if inner.tracked.contains_key(&child_id) && !subgraph.contains(&child_id) {
                        worklist.push(child_id);
                    }
                }
            }
        }
    }

    let sccs = tarjan(inner, &subgraph);

    // Tarjan emits components children-first; walk parents-first so
    // liveness flows down the condensation.
    let mut component_of: HashMap<usize, usize> = HashMap::new();
    for (index, scc) in sccs.iter().enumerate() {
        for id in scc {
            component_of.insert(*id, index);
        }
    }
    let mut alive: Vec<bool> = vec![false; sccs.len()];
    for (index, scc) in sccs.iter().enumerate().rev() {
        let mut component_alive = false;
        for id in scc {
            let tracked = &inner.tracked[id];
            if tracked.stack_refs > 0 {
                component_alive = true;
                break;
            }
            for parent_id in tracked.parent_refs.keys() {
                match component_of.get(parent_id) {
                    // A parent outside the candidate subgraph is reachable.
                    None => {
                        component_alive = true;
                        break;
                    }
                    Some(parent_component) => {
                        if *parent_component != index && alive[*parent_component] {
                            component_alive = true;
                            break;
                        }
                    }
                }
            }
            if component_alive {
                break;
            }
        }
        alive[index] = component_alive;
    }

    let dead: HashSet<usize> = sccs
        .iter()
        .enumerate()
        .filter(|(index, _)| !alive[*index])
        .flat_map(|(_, scc)| scc.iter().copied())
        .collect();

    if !dead.is_empty() {
        trace!(reclaimed = dead.len(), "reference counter reclaimed items");
    }

    for id in &dead {
        let Some(tracked) = inner.tracked.remove(id) else {
            continue;
        };
        for child in tracked.item.children() {
            inner.total = inner.total.saturating_sub(1);
            if let Some(child_id) = child.compound_id() {
                if dead.contains(&child_id) {
                    continue;
                }
                let mut orphaned = false;
                if let Some(child_tracked) = inner.tracked.get_mut(&child_id) {
                    if let Some(count) = child_tracked.parent_refs.get_mut(id) {
                        *count -= 1;
                        if *count == 0 {
                            child_tracked.parent_refs.remove(id);
                        }
                    }
                    orphaned =
                        child_tracked.stack_refs == 0 && child_tracked.parent_refs.is_empty();
                }
                if orphaned {
                    inner.tracked.remove(&child_id);
                }
            }
        }
    }

    inner.zero_referred.clear();
}

/// Iterative Tarjan over the containment edges restricted to `subgraph`.
/// Components are emitted children-first (reverse topological order).
fn tarjan(inner: &Inner, subgraph: &HashSet<usize>) -> Vec<Vec<usize>> {
    #[derive(Default)]
    struct NodeState {
        index: usize,
        lowlink: usize,
        on_stack: bool,
        visited: bool,
    }

    let children_in_subgraph = |id: usize| -> Vec<usize> {
        inner
            .tracked
            .get(&id)
            .map(|tracked| {
                tracked
                    .item
                    .children()
                    .iter()
                    .filter_map(StackItem::compound_id)
                    .filter(|child| subgraph.contains(child))
                    .collect()
            })
            .unwrap_or_default()
    };

    enum Step {
        Visit(usize),
        Complete,
    }

    let mut states: HashMap<usize, NodeState> = HashMap::new();
    let mut stack: Vec<usize> = Vec::new();
    let mut next_index = 0usize;
    let mut sccs: Vec<Vec<usize>> = Vec::new();

    let mut visit = |states: &mut HashMap<usize, NodeState>,
                     stack: &mut Vec<usize>,
                     next_index: &mut usize,
                     node: usize| {
        states.insert(
            node,
            NodeState {
                index: *next_index,
                lowlink: *next_index,
                on_stack: true,
                visited: true,
            },
        );
        *next_index += 1;
        stack.push(node);
    };

    let mut roots: Vec<usize> = subgraph.iter().copied().collect();
    roots.sort_unstable();
    for root in roots {
        if states.get(&root).map(|s| s.visited).unwrap_or(false) {
            continue;
        }
        // Explicit DFS frames: (node, children, next child position).
        visit(&mut states, &mut stack, &mut next_index, root);
        let mut frames: Vec<(usize, Vec<usize>, usize)> =
            vec![(root, children_in_subgraph(root), 0)];
        while !frames.is_empty() {
            let step = {
                let (node, children, position) = frames.last_mut().expect("frames not empty");
                if let Some(&child) = children.get(*position) {
                    *position += 1;
                    match states.get(&child) {
                        Some(state) if state.visited => {
                            if state.on_stack {
                                let child_index = state.index;
                                let entry = states.get_mut(node).expect("node visited");
                                entry.lowlink = entry.lowlink.min(child_index);
                            }
                            continue;
                        }
                        _ => Step::Visit(child),
                    }
                } else {
                    Step::Complete
                }
            };
            match step {
                Step::Visit(child) => {
                    visit(&mut states, &mut stack, &mut next_index, child);
                    frames.push((child, children_in_subgraph(child), 0));
                }
                Step::Complete => {
                    let (node, _, _) = frames.pop().expect("frames not empty");
                    let (lowlink, index) = {
                        let state = &states[&node];
                        (state.lowlink, state.index)
                    };
                    if lowlink == index {
                        let mut component = Vec::new();
                        while let Some(member) = stack.pop() {
                            states.get_mut(&member).expect("on stack").on_stack = false;
                            component.push(member);
                            if member == node {
                                break;
                            }
                        }
                        sccs.push(component);
                    }
                    if let Some((parent, _, _)) = frames.last() {
                        let parent = *parent;
                        let parent_state = states.get_mut(&parent).expect("parent visited");
                        parent_state.lowlink = parent_state.lowlink.min(lowlink);
                    }
                }
            }
        }
    }
    sccs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack_item::ArrayItem;

    #[test]
    fn stack_references_count() {
        let rc = ReferenceCounter::new();
        let item = StackItem::from_int(1);
        rc.add_stack_reference(&item);
        rc.add_stack_reference(&item);
        assert_eq!(rc.count(), 2);
        rc.remove_stack_reference(&item);
        assert_eq!(rc.count(), 1);
    }

    #[test]
    fn compound_children_count_as_edges() {
        let rc = ReferenceCounter::new();
        let array = StackItem::from_array(vec![StackItem::from_int(1), StackItem::Null]);
        rc.add_stack_reference(&array);
        // 1 stack reference + 2 containment edges.
        assert_eq!(rc.count(), 3);
        rc.remove_stack_reference(&array);
        assert_eq!(rc.check_zero_referred(), 0);
    }

    #[test]
    fn reclaims_simple_garbage() {
        let rc = ReferenceCounter::new();
        let array = StackItem::from_array(vec![StackItem::from_int(7)]);
        let id = array.compound_id().unwrap();
        rc.add_stack_reference(&array);
        assert!(rc.is_tracked(id));
        rc.remove_stack_reference(&array);
        rc.check_zero_referred();
        assert!(!rc.is_tracked(id));
        assert_eq!(rc.count(), 0);
    }

    #[test]
    fn reclaims_cycles() {
        let rc = ReferenceCounter::new();
        let inner = ArrayItem::new(Vec::new());
        let outer = StackItem::Array(ArrayItem::new(vec![StackItem::Array(inner.clone())]));
        // Close the cycle before the counter sees either item; the
        // registration walk picks up both edges.
        inner.borrow_mut().push(outer.clone());
        rc.add_stack_reference(&outer);
        assert_eq!(rc.count(), 3);
        let outer_id = outer.compound_id().unwrap();
        rc.remove_stack_reference(&outer);
        rc.check_zero_referred();
        assert!(!rc.is_tracked(outer_id));
        assert!(!rc.is_tracked(inner.id()));
        assert_eq!(rc.count(), 0);
    }

    #[test]
    fn keeps_items_reachable_from_live_parents() {
        let rc = ReferenceCounter::new();
        let child = StackItem::from_array(vec![]);
        let parent = StackItem::from_array(vec![child.clone()]);
        rc.add_stack_reference(&parent);
        // The child was never stack-referenced directly, then loses a
        // transient stack reference.
        rc.add_stack_reference(&child);
        rc.remove_stack_reference(&child);
        rc.check_zero_referred();
        assert!(rc.is_tracked(child.compound_id().unwrap()));
    }
}
