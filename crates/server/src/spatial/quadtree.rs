//! QuadTree for spatial indexing.
//!
//! Nodes live in an arena and refer to each other by [`NodeId`]; every item
//! lives in exactly one node's list. A node splits into four quadrants once it
//! holds more than `max_items` items and sits above `max_level`. Items that
//! straddle a split line stay at the node where the line is drawn rather than
//! being copied into several quadrants.

use super::bounds::{Bounds, Quadrant};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct NodeId(usize);

#[derive(Debug, Clone)]
struct Node {
    range: Bounds,
    level: u32,
    parent: Option<NodeId>,
    children: Option<[NodeId; 4]>,
    /// Slot indices of the items owned by this node.
    items: Vec<usize>,
}

#[derive(Debug, Clone, Copy)]
struct Slot<K> {
    key: K,
    bounds: Bounds,
    owner: NodeId,
}

/// Proof that an item is currently inserted in a [`QuadTree`].
///
/// Returned by [`QuadTree::insert`] and consumed by [`QuadTree::remove`], so an
/// item cannot be relocated or removed twice. The handle stays valid while the
/// tree moves the item between nodes.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "dropping the handle leaves the item in the tree with no way to remove it"]
pub struct ItemHandle {
    slot: usize,
}

/// Adaptive quadtree over movable bounding boxes.
pub struct QuadTree<K> {
    nodes: Vec<Node>,
    free_nodes: Vec<NodeId>,
    slots: Vec<Slot<K>>,
    free_slots: Vec<usize>,
    root: NodeId,
    max_level: u32,
    max_items: usize,
}

impl<K: Copy> QuadTree<K> {
    /// Create an empty tree covering `range`. The root sits at level 1.
    pub fn new(range: Bounds, max_level: u32, max_items: usize) -> Self {
        let root = Node {
            range,
            level: 1,
            parent: None,
            children: None,
            items: Vec::new(),
        };
        Self {
            nodes: vec![root],
            free_nodes: Vec::new(),
            slots: Vec::with_capacity(1024),
            free_slots: Vec::new(),
            root: NodeId(0),
            max_level,
            max_items,
        }
    }

    /// Range covered by the root node.
    #[inline]
    pub fn range(&self) -> Bounds {
        self.node(self.root).range
    }

    /// Number of inserted items.
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len() - self.free_slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of live nodes, root included.
    pub fn branch_count(&self) -> usize {
        self.branch_count_from(self.root)
    }

    fn branch_count_from(&self, id: NodeId) -> usize {
        match self.node(id).children {
            Some(children) => 1 + children.iter().map(|&c| self.branch_count_from(c)).sum::<usize>(),
            None => 1,
        }
    }

    /// Key of an inserted item.
    #[inline]
    pub fn key(&self, handle: &ItemHandle) -> K {
        self.slots[handle.slot].key
    }

    /// Current box of an inserted item.
    #[inline]
    pub fn bounds(&self, handle: &ItemHandle) -> Bounds {
        self.slots[handle.slot].bounds
    }

    /// Insert an item, descending from the root into the quadrant that fully
    /// contains it for as long as one exists.
    pub fn insert(&mut self, key: K, bounds: Bounds) -> ItemHandle {
        let slot = Slot {
            key,
            bounds,
            owner: self.root,
        };
        let index = match self.free_slots.pop() {
            Some(index) => {
                self.slots[index] = slot;
                index
            }
            None => {
                self.slots.push(slot);
                self.slots.len() - 1
            }
        };
        self.place(self.root, index);
        ItemHandle { slot: index }
    }

    /// Move an item to its new box.
    ///
    /// Climbs from the owning node until a node's range contains the new box
    /// (or the root is reached), then descends as [`insert`](Self::insert)
    /// does. Nothing changes when the item lands in the node it already had.
    pub fn relocate(&mut self, handle: &ItemHandle, bounds: Bounds) {
        let index = handle.slot;
        self.slots[index].bounds = bounds;
        let old = self.slots[index].owner;

        let mut node = old;
        while !self.node(node).range.contains(&bounds) {
            match self.node(node).parent {
                Some(parent) => node = parent,
                None => break,
            }
        }
        let new = self.descend(node, &bounds);
        if new == old {
            return;
        }

        self.detach(old, index);
        self.node_mut(new).items.push(index);
        self.slots[index].owner = new;
        self.merge(old);
        self.split(new);
    }

    /// Remove an item, returning its key.
    pub fn remove(&mut self, handle: ItemHandle) -> K {
        let index = handle.slot;
        let Slot { key, owner, .. } = self.slots[index];
        self.detach(owner, index);
        self.free_slots.push(index);
        self.merge(owner);
        key
    }

    /// Visit every item whose box intersects `range`.
    pub fn search<F>(&self, range: &Bounds, mut visit: F)
    where
        F: FnMut(K, &Bounds),
    {
        self.search_node(self.root, range, &mut visit);
    }

    fn search_node<F>(&self, id: NodeId, range: &Bounds, visit: &mut F)
    where
        F: FnMut(K, &Bounds),
    {
        let node = self.node(id);
        for &index in &node.items {
            let slot = &self.slots[index];
            if range.intersects(&slot.bounds) {
                visit(slot.key, &slot.bounds);
            }
        }
        let Some(children) = node.children else {
            return;
        };
        let mask = range.quadrants_touched(&node.range);
        for quadrant in Quadrant::ALL {
            if mask.touches(quadrant) {
                self.search_node(children[quadrant.index()], range, visit);
            }
        }
    }

    /// Check whether any item intersecting `range` satisfies `selector`.
    /// Stops at the first match.
    pub fn contains_any<F>(&self, range: &Bounds, mut selector: F) -> bool
    where
        F: FnMut(K) -> bool,
    {
        self.contains_any_node(self.root, range, &mut selector)
    }

    /// Check whether any item intersects `range`.
    #[inline]
    pub fn any_in(&self, range: &Bounds) -> bool {
        self.contains_any(range, |_| true)
    }

    fn contains_any_node<F>(&self, id: NodeId, range: &Bounds, selector: &mut F) -> bool
    where
        F: FnMut(K) -> bool,
    {
        let node = self.node(id);
        for &index in &node.items {
            let slot = &self.slots[index];
            if range.intersects(&slot.bounds) && selector(slot.key) {
                return true;
            }
        }
        let Some(children) = node.children else {
            return false;
        };
        let mask = range.quadrants_touched(&node.range);
        Quadrant::ALL.into_iter().any(|quadrant| {
            mask.touches(quadrant) && self.contains_any_node(children[quadrant.index()], range, selector)
        })
    }

    /// Every item in the tree. Walks all nodes; meant for diagnostics.
    pub fn collect_all(&self) -> Vec<K> {
        let mut out = Vec::with_capacity(self.len());
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            let node = self.node(id);
            out.extend(node.items.iter().map(|&index| self.slots[index].key));
            if let Some(children) = node.children {
                stack.extend(children);
            }
        }
        out
    }

    #[inline]
    fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    #[inline]
    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    /// Deepest node under `from` whose quadrant fully contains `bounds`.
    fn descend(&self, from: NodeId, bounds: &Bounds) -> NodeId {
        let mut id = from;
        while let Some(children) = self.node(id).children {
            match bounds.quadrant_in(&self.node(id).range) {
                Some(quadrant) => id = children[quadrant.index()],
                None => break,
            }
        }
        id
    }

    fn place(&mut self, from: NodeId, index: usize) {
        let bounds = self.slots[index].bounds;
        let id = self.descend(from, &bounds);
        self.slots[index].owner = id;
        self.node_mut(id).items.push(index);
        self.split(id);
    }

    fn detach(&mut self, id: NodeId, index: usize) {
        let items = &mut self.node_mut(id).items;
        if let Some(position) = items.iter().position(|&i| i == index) {
            items.swap_remove(position);
        }
    }

    fn alloc_node(&mut self, node: Node) -> NodeId {
        match self.free_nodes.pop() {
            Some(id) => {
                self.nodes[id.0] = node;
                id
            }
            None => {
                self.nodes.push(node);
                NodeId(self.nodes.len() - 1)
            }
        }
    }

    fn split(&mut self, id: NodeId) {
        let node = self.node(id);
        if node.children.is_some() || node.level >= self.max_level || node.items.len() <= self.max_items {
            return;
        }
        let range = node.range;
        let level = node.level + 1;

        let children = Quadrant::ALL.map(|quadrant| {
            self.alloc_node(Node {
                range: range.quadrant(quadrant),
                level,
                parent: Some(id),
                children: None,
                items: Vec::new(),
            })
        });
        self.node_mut(id).children = Some(children);

        let items = std::mem::take(&mut self.node_mut(id).items);
        let mut straddling = Vec::with_capacity(items.len());
        for index in items {
            match self.slots[index].bounds.quadrant_in(&range) {
                Some(quadrant) => self.place(children[quadrant.index()], index),
                None => straddling.push(index),
            }
        }
        self.node_mut(id).items = straddling;
    }

    /// Collapse empty subtrees, walking upward from `start` until a split
    /// ancestor still has content below it.
    fn merge(&mut self, start: NodeId) {
        let mut current = Some(start);
        while let Some(id) = current {
            if let Some(children) = self.node(id).children {
                let occupied = children.iter().any(|&c| {
                    let child = self.node(c);
                    child.children.is_some() || !child.items.is_empty()
                });
                if occupied {
                    return;
                }
                self.node_mut(id).children = None;
                self.free_nodes.extend(children);
            }
            current = self.node(id).parent;
        }
    }

    fn fmt_node(&self, f: &mut fmt::Formatter<'_>, id: NodeId) -> fmt::Result {
        let node = self.node(id);
        let total = self.subtree_len(id);
        writeln!(
            f,
            "{:indent$}items {}/{} level {} x {} y {} w {} h {}",
            "",
            node.items.len(),
            total,
            node.level,
            node.range.x,
            node.range.y,
            node.range.w,
            node.range.h,
            indent = (node.level as usize - 1) * 2,
        )?;
        if let Some(children) = node.children {
            for child in children {
                self.fmt_node(f, child)?;
            }
        }
        Ok(())
    }

    fn subtree_len(&self, id: NodeId) -> usize {
        let node = self.node(id);
        node.items.len()
            + node
                .children
                .map(|children| children.iter().map(|&c| self.subtree_len(c)).sum())
                .unwrap_or(0)
    }
}

impl<K: Copy> fmt::Debug for QuadTree<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_node(f, self.root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::collections::{BTreeSet, HashMap};

    fn world_tree(max_level: u32, max_items: usize) -> QuadTree<u32> {
        QuadTree::new(Bounds::new(0.0, 0.0, 100.0, 100.0), max_level, max_items)
    }

    fn owner_of(tree: &QuadTree<u32>, handle: &ItemHandle) -> NodeId {
        tree.slots[handle.slot].owner
    }

    fn search_set(tree: &QuadTree<u32>, range: &Bounds) -> BTreeSet<u32> {
        let mut found = BTreeSet::new();
        tree.search(range, |key, _| {
            assert!(found.insert(key), "item {key} visited twice");
        });
        found
    }

    /// Walk the whole tree and check its structure: every live slot is owned
    /// by exactly one node that lists it, split nodes keep only items that
    /// straddle their split lines, and empty quadrants are only left behind by
    /// a split whose items all straddled.
    fn assert_structure(tree: &QuadTree<u32>) {
        let free: BTreeSet<usize> = tree.free_slots.iter().copied().collect();
        let mut seen = BTreeSet::new();
        let mut stack = vec![tree.root];
        while let Some(id) = stack.pop() {
            let node = tree.node(id);
            assert!(node.level <= tree.max_level, "node {id:?} below max level");
            for &index in &node.items {
                assert!(!free.contains(&index), "freed slot {index} still listed in {id:?}");
                assert!(seen.insert(index), "slot {index} listed twice");
                assert_eq!(tree.slots[index].owner, id, "slot {index} has a stale owner");
            }
            let Some(children) = node.children else {
                continue;
            };
            for &index in &node.items {
                assert_eq!(
                    tree.slots[index].bounds.quadrant_in(&node.range),
                    None,
                    "slot {index} fits a quadrant of split node {id:?}"
                );
            }
            for (quadrant, &child) in Quadrant::ALL.iter().zip(children.iter()) {
                let child_node = tree.node(child);
                assert_eq!(child_node.parent, Some(id));
                assert_eq!(child_node.level, node.level + 1);
                assert_eq!(child_node.range, node.range.quadrant(*quadrant));
            }
            let all_empty = children.iter().all(|&c| {
                let child = tree.node(c);
                child.children.is_none() && child.items.is_empty()
            });
            if all_empty {
                assert!(
                    !node.items.is_empty(),
                    "split node {id:?} kept four empty quadrants and no items"
                );
            }
            stack.extend(children);
        }
        assert_eq!(seen.len(), tree.len());
        assert_eq!(seen.len() + free.len(), tree.slots.len());
    }

    #[test]
    fn test_quadtree_insert_find() {
        let mut tree = world_tree(8, 4);

        let _a = tree.insert(1, Bounds::from_center(0.0, 0.0, 10.0));
        let _b = tree.insert(2, Bounds::from_center(50.0, 50.0, 10.0));
        let _c = tree.insert(3, Bounds::from_center(-50.0, -50.0, 10.0));

        assert_eq!(tree.len(), 3);

        let found = search_set(&tree, &Bounds::from_center(0.0, 0.0, 20.0));
        assert_eq!(found, BTreeSet::from([1]));

        let found = search_set(&tree, &Bounds::from_center(50.0, 50.0, 20.0));
        assert_eq!(found, BTreeSet::from([2]));
    }

    #[test]
    fn test_split_after_exceeding_max_items() {
        let mut tree = world_tree(8, 2);
        let _a = tree.insert(1, Bounds::from_center(-50.0, -50.0, 5.0));
        let _b = tree.insert(2, Bounds::from_center(50.0, -50.0, 5.0));
        assert_eq!(tree.branch_count(), 1);

        let _c = tree.insert(3, Bounds::from_center(50.0, 50.0, 5.0));
        assert_eq!(tree.branch_count(), 5);
        assert!(tree.node(tree.root).items.is_empty());
    }

    #[test]
    fn test_straddling_items_stay_at_split_node() {
        let mut tree = world_tree(8, 2);
        let center = tree.insert(1, Bounds::from_center(0.0, 0.0, 5.0));
        let _a = tree.insert(2, Bounds::from_center(-50.0, -50.0, 5.0));
        let _b = tree.insert(3, Bounds::from_center(50.0, 50.0, 5.0));

        assert_eq!(tree.branch_count(), 5);
        assert_eq!(owner_of(&tree, &center), tree.root);
        assert_eq!(tree.node(tree.root).items.len(), 1);
    }

    #[test]
    fn test_no_split_at_max_level() {
        let mut tree = world_tree(1, 1);
        let _handles: Vec<_> = (0..10)
            .map(|i| tree.insert(i, Bounds::from_center(-50.0, -50.0, 1.0)))
            .collect();
        assert_eq!(tree.branch_count(), 1);
        assert_eq!(tree.len(), 10);
    }

    #[test]
    fn test_remove_merges_empty_subtrees() {
        let mut tree = world_tree(8, 1);
        let a = tree.insert(1, Bounds::from_center(-75.0, -75.0, 1.0));
        let b = tree.insert(2, Bounds::from_center(-70.0, -70.0, 1.0));
        let c = tree.insert(3, Bounds::from_center(60.0, 60.0, 1.0));
        assert!(tree.branch_count() > 5);

        assert_eq!(tree.remove(a), 1);
        assert_eq!(tree.remove(b), 2);
        // Only the south-east item is left, so the north-west subtree collapses
        // and the root keeps its four children.
        assert_eq!(tree.branch_count(), 5);

        assert_eq!(tree.remove(c), 3);
        assert_eq!(tree.branch_count(), 1);
        assert!(tree.is_empty());
    }

    #[test]
    fn test_merge_walks_past_several_ancestors() {
        let mut tree = world_tree(16, 1);
        let deep = tree.insert(1, Bounds::from_center(-90.0, -90.0, 0.5));
        let near = tree.insert(2, Bounds::from_center(-89.0, -89.0, 0.5));
        let depth_before = tree.branch_count();
        assert!(depth_before > 9);

        assert_eq!(tree.remove(deep), 1);
        assert!(tree.branch_count() < depth_before);

        // The last item goes: every ancestor collapses in a single walk.
        assert_eq!(tree.remove(near), 2);
        assert_eq!(tree.branch_count(), 1);
    }

    #[test]
    fn test_relocate_within_same_node_is_noop() {
        let mut tree = world_tree(8, 1);
        let a = tree.insert(1, Bounds::from_center(-50.0, -50.0, 5.0));
        let _b = tree.insert(2, Bounds::from_center(50.0, 50.0, 5.0));
        let owner = owner_of(&tree, &a);
        let branches = tree.branch_count();
        let items_before = tree.node(owner).items.clone();

        tree.relocate(&a, Bounds::from_center(-45.0, -55.0, 5.0));

        assert_eq!(owner_of(&tree, &a), owner);
        assert_eq!(tree.node(owner).items, items_before);
        assert_eq!(tree.branch_count(), branches);
        assert_eq!(tree.bounds(&a), Bounds::from_center(-45.0, -55.0, 5.0));
    }

    #[test]
    fn test_relocate_across_quadrants() {
        let mut tree = world_tree(8, 1);
        let a = tree.insert(1, Bounds::from_center(-50.0, -50.0, 5.0));
        let _b = tree.insert(2, Bounds::from_center(50.0, -50.0, 5.0));

        tree.relocate(&a, Bounds::from_center(50.0, 50.0, 5.0));

        assert!(search_set(&tree, &Bounds::from_center(-50.0, -50.0, 10.0)).is_empty());
        assert_eq!(search_set(&tree, &Bounds::from_center(50.0, 50.0, 10.0)), BTreeSet::from([1]));
        assert_eq!(tree.key(&a), 1);
    }

    #[test]
    fn test_relocate_onto_split_line_moves_up() {
        let mut tree = world_tree(8, 1);
        let a = tree.insert(1, Bounds::from_center(-50.0, -50.0, 5.0));
        let _b = tree.insert(2, Bounds::from_center(50.0, 50.0, 5.0));
        assert_ne!(owner_of(&tree, &a), tree.root);

        tree.relocate(&a, Bounds::from_center(0.0, -50.0, 5.0));
        assert_eq!(owner_of(&tree, &a), tree.root);
    }

    #[test]
    fn test_contains_any_with_selector() {
        let mut tree = world_tree(8, 2);
        let _handles: Vec<_> = (0..8)
            .map(|i| tree.insert(i, Bounds::from_center(-80.0 + i as f32 * 20.0, 10.0, 2.0)))
            .collect();

        let everything = Bounds::new(0.0, 0.0, 100.0, 100.0);
        assert!(tree.any_in(&everything));
        assert!(tree.contains_any(&everything, |k| k == 7));
        assert!(!tree.contains_any(&everything, |k| k > 7));
        assert!(!tree.any_in(&Bounds::from_center(0.0, -80.0, 5.0)));
    }

    #[test]
    fn test_items_outside_root_range_are_searchable() {
        let mut tree = world_tree(8, 1);
        let _out = tree.insert(1, Bounds::from_center(500.0, 500.0, 5.0));
        let _a = tree.insert(2, Bounds::from_center(-50.0, -50.0, 5.0));
        assert_eq!(tree.collect_all().len(), 2);
        assert_eq!(search_set(&tree, &Bounds::from_center(500.0, 500.0, 1.0)), BTreeSet::from([1]));
        assert!(search_set(&tree, &Bounds::from_center(-500.0, -500.0, 1.0)).is_empty());
    }

    #[test]
    fn test_differential_against_brute_force() {
        let mut rng = StdRng::seed_from_u64(0x0ba5e);
        let mut tree = world_tree(6, 4);
        let mut handles: HashMap<u32, ItemHandle> = HashMap::new();
        let mut oracle: HashMap<u32, Bounds> = HashMap::new();
        let mut next_key = 0u32;

        let random_box = |rng: &mut StdRng| {
            let size = rng.random_range(0.5..12.0);
            Bounds::from_center(rng.random_range(-110.0..110.0), rng.random_range(-110.0..110.0), size)
        };

        for step in 0..4000 {
            let roll = rng.random_range(0..10);
            if roll < 4 || handles.is_empty() {
                let bounds = random_box(&mut rng);
                handles.insert(next_key, tree.insert(next_key, bounds));
                oracle.insert(next_key, bounds);
                next_key += 1;
            } else {
                let keys: Vec<u32> = handles.keys().copied().collect();
                let key = keys[rng.random_range(0..keys.len())];
                if roll < 8 {
                    let old = oracle[&key];
                    let bounds = if rng.random_bool(0.7) {
                        Bounds::from_center(
                            old.x + rng.random_range(-8.0..8.0),
                            old.y + rng.random_range(-8.0..8.0),
                            old.w,
                        )
                    } else {
                        random_box(&mut rng)
                    };
                    tree.relocate(&handles[&key], bounds);
                    oracle.insert(key, bounds);
                } else {
                    let handle = handles.remove(&key).expect("key was sampled from handles");
                    assert_eq!(tree.remove(handle), key);
                    oracle.remove(&key);
                }
            }

            assert_structure(&tree);

            if step % 50 == 0 {
                let all: BTreeSet<u32> = tree.collect_all().into_iter().collect();
                let expected: BTreeSet<u32> = oracle.keys().copied().collect();
                assert_eq!(all, expected);
                assert_eq!(tree.collect_all().len(), oracle.len());
                assert_eq!(tree.len(), oracle.len());

                for _ in 0..10 {
                    let query = Bounds::new(
                        rng.random_range(-100.0..100.0),
                        rng.random_range(-100.0..100.0),
                        rng.random_range(1.0..40.0),
                        rng.random_range(1.0..40.0),
                    );
                    let expected: BTreeSet<u32> = oracle
                        .iter()
                        .filter(|(_, b)| query.intersects(b))
                        .map(|(&k, _)| k)
                        .collect();
                    assert_eq!(search_set(&tree, &query), expected);
                    assert_eq!(tree.any_in(&query), !expected.is_empty());
                    let even = expected.iter().any(|k| k % 2 == 0);
                    assert_eq!(tree.contains_any(&query, |k| k % 2 == 0), even);
                }
            }
        }

        for (_, handle) in handles.drain() {
            let _ = tree.remove(handle);
            assert_structure(&tree);
        }
        assert!(tree.is_empty());
        assert_eq!(tree.branch_count(), 1);
    }

    #[test]
    fn test_debug_dump_lists_nodes() {
        let mut tree = world_tree(8, 1);
        let _a = tree.insert(1, Bounds::from_center(-50.0, -50.0, 5.0));
        let _b = tree.insert(2, Bounds::from_center(50.0, 50.0, 5.0));
        let dump = format!("{tree:?}");
        assert_eq!(dump.lines().count(), 5);
        assert!(dump.starts_with("items 0/2 level 1"));
    }
}
