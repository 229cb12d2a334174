//! # Disjoint Set Union
//!
//! Arena-backed Union-Find over the per-run record ids. Parent and rank live
//! in flat arrays indexed by the dense [`RecordId`]s assigned at snapshot
//! intake, giving O(1) amortized union/find without pointer-chasing through
//! live records.

use crate::model::RecordId;
use rustc_hash::FxHashMap;

/// Union-Find over a fixed-size arena of records.
#[derive(Debug, Clone)]
pub struct DisjointSet {
    parent: Vec<u32>,
    rank: Vec<u8>,
    components: usize,
}

impl DisjointSet {
    /// Create a disjoint set where every record starts as its own component.
    pub fn new(len: usize) -> Self {
        Self {
            parent: (0..len as u32).collect(),
            rank: vec![0; len],
            components: len,
        }
    }

    pub fn len(&self) -> usize {
        self.parent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    /// Number of current components.
    pub fn component_count(&self) -> usize {
        self.components
    }

    /// Find the root of a record, compressing the path by halving.
    pub fn find(&mut self, record: RecordId) -> RecordId {
        let mut current = record.0;
        loop {
            let parent = self.parent[current as usize];
            if parent == current {
                return RecordId(current);
            }
            let grandparent = self.parent[parent as usize];
            // Point every other node at its grandparent while walking up.
            self.parent[current as usize] = grandparent;
            current = grandparent;
        }
    }

    /// Union the components of `a` and `b` by rank.
    /// Returns `false` when they were already in the same component.
    pub fn union(&mut self, a: RecordId, b: RecordId) -> bool {
        let root_a = self.find(a);
        let root_b = self.find(b);
        if root_a == root_b {
            return false;
        }

        let (ra, rb) = (root_a.0 as usize, root_b.0 as usize);
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = root_b.0,
            std::cmp::Ordering::Greater => self.parent[rb] = root_a.0,
            std::cmp::Ordering::Equal => {
                self.parent[ra] = root_b.0;
                self.rank[rb] += 1;
            }
        }
        self.components -= 1;
        true
    }

    /// Whether two records currently share a component.
    pub fn same_component(&mut self, a: RecordId, b: RecordId) -> bool {
        self.find(a) == self.find(b)
    }

    /// Extract the final partition as sorted components.
    ///
    /// Members within a component are sorted by record id and components are
    /// ordered by their smallest member, so output is deterministic for a
    /// given set of unions regardless of union order.
    pub fn components(&mut self) -> Vec<Vec<RecordId>> {
        let mut by_root: FxHashMap<u32, Vec<RecordId>> = FxHashMap::default();
        for index in 0..self.parent.len() as u32 {
            let root = self.find(RecordId(index));
            by_root.entry(root.0).or_default().push(RecordId(index));
        }

        let mut components: Vec<Vec<RecordId>> = by_root.into_values().collect();
        for component in &mut components {
            component.sort();
        }
        components.sort_by_key(|component| component[0]);
        components
    }
}
