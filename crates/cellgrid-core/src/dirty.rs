use crate::id::GraphId;
use std::collections::BTreeSet;

/// Tracks which graphs changed identity or membership since the last save.
///
/// Hosts persist only graph ids, so a graph that was created, grew, shrank
/// or was dissolved must be written out again. Call
/// [`mark_clean`](DirtyTracker::mark_clean) after persisting.
#[derive(Debug, Clone, Default)]
pub struct DirtyTracker {
    dirty_graphs: BTreeSet<GraphId>,
    removed_graphs: BTreeSet<GraphId>,
}

impl DirtyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a live graph as changed.
    pub fn mark_graph(&mut self, graph: GraphId) {
        self.removed_graphs.remove(&graph);
        self.dirty_graphs.insert(graph);
    }

    /// Mark a graph as gone (merged away, split or emptied).
    pub fn mark_removed(&mut self, graph: GraphId) {
        self.dirty_graphs.remove(&graph);
        self.removed_graphs.insert(graph);
    }

    pub fn is_dirty(&self) -> bool {
        !self.dirty_graphs.is_empty() || !self.removed_graphs.is_empty()
    }

    pub fn is_graph_dirty(&self, graph: GraphId) -> bool {
        self.dirty_graphs.contains(&graph)
    }

    pub fn is_graph_removed(&self, graph: GraphId) -> bool {
        self.removed_graphs.contains(&graph)
    }

    pub fn dirty_graphs(&self) -> impl Iterator<Item = GraphId> + '_ {
        self.dirty_graphs.iter().copied()
    }

    pub fn removed_graphs(&self) -> impl Iterator<Item = GraphId> + '_ {
        self.removed_graphs.iter().copied()
    }

    pub fn mark_clean(&mut self) {
        self.dirty_graphs.clear();
        self.removed_graphs.clear();
    }
}
