//! Import graph — a bidirectional importer/importee multimap plus the
//! bookkeeping the HMR propagator and rewriter need. Pure in-memory, no I/O.
//! Keyed by cleanId (never object references, per the "cyclic ownership"
//! design note), so the graph owns plain strings and modules are never
//! graph objects themselves.

use std::sync::atomic::{AtomicI64, Ordering};

use dashmap::{DashMap, DashSet};
use tracing::trace;

#[derive(Default)]
pub struct ImportGraph {
    importers: DashMap<String, DashSet<String>>,
    importees: DashMap<String, DashSet<String>>,
    hmr_boundaries: DashSet<String>,
    accepted_by: DashMap<String, DashSet<String>>,
    dirty_files_by_timestamp: DashMap<i64, DashSet<String>>,
    latest_versions: DashMap<String, i64>,
    sequence: AtomicI64,
}

impl ImportGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Monotonic timestamp generator: wall-clock milliseconds with an
    /// in-process sequence number tie-breaker so events that land in the
    /// same millisecond still order strictly.
    pub fn next_timestamp(&self, now_millis: i64) -> i64 {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        now_millis.max(seq)
    }

    pub fn add_edge(&self, importee: &str, importer: &str) {
        trace!(importee, importer, "add edge");
        self.importers
            .entry(importee.to_string())
            .or_default()
            .insert(importer.to_string());
        self.importees
            .entry(importer.to_string())
            .or_default()
            .insert(importee.to_string());
    }

    pub fn remove_edge(&self, importee: &str, importer: &str) {
        trace!(importee, importer, "remove edge");
        if let Some(set) = self.importers.get(importee) {
            set.remove(importer);
        }
        if let Some(set) = self.importees.get(importer) {
            set.remove(importee);
        }
    }

    /// Replaces the full importee set of `importer`, removing edges for any
    /// previously-recorded importee that is no longer imported.
    pub fn reconcile_importees(&self, importer: &str, fresh: impl IntoIterator<Item = String>) {
        let fresh: std::collections::HashSet<String> = fresh.into_iter().collect();
        let prev: Vec<String> = self
            .importees
            .get(importer)
            .map(|s| s.iter().map(|x| x.key().clone()).collect())
            .unwrap_or_default();

        for old in &prev {
            if !fresh.contains(old) {
                self.remove_edge(old, importer);
            }
        }
        for new in &fresh {
            self.add_edge(new, importer);
        }
        trace!(importer, count = fresh.len(), "reconcile importees");
        self.importees
            .insert(importer.to_string(), fresh.into_iter().collect());
    }

    pub fn importers_of(&self, clean_id: &str) -> Vec<String> {
        self.importers
            .get(clean_id)
            .map(|s| s.iter().map(|x| x.key().clone()).collect())
            .unwrap_or_default()
    }

    pub fn importees_of(&self, clean_id: &str) -> Vec<String> {
        self.importees
            .get(clean_id)
            .map(|s| s.iter().map(|x| x.key().clone()).collect())
            .unwrap_or_default()
    }

    pub fn mark_self_accepting(&self, clean_id: &str) {
        self.hmr_boundaries.insert(clean_id.to_string());
    }

    pub fn is_self_accepting(&self, clean_id: &str) -> bool {
        self.hmr_boundaries.contains(clean_id)
    }

    pub fn record_acceptance(&self, accepter: &str, accepted_dep: &str) {
        self.accepted_by
            .entry(accepted_dep.to_string())
            .or_default()
            .insert(accepter.to_string());
    }

    /// Returns an importer of `importee` that explicitly accepts it, if any.
    pub fn accepter_of(&self, importee: &str) -> Option<String> {
        self.accepted_by
            .get(importee)
            .and_then(|set| set.iter().next().map(|x| x.key().clone()))
    }

    pub fn mark_dirty(&self, timestamp: i64, clean_ids: impl IntoIterator<Item = String>) {
        let set = self.dirty_files_by_timestamp.entry(timestamp).or_default();
        for id in clean_ids {
            set.insert(id);
        }
    }

    pub fn is_dirty_at(&self, clean_id: &str, timestamp: i64) -> bool {
        self.dirty_files_by_timestamp
            .get(&timestamp)
            .map(|set| set.contains(clean_id))
            .unwrap_or(false)
    }

    /// Versions are monotonically non-decreasing per id.
    pub fn record_version(&self, clean_id: &str, timestamp: i64) {
        self.latest_versions
            .entry(clean_id.to_string())
            .and_modify(|v| *v = (*v).max(timestamp))
            .or_insert(timestamp);
    }

    pub fn latest_version(&self, clean_id: &str) -> Option<i64> {
        self.latest_versions.get(clean_id).map(|v| *v)
    }

    /// On `unlink`: drop this module's outgoing edges but keep it as an
    /// importee key so existing importers still resolve to a clear 404
    /// rather than silently vanishing from the graph.
    pub fn clear_importees(&self, clean_id: &str) {
        if let Some((_, set)) = self.importees.remove(clean_id) {
            for importee in set.iter() {
                if let Some(importers) = self.importers.get(importee.key().as_str()) {
                    importers.remove(clean_id);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edges_are_symmetric() {
        let graph = ImportGraph::new();
        graph.add_edge("/b.js", "/a.js");
        assert!(graph.importers_of("/b.js").contains(&"/a.js".to_string()));
        assert!(graph.importees_of("/a.js").contains(&"/b.js".to_string()));

        graph.remove_edge("/b.js", "/a.js");
        assert!(graph.importers_of("/b.js").is_empty());
        assert!(graph.importees_of("/a.js").is_empty());
    }

    #[test]
    fn reconcile_drops_stale_edges_only() {
        let graph = ImportGraph::new();
        graph.add_edge("/b.js", "/a.js");
        graph.add_edge("/c.js", "/a.js");

        graph.reconcile_importees("/a.js", vec!["/c.js".to_string(), "/d.js".to_string()]);

        assert!(!graph.importers_of("/b.js").contains(&"/a.js".to_string()));
        assert!(graph.importers_of("/c.js").contains(&"/a.js".to_string()));
        assert!(graph.importers_of("/d.js").contains(&"/a.js".to_string()));
    }

    #[test]
    fn versions_are_monotonic() {
        let graph = ImportGraph::new();
        graph.record_version("/a.js", 10);
        graph.record_version("/a.js", 5);
        assert_eq!(graph.latest_version("/a.js"), Some(10));
        graph.record_version("/a.js", 20);
        assert_eq!(graph.latest_version("/a.js"), Some(20));
    }

    #[test]
    fn unlink_preserves_importers_but_clears_importees() {
        let graph = ImportGraph::new();
        graph.add_edge("/b.js", "/a.js");
        graph.clear_importees("/a.js");
        assert!(graph.importees_of("/a.js").is_empty());
        // importers of /a.js itself (if any) are untouched; here none exist.
        assert!(graph.importers_of("/a.js").is_empty());
    }
}
