//! HMR propagator — from one changed module, walk importers upward to
//! find the set of boundaries that can absorb the update without a full
//! page reload.

use std::collections::{HashSet, VecDeque};

use serde::Serialize;

use crate::graph::ImportGraph;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum UpdateKind {
    JsUpdate,
    VueReload,
    VueRerender,
    StyleUpdate,
    StyleRemove,
}

#[derive(Debug, Clone, Serialize)]
pub struct HmrUpdate {
    #[serde(rename = "type")]
    pub kind: UpdateKind,
    pub path: String,
    #[serde(rename = "acceptedPath")]
    pub accepted_path: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum HmrMessage {
    #[serde(rename = "update")]
    Update { timestamp: i64, updates: Vec<HmrUpdate> },
    #[serde(rename = "full-reload")]
    FullReload { timestamp: i64, path: String },
}

/// Runs the breadth-first upward walk and mutates the graph's dirty-set
/// /version bookkeeping as a side effect. `timestamp` must already be
/// monotonic (see `ImportGraph::next_timestamp`). Every id swept into the
/// dirty set — not just `changed_clean_id` — gets its `latest_version`
/// bumped, so `rewrite::stamp_specifier` stamps a fresh `?t=` onto any
/// import site for any transitively stale module, not only the one that
/// changed on disk.
pub fn propagate(graph: &ImportGraph, changed_clean_id: &str, timestamp: i64) -> HmrMessage {
    let mut queue: VecDeque<String> = VecDeque::new();
    let mut visited: HashSet<String> = HashSet::new();
    let mut dirty: HashSet<String> = HashSet::new();
    let mut boundaries: Vec<(String, String)> = Vec::new(); // (path, acceptedPath)

    queue.push_back(changed_clean_id.to_string());
    dirty.insert(changed_clean_id.to_string());

    while let Some(node) = queue.pop_front() {
        if !visited.insert(node.clone()) {
            continue;
        }

        if graph.is_self_accepting(&node) {
            boundaries.push((node.clone(), node.clone()));
            continue; // do not recurse through a boundary
        }

        if let Some(accepter) = graph.accepter_of(&node) {
            boundaries.push((accepter, node.clone()));
            continue;
        }

        let importers = graph.importers_of(&node);
        if importers.is_empty() {
            // Reached a root with no importers: unresolvable, bubble to reload.
            return full_reload(graph, changed_clean_id, timestamp, &dirty);
        }

        for importer in importers {
            dirty.insert(importer.clone());
            queue.push_back(importer);
        }
    }

    for id in &dirty {
        graph.record_version(id, timestamp);
    }
    graph.mark_dirty(timestamp, dirty.into_iter());

    let updates = boundaries
        .into_iter()
        .map(|(path, accepted_path)| HmrUpdate {
            kind: update_kind_for(&path),
            path,
            accepted_path,
            timestamp,
        })
        .collect();

    HmrMessage::Update { timestamp, updates }
}

fn full_reload(
    graph: &ImportGraph,
    changed_clean_id: &str,
    timestamp: i64,
    dirty: &HashSet<String>,
) -> HmrMessage {
    for id in dirty {
        graph.record_version(id, timestamp);
    }
    graph.mark_dirty(timestamp, dirty.iter().cloned());
    HmrMessage::FullReload {
        timestamp,
        path: changed_clean_id.to_string(),
    }
}

fn update_kind_for(clean_id: &str) -> UpdateKind {
    match clean_id.rsplit_once('.').map(|(_, ext)| ext) {
        Some("css") => UpdateKind::StyleUpdate,
        Some("vue") => UpdateKind::VueRerender,
        _ => UpdateKind::JsUpdate,
    }
}
