//! Cross-highlighting between the net view and the DAG view.
//!
//! [`map_selection`] is the pure mapping. [`HighlightController`] owns the one
//! active [`HighlightSet`] and the expiry timer of transient highlights.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use petriflow_types::{
    DagProjection, ElementRef, HighlightMode, HighlightSet, PetriNet, PlaceId, TaskId,
    TransitionId,
};
use tokio::sync::watch;

use crate::tasks::TaskArena;

/// Ids in the other view that correspond to `element`.
///
/// Transitions map to DAG nodes and places map to DAG edges (or state-marker
/// nodes), always through an explicit cross-reference. The reference on the
/// selected element wins; otherwise a back-reference from the other view is
/// used. A missing reference or a dangling one yields an empty set.
#[must_use]
pub fn map_selection(
    element: &ElementRef,
    net: &PetriNet,
    dag: &DagProjection,
) -> BTreeSet<String> {
    let mapped: Option<String> = match element {
        ElementRef::Transition(id) => net
            .transition(id)
            .and_then(|t| t.dag_ref.clone())
            .filter(|node| dag.node(node).is_some())
            .or_else(|| {
                dag.nodes
                    .iter()
                    .find(|n| n.net_ref.as_deref() == Some(id.as_str()))
                    .map(|n| n.id.clone())
            }),
        ElementRef::Place(id) => net
            .place(id)
            .and_then(|p| p.dag_ref.clone())
            .filter(|target| dag.edge(target).is_some() || dag.node(target).is_some())
            .or_else(|| {
                dag.edges
                    .iter()
                    .find(|e| e.net_ref.as_deref() == Some(id.as_str()))
                    .map(|e| e.id.clone())
            }),
        ElementRef::DagNode(id) => dag
            .node(id)
            .and_then(|n| n.net_ref.clone())
            .filter(|target| {
                net.transition(&TransitionId::new(target.as_str())).is_some()
                    || net.place(&PlaceId::new(target.as_str())).is_some()
            })
            .or_else(|| {
                net.transitions
                    .iter()
                    .find(|t| t.dag_ref.as_deref() == Some(id.as_str()))
                    .map(|t| t.id.as_str().to_string())
            }),
        ElementRef::DagEdge(id) => dag
            .edge(id)
            .and_then(|e| e.net_ref.clone())
            .filter(|target| net.place(&PlaceId::new(target.as_str())).is_some())
            .or_else(|| {
                net.places
                    .iter()
                    .find(|p| p.dag_ref.as_deref() == Some(id.as_str()))
                    .map(|p| p.id.as_str().to_string())
            }),
    };
    mapped.into_iter().collect()
}

#[derive(Debug)]
pub struct HighlightController {
    hover_timeout: Duration,
    net: Arc<PetriNet>,
    dag: Arc<DagProjection>,
    state: watch::Sender<Option<HighlightSet>>,
    generation: Arc<AtomicU64>,
    expiry: Option<TaskId>,
    tasks: TaskArena,
}

impl HighlightController {
    #[must_use]
    pub fn new(hover_timeout: Duration) -> Self {
        let (state, _) = watch::channel(None);
        Self {
            hover_timeout,
            net: Arc::default(),
            dag: Arc::default(),
            state,
            generation: Arc::new(AtomicU64::new(0)),
            expiry: None,
            tasks: TaskArena::new(),
        }
    }

    /// Replace the models selections are mapped against. Clears the current
    /// highlight since its ids may no longer exist.
    pub fn set_models(&mut self, net: Arc<PetriNet>, dag: Arc<DagProjection>) {
        self.net = net;
        self.dag = dag;
        self.clear();
    }

    #[must_use]
    pub fn current(&self) -> Option<HighlightSet> {
        self.state.borrow().clone()
    }

    /// Receiver that observes every highlight change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<HighlightSet>> {
        self.state.subscribe()
    }

    /// Transient highlight that clears itself after the hover timeout.
    ///
    /// Must be called from within a tokio runtime.
    pub fn hover(&mut self, element: &ElementRef) -> Option<HighlightSet> {
        let set = self.install(element, HighlightMode::Transient);
        if set.is_some() {
            let generation = self.generation.load(Ordering::SeqCst);
            let counter = Arc::clone(&self.generation);
            let state = self.state.clone();
            let timeout = self.hover_timeout;
            self.expiry = Some(self.tasks.spawn("highlight-expiry", async move {
                tokio::time::sleep(timeout).await;
                expire(&state, &counter, generation);
            }));
        }
        set
    }

    /// Persistent highlight that stays until replaced or cleared.
    pub fn select(&mut self, element: &ElementRef) -> Option<HighlightSet> {
        self.install(element, HighlightMode::Persistent)
    }

    pub fn clear(&mut self) {
        self.supersede();
        self.state.send_replace(None);
    }

    /// Cancel the expiry timer and drop the current highlight.
    pub fn shutdown(&mut self) {
        self.clear();
        self.tasks.cancel_all();
    }

    fn supersede(&mut self) -> u64 {
        if let Some(id) = self.expiry.take() {
            self.tasks.cancel(id);
        }
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn install(&mut self, element: &ElementRef, mode: HighlightMode) -> Option<HighlightSet> {
        let generation = self.supersede();
        let ids = map_selection(element, &self.net, &self.dag);
        let set = (!ids.is_empty()).then(|| HighlightSet::new(element.view().other(), ids, mode));
        tracing::debug!(
            element = %element,
            ?mode,
            generation,
            mapped = set.as_ref().map_or(0, |s| s.element_ids.len()),
            "Highlight replaced"
        );
        self.state.send_replace(set.clone());
        set
    }
}

/// Clear the highlight if `generation` is still the latest install. The
/// compare runs under the channel lock so a newer install cannot land between
/// the check and the clear.
fn expire(
    state: &watch::Sender<Option<HighlightSet>>,
    counter: &AtomicU64,
    generation: u64,
) -> bool {
    state.send_if_modified(|current| {
        if counter.load(Ordering::SeqCst) != generation {
            return false;
        }
        tracing::debug!(generation, "Transient highlight expired");
        current.take().is_some()
    })
}

impl Drop for HighlightController {
    fn drop(&mut self) {
        self.tasks.cancel_all();
    }
}
