//! # Hierarchical cancellation domains.
//!
//! [`ContextRegistry`] is the process-wide set of cancellation domains.
//! Each [`RunContext`] is a node in a tree: cancelling a node cancels all
//! of its descendants (via `CancellationToken` parent/child linkage) and
//! leaves ancestors and siblings untouched. [`ContextRegistry::cancel_all`]
//! walks the currently registered roots — it is the orchestrator's single
//! unconditional shutdown hook.
//!
//! ## Rules
//! - The registry is an explicitly constructed, injected object with the
//!   orchestrator's lifetime, never an implicit singleton.
//! - A context is registered when a cancellable unit of work begins and
//!   deregistered when the [`RunContext`] is dropped — normal finish,
//!   error, and cancellation all pass through the same `Drop`.
//! - Cancellation flags are monotonic: once set, never cleared; `cancel`
//!   is idempotent.
//! - Deregistering a node detaches its children (they become roots); the
//!   already-derived tokens keep working.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;

/// Opaque identifier of a registered context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ContextId(u64);

struct Node {
    token: CancellationToken,
    /// Back-relation only; never an ownership edge.
    parent: Option<u64>,
    children: HashSet<u64>,
}

/// Process-wide registry of cancellation domains.
pub struct ContextRegistry {
    nodes: Mutex<HashMap<u64, Node>>,
    next_id: AtomicU64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ContextRegistry {
    /// Creates an empty registry.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            nodes: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        })
    }

    /// Allocates a context, optionally nested under `parent`.
    ///
    /// A nested context derives its token from the parent's token, so
    /// cancelling the parent cascades without any registry lookup.
    pub fn create(self: &Arc<Self>, parent: Option<&RunContext>) -> RunContext {
        let id = self.next_id.fetch_add(1, AtomicOrdering::Relaxed);
        let token = match parent {
            Some(p) => p.token.child_token(),
            None => CancellationToken::new(),
        };

        let mut nodes = lock(&self.nodes);
        nodes.insert(
            id,
            Node {
                token: token.clone(),
                parent: parent.map(|p| p.id.0),
                children: HashSet::new(),
            },
        );
        if let Some(p) = parent {
            if let Some(parent_node) = nodes.get_mut(&p.id.0) {
                parent_node.children.insert(id);
            }
        }
        drop(nodes);

        RunContext {
            id: ContextId(id),
            token,
            registry: Arc::clone(self),
        }
    }

    /// Cancels the context and, transitively, every descendant.
    ///
    /// Idempotent; unknown identifiers are ignored (the unit of work
    /// already finished).
    pub fn cancel(&self, id: ContextId) {
        let token = lock(&self.nodes).get(&id.0).map(|n| n.token.clone());
        if let Some(token) = token {
            token.cancel();
        }
    }

    /// Cancels every currently registered root context.
    pub fn cancel_all(&self) {
        let roots: Vec<CancellationToken> = lock(&self.nodes)
            .values()
            .filter(|n| n.parent.is_none())
            .map(|n| n.token.clone())
            .collect();
        for token in roots {
            token.cancel();
        }
    }

    /// Number of currently registered contexts.
    pub fn len(&self) -> usize {
        lock(&self.nodes).len()
    }

    /// True when no context is registered.
    pub fn is_empty(&self) -> bool {
        lock(&self.nodes).is_empty()
    }

    /// Deregisters a finished context, detaching its children.
    fn remove(&self, id: u64) {
        let mut nodes = lock(&self.nodes);
        if let Some(node) = nodes.remove(&id) {
            if let Some(parent) = node.parent {
                if let Some(parent_node) = nodes.get_mut(&parent) {
                    parent_node.children.remove(&id);
                }
            }
            for child in node.children {
                if let Some(child_node) = nodes.get_mut(&child) {
                    child_node.parent = None;
                }
            }
        }
    }
}

/// One cancellable unit of work, registered for its whole lifetime.
///
/// Not clonable: the owner of the unit of work holds it, and dropping it
/// deregisters the context. Hand out [`RunContext::token`] clones (or
/// child tokens) to the computation that has to observe cancellation.
pub struct RunContext {
    id: ContextId,
    token: CancellationToken,
    registry: Arc<ContextRegistry>,
}

impl RunContext {
    /// Returns the context identifier.
    pub fn id(&self) -> ContextId {
        self.id
    }

    /// Returns the context's cancellation token.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// True once this context (or an ancestor) was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Completes when this context (or an ancestor) is cancelled.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }

    /// Allocates a child context nested under this one.
    pub fn child(&self) -> RunContext {
        self.registry.create(Some(self))
    }
}

impl Drop for RunContext {
    fn drop(&mut self) {
        self.registry.remove(self.id.0);
    }
}
