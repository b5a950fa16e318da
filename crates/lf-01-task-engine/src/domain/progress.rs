//! # Progress Tracking
//!
//! A tracker is an ordered list of steps with a cursor. Children are
//! attached to a parent step explicitly when a sub-flow starts, and the
//! engine marks a child done when the sub-flow returns.
//!
//! ```text
//! Finality
//! ├── VERIFYING
//! ├── NOTARISING ─┐
//! │               └── Notarisation
//! │                   ├── VERIFYING_LOCAL_SIGNATURES
//! │                   ├── REQUESTING
//! │                   └── VALIDATING
//! └── BROADCASTING
//! ```

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::broadcast;

/// A named step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Step {
    pub label: &'static str,
}

impl Step {
    pub const fn new(label: &'static str) -> Self {
        Self { label }
    }
}

pub const UNSTARTED: Step = Step::new("Starting");
pub const DONE: Step = Step::new("Done");

/// Emitted whenever any tracker in a tree changes step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProgressChange {
    /// Depth of the tracker that changed; 0 is the root.
    pub depth: usize,
    pub step: &'static str,
}

struct TrackerState {
    steps: Vec<Step>,
    /// 0 is [`UNSTARTED`]; `steps.len() + 1` is [`DONE`].
    position: usize,
    children: BTreeMap<usize, ProgressTracker>,
    depth: usize,
    changes: broadcast::Sender<ProgressChange>,
}

/// Shared handle to a tracker.
#[derive(Clone)]
pub struct ProgressTracker {
    state: Arc<Mutex<TrackerState>>,
}

impl ProgressTracker {
    pub fn new(steps: &[Step]) -> Self {
        let (changes, _) = broadcast::channel(64);
        Self {
            state: Arc::new(Mutex::new(TrackerState {
                steps: steps.to_vec(),
                position: 0,
                children: BTreeMap::new(),
                depth: 0,
                changes,
            })),
        }
    }

    pub fn steps(&self) -> Vec<Step> {
        self.state.lock().steps.clone()
    }

    pub fn current_step(&self) -> Step {
        let state = self.state.lock();
        match state.position {
            0 => UNSTARTED,
            p if p > state.steps.len() => DONE,
            p => state.steps[p - 1],
        }
    }

    pub fn has_ended(&self) -> bool {
        self.current_step() == DONE
    }

    /// Move to `step`. Unknown steps are ignored with a warning.
    pub fn set_current(&self, step: Step) {
        let mut state = self.state.lock();
        let position = if step == DONE {
            state.steps.len() + 1
        } else if let Some(i) = state.steps.iter().position(|s| *s == step) {
            i + 1
        } else {
            tracing::warn!(step = step.label, "Progress step not in tracker");
            return;
        };
        if position == state.position {
            return;
        }
        state.position = position;
        let change = ProgressChange {
            depth: state.depth,
            step: step.label,
        };
        let _ = state.changes.send(change);
    }

    pub fn done(&self) {
        self.set_current(DONE);
    }

    /// Attach `child` under the current step. The child reports its changes
    /// through this tracker's subscription.
    pub fn set_child_for_current(&self, child: &ProgressTracker) {
        if Arc::ptr_eq(&self.state, &child.state) {
            return;
        }
        let (depth, changes, position) = {
            let state = self.state.lock();
            (state.depth, state.changes.clone(), state.position)
        };
        child.reparent(depth + 1, &changes);
        self.state.lock().children.insert(position, child.clone());
    }

    fn reparent(&self, depth: usize, changes: &broadcast::Sender<ProgressChange>) {
        let children: Vec<ProgressTracker> = {
            let mut state = self.state.lock();
            state.depth = depth;
            state.changes = changes.clone();
            state.children.values().cloned().collect()
        };
        for child in children {
            child.reparent(depth + 1, changes);
        }
    }

    pub fn child_for(&self, step: Step) -> Option<ProgressTracker> {
        let state = self.state.lock();
        let index = state.steps.iter().position(|s| *s == step)?;
        state.children.get(&(index + 1)).cloned()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressChange> {
        self.state.lock().changes.subscribe()
    }

    /// Flattened tree of `(depth, label)` pairs, children after their step.
    pub fn steps_tree(&self) -> Vec<(usize, &'static str)> {
        let mut out = Vec::new();
        self.collect_tree(0, &mut out);
        out
    }

    fn collect_tree(&self, depth: usize, out: &mut Vec<(usize, &'static str)>) {
        let (steps, children) = {
            let state = self.state.lock();
            (state.steps.clone(), state.children.clone())
        };
        for (i, step) in steps.iter().enumerate() {
            out.push((depth, step.label));
            if let Some(child) = children.get(&(i + 1)) {
                child.collect_tree(depth + 1, out);
            }
        }
    }
}

impl std::fmt::Debug for ProgressTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ProgressTracker({})", self.current_step().label)
    }
}
