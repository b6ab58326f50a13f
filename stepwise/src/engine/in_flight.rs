//! Tracks which builds currently have a walk or retrigger running.

use crate::core::{BuildId, StepPath};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

/// What is running inside a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Activity {
    /// The initial walk of the whole tree.
    Walk,
    /// A retrigger of one top-level step.
    Retrigger(StepPath),
}

#[derive(Debug, Default)]
pub(crate) struct InFlight {
    active: DashMap<BuildId, Activity>,
}

impl InFlight {
    /// Marks `build_id` busy. Returns `None` if something already runs in it.
    pub(crate) fn claim(self: &Arc<Self>, build_id: &BuildId, activity: Activity) -> Option<InFlightGuard> {
        match self.active.entry(build_id.clone()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                slot.insert(activity);
                Some(InFlightGuard {
                    tracker: Arc::clone(self),
                    build_id: build_id.clone(),
                })
            }
        }
    }

    pub(crate) fn activity(&self, build_id: &BuildId) -> Option<Activity> {
        self.active.get(build_id).map(|entry| entry.value().clone())
    }
}

/// Releases the build when dropped.
#[derive(Debug)]
pub(crate) struct InFlightGuard {
    tracker: Arc<InFlight>,
    build_id: BuildId,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.tracker.active.remove(&self.build_id);
    }
}
