//! Fan-in barrier over donor plugins.
//!
//! A [`Merged`] has one slot per donor. Loaders publish into their slot
//! from any thread; consumers block in [`Merged::wait`] until every slot is
//! filled, or until any loader reports failure.

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::tree::Plugin;
use crate::{Error, Result};

/// A named plugin supplying original record content.
#[derive(Debug, Clone)]
pub struct Donor {
    pub name: String,
    pub plugin: Plugin,
}

impl Donor {
    pub fn new(name: impl Into<String>, plugin: Plugin) -> Self {
        Self {
            name: name.into(),
            plugin,
        }
    }
}

/// All donors of one barrier, in slot order.
#[derive(Debug, Clone, Default)]
pub struct MergedDonors {
    donors: Vec<Arc<Donor>>,
}

impl MergedDonors {
    pub fn new(donors: Vec<Donor>) -> Self {
        Self {
            donors: donors.into_iter().map(Arc::new).collect(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.donors.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.donors.is_empty()
    }

    pub fn get(&self, slot: usize) -> Option<&Donor> {
        self.donors.get(slot).map(Arc::as_ref)
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Donor> + '_ {
        self.donors.iter().map(Arc::as_ref)
    }

    pub fn find(&self, name: &str) -> Option<&Donor> {
        self.iter().find(|d| d.name.eq_ignore_ascii_case(name))
    }
}

#[derive(Debug)]
enum Slot {
    Pending,
    Ready(Arc<Donor>),
    Failed(String),
}

#[derive(Debug)]
struct State {
    slots: Vec<Slot>,
    pending: usize,
    failed: bool,
}

/// Barrier that becomes queryable once all donors are published.
#[derive(Debug)]
pub struct Merged {
    state: Mutex<State>,
    ready: Condvar,
}

impl Merged {
    pub fn new(count: usize) -> Self {
        Self {
            state: Mutex::new(State {
                slots: (0..count).map(|_| Slot::Pending).collect(),
                pending: count,
                failed: false,
            }),
            ready: Condvar::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.state.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Publish a loaded donor into `slot`.
    pub fn publish(&self, slot: usize, donor: Donor) -> Result<()> {
        self.fill(slot, Slot::Ready(Arc::new(donor)))
    }

    /// Record that the donor for `slot` could not be loaded.
    pub fn fail(&self, slot: usize, message: impl Into<String>) -> Result<()> {
        self.fill(slot, Slot::Failed(message.into()))
    }

    fn fill(&self, slot: usize, value: Slot) -> Result<()> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let count = state.slots.len();
        let entry = match state.slots.get_mut(slot) {
            Some(entry) if matches!(entry, Slot::Pending) => entry,
            _ => return Err(Error::InvalidDonorSlot { slot, count }),
        };
        let failed = matches!(value, Slot::Failed(_));
        *entry = value;
        state.failed |= failed;
        state.pending -= 1;
        if state.pending == 0 || state.failed {
            self.ready.notify_all();
        }
        Ok(())
    }

    /// Whether every slot has been filled.
    pub fn is_ready(&self) -> bool {
        self.state.lock().pending == 0
    }

    /// The donors if every slot is filled, without blocking.
    pub fn try_get(&self) -> Option<Result<MergedDonors>> {
        let state = self.state.lock();
        if state.failed || state.pending == 0 {
            Some(collect(&state))
        } else {
            None
        }
    }

    /// Block until every slot is filled or a loader fails.
    pub fn wait(&self) -> Result<MergedDonors> {
        let mut state = self.state.lock();
        while state.pending > 0 && !state.failed {
            self.ready.wait(&mut state);
        }
        collect(&state)
    }
}

fn collect(state: &State) -> Result<MergedDonors> {
    let mut donors = Vec::with_capacity(state.slots.len());
    for slot in &state.slots {
        match slot {
            Slot::Ready(donor) => donors.push(Arc::clone(donor)),
            Slot::Failed(message) => return Err(Error::DonorUnavailable(message.clone())),
            Slot::Pending => {
                return Err(Error::DonorUnavailable("donor still loading".to_string()))
            }
        }
    }
    Ok(MergedDonors { donors })
}
