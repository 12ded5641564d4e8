//! The visible surface hosts attach to.

use crate::error::PreviewError;
use crate::types::HostId;
use std::fmt::Debug;
use std::sync::{Mutex, PoisonError};

/// Exclusive mount point for the Ready host.
pub trait MountSurface: Send + Sync + Debug {
    /// Attaches a host.
    ///
    /// # Errors
    ///
    /// Fails if a different host is still attached.
    fn attach(&self, host_id: &HostId) -> Result<(), PreviewError>;

    /// Detaches the host if it is the attached one. Returns true if it was.
    fn detach(&self, host_id: &HostId) -> bool;

    /// The currently attached host.
    fn attached(&self) -> Option<HostId>;
}

#[derive(Debug, Default)]
struct Slot {
    current: Option<HostId>,
    attaches: u64,
    detaches: u64,
}

/// In-memory surface that enforces single ownership.
#[derive(Debug, Default)]
pub struct PreviewSurface {
    slot: Mutex<Slot>,
}

impl PreviewSurface {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total successful attaches.
    #[must_use]
    pub fn attach_count(&self) -> u64 {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).attaches
    }

    /// Total successful detaches.
    #[must_use]
    pub fn detach_count(&self) -> u64 {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).detaches
    }
}

impl MountSurface for PreviewSurface {
    fn attach(&self, host_id: &HostId) -> Result<(), PreviewError> {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        match &slot.current {
            Some(current) if current != host_id => {
                Err(PreviewError::surface_occupied(current.clone()))
            }
            Some(_) => Ok(()),
            None => {
                slot.current = Some(host_id.clone());
                slot.attaches += 1;
                Ok(())
            }
        }
    }

    fn detach(&self, host_id: &HostId) -> bool {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.current.as_ref() == Some(host_id) {
            slot.current = None;
            slot.detaches += 1;
            true
        } else {
            false
        }
    }

    fn attached(&self) -> Option<HostId> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .current
            .clone()
    }
}
