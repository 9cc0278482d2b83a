//! Write-once slot for a `'static` service table such as the klog backend.

use core::sync::atomic::{AtomicPtr, Ordering};

pub struct ServiceCell<T> {
    slot: AtomicPtr<T>,
    label: &'static str,
}

// SAFETY: the slot only ever holds a pointer derived from a `&'static T`.
unsafe impl<T: Sync> Sync for ServiceCell<T> {}

impl<T> ServiceCell<T> {
    /// An empty cell. `label` names the service in the double-registration panic.
    pub const fn new(label: &'static str) -> Self {
        Self {
            slot: AtomicPtr::new(core::ptr::null_mut()),
            label,
        }
    }

    /// Attach `table`. A second registration panics.
    pub fn register(&self, table: &'static T) {
        let attached = self.slot.compare_exchange(
            core::ptr::null_mut(),
            table as *const T as *mut T,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        if attached.is_err() {
            panic!("{} registered twice", self.label);
        }
    }

    pub fn try_get(&self) -> Option<&'static T> {
        let ptr = self.slot.load(Ordering::Acquire);
        // SAFETY: non-null values come from `register`, which takes `&'static T`.
        unsafe { ptr.as_ref() }
    }
}
