use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide unique id generator for frontend objects.
static NEXT_RESOURCE_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identity of a frontend object.
///
/// Trackers compare ids instead of pointers so that a dropped and
/// re-created object never aliases a previously bound one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(u64);

impl ResourceId {
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_RESOURCE_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    #[must_use]
    pub fn raw(self) -> u64 {
        self.0
    }
}
