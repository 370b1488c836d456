use super::ResourceId;

/// A sampler object. Its descriptor lives in the CPU staging heap of every
/// bind group that references it; the replay engine only needs its identity.
#[derive(Debug)]
pub struct Sampler {
    id: ResourceId,
    comparison: bool,
}

impl Sampler {
    #[must_use]
    pub fn new(comparison: bool) -> Self {
        Self {
            id: ResourceId::next(),
            comparison,
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> ResourceId {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn is_comparison(&self) -> bool {
        self.comparison
    }
}

impl Default for Sampler {
    fn default() -> Self {
        Self::new(false)
    }
}
