/// A set of slot indices in `0..32`.
///
/// Iteration is in ascending order, which is the order in which trackers
/// must apply slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SlotMask(u32);

impl SlotMask {
    pub const EMPTY: Self = Self(0);

    /// Mask with the low `count` bits set.
    #[inline]
    #[must_use]
    pub fn first(count: usize) -> Self {
        if count >= 32 {
            Self(u32::MAX)
        } else {
            Self((1u32 << count) - 1)
        }
    }

    #[inline]
    #[must_use]
    pub fn bits(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn set(&mut self, index: usize) {
        debug_assert!(index < 32);
        self.0 |= 1 << index;
    }

    #[inline]
    pub fn reset(&mut self, index: usize) {
        self.0 &= !(1 << index);
    }

    #[inline]
    pub fn clear(&mut self) {
        self.0 = 0;
    }

    #[inline]
    #[must_use]
    pub fn contains(self, index: usize) -> bool {
        index < 32 && self.0 & (1 << index) != 0
    }

    #[inline]
    #[must_use]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[inline]
    #[must_use]
    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    #[inline]
    #[must_use]
    pub fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    #[inline]
    #[must_use]
    pub fn intersection(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }

    #[inline]
    #[must_use]
    pub fn difference(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    /// Iterates set indices in ascending order.
    #[must_use]
    pub fn iter(self) -> SlotMaskIter {
        SlotMaskIter(self.0)
    }
}

impl std::ops::BitOrAssign for SlotMask {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl FromIterator<usize> for SlotMask {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let mut mask = Self::EMPTY;
        for index in iter {
            mask.set(index);
        }
        mask
    }
}

impl IntoIterator for SlotMask {
    type Item = usize;
    type IntoIter = SlotMaskIter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

pub struct SlotMaskIter(u32);

impl Iterator for SlotMaskIter {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.0 == 0 {
            return None;
        }
        let index = self.0.trailing_zeros() as usize;
        self.0 &= self.0 - 1;
        Some(index)
    }
}
