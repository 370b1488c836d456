//! Utility Module
//!
//! - [`SlotMask`]: fixed-width bit set over slot indices (bind groups,
//!   bindings, vertex buffers) with ascending iteration

pub mod slot_mask;

pub use slot_mask::SlotMask;
