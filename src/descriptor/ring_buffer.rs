//! Serial-tracked ring buffer sub-allocator.
//!
//! Hands out contiguous ranges of a fixed-size block. Each allocation is
//! tagged with the submission serial that will use it; ranges are only
//! reclaimed once that serial has completed on the GPU.
//!
//! ```text
//!   0                                                     max
//!   ├──────────┬───────────────────────────┬──────────────┤
//!   │   free   │  in flight (oldest → new) │     free     │
//!   └──────────┴───────────────────────────┴──────────────┘
//!              ↑ used_start                ↑ used_end
//! ```
//!
//! When the tail cannot fit a request the allocator wraps to offset 0; the
//! skipped tail is charged to that request and reclaimed with it.

use std::collections::VecDeque;

use crate::replay::Serial;

#[derive(Debug, Clone, Copy)]
struct Request {
    end_offset: u64,
    size: u64,
}

#[derive(Debug)]
pub struct RingBufferAllocator {
    max_size: u64,
    used_start: u64,
    used_end: u64,
    used_size: u64,
    inflight: VecDeque<(Serial, Request)>,
}

impl RingBufferAllocator {
    #[must_use]
    pub fn new(max_size: u64) -> Self {
        Self {
            max_size,
            used_start: 0,
            used_end: 0,
            used_size: 0,
            inflight: VecDeque::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn size(&self) -> u64 {
        self.max_size
    }

    #[inline]
    #[must_use]
    pub fn used_size(&self) -> u64 {
        self.used_size
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.used_size == 0
    }

    /// Allocates `size` units for use by `serial`. Returns the start offset,
    /// or `None` when no contiguous range is free.
    pub fn allocate(&mut self, size: u64, serial: Serial) -> Option<u64> {
        if size == 0 || self.used_size >= self.max_size {
            return None;
        }
        if size > self.max_size - self.used_size {
            return None;
        }

        let (start, charged) = if self.used_start <= self.used_end {
            if self.used_end + size <= self.max_size {
                (self.used_end, size)
            } else if size <= self.used_start {
                // Wrap around; the unused tail is charged to this request.
                (0, (self.max_size - self.used_end) + size)
            } else {
                return None;
            }
        } else if self.used_end + size <= self.used_start {
            (self.used_end, size)
        } else {
            return None;
        };

        self.used_end = start + size;
        self.used_size += charged;

        match self.inflight.back_mut() {
            Some((last_serial, request)) if *last_serial == serial => {
                request.end_offset = self.used_end;
                request.size += charged;
            }
            _ => self.inflight.push_back((
                serial,
                Request {
                    end_offset: self.used_end,
                    size: charged,
                },
            )),
        }

        Some(start)
    }

    /// Reclaims every range whose serial is `<= completed_serial`.
    pub fn deallocate(&mut self, completed_serial: Serial) {
        while let Some(&(serial, request)) = self.inflight.front() {
            if serial > completed_serial {
                break;
            }
            self.used_start = request.end_offset;
            self.used_size -= request.size;
            self.inflight.pop_front();
        }
        if self.used_size == 0 {
            self.used_start = 0;
            self.used_end = 0;
        }
    }
}
