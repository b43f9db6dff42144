//! Holds the [`Stack`] type and methods

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use core::{
    cell::UnsafeCell,
    sync::atomic::{AtomicBool, Ordering},
};

/// A task stack, with the given size `LEN` bytes.
///
/// We align stacks on 8-byte boundaries, which satisfies AAPCS and costs
/// nothing on byte-addressed 8-bit parts.
#[repr(C, align(8))]
pub struct Stack<const LEN: usize> {
    /// The memory reserved for the task stack
    contents: UnsafeCell<[u8; LEN]>,
    /// Set once a task (or the boot context) has taken this stack
    claimed: AtomicBool,
}

impl<const LEN: usize> Stack<LEN> {
    /// Create a new stack
    pub const fn new() -> Self {
        Self {
            contents: UnsafeCell::new([0u8; LEN]),
            claimed: AtomicBool::new(false),
        }
    }

    /// Describe the memory this stack covers
    pub const fn region(&'static self) -> StackRegion {
        StackRegion {
            base: self.contents.get() as *mut u8,
            len: LEN,
            claimed: &self.claimed,
        }
    }
}

/// SAFETY: Our stack object only exposes pointers to itself, and the claim
/// flag makes sure at most one owner ever writes through them.
unsafe impl<const LEN: usize> Sync for Stack<LEN> {}

impl<const LEN: usize> Default for Stack<LEN> {
    fn default() -> Self {
        Stack::new()
    }
}

/// A type-erased view of a [`Stack`]
#[derive(Copy, Clone)]
pub struct StackRegion {
    base: *mut u8,
    len: usize,
    claimed: &'static AtomicBool,
}

impl StackRegion {
    /// Lowest address in the region
    pub fn base(&self) -> usize {
        self.base as usize
    }

    /// Size of the region in bytes
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Is this a zero-sized region?
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Does `addr` fall inside the region?
    pub fn contains(&self, addr: usize) -> bool {
        addr >= self.base() && addr - self.base() < self.len
    }

    /// Take exclusive ownership of the region.
    ///
    /// Returns `false` if somebody already holds it.
    pub(crate) fn claim(&self) -> bool {
        critical_section::with(|_cs| {
            if self.claimed.load(Ordering::Relaxed) {
                false
            } else {
                self.claimed.store(true, Ordering::Relaxed);
                true
            }
        })
    }

    /// Borrow the whole region as bytes
    ///
    /// # Safety
    ///
    /// The caller must hold the claim, and nothing may be executing on this
    /// stack for as long as the slice lives.
    pub(crate) unsafe fn bytes_mut(&self) -> &mut [u8] {
        unsafe { core::slice::from_raw_parts_mut(self.base, self.len) }
    }
}

// SAFETY: a region is just an address range plus a flag that is only touched
// inside a critical section.
unsafe impl Send for StackRegion {}
unsafe impl Sync for StackRegion {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_covers_whole_stack() {
        static STACK: Stack<30> = Stack::new();
        let region = STACK.region();
        assert_eq!(region.len(), 30);
        assert_eq!(region.base() % 8, 0);
        assert!(region.contains(region.base()));
        assert!(region.contains(region.base() + 29));
        assert!(!region.contains(region.base() + 30));
        assert!(!region.contains(region.base().wrapping_sub(1)));
    }

    #[test]
    fn region_can_only_be_claimed_once() {
        static STACK: Stack<16> = Stack::new();
        assert!(STACK.region().claim());
        assert!(!STACK.region().claim());
    }
}

// End of File
