//! Holds the [`FrameBuilder`] type and methods
//!
//! A freshly registered task has never been interrupted, so there is no saved
//! state for the first switch to restore. We therefore hand-write the frame
//! the return-from-interrupt path would pop, with the task's entry point in
//! the program counter slot. The layout itself belongs to the [`Port`].

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use crate::Port;

/// How a stack pointer relates to the data on the stack
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Discipline {
    /// The stack pointer addresses the next free byte (push writes, then
    /// decrements). This is what 8-bit parts like the HCS08 and AVR do.
    EmptyDescending,
    /// The stack pointer addresses the last item pushed (push decrements,
    /// then writes). This is the Arm EABI stack.
    FullDescending,
}

/// A helper for pushing things into a descending stack, without ever leaving
/// the stack's memory.
pub struct FrameBuilder<'a> {
    region: &'a mut [u8],
    /// Offset of the stack pointer within `region`
    offset: usize,
    discipline: Discipline,
}

impl<'a> FrameBuilder<'a> {
    /// Start at the very top of `region`
    ///
    /// A full-descending stack starts one past the highest byte, rounded down
    /// to `align`. An empty-descending stack starts at the highest byte.
    pub fn new(region: &'a mut [u8], discipline: Discipline, align: usize) -> FrameBuilder<'a> {
        let offset = match discipline {
            Discipline::EmptyDescending => region.len().saturating_sub(1),
            Discipline::FullDescending => region.len() - (region.len() % align.max(1)),
        };
        FrameBuilder {
            region,
            offset,
            discipline,
        }
    }

    /// Push one byte
    pub fn push_u8(&mut self, value: u8) {
        match self.discipline {
            Discipline::EmptyDescending => {
                self.region[self.offset] = value;
                self.offset -= 1;
            }
            Discipline::FullDescending => {
                self.offset -= 1;
                self.region[self.offset] = value;
            }
        }
    }

    /// Push a 16-bit value so that it reads big-endian from low to high
    /// address (high byte ends up below the low byte)
    pub fn push_be16(&mut self, value: u16) {
        let [high, low] = value.to_be_bytes();
        self.push_u8(low);
        self.push_u8(high);
    }

    /// Push a 32-bit word in little-endian byte order
    pub fn push_word(&mut self, value: u32) {
        for byte in value.to_be_bytes() {
            self.push_u8(byte);
        }
    }

    /// Move the stack pointer down without writing anything
    ///
    /// Whatever was in those bytes stays there.
    pub fn skip(&mut self, bytes: usize) {
        self.offset -= bytes;
    }

    /// The current stack pointer, as an offset into the region
    pub fn offset(&self) -> usize {
        self.offset
    }
}

/// Write the first-resume frame for `entry` into `region`
///
/// Returns the offset the saved stack pointer should take so that resuming
/// it lands on `entry`.
pub(crate) fn initialize<P: Port>(region: &mut [u8], entry: P::Entry) -> usize {
    let mut builder = FrameBuilder::new(region, P::DISCIPLINE, P::STACK_ALIGN);
    P::build_frame(&mut builder, entry);
    builder.offset()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_descending_writes_at_the_pointer() {
        let mut mem = [0u8; 8];
        let mut builder = FrameBuilder::new(&mut mem, Discipline::EmptyDescending, 1);
        assert_eq!(builder.offset(), 7);
        builder.push_be16(0xC0DE);
        assert_eq!(builder.offset(), 5);
        builder.skip(3);
        assert_eq!(builder.offset(), 2);
        assert_eq!(mem, [0, 0, 0, 0, 0, 0, 0xC0, 0xDE]);
    }

    #[test]
    fn full_descending_aligns_and_writes_below_the_pointer() {
        let mut mem = [0u8; 13];
        let mut builder = FrameBuilder::new(&mut mem, Discipline::FullDescending, 4);
        assert_eq!(builder.offset(), 12);
        builder.push_word(0x0102_0304);
        assert_eq!(builder.offset(), 8);
        assert_eq!(&mem[8..13], &[4, 3, 2, 1, 0]);
    }

    #[test]
    #[should_panic]
    fn pushing_past_the_bottom_panics() {
        let mut mem = [0u8; 2];
        let mut builder = FrameBuilder::new(&mut mem, Discipline::FullDescending, 1);
        builder.push_word(0);
    }
}

// End of File
