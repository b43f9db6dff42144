//! A simulated 8-bit processor
//!
//! This models the interrupt behaviour of a small accumulator machine with a
//! 16-bit address space and an empty-descending byte stack, in the style of
//! the Freescale HCS08. On interrupt the hardware pushes `PCL, PCH, X, A,
//! CCR` and the return-from-interrupt pulls them back in reverse. The stack
//! lives in real memory (your [`Stack`](crate::Stack) objects), so the frames
//! the kernel builds are the bytes a harness inspects.
//!
//! The high index byte H is not modelled. Code that wants it preserved
//! across a switch has to stack it itself, so the frame is always five bytes.
//!
//! Taking an interrupt masks further interrupts until the return, as the I
//! bit does, so each context only ever has one frame stacked on it.

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use core::cell::Cell;

use crate::{
    Port, StackRegion,
    frame::{Discipline, FrameBuilder},
};

/// Register file of the simulated processor
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Registers {
    /// Accumulator
    pub a: u8,
    /// Index register (low byte)
    pub x: u8,
    /// Condition codes
    pub ccr: u8,
    /// Program counter
    pub pc: u16,
}

/// The simulated processor
pub struct Sim {
    sp: Cell<usize>,
    regs: Cell<Registers>,
    halted: Cell<bool>,
    halts: Cell<u32>,
    masked: Cell<bool>,
}

impl Sim {
    /// Bytes pulled by a return-from-interrupt: CCR, A, X, PCH, PCL
    pub const FRAME_LEN: usize = 5;

    /// Power on, running from `boot` (what `main` would use)
    ///
    /// Panics if `boot` is already claimed.
    pub fn new(boot: StackRegion) -> Sim {
        if !boot.claim() {
            panic!("Boot stack is already in use");
        }
        Sim {
            sp: Cell::new(boot.base() + boot.len() - 1),
            regs: Cell::new(Registers::default()),
            halted: Cell::new(false),
            halts: Cell::new(0),
            masked: Cell::new(false),
        }
    }

    /// Current register values
    pub fn registers(&self) -> Registers {
        self.regs.get()
    }

    /// Overwrite the register values, as running code would
    pub fn set_registers(&self, regs: Registers) {
        self.regs.set(regs);
    }

    /// Current stack pointer
    pub fn sp(&self) -> usize {
        self.sp.get()
    }

    /// Is the processor halted, waiting for an interrupt?
    pub fn is_halted(&self) -> bool {
        self.halted.get()
    }

    /// How many times the processor has been halted
    pub fn halt_count(&self) -> u32 {
        self.halts.get()
    }

    /// Deliver an interrupt
    ///
    /// Stacks the interrupt frame, wakes the processor, runs `handler` and
    /// then executes a return-from-interrupt.
    ///
    /// Panics if interrupts are masked, which they are inside `handler` and
    /// during a [`Port::suspend`].
    pub fn interrupt(&self, handler: impl FnOnce()) {
        self.enter();
        self.halted.set(false);
        handler();
        self.return_from_interrupt();
    }

    /// Are interrupts masked?
    pub fn is_masked(&self) -> bool {
        self.masked.get()
    }

    /// Mask interrupts and stack the registers the way the interrupt
    /// hardware does
    fn enter(&self) {
        if self.masked.replace(true) {
            panic!("Interrupts are masked");
        }
        self.push_frame();
    }

    /// Pull an interrupt frame off the stack, continue from it and unmask
    fn return_from_interrupt(&self) {
        let ccr = self.pull();
        let a = self.pull();
        let x = self.pull();
        let pch = self.pull();
        let pcl = self.pull();
        self.regs.set(Registers {
            a,
            x,
            ccr,
            pc: u16::from_be_bytes([pch, pcl]),
        });
        self.masked.set(false);
    }

    /// Read a byte of memory
    ///
    /// # Safety
    ///
    /// `addr` must lie inside a [`Stack`](crate::Stack) that no other
    /// thread is using.
    pub unsafe fn peek(&self, addr: usize) -> u8 {
        // SAFETY: the caller promises `addr` is in a stack we may read
        unsafe { (addr as *const u8).read_volatile() }
    }

    fn push_frame(&self) {
        let regs = self.regs.get();
        let [pch, pcl] = regs.pc.to_be_bytes();
        self.push(pcl);
        self.push(pch);
        self.push(regs.x);
        self.push(regs.a);
        self.push(regs.ccr);
    }

    fn push(&self, value: u8) {
        let sp = self.sp.get();
        // SAFETY: the stack pointer only ever holds the boot stack or a
        // value installed through `install_context`, whose caller promised
        // room for one frame. Masking stops a second one being stacked.
        unsafe { (sp as *mut u8).write_volatile(value) };
        self.sp.set(sp.wrapping_sub(1));
    }

    fn pull(&self) -> u8 {
        let sp = self.sp.get().wrapping_add(1);
        self.sp.set(sp);
        // SAFETY: as for `push`
        unsafe { self.peek(sp) }
    }
}

impl Port for Sim {
    type Entry = u16;

    const DISCIPLINE: Discipline = Discipline::EmptyDescending;

    const STACK_ALIGN: usize = 1;

    /// The frame plus the byte the stack pointer rests on
    const MIN_STACK: usize = Self::FRAME_LEN + 2;

    fn build_frame(frame: &mut FrameBuilder<'_>, entry: u16) {
        // PCL lands on the top byte, PCH just below it
        frame.push_be16(entry);
        // X, A and CCR start as whatever is already in memory
        frame.skip(Self::FRAME_LEN - 2);
    }

    fn read_context(&self) -> usize {
        self.sp.get()
    }

    unsafe fn install_context(&self, sp: usize) {
        self.sp.set(sp);
    }

    fn suspend(&self, switch: &mut dyn FnMut()) {
        critical_section::with(|_cs| {
            // The call into the kernel would push the return address, and we
            // then push X, A and CCR by hand, which is exactly the frame an
            // interrupt leaves behind.
            self.enter();
            switch();
            self.return_from_interrupt();
        });
    }

    fn halt(&self) {
        self.halted.set(true);
        self.halts.set(self.halts.get() + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Stack;

    #[test]
    fn interrupt_without_a_switch_restores_everything() {
        static BOOT: Stack<16> = Stack::new();
        let sim = Sim::new(BOOT.region());
        let before = Registers {
            a: 0x12,
            x: 0x34,
            ccr: 0x60,
            pc: 0xE123,
        };
        sim.set_registers(before);
        let sp = sim.sp();
        sim.interrupt(|| {
            assert_eq!(sim.sp(), sp - Sim::FRAME_LEN);
            sim.set_registers(Registers::default());
        });
        assert_eq!(sim.registers(), before);
        assert_eq!(sim.sp(), sp);
    }

    #[test]
    fn interrupt_frame_layout() {
        static BOOT: Stack<16> = Stack::new();
        let region = BOOT.region();
        let sim = Sim::new(region);
        sim.set_registers(Registers {
            a: 0xAA,
            x: 0x55,
            ccr: 0x01,
            pc: 0xBEEF,
        });
        let top = region.base() + 15;
        sim.interrupt(|| {
            // SAFETY: the frame is on our own boot stack
            let frame: [u8; 5] = core::array::from_fn(|i| unsafe { sim.peek(top - i) });
            assert_eq!(frame, [0xEF, 0xBE, 0x55, 0xAA, 0x01]);
        });
    }

    #[test]
    #[should_panic(expected = "Interrupts are masked")]
    fn handlers_cannot_be_interrupted() {
        static BOOT: Stack<16> = Stack::new();
        let sim = Sim::new(BOOT.region());
        sim.interrupt(|| {
            assert!(sim.is_masked());
            // a second frame would run off the bottom of a minimum stack
            sim.interrupt(|| {});
        });
    }

    #[test]
    fn return_from_interrupt_unmasks() {
        static BOOT: Stack<16> = Stack::new();
        let sim = Sim::new(BOOT.region());
        sim.interrupt(|| {});
        assert!(!sim.is_masked());
        sim.suspend(&mut || assert!(sim.is_masked()));
        assert!(!sim.is_masked());
    }

    #[test]
    fn interrupt_wakes_a_halted_processor() {
        static BOOT: Stack<16> = Stack::new();
        let sim = Sim::new(BOOT.region());
        sim.halt();
        assert!(sim.is_halted());
        sim.interrupt(|| {});
        assert!(!sim.is_halted());
        assert_eq!(sim.halt_count(), 1);
    }

    #[test]
    #[should_panic(expected = "Boot stack is already in use")]
    fn boot_stack_cannot_be_shared() {
        static BOOT: Stack<16> = Stack::new();
        let _first = Sim::new(BOOT.region());
        let _second = Sim::new(BOOT.region());
    }
}

// End of File
