//! The boundary between the kernel and the processor it runs on

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use crate::frame::{Discipline, FrameBuilder};

pub mod sim;

#[cfg(all(
    target_arch = "arm",
    arm_abi = "eabi",
    not(any(arm_architecture = "v6-m", arm_architecture = "v8-m.base"))
))]
pub mod cortex_m;

/// Everything the kernel needs from a processor
///
/// The scheduler itself only ever reads and installs an execution context
/// (a stack pointer). How a frame looks, how a task gets into the kernel and
/// how the processor sleeps are all decided here.
///
/// A port lives inside a `static` [`Scheduler`](crate::Scheduler), alongside
/// the `'static` task list, so it must not borrow anything shorter-lived.
pub trait Port: 'static {
    /// What a task entry point looks like on this processor
    type Entry: Copy;

    /// How this processor's stack pointer moves
    const DISCIPLINE: Discipline;

    /// Alignment of the initial stack pointer, in bytes
    const STACK_ALIGN: usize;

    /// The smallest stack that holds a first-resume frame
    const MIN_STACK: usize;

    /// Lay out a frame which, when resumed, starts executing `entry`
    fn build_frame(frame: &mut FrameBuilder<'_>, entry: Self::Entry);

    /// Read the stack pointer of the context that entered the kernel
    fn read_context(&self) -> usize;

    /// Make `sp` the context the kernel will return into
    ///
    /// # Safety
    ///
    /// `sp` must point into a stack that nothing else is using, at a frame
    /// this port can resume (one laid out by [`Port::build_frame`] or left
    /// behind when a task entered the kernel), with enough room below it for
    /// the next interrupt frame.
    unsafe fn install_context(&self, sp: usize);

    /// Enter the kernel from task context as if interrupted, call `switch`,
    /// then resume whatever context is installed.
    ///
    /// Must not be called from interrupt context.
    fn suspend(&self, switch: &mut dyn FnMut());

    /// Stop the processor until the next interrupt
    fn halt(&self);

    /// Called once by [`Scheduler::start`](crate::Scheduler::start)
    fn prepare(&self) {}
}

// End of File
