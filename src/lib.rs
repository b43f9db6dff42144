//! # carousel
//!
//! A pre-emptive, round-robin task switcher for very small microcontrollers.
//!
//! You declare a fixed list of [`Task`]s, each with its own [`Stack`], in a
//! `static`. At start-up you [`register`](Scheduler::register) each one,
//! which writes a frame into its stack that looks exactly like the task had
//! been interrupted at its first instruction. Then you enable one interrupt
//! source and wait. Every time it fires, the chosen [`TimingStrategy`] asks
//! the [`Scheduler`] to swap the interrupted task's stack pointer for the next
//! task's, and the return from interrupt resumes that task.
//!
//! Three timing strategies are provided:
//!
//! * [`FixedTick`]: a periodic timer switches tasks on every tick.
//! * [`Weighted`]: a compare-match timer gives each task its own quantum.
//! * [`LowPower`]: a slow wake-up source switches tasks, and tasks may
//!   [`sleep`](LowPower::sleep) through the rest of their slot.
//!
//! Everything processor-specific lives behind the [`Port`] trait.

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

#![cfg_attr(not(test), no_std)]

mod fmt;

pub mod frame;
pub mod port;
mod scheduler;
mod stack;
mod task;
mod timing;

pub use port::Port;
pub use scheduler::Scheduler;
pub use stack::{Stack, StackRegion};
pub use task::{Task, TaskId};
pub use timing::{
    CompareTimer, FixedTick, InterruptSource, LowPower, TimingStrategy, Weighted,
};

// End of File
