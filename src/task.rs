//! Holds the [`Task`] and [`TaskId`] types and methods

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use core::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};

use crate::{Port, Stack, StackRegion, frame};

/// Identifies a task by its position in the task list
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TaskId(pub(crate) usize);

impl TaskId {
    /// Represents the Task ID we produce when no task has run yet
    pub const INVALID: TaskId = TaskId(usize::MAX);

    /// Make a Task ID from a task list index
    pub const fn new(index: usize) -> TaskId {
        TaskId(index)
    }

    /// Is this the invalid Task ID?
    pub const fn is_invalid(self) -> bool {
        self.0 == Self::INVALID.0
    }

    /// The task list index, or `None` for the invalid Task ID
    pub const fn index(self) -> Option<usize> {
        if self.is_invalid() { None } else { Some(self.0) }
    }

    /// The task after this one, out of `num_tasks`
    ///
    /// The invalid Task ID is followed by task 0.
    pub const fn following(self, num_tasks: usize) -> TaskId {
        if self.is_invalid() || self.0 + 1 >= num_tasks {
            TaskId(0)
        } else {
            TaskId(self.0 + 1)
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for TaskId {
    fn format(&self, fmt: defmt::Formatter) {
        if self.is_invalid() {
            defmt::write!(fmt, "T---");
        } else {
            defmt::write!(fmt, "T{=usize:03}", self.0);
        }
    }
}

impl core::fmt::Display for TaskId {
    fn fmt(&self, fmt: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if self.is_invalid() {
            write!(fmt, "T---")
        } else {
            write!(fmt, "T{:03}", self.0)
        }
    }
}

/// Represents a task that the scheduler is managing
pub struct Task<P: Port> {
    entry: P::Entry,
    stack: StackRegion,
    /// Timer ticks this task runs for under the weighted strategy
    quantum: u32,
    /// Where this task's stack pointer was when it was last suspended, as an
    /// offset into `stack`. Only the scheduler writes this, and only while
    /// the task is not running.
    saved_sp: AtomicUsize,
    /// How many times `saved_sp` has been written by a switch
    suspensions: AtomicU32,
    registered: AtomicBool,
}

impl<P: Port> Task<P> {
    /// Create a new [`Task`] object, with a quantum of one tick
    pub const fn new<const N: usize>(entry: P::Entry, stack: &'static Stack<N>) -> Task<P> {
        Self::weighted(entry, stack, 1)
    }

    /// Create a new [`Task`] object which runs for `quantum` timer ticks at a
    /// time under the [`Weighted`](crate::Weighted) strategy
    pub const fn weighted<const N: usize>(
        entry: P::Entry,
        stack: &'static Stack<N>,
        quantum: u32,
    ) -> Task<P> {
        assert!(N >= P::MIN_STACK, "Task stack too small for the resume frame");
        Task {
            entry,
            stack: stack.region(),
            quantum,
            saved_sp: AtomicUsize::new(0),
            suspensions: AtomicU32::new(0),
            registered: AtomicBool::new(false),
        }
    }

    /// Get the initial entry point for this task
    pub const fn entry(&self) -> P::Entry {
        self.entry
    }

    /// Get the memory this task runs its stack in
    pub const fn stack(&self) -> &StackRegion {
        &self.stack
    }

    /// Get this task's quantum, in timer ticks
    pub const fn quantum(&self) -> u32 {
        self.quantum
    }

    /// Has the Stack Frame Builder been run for this task?
    pub fn is_registered(&self) -> bool {
        self.registered.load(Ordering::Relaxed)
    }

    /// The saved stack pointer, as an address
    pub fn saved_sp(&self) -> usize {
        self.stack.base() + self.saved_sp.load(Ordering::Relaxed)
    }

    /// How many times this task has been switched away from
    pub fn suspensions(&self) -> u32 {
        self.suspensions.load(Ordering::Relaxed)
    }

    /// Claim the stack and write the first-resume frame into it
    ///
    /// Panics if the stack is already claimed, which catches both a double
    /// registration and two tasks sharing one stack.
    pub(crate) fn register(&self) {
        if !self.stack.claim() {
            panic!("Task stack is already in use");
        }
        // SAFETY: we hold the claim, and the task cannot be running because
        // it has never been registered.
        let bytes = unsafe { self.stack.bytes_mut() };
        let offset = frame::initialize::<P>(bytes, self.entry);
        self.saved_sp.store(offset, Ordering::Relaxed);
        self.registered.store(true, Ordering::Relaxed);
    }

    /// Record where this task's stack pointer was when it got switched out
    pub(crate) fn save_sp(&self, sp: usize) {
        debug_assert!(
            self.stack.contains(sp),
            "Saved stack pointer is outside its task's stack"
        );
        self.saved_sp
            .store(sp.wrapping_sub(self.stack.base()), Ordering::Relaxed);
        self.suspensions
            .store(self.suspensions().wrapping_add(1), Ordering::Relaxed);
    }
}

// SAFETY: All mutable state is in atomics, and the stack region is only
// written through while claimed.
unsafe impl<P: Port> Sync for Task<P> {}


// End of File
