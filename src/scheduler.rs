//! Contains the [`Scheduler`] type

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use core::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};

use crate::{Port, Task, TaskId};

/// A pre-emptive task-switching scheduler
///
/// It time slices tasks in a round-robin fashion, whether or not they have
/// work to do. Every registered task is always eligible to run, so task `i`
/// always runs between task `i - 1` and task `i + 1` (wrapping).
///
/// The scheduler never decides *when* to switch. That is up to the timing
/// strategy (see [`FixedTick`](crate::FixedTick),
/// [`Weighted`](crate::Weighted) and [`LowPower`](crate::LowPower)), which
/// calls [`Scheduler::switch_to`] from its interrupt handler.
pub struct Scheduler<P: Port> {
    /// Which task is currently running
    ///
    /// Holds the invalid Task ID until the first switch. Only
    /// [`Scheduler::switch_to`] writes this.
    current_task: AtomicUsize,
    /// A fixed, static list of all our tasks
    task_list: &'static [Task<P>],
    /// Number of switches performed so far (wrapping)
    switches: AtomicU32,
    /// Set by [`Scheduler::start`]
    started: AtomicBool,
    /// The processor we drive
    port: P,
}

impl<P: Port> Scheduler<P> {
    /// Build the scheduler
    pub const fn new(task_list: &'static [Task<P>], port: P) -> Scheduler<P> {
        // Cannot schedule without at least one task
        assert!(!task_list.is_empty());
        Scheduler {
            current_task: AtomicUsize::new(TaskId::INVALID.0),
            task_list,
            switches: AtomicU32::new(0),
            started: AtomicBool::new(false),
            port,
        }
    }

    /// Register a task, writing the frame its first switch will resume
    ///
    /// Call this exactly once per task, in any order, before interrupts are
    /// enabled.
    ///
    /// Panics if the task's stack is already in use (a second registration,
    /// or another task sharing the stack) or if the scheduler has started.
    pub fn register(&self, task_id: TaskId) {
        if self.is_started() {
            panic!("Tried to register a task with the scheduler running!");
        }
        let task = self.task(task_id);
        task.register();
        debug!(
            "Registered task {}, stack @ 0x{=usize:08x}, saved sp @ 0x{=usize:08x}",
            task_id,
            task.stack().base(),
            task.saved_sp()
        );
    }

    /// Register every task in the list, in order
    pub fn register_all(&self) {
        for index in 0..self.task_list.len() {
            self.register(TaskId::new(index));
        }
    }

    /// Get ready to run
    ///
    /// Checks that every task has been registered, then lets the port do any
    /// one-time setup. Enable the timer interrupt after this returns; the
    /// first interrupt will switch to task 0.
    ///
    /// Panics if called twice.
    pub fn start(&self) {
        if let Some(index) = self.task_list.iter().position(|t| !t.is_registered()) {
            panic!("Task {} was never registered", TaskId::new(index));
        }
        if self.started.swap(true, Ordering::Relaxed) {
            panic!("Tried to re-start scheduler!");
        }
        self.port.prepare();
        info!("Scheduler ready with {=usize} tasks", self.task_list.len());
    }

    /// Which task runs after the current one
    pub fn next_task(&self) -> TaskId {
        self.current_task_id().following(self.task_list.len())
    }

    /// Switch to the next task in the round-robin
    pub fn preempt(&self) {
        self.switch_to(self.next_task());
    }

    /// Swap the running context for `next_task`'s
    ///
    /// Must be called from interrupt context, or from inside
    /// [`Port::suspend`], so that the context the kernel returns into is an
    /// interrupt frame.
    ///
    /// The outgoing task's stack pointer is stored only after the new one is
    /// installed, and never for the "no task yet" state.
    ///
    /// Panics if the scheduler has not been started.
    pub fn switch_to(&self, next_task: TaskId) {
        if !self.is_started() {
            panic!("Tried to switch tasks before the scheduler started!");
        }
        let current_task = self.current_task_id();
        // With a single task there is nothing to exchange; installing its
        // saved pointer here would throw away the frame just stacked.
        if current_task != next_task {
            let outgoing_sp = self.port.read_context();
            let incoming = self.task(next_task);
            // SAFETY: every task was registered before `start`, and a
            // registered task's saved pointer always addresses a resumable
            // frame on its own, exclusively claimed stack
            unsafe { self.port.install_context(incoming.saved_sp()) };
            if let Some(index) = current_task.index() {
                self.task_list[index].save_sp(outgoing_sp);
            }
            self.current_task.store(next_task.0, Ordering::Relaxed);
        }
        self.switches
            .store(self.switch_count().wrapping_add(1), Ordering::Relaxed);
        trace!("Switched {} -> {}", current_task, next_task);
    }

    /// Give up the rest of this task's time, running `switch` to pick who
    /// goes next
    ///
    /// Call this from task context only. The port stacks the same frame an
    /// interrupt would, so the task later resumes through exactly the same
    /// path as if it had been preempted.
    pub fn yield_with(&self, mut switch: impl FnMut()) {
        trace!("Yield from {}", self.current_task_id());
        self.port.suspend(&mut switch);
    }

    /// Has [`Scheduler::start`] been called?
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Relaxed)
    }

    /// Get the current Task ID
    pub fn current_task_id(&self) -> TaskId {
        TaskId(self.current_task.load(Ordering::Relaxed))
    }

    /// Get a task from the list
    pub fn task(&self, task_id: TaskId) -> &Task<P> {
        &self.task_list[task_id.0]
    }

    /// Get all the tasks
    pub fn tasks(&self) -> &'static [Task<P>] {
        self.task_list
    }

    /// Get the number of switches performed so far
    pub fn switch_count(&self) -> u32 {
        self.switches.load(Ordering::Relaxed)
    }

    /// Get the port this scheduler drives
    pub fn port(&self) -> &P {
        &self.port
    }
}


// End of File
