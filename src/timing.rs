//! The three ways of deciding when to switch tasks
//!
//! All of them share the same [`Scheduler`] and the same switch. They differ
//! only in which interrupt fires [`Scheduler::switch_to`], and in how the
//! next firing gets scheduled. Pick one per firmware image.

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use crate::{Port, Scheduler};

/// An interrupt source whose pending flag the handler has to clear
///
/// Configuring the source (clock, prescaler, period) is up to your start-up
/// code. The kernel only acknowledges it.
pub trait InterruptSource {
    /// Clear the pending-interrupt flag
    fn acknowledge(&self);
}

/// A free-running counter with a compare register that interrupts on match
pub trait CompareTimer: InterruptSource {
    /// The current compare value
    fn compare(&self) -> u32;

    /// Set the compare value
    ///
    /// Counters narrower than 32 bits should keep the low bits only, so the
    /// wrapping arithmetic the kernel does matches the hardware's.
    fn set_compare(&self, value: u32);
}

/// Something that decides when the scheduler switches
pub trait TimingStrategy {
    /// Call this from the interrupt handler of the strategy's source
    fn on_interrupt<P: Port>(&self, scheduler: &Scheduler<P>);
}

/// Switch to the next task on every tick of a periodic timer
///
/// Every task gets exactly one tick per rotation.
pub struct FixedTick<S> {
    source: S,
}

impl<S: InterruptSource> FixedTick<S> {
    /// Drive the scheduler from `source`
    pub const fn new(source: S) -> FixedTick<S> {
        FixedTick { source }
    }
}

impl<S: InterruptSource> TimingStrategy for FixedTick<S> {
    fn on_interrupt<P: Port>(&self, scheduler: &Scheduler<P>) {
        self.source.acknowledge();
        scheduler.preempt();
    }
}

/// Give each task its own quantum, using a compare-match timer
///
/// At every switch the compare register moves forward by the *incoming*
/// task's quantum, counted from where it was rather than from now. Servicing
/// an interrupt late does not shift the rest of the schedule, so over time
/// task `i` gets `quantum_i / sum(quanta)` of the processor.
pub struct Weighted<T> {
    timer: T,
}

impl<T: CompareTimer> Weighted<T> {
    /// Drive the scheduler from `timer`
    pub const fn new(timer: T) -> Weighted<T> {
        Weighted { timer }
    }

    /// Get the timer we drive the scheduler from
    pub const fn timer(&self) -> &T {
        &self.timer
    }

    /// Give up the rest of the current quantum
    ///
    /// The next task's quantum is added on top of the current compare value,
    /// just as a timer match would, so it also inherits whatever the yielding
    /// task left unused. Call from task context only.
    pub fn yield_now<P: Port>(&self, scheduler: &Scheduler<P>) {
        scheduler.yield_with(|| self.schedule_next(scheduler));
    }

    fn schedule_next<P: Port>(&self, scheduler: &Scheduler<P>) {
        let next = scheduler.next_task();
        let quantum = scheduler.task(next).quantum();
        self.timer
            .set_compare(self.timer.compare().wrapping_add(quantum));
        scheduler.switch_to(next);
    }
}

impl<T: CompareTimer> TimingStrategy for Weighted<T> {
    fn on_interrupt<P: Port>(&self, scheduler: &Scheduler<P>) {
        self.timer.acknowledge();
        self.schedule_next(scheduler);
    }
}

/// Switch on a slow, fixed-rate wake-up source and let tasks sleep
///
/// A task that has nothing left to do in its slot calls
/// [`LowPower::sleep`]. The processor halts until the next wake-up, which
/// then switches to the following task exactly as if the sleeper had run to
/// the end of its slot, so the rotation cadence is unchanged.
pub struct LowPower<S> {
    source: S,
}

impl<S: InterruptSource> LowPower<S> {
    /// Drive the scheduler from the wake-up `source`
    pub const fn new(source: S) -> LowPower<S> {
        LowPower { source }
    }

    /// Halt until the next interrupt
    ///
    /// This does not reschedule anything by itself. If the interrupt that
    /// wakes us is the wake-up source, it preempts this task as normal.
    pub fn sleep<P: Port>(&self, scheduler: &Scheduler<P>) {
        trace!("Sleep in {}", scheduler.current_task_id());
        scheduler.port().halt();
    }

    /// Hand the rest of this slot straight to the next task
    ///
    /// Call from task context only.
    pub fn yield_now<P: Port>(&self, scheduler: &Scheduler<P>) {
        scheduler.yield_with(|| scheduler.preempt());
    }
}

impl<S: InterruptSource> TimingStrategy for LowPower<S> {
    fn on_interrupt<P: Port>(&self, scheduler: &Scheduler<P>) {
        self.source.acknowledge();
        scheduler.preempt();
    }
}

#[cfg(test)]
mod tests {
    use core::cell::Cell;

    use super::*;
    use crate::{
        Stack, Task, TaskId,
        port::sim::{Registers, Sim},
    };

    /// Counts acknowledgements
    #[derive(Default)]
    struct Flag {
        acks: Cell<u32>,
    }

    impl InterruptSource for Flag {
        fn acknowledge(&self) {
            self.acks.set(self.acks.get() + 1);
        }
    }

    /// A 16-bit compare-match timer
    #[derive(Default)]
    struct Tpm {
        acks: Cell<u32>,
        compare: Cell<u16>,
    }

    impl InterruptSource for Tpm {
        fn acknowledge(&self) {
            self.acks.set(self.acks.get() + 1);
        }
    }

    impl CompareTimer for Tpm {
        fn compare(&self) -> u32 {
            u32::from(self.compare.get())
        }

        fn set_compare(&self, value: u32) {
            self.compare.set(value as u16);
        }
    }

    #[test]
    fn fixed_tick_acknowledges_and_rotates() {
        static BOOT: Stack<16> = Stack::new();
        static TASKS: [Task<Sim>; 3] = [
            Task::new(0x1000, {
                static STACK: Stack<16> = Stack::new();
                &STACK
            }),
            Task::new(0x2000, {
                static STACK: Stack<16> = Stack::new();
                &STACK
            }),
            Task::new(0x3000, {
                static STACK: Stack<16> = Stack::new();
                &STACK
            }),
        ];
        let scheduler = Scheduler::new(&TASKS, Sim::new(BOOT.region()));
        scheduler.register_all();
        scheduler.start();
        let timing = FixedTick::new(Flag::default());
        let sim = scheduler.port();
        for tick in 0..9u16 {
            sim.interrupt(|| timing.on_interrupt(&scheduler));
            assert_eq!(sim.registers().pc, 0x1000 * (tick % 3 + 1));
        }
        assert_eq!(timing.source.acks.get(), 9);
    }

    #[test]
    fn weighted_shares_follow_the_quanta() {
        static BOOT: Stack<16> = Stack::new();
        static TASKS: [Task<Sim>; 3] = [
            Task::weighted(
                0x1000,
                {
                    static STACK: Stack<16> = Stack::new();
                    &STACK
                },
                200,
            ),
            Task::weighted(
                0x2000,
                {
                    static STACK: Stack<16> = Stack::new();
                    &STACK
                },
                1000,
            ),
            Task::weighted(
                0x3000,
                {
                    static STACK: Stack<16> = Stack::new();
                    &STACK
                },
                300,
            ),
        ];
        let scheduler = Scheduler::new(&TASKS, Sim::new(BOOT.region()));
        scheduler.register_all();
        scheduler.start();
        let timing = Weighted::new(Tpm::default());
        let sim = scheduler.port();

        // Run a free-running 16-bit counter, firing on compare match, and
        // charge every tick to whoever is running.
        let mut counter: u16 = 0;
        let mut charged = [0u32; 3];
        sim.interrupt(|| timing.on_interrupt(&scheduler));
        for _ in 0..150_000 {
            counter = counter.wrapping_add(1);
            let current = scheduler.current_task_id().index().unwrap();
            charged[current] += 1;
            if counter == timing.timer.compare.get() {
                sim.interrupt(|| timing.on_interrupt(&scheduler));
            }
        }
        let total: u32 = charged.iter().sum();
        for (task, ticks) in TASKS.iter().zip(charged) {
            let expected = total * task.quantum() / 1500;
            assert!(
                ticks.abs_diff(expected) <= 1000,
                "got {} ticks, expected about {}",
                ticks,
                expected
            );
        }
    }

    #[test]
    fn weighted_schedule_advances_from_the_old_compare_value() {
        static BOOT: Stack<16> = Stack::new();
        static TASKS: [Task<Sim>; 2] = [
            Task::weighted(
                0x1000,
                {
                    static STACK: Stack<16> = Stack::new();
                    &STACK
                },
                0x8000,
            ),
            Task::weighted(
                0x2000,
                {
                    static STACK: Stack<16> = Stack::new();
                    &STACK
                },
                0x9000,
            ),
        ];
        let scheduler = Scheduler::new(&TASKS, Sim::new(BOOT.region()));
        scheduler.register_all();
        scheduler.start();
        let timing = Weighted::new(Tpm::default());
        timing.timer.compare.set(0x0100);
        let sim = scheduler.port();
        sim.interrupt(|| timing.on_interrupt(&scheduler));
        assert_eq!(timing.timer.compare.get(), 0x8100);
        sim.interrupt(|| timing.on_interrupt(&scheduler));
        // wraps like the 16-bit hardware does
        assert_eq!(timing.timer.compare.get(), 0x1100);
        assert_eq!(timing.timer.acks.get(), 2);
    }

    #[test]
    fn weighted_yield_passes_the_slot_on() {
        static BOOT: Stack<16> = Stack::new();
        static TASKS: [Task<Sim>; 2] = [
            Task::weighted(
                0x1000,
                {
                    static STACK: Stack<16> = Stack::new();
                    &STACK
                },
                200,
            ),
            Task::weighted(
                0x2000,
                {
                    static STACK: Stack<16> = Stack::new();
                    &STACK
                },
                1000,
            ),
        ];
        let scheduler = Scheduler::new(&TASKS, Sim::new(BOOT.region()));
        scheduler.register_all();
        scheduler.start();
        let timing = Weighted::new(Tpm::default());
        let sim = scheduler.port();
        sim.interrupt(|| timing.on_interrupt(&scheduler));
        assert_eq!(timing.timer.compare.get(), 200);

        // Task 0 gives up early
        timing.yield_now(&scheduler);
        assert_eq!(scheduler.current_task_id(), TaskId::new(1));
        assert_eq!(sim.registers().pc, 0x2000);
        assert_eq!(timing.timer.compare.get(), 1200);
        // a yield is not an interrupt, so nothing was acknowledged
        assert_eq!(timing.timer.acks.get(), 1);
    }

    #[test]
    fn yielded_and_preempted_tasks_resume_identically() {
        static BOOT: Stack<16> = Stack::new();
        static TASKS: [Task<Sim>; 2] = [
            Task::new(0x1000, {
                static STACK: Stack<16> = Stack::new();
                &STACK
            }),
            Task::new(0x2000, {
                static STACK: Stack<16> = Stack::new();
                &STACK
            }),
        ];
        let scheduler = Scheduler::new(&TASKS, Sim::new(BOOT.region()));
        scheduler.register_all();
        scheduler.start();
        let timing = LowPower::new(Flag::default());
        let sim = scheduler.port();
        let state = [
            Registers {
                a: 0x11,
                x: 0x22,
                ccr: 0x33,
                pc: 0x1044,
            },
            Registers {
                a: 0x55,
                x: 0x66,
                ccr: 0x77,
                pc: 0x2088,
            },
        ];

        // Task 0 starts, gets somewhere and yields
        sim.interrupt(|| timing.on_interrupt(&scheduler));
        sim.set_registers(state[0]);
        timing.yield_now(&scheduler);
        let yielded_sp = TASKS[0].saved_sp();
        // SAFETY: a saved frame lies inside its task's stack
        let yielded: [u8; 5] =
            core::array::from_fn(|i| unsafe { sim.peek(yielded_sp + 1 + i) });

        // Task 1 starts, gets somewhere and is preempted
        assert_eq!(sim.registers().pc, 0x2000);
        sim.set_registers(state[1]);
        sim.interrupt(|| timing.on_interrupt(&scheduler));
        let preempted_sp = TASKS[1].saved_sp();
        // SAFETY: as above
        let preempted: [u8; 5] =
            core::array::from_fn(|i| unsafe { sim.peek(preempted_sp + 1 + i) });

        // Both frames have the same shape
        assert_eq!(yielded, [0x33, 0x11, 0x22, 0x10, 0x44]);
        assert_eq!(preempted, [0x77, 0x55, 0x66, 0x20, 0x88]);

        // And both come back through the same return
        assert_eq!(sim.registers(), state[0]);
        sim.interrupt(|| timing.on_interrupt(&scheduler));
        assert_eq!(sim.registers(), state[1]);
    }

    #[test]
    fn low_power_sleep_waits_for_the_next_wake_up() {
        static BOOT: Stack<16> = Stack::new();
        static TASKS: [Task<Sim>; 2] = [
            Task::new(0x1000, {
                static STACK: Stack<10> = Stack::new();
                &STACK
            }),
            Task::new(0x2000, {
                static STACK: Stack<7> = Stack::new();
                &STACK
            }),
        ];
        let scheduler = Scheduler::new(&TASKS, Sim::new(BOOT.region()));
        scheduler.register_all();
        scheduler.start();
        let timing = LowPower::new(Flag::default());
        let sim = scheduler.port();

        for wake in 0..6u16 {
            sim.interrupt(|| timing.on_interrupt(&scheduler));
            assert_eq!(sim.registers().pc, 0x1000 * (wake % 2 + 1));
            timing.sleep(&scheduler);
            assert!(sim.is_halted());
            // sleeping does not switch
            assert_eq!(scheduler.switch_count(), u32::from(wake) + 1);
        }
        assert_eq!(sim.halt_count(), 6);
        assert_eq!(timing.source.acks.get(), 6);
    }
}

// End of File
