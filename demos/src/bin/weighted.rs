//! Two tasks with unequal shares of the processor
//!
//! The LM3S6965 timers are left alone here. Instead SysTick runs fast and
//! counts, and a match against a compare value in RAM stands in for a
//! compare-match timer.

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

#![no_std]
#![no_main]

use core::sync::atomic::{AtomicU32, Ordering};

use carousel::{
    CompareTimer, InterruptSource, Scheduler, Stack, Task, TimingStrategy, Weighted,
    port::cortex_m::{CortexM, SysTickSource},
};

use carousel_demos as _;

const SYSTICKS_PER_COUNT: u32 = 10_000;

static SCHEDULER: Scheduler<CortexM> = Scheduler::new(
    {
        static TASK_LIST: [Task<CortexM>; 2] = [
            Task::weighted(
                busy,
                {
                    static STACK: Stack<1024> = Stack::new();
                    &STACK
                },
                200,
            ),
            Task::weighted(
                polite,
                {
                    static STACK: Stack<1024> = Stack::new();
                    &STACK
                },
                1000,
            ),
        ];
        &TASK_LIST
    },
    CortexM::new(),
);

/// A counter bumped by SysTick, with a compare register
struct SoftCompare {
    counter: AtomicU32,
    compare: AtomicU32,
}

impl SoftCompare {
    /// Count one tick, returning true on a match
    fn tick(&self) -> bool {
        let now = self.counter.load(Ordering::Relaxed).wrapping_add(1);
        self.counter.store(now, Ordering::Relaxed);
        now == self.compare.load(Ordering::Relaxed)
    }
}

impl InterruptSource for SoftCompare {
    fn acknowledge(&self) {
        SysTickSource.acknowledge();
    }
}

impl CompareTimer for SoftCompare {
    fn compare(&self) -> u32 {
        self.compare.load(Ordering::Relaxed)
    }

    fn set_compare(&self, value: u32) {
        self.compare.store(value, Ordering::Relaxed);
    }
}

static TIMING: Weighted<SoftCompare> = Weighted::new(SoftCompare {
    counter: AtomicU32::new(0),
    compare: AtomicU32::new(1),
});

carousel::switching_handler!(SysTick, {
    if TIMING.timer().tick() {
        TIMING.on_interrupt(&SCHEDULER);
    } else {
        SysTickSource.acknowledge();
    }
});

defmt::timestamp!(
    "{=u32:010} {}",
    SCHEDULER.switch_count(),
    SCHEDULER.current_task_id()
);

#[cortex_m_rt::entry]
fn main() -> ! {
    let mut cp = cortex_m::Peripherals::take().unwrap();
    defmt::info!("Hello!");

    SCHEDULER.register_all();
    SCHEDULER.start();

    carousel_demos::lowest_priority_for_switching(&mut cp.SCB);
    let mut syst = cp.SYST;
    syst.set_reload(SYSTICKS_PER_COUNT);
    syst.set_clock_source(cortex_m::peripheral::syst::SystClkSource::Core);
    syst.clear_current();
    syst.enable_counter();
    syst.enable_interrupt();

    loop {
        cortex_m::asm::wfi();
    }
}

/// Runs flat out for its whole quantum
fn busy() -> ! {
    let mut spins: u32 = 0;
    loop {
        spins = spins.wrapping_add(1);
        if spins % 1_000_000 == 0 {
            defmt::info!("Busy! {=u32}", spins);
        }
    }
}

/// Does a little work, then hands the rest of its quantum on
fn polite() -> ! {
    let mut rounds: u32 = 0;
    loop {
        rounds = rounds.wrapping_add(1);
        defmt::info!("Polite round {=u32}, yielding", rounds);
        TIMING.yield_now(&SCHEDULER);
    }
}

// End of File
