//! Three tasks sharing the processor one SysTick at a time

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

#![no_std]
#![no_main]

use carousel::{
    FixedTick, Scheduler, Stack, Task, TimingStrategy,
    port::cortex_m::{CortexM, SysTickSource},
};

use carousel_demos as _;

const SYSTICKS_PER_SCHED_TICK: u32 = 100_000;

static SCHEDULER: Scheduler<CortexM> = Scheduler::new(
    {
        static TASK_LIST: [Task<CortexM>; 3] = [
            Task::new(rabbits, {
                static STACK: Stack<1024> = Stack::new();
                &STACK
            }),
            Task::new(hamsters, {
                static STACK: Stack<1024> = Stack::new();
                &STACK
            }),
            Task::new(cats, {
                static STACK: Stack<1024> = Stack::new();
                &STACK
            }),
        ];
        &TASK_LIST
    },
    CortexM::new(),
);

static TIMING: FixedTick<SysTickSource> = FixedTick::new(SysTickSource);

carousel::switching_handler!(SysTick, TIMING.on_interrupt(&SCHEDULER));

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
    syst.set_reload(SYSTICKS_PER_SCHED_TICK);
    syst.set_clock_source(cortex_m::peripheral::syst::SystClkSource::Core);
    syst.clear_current();
    syst.enable_counter();
    syst.enable_interrupt();

    // We never come back here after the first tick
    loop {
        cortex_m::asm::wfi();
    }
}

/// Our 'rabbit' task
fn rabbits() -> ! {
    let mut hops: u32 = 0;
    loop {
        hops = hops.wrapping_add(1);
        if hops % 1_000_000 == 0 {
            defmt::info!("Rabbit! {=u32}", hops);
        }
    }
}

/// Our 'hamster' task
fn hamsters() -> ! {
    let mut laps: u32 = 0;
    loop {
        laps = laps.wrapping_add(1);
        if laps % 1_000_000 == 0 {
            defmt::info!("Hamster! {=u32}", laps);
        }
    }
}

/// Our 'cat' task
fn cats() -> ! {
    let mut naps: u32 = 0;
    loop {
        naps = naps.wrapping_add(1);
        if naps % 1_000_000 == 0 {
            defmt::info!("Cat! {=u32}", naps);
        }
    }
}

// End of File
