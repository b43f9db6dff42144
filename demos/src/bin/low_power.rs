//! Two tasks that sleep through the rest of their slot

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

#![no_std]
#![no_main]

use carousel::{
    LowPower, Scheduler, Stack, Task, TimingStrategy,
    port::cortex_m::{CortexM, SysTickSource},
};

use carousel_demos as _;

/// Slow, like a real-time wake-up source
const SYSTICKS_PER_WAKE: u32 = 0x00FF_FFFF;

static SCHEDULER: Scheduler<CortexM> = Scheduler::new(
    {
        static TASK_LIST: [Task<CortexM>; 2] = [
            Task::new(counter, {
                static STACK: Stack<512> = Stack::new();
                &STACK
            }),
            Task::new(blinker, {
                static STACK: Stack<512> = Stack::new();
                &STACK
            }),
        ];
        &TASK_LIST
    },
    CortexM::new(),
);

static TIMING: LowPower<SysTickSource> = LowPower::new(SysTickSource);

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
    syst.set_reload(SYSTICKS_PER_WAKE);
    syst.set_clock_source(cortex_m::peripheral::syst::SystClkSource::Core);
    syst.clear_current();
    syst.enable_counter();
    syst.enable_interrupt();

    loop {
        cortex_m::asm::wfi();
    }
}

/// Counts one step per slot
fn counter() -> ! {
    let mut count: u32 = 0;
    loop {
        count = count.wrapping_add(1);
        defmt::info!("Count {=u32}", count);
        TIMING.sleep(&SCHEDULER);
    }
}

/// Toggles a flag per slot, and sometimes gives its slot away entirely
fn blinker() -> ! {
    let mut on = false;
    loop {
        on = !on;
        defmt::info!("Blink {=bool}", on);
        if on {
            TIMING.sleep(&SCHEDULER);
        } else {
            TIMING.yield_now(&SCHEDULER);
        }
    }
}

// End of File
