//! Common panic/fault handlers for the demos

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

#![no_std]

use defmt_semihosting as _;

/// Called when a panic occurs.
///
/// Logs the panic to defmt and then crashes the CPU.
#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    defmt::println!("PANIC: {}", defmt::Debug2Format(info));
    cortex_m::asm::udf();
}

/// Called when a HardFault occurs.
///
/// Logs the fault to defmt and then crashes the CPU.
#[cortex_m_rt::exception]
unsafe fn HardFault(info: &cortex_m_rt::ExceptionFrame) -> ! {
    defmt::println!("FAULT: {}", defmt::Debug2Format(info));
    cortex_m::asm::udf();
}

/// Put SVCall and SysTick at the lowest priority, so task switches never nest
pub fn lowest_priority_for_switching(scb: &mut cortex_m::peripheral::SCB) {
    use cortex_m::peripheral::scb::SystemHandler;
    // SAFETY: no handler relies on these priorities for mutual exclusion
    // with code outside the scheduler
    unsafe {
        scb.set_priority(SystemHandler::SVCall, 0xFF);
        scb.set_priority(SystemHandler::SysTick, 0xFF);
    }
}

// End of File
