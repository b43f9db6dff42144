//! Armv7-M and Armv8-M Mainline EABI port
//!
//! Tasks run in Thread mode on the Process Stack (PSP). The kernel runs in
//! Handler mode on the Main Stack, so reading and installing a task context
//! is just reading and writing PSP.
//!
//! On exception entry the hardware pushes xPSR, PC, LR, R12, R3, R2, R1 and
//! R0 to the PSP. A handler made with [`switching_handler!`] then pushes R4
//! to R11 (which are as the running task left them), runs your code, and pops
//! R4 to R11 from whichever PSP is installed by then. Exiting from the
//! handler makes the hardware pop the rest, and the new task resumes.
//!
//! A voluntary yield executes `svc`, so the hardware pushes the same frame it
//! would for a timer, and the `SVCall` handler uses the same trampoline.
//!
//! The context-switching handlers must all run at the same, lowest,
//! exception priority. That is the start-up code's job.

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use cortex_m::register::psp;

use crate::{
    InterruptSource, Port,
    frame::{Discipline, FrameBuilder},
};

/// Build an exception handler that can switch tasks
///
/// ```rust,ignore
/// carousel::switching_handler!(SysTick, TIMING.on_interrupt(&SCHEDULER));
/// ```
///
/// The body runs with interrupts disabled.
#[macro_export]
macro_rules! switching_handler {
    ($vector:ident, $body:expr) => {
        const _: () = {
            extern "C" fn body(_frame: *const usize) {
                $crate::port::cortex_m::kernel_entry(|| {
                    $body;
                });
            }
            $crate::switching_handler!(@trampoline $vector, body);
        };
    };
    (@trampoline $vector:ident, $body:path) => {
        /// Stacks R4 to R11 on the PSP, calls the body with the address of
        /// the hardware-stacked frame (or zero when no task has run yet),
        /// then unstacks R4 to R11 from the PSP the body left installed. If
        /// PSP is still zero it returns to `main` as it was entered.
        ///
        /// It is a naked function because we do not want the compiler pushing
        /// anything else to the stack and re-using registers containing
        /// precious task state.
        #[unsafe(no_mangle)]
        #[unsafe(naked)]
        unsafe extern "C" fn $vector() {
            core::arch::naked_asm!(r#"
            // keep EXC_RETURN (r0 is only there for alignment)
            push    {{ r0, lr }}

            // r0 = the interrupted task's stack pointer
            mrs     r0, psp

            // a zero PSP means we came from `main`, with nothing to stack
            cbz     r0, 1f

            // Push the additional state
            stmdb   r0!, {{ r4 - r11 }}
            msr     psp, r0

            // r0 = the hardware-stacked frame
            add     r0, r0, #32

            1:
            bl      {body}
            pop     {{ r0, lr }}

            // still no task, so go back the way we came
            mrs     r0, psp
            cbz     r0, 2f

            // Pop the additional state for whoever is installed now
            ldmia   r0!, {{ r4 - r11 }}
            msr     psp, r0

            // return to thread mode on the process stack
            mov     lr, #0xFFFFFFFD

            2:
            bx      lr
            "#,
            body = sym $body,
            );
        }
    };
}

crate::switching_handler!(@trampoline SVCall, svc_body);

/// Runs the switch a task asked for in [`CortexM::suspend`]
extern "C" fn svc_body(frame: *const usize) {
    if frame.is_null() {
        // `svc` from `main`, before any task ran
        return;
    }
    // SAFETY: stacked R0 is the address of the `&mut dyn FnMut()` that
    // `CortexM::suspend` put on the yielding task's stack. That stack is not
    // touched again until this task resumes, which is after we return.
    let switch = unsafe { &mut *(*frame as *mut &mut dyn FnMut()) };
    kernel_entry(|| switch());
}

/// Run `f` as the body of a switching handler
#[doc(hidden)]
pub fn kernel_entry<F: FnOnce()>(f: F) {
    critical_section::with(|_cs| f());
}

/// Stand-in return address for a task entry function
///
/// Task entry functions never return, but the frame needs some LR.
extern "C" fn task_exit() -> ! {
    panic!("Task returned");
}

/// An Armv7-M processor
pub struct CortexM {
    _private: (),
}

impl CortexM {
    /// The value of the Processor Status Register when a task starts
    ///
    /// The only bit we need to set is the T bit, to indicate that the
    /// task should run in Thumb mode (the only supported mode on Armv7-M)
    const DEFAULT_XPSR: u32 = 1 << 24;

    /// Hardware-stacked words plus R4 to R11
    const FRAME_WORDS: usize = 16;

    /// Get a handle to the processor
    ///
    /// You should only make one, for your one [`Scheduler`](crate::Scheduler).
    pub const fn new() -> CortexM {
        CortexM { _private: () }
    }
}

impl Default for CortexM {
    fn default() -> Self {
        CortexM::new()
    }
}

impl Port for CortexM {
    type Entry = fn() -> !;

    const DISCIPLINE: Discipline = Discipline::FullDescending;

    /// AAPCS wants 8-byte aligned stacks at public interfaces
    const STACK_ALIGN: usize = 8;

    /// Make space for the sixteen registers in the task state, plus some
    /// headroom
    const MIN_STACK: usize = (4 * Self::FRAME_WORDS) + 8;

    fn build_frame(frame: &mut FrameBuilder<'_>, entry: fn() -> !) {
        // Standard Arm exception frame

        // xPSR
        frame.push_word(Self::DEFAULT_XPSR);
        // PC, which must be halfword aligned (the Thumb bit lives in xPSR)
        frame.push_word((entry as usize as u32) & !1);
        // LR
        frame.push_word(task_exit as usize as u32);
        // R12, R3, R2, R1, R0
        for _ in 0..5 {
            frame.push_word(0);
        }

        // R11 to R4, as the trampoline pops them
        for _ in 0..8 {
            frame.push_word(0);
        }
    }

    fn read_context(&self) -> usize {
        psp::read() as usize
    }

    unsafe fn install_context(&self, sp: usize) {
        // SAFETY: the caller hands us a frame on a stack no-one else uses
        #[allow(unused_unsafe)]
        unsafe {
            psp::write(sp as u32)
        }
    }

    fn suspend(&self, switch: &mut dyn FnMut()) {
        let mut switch = switch;
        let slot = &mut switch as *mut &mut dyn FnMut() as usize;
        // SAFETY: `SVCall` reads `slot` back from the stacked R0 and calls it
        // before this task can run again, so the borrow is still live. All
        // registers come back from the frame when we resume.
        unsafe {
            core::arch::asm!("svc 0", in("r0") slot);
        }
    }

    fn halt(&self) {
        cortex_m::asm::wfi();
    }

    fn prepare(&self) {
        // Tells the trampoline there is no task to stack on the first switch
        #[allow(unused_unsafe)]
        unsafe {
            psp::write(0)
        }
    }
}

/// The SysTick timer as a tick or wake-up source
///
/// You set the reload value and enable the counter and its interrupt.
pub struct SysTickSource;

impl InterruptSource for SysTickSource {
    fn acknowledge(&self) {
        // SAFETY: reading CSR has no side effect besides clearing COUNTFLAG
        let _ = unsafe { (*cortex_m::peripheral::SYST::PTR).csr.read() };
    }
}

// End of File
