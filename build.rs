//! Build script for carousel

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

/// Entry point to the build script
///
/// Emits the `arm_abi` and `arm_architecture` cfgs the Cortex-M port keys on.
fn main() {
    arm_targets::process();
}

// End of File
