// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! mvm-adapters: the VM process supervisor.
//!
//! Turns a task directory into a running VM: invokes the external image
//! builder, allocates a pseudoterminal pair, streams the serial console to
//! `serial.log`, and detects exit. Does not interpret guest state.

pub mod builder;
pub mod slot_env;
pub mod supervisor;

pub use builder::{BuildArgs, BuildError, ExternalVmBuilder, VmBuilder};
pub use slot_env::{ensure_slot_environment, SlotEnv, SlotEnvError, NIX_STORE_IMAGE_SIZE_BYTES};
pub use supervisor::{ExitCallback, PtyVmSupervisor, SpawnedVm, SupervisorError, VmSupervisor};

#[cfg(any(test, feature = "test-support"))]
pub use supervisor::fake::FakeVmProcess;

#[cfg(any(test, feature = "test-support"))]
pub use builder::fake::{FailingVmBuilder, FakeVmBuilder};
