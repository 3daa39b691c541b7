// SPDX-License-Identifier: GPL-3.0-only

//! Deterministic collaborators for driving the device tree without a kernel
//!
//! - [`FakeCallouts`]: records every callout/helper, can post events mid-wait
//! - [`FixtureEnumerator`]: builds a fixed device tree and counts probes
//! - [`RecordingHandler`]: devd handler that claims chosen event kinds
//! - [`fixtures`]: ready-made `Hal`/`Daemon` instances

pub mod callouts;
pub mod enumerator;
pub mod fixtures;
pub mod handler;

pub use callouts::{Call, FakeCallouts};
pub use enumerator::{FixtureDevice, FixtureEnumerator};
pub use handler::RecordingHandler;
