// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subscriber initialization. The facade crate is the only place in the
//! workspace that installs a `tracing` subscriber; every library crate only
//! emits through the `tracing` macros.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install a stderr `tracing` subscriber filtered by `RUST_LOG` (falling
/// back to `info` when unset). Call once, near process entry; calling it
/// more than once is a caller error (the underlying `set_global_default`
/// fails silently past the first call).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry().with(filter).with(fmt::layer()).try_init();
}
