//! Workspace facade crate.
//!
//! Host applications can depend on `cpc-workspace` and enable the documented
//! features (e.g. `desktop-shims` for reqwest/keyring-backed defaults)
//! without wiring each workspace crate individually.

pub use core_runtime;
pub use core_session;
