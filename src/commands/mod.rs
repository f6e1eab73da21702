//! CLI command implementations
//!
//! Commands are generic over [`BootCountDevice`](bootcount_core::BootCountDevice)
//! so they run the same against a real MTD partition or an emulated one.

mod resetbc;
mod show;

pub use resetbc::run_resetbc;
pub use show::run_show;
