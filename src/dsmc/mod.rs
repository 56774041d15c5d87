pub mod client;
pub mod report;

pub use client::{Dsmc, resolve_dsmc_bin};
