pub mod audit;
pub mod backend;
pub mod checksum;
pub mod classify;
pub mod config;
pub mod lifecycle;
pub mod lock;
#[cfg(test)]
pub mod memory_backend;
pub mod paths;
pub mod pool;
pub mod state;
pub mod stub;
pub mod util;
pub mod warn;
