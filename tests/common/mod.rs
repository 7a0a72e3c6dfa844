//! Common test utilities for mp3bot integration tests

#[allow(dead_code)]
pub mod fixtures;
#[allow(dead_code)]
pub mod telegram;

#[allow(unused_imports)]
pub use fixtures::*;
#[allow(unused_imports)]
pub use telegram::*;
