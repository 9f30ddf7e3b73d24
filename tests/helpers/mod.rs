// Shared fixtures for unit and integration tests
//
// Each test target pulls this in with:
//   #[path = "../helpers/mod.rs"]
//   mod helpers;

#![allow(dead_code)]

pub mod test_data;

pub use test_data::*;
