//! Test data generation

mod fixtures;

pub use fixtures::{TestDataFactory, TestScenario};
