//! Integration test suite entry point.

mod fixture;
mod generator_tests;
mod install_tests;
mod kernel_tests;
mod pipeline_tests;
