//! Property-based tests: containment holds and scanners never panic.

mod analyzer_tests;
mod sandbox_tests;
