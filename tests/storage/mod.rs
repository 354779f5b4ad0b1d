//! Shared storage integration tests.
//!
//! Tests the SagaStore interface against all implementations.
//! Each implementation module imports these test functions and runs them.

pub mod saga_store_tests;
