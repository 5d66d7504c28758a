//! Integration tests for the buffer pool

mod allocation_tests;
mod concurrency_tests;
