//! Integration test aggregator.

mod circuit_breaker_tests;
mod engine_tests;
mod matching_tests;
mod position_tests;
mod risk_service_tests;
