//! Adapter integration tests.

#[path = "adapters/local_test.rs"]
mod local_test;
#[cfg(feature = "sendgrid")]
#[path = "adapters/sendgrid_test.rs"]
mod sendgrid_test;
