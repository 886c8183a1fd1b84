//! Integration test binary: all integration tests live in one binary to keep
//! link times down.
//!
//! See the matklad pattern: <https://matklad.github.io/2021/02/27/delete-cargo-integration-tests.html>

// Allow unwrap/expect in test code
#![allow(clippy::unwrap_used, clippy::expect_used)]

mod helpers;

mod event_server;
mod reminders;
mod router_http;
mod services_http;
mod settings;
