//! Local maintenance tasks the router can run without any network service.

pub mod files;
pub mod system_status;
