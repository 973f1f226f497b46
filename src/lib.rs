//! agent-notify: local notification daemon that plays an alert sound and
//! speaks agent messages aloud.

pub mod catalog;
pub mod client;
pub mod config;
pub mod console;
pub mod control;
pub mod dispatcher;
pub mod mcp_server;
pub mod playback;
pub mod server;
