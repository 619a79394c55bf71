//! Common code shared between the `coral_cam` server and its browser front end.
pub mod protocol;

/// Error type.
pub type Error = Box<dyn std::error::Error>;
