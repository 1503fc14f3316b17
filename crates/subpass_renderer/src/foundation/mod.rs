//! Foundation utilities shared by the renderer: logging setup and math types

pub mod logging;
pub mod math;
