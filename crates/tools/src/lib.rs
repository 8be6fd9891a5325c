//! Tool functions for the MAGPIE agents.
//!
//! [`ToolCall`] is the closed set of operations an agent may request,
//! [`DatabricksToolbox`] runs them, either on the caller's runtime or through
//! the blocking bridge in [`bridge`], and [`surface`] decides which agent sees
//! which tools.

pub mod bridge;
pub mod call;
pub mod surface;
pub mod toolbox;

pub use bridge::run_blocking;
pub use call::{ToolCall, ToolSpec};
pub use surface::{catalog_for, tools_for};
pub use toolbox::DatabricksToolbox;
