//! Route handlers grouped by concern.

pub mod admin;
pub mod screen;
pub mod system;
