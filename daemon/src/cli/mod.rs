//! Terminal-facing commands.

pub mod console;
