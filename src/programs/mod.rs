//! Built-in programs.
//!
//! Each program is a plain [`Program`] value; the bootstrap image
//! installs them as executable nodes under `/sys/bin`, and anything
//! else installed through the same contract is indistinguishable from
//! them. Their logic is deliberately small — they exist to populate the
//! image and exercise the scheduler.

pub mod core;
pub mod file;
pub mod text;

use crate::kernel::Program;

/// Name/program pairs for the default image.
pub fn builtins() -> Vec<(&'static str, Program)> {
    vec![
        ("echo", core::echo()),
        ("printf", core::printf()),
        ("env", core::env()),
        ("cd", core::cd()),
        ("cat", file::cat()),
        ("ls", file::ls()),
        ("mkdir", file::mkdir()),
        ("rm", file::rm()),
        ("cp", file::cp()),
        ("grep", text::grep()),
    ]
}
