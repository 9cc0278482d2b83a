//! Shared fixtures for cross-crate scenario tests.
//!
//! The scenarios themselves live under `tests/`. Each one builds a
//! [`KernelFixture`], installs images made with [`ElfImage`] and drives exec
//! and the file table through the public crate interfaces.

pub mod fixture;
pub mod image;
pub mod log_capture;

pub use fixture::{FixtureKind, INIT_PATH, KernelFixture, NoFixture, TestFixture};
pub use image::ElfImage;
pub use log_capture::{captured_log, install_log_capture};
