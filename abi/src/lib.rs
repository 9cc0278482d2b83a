//! Pebble Kernel-Userland ABI Types
//!
//! This crate provides the canonical definitions for all types shared between
//! the kernel and userland: tunable kernel parameters, address newtypes, the
//! error codes returned from system calls, open flags and the `stat` record.
//!
//! All record types in this crate are `#[repr(C)]` for ABI stability.

#![cfg_attr(not(test), no_std)]
#![forbid(unsafe_code)]

pub mod addr;
pub mod error;
pub mod fcntl;
pub mod param;
pub mod stat;

pub use addr::*;
pub use error::*;
pub use fcntl::*;
pub use stat::*;
