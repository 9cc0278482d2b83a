#![cfg_attr(not(test), no_std)]

pub mod alignment;
pub mod klog;
pub mod service_cell;
pub mod string;

pub use alignment::{align_down_u32, align_up_u32, checked_align_up_u32};
pub use klog::{
    KlogBackend, KlogLevel, klog_get_level, klog_is_enabled, klog_register_backend,
    klog_set_level,
};
pub use service_cell::ServiceCell;
pub use string::{c_str_len, copy_truncated, last_path_component};
