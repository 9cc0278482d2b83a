//! Error types for kernel-userland communication

use core::ffi::c_int;

/// Implement common methods for kernel error enums.
///
/// Generates `as_c_int()` and `from_c_int()` for `#[repr(i32)]` error enums
/// that follow the kernel's negative-errno convention.
macro_rules! impl_kernel_error {
    ($ty:ty, fallback: $fallback:ident, variants: { $($val:literal => $variant:ident),* $(,)? }) => {
        impl $ty {
            /// Convert to C-style integer for syscall returns.
            #[inline]
            pub fn as_c_int(self) -> c_int {
                self as c_int
            }

            /// Convert from C-style integer.
            #[inline]
            pub fn from_c_int(val: c_int) -> Self {
                match val {
                    $($val => Self::$variant,)*
                    _ => Self::$fallback,
                }
            }
        }
    };
}

/// Process image loader result type
pub type ExecResult<T> = Result<T, ExecError>;

/// Errors returned by exec. The calling process keeps its old image.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecError {
    /// Path does not name an inode
    NoEntry = -2,
    /// Filesystem read failed or came up short
    IoError = -5,
    /// More than `MAXARG` arguments
    TooManyArgs = -7,
    /// Bad magic, malformed or overflowing section table, misaligned section
    NoExec = -8,
    /// Frame allocator exhausted while building the image
    NoMem = -12,
    /// Copy into the new image or out of the caller's memory failed
    Fault = -14,
    /// Argument vector or path is not usable
    InvalidArgument = -22,
    /// Empty or oversized path
    NameTooLong = -36,
}

impl_kernel_error!(ExecError, fallback: NoExec, variants: {
    -2 => NoEntry,
    -5 => IoError,
    -7 => TooManyArgs,
    -8 => NoExec,
    -12 => NoMem,
    -14 => Fault,
    -22 => InvalidArgument,
    -36 => NameTooLong,
});

/// File operation result type
pub type FileResult<T> = Result<T, FileError>;

/// Errors returned by file handle and descriptor operations
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileError {
    /// Handle is not open for writing
    NotWritable = -1,
    /// Path not found
    NoEntry = -2,
    /// Backing store reported a failure
    Io = -5,
    /// Descriptor is not open
    BadDescriptor = -9,
    /// Pipe has no data or no room and the other end is still open
    WouldBlock = -11,
    /// Handle is not open for reading
    NotReadable = -13,
    /// Bad user buffer
    Fault = -14,
    /// Directory opened for writing
    IsDirectory = -21,
    /// Unsupported flags or handle kind
    InvalidArgument = -22,
    /// File handle pool exhausted
    TableFull = -23,
    /// Per-process descriptor table full
    TooManyOpen = -24,
    /// Filesystem out of data blocks or beyond the maximum file size
    NoSpace = -28,
    /// Write to a pipe whose read end is closed
    BrokenPipe = -32,
}

impl_kernel_error!(FileError, fallback: Io, variants: {
    -1 => NotWritable,
    -2 => NoEntry,
    -5 => Io,
    -9 => BadDescriptor,
    -11 => WouldBlock,
    -13 => NotReadable,
    -14 => Fault,
    -21 => IsDirectory,
    -22 => InvalidArgument,
    -23 => TableFull,
    -24 => TooManyOpen,
    -28 => NoSpace,
    -32 => BrokenPipe,
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn c_codes_map_back_to_variants() {
        assert_eq!(ExecError::from_c_int(ExecError::TooManyArgs.as_c_int()), ExecError::TooManyArgs);
        assert_eq!(FileError::from_c_int(-32), FileError::BrokenPipe);
        assert_eq!(FileError::from_c_int(-999), FileError::Io);
        assert_eq!(ExecError::from_c_int(0), ExecError::NoExec);
    }
}
