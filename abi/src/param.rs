//! Kernel-wide tunable parameters.
//!
//! Everything here is a compile-time constant shared by the memory manager,
//! the filesystem and the process loader. Runtime sizing (frame budget, slab
//! pool bounds) is derived from these defaults by `KernelConfig`.

/// Size of a physical frame and of a user page.
pub const PAGE_SIZE: u32 = 4096;

/// Maximum number of arguments accepted by exec.
pub const MAXARG: usize = 32;

/// Maximum path length accepted from user space.
pub const MAXPATH: usize = 128;

/// Maximum number of log blocks a single filesystem operation may write.
pub const MAXOPBLOCKS: u32 = 10;

/// Filesystem block size in bytes.
pub const BSIZE: u32 = 512;

/// Maximum file size in blocks (direct + singly indirect).
pub const MAXFILE: u32 = 12 + (BSIZE / 4);

/// Open files per process.
pub const NOFILE: usize = 16;

/// File handle objects per slab.
pub const SLAB_SIZE: usize = 32;

/// Slabs reserved for the file table at boot. The default pool never holds
/// more than this many.
pub const NUM_SLABS: usize = 4;

/// Capacity of the process name field, including the terminating NUL.
pub const PROC_NAME_LEN: usize = 16;

/// First address above the user image; user mappings must stay below it.
pub const USER_TOP: u32 = 0x8000_0000;

/// Pipe ring buffer capacity.
pub const PIPESIZE: usize = 512;

/// Return address planted below `argc` on a fresh user stack. Returning from
/// the entry point jumps here and faults.
pub const FAKE_RETURN_PC: u32 = 0xffff_ffff;

/// Size of a user machine word.
pub const USER_WORD: u32 = 4;

/// Largest inode write that fits in one transaction: one inode block, one
/// indirect block, two blocks of slop for unaligned writes, and every data
/// block may also dirty an allocation bitmap block.
pub const MAX_WRITE_CHUNK: u32 = ((MAXOPBLOCKS - 1 - 1 - 2) / 2) * BSIZE;

/// Frames handed to the page allocator by the default configuration.
pub const DEFAULT_FRAME_BUDGET: u32 = 1024;

/// Data blocks available to the default in-memory filesystem.
pub const DEFAULT_FS_BLOCKS: u32 = 4096;
