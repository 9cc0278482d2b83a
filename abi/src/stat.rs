//! File metadata as returned by `fstat`.

pub const T_DIR: i16 = 1;
pub const T_FILE: i16 = 2;
pub const T_DEV: i16 = 3;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileStat {
    /// One of `T_DIR`, `T_FILE`, `T_DEV`
    pub kind: i16,
    /// Device holding the inode
    pub dev: i32,
    /// Inode number
    pub ino: u32,
    /// Links to the inode
    pub nlink: i16,
    /// Size in bytes
    pub size: u32,
}

impl FileStat {
    pub const SIZE: usize = 20;

    /// Little-endian image for copying into a user buffer.
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[0..2].copy_from_slice(&self.kind.to_le_bytes());
        out[4..8].copy_from_slice(&self.dev.to_le_bytes());
        out[8..12].copy_from_slice(&self.ino.to_le_bytes());
        out[12..14].copy_from_slice(&self.nlink.to_le_bytes());
        out[16..20].copy_from_slice(&self.size.to_le_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8; Self::SIZE]) -> Self {
        Self {
            kind: i16::from_le_bytes([bytes[0], bytes[1]]),
            dev: i32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
            ino: u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]),
            nlink: i16::from_le_bytes([bytes[12], bytes[13]]),
            size: u32::from_le_bytes([bytes[16], bytes[17], bytes[18], bytes[19]]),
        }
    }
}
