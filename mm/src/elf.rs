//! 32-bit little-endian ELF header and program header records.

pub const ELF_MAGIC: u32 = 0x464C_457F;
pub const ELF_PROG_LOAD: u32 = 1;

#[inline]
fn le_u16(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

#[inline]
fn le_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

#[inline]
fn put_u16(bytes: &mut [u8], at: usize, value: u16) {
    bytes[at..at + 2].copy_from_slice(&value.to_le_bytes());
}

#[inline]
fn put_u32(bytes: &mut [u8], at: usize, value: u32) {
    bytes[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ElfHeader {
    pub magic: u32,
    pub ident: [u8; 12],
    pub kind: u16,
    pub machine: u16,
    pub version: u32,
    pub entry: u32,
    pub phoff: u32,
    pub shoff: u32,
    pub flags: u32,
    pub ehsize: u16,
    pub phentsize: u16,
    pub phnum: u16,
    pub shentsize: u16,
    pub shnum: u16,
    pub shstrndx: u16,
}

impl ElfHeader {
    pub const SIZE: usize = 52;

    pub fn parse(bytes: &[u8; Self::SIZE]) -> Self {
        let mut ident = [0u8; 12];
        ident.copy_from_slice(&bytes[4..16]);
        Self {
            magic: le_u32(bytes, 0),
            ident,
            kind: le_u16(bytes, 16),
            machine: le_u16(bytes, 18),
            version: le_u32(bytes, 20),
            entry: le_u32(bytes, 24),
            phoff: le_u32(bytes, 28),
            shoff: le_u32(bytes, 32),
            flags: le_u32(bytes, 36),
            ehsize: le_u16(bytes, 40),
            phentsize: le_u16(bytes, 42),
            phnum: le_u16(bytes, 44),
            shentsize: le_u16(bytes, 46),
            shnum: le_u16(bytes, 48),
            shstrndx: le_u16(bytes, 50),
        }
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        put_u32(&mut out, 0, self.magic);
        out[4..16].copy_from_slice(&self.ident);
        put_u16(&mut out, 16, self.kind);
        put_u16(&mut out, 18, self.machine);
        put_u32(&mut out, 20, self.version);
        put_u32(&mut out, 24, self.entry);
        put_u32(&mut out, 28, self.phoff);
        put_u32(&mut out, 32, self.shoff);
        put_u32(&mut out, 36, self.flags);
        put_u16(&mut out, 40, self.ehsize);
        put_u16(&mut out, 42, self.phentsize);
        put_u16(&mut out, 44, self.phnum);
        put_u16(&mut out, 46, self.shentsize);
        put_u16(&mut out, 48, self.shnum);
        put_u16(&mut out, 50, self.shstrndx);
        out
    }

    #[inline]
    pub fn has_valid_magic(&self) -> bool {
        self.magic == ELF_MAGIC
    }

    /// File offset of program header `index`, or `None` if it overflows.
    pub fn program_header_offset(&self, index: u16) -> Option<u32> {
        (index as u32)
            .checked_mul(ProgramHeader::SIZE as u32)
            .and_then(|rel| self.phoff.checked_add(rel))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgramHeader {
    pub kind: u32,
    pub off: u32,
    pub vaddr: u32,
    pub paddr: u32,
    pub filesz: u32,
    pub memsz: u32,
    pub flags: u32,
    pub align: u32,
}

impl ProgramHeader {
    pub const SIZE: usize = 32;

    pub fn parse(bytes: &[u8; Self::SIZE]) -> Self {
        Self {
            kind: le_u32(bytes, 0),
            off: le_u32(bytes, 4),
            vaddr: le_u32(bytes, 8),
            paddr: le_u32(bytes, 12),
            filesz: le_u32(bytes, 16),
            memsz: le_u32(bytes, 20),
            flags: le_u32(bytes, 24),
            align: le_u32(bytes, 28),
        }
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        put_u32(&mut out, 0, self.kind);
        put_u32(&mut out, 4, self.off);
        put_u32(&mut out, 8, self.vaddr);
        put_u32(&mut out, 12, self.paddr);
        put_u32(&mut out, 16, self.filesz);
        put_u32(&mut out, 20, self.memsz);
        put_u32(&mut out, 24, self.flags);
        put_u32(&mut out, 28, self.align);
        out
    }

    #[inline]
    pub fn is_load(&self) -> bool {
        self.kind == ELF_PROG_LOAD
    }

    /// One past the last byte of the segment in memory, or `None` if it wraps.
    #[inline]
    pub fn mem_end(&self) -> Option<u32> {
        self.vaddr.checked_add(self.memsz)
    }
}
