use pebble_mm::elf::{ELF_MAGIC, ELF_PROG_LOAD, ElfHeader, ProgramHeader};

struct Segment {
    kind: u32,
    vaddr: u32,
    data: Vec<u8>,
    memsz: u32,
}

/// Builder for small ELF32 executables.
///
/// Program headers follow the ELF header directly and segment contents follow
/// the program headers in the order they were added.
pub struct ElfImage {
    entry: u32,
    magic: u32,
    segments: Vec<Segment>,
}

impl ElfImage {
    pub fn new(entry: u32) -> Self {
        Self {
            entry,
            magic: ELF_MAGIC,
            segments: Vec::new(),
        }
    }

    /// A loadable segment at `vaddr` with `data` followed by zeros up to `memsz`.
    pub fn segment(self, vaddr: u32, data: &[u8], memsz: u32) -> Self {
        self.raw_segment(ELF_PROG_LOAD, vaddr, data, memsz)
    }

    pub fn raw_segment(mut self, kind: u32, vaddr: u32, data: &[u8], memsz: u32) -> Self {
        self.segments.push(Segment {
            kind,
            vaddr,
            data: data.to_vec(),
            memsz,
        });
        self
    }

    pub fn magic(mut self, magic: u32) -> Self {
        self.magic = magic;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let phoff = ElfHeader::SIZE as u32;
        let mut data_off = phoff + (self.segments.len() * ProgramHeader::SIZE) as u32;
        let header = ElfHeader {
            magic: self.magic,
            entry: self.entry,
            phoff,
            phnum: self.segments.len() as u16,
            ehsize: ElfHeader::SIZE as u16,
            phentsize: ProgramHeader::SIZE as u16,
            ..Default::default()
        };

        let mut out = header.to_bytes().to_vec();
        let mut payload = Vec::new();
        for seg in &self.segments {
            let ph = ProgramHeader {
                kind: seg.kind,
                off: data_off,
                vaddr: seg.vaddr,
                filesz: seg.data.len() as u32,
                memsz: seg.memsz,
                ..Default::default()
            };
            out.extend_from_slice(&ph.to_bytes());
            payload.extend_from_slice(&seg.data);
            data_off += seg.data.len() as u32;
        }
        out.extend_from_slice(&payload);
        out
    }
}
