//! Test fixtures with setup on construction and teardown on drop.

use pebble_abi::param::PAGE_SIZE;
use pebble_core::{KernelConfig, KernelContext, Process};
use pebble_lib::{klog_info, klog_warn};

use crate::image::ElfImage;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FixtureKind {
    /// Nothing to set up
    None,
    /// A kernel context and one process running `/init`
    Kernel,
}

/// A test environment that is set up by `setup` and torn down by `Drop`.
pub trait TestFixture: Sized {
    const KIND: FixtureKind;

    fn setup() -> Result<Self, &'static str>;

    fn teardown(&mut self);
}

pub struct NoFixture;

impl TestFixture for NoFixture {
    const KIND: FixtureKind = FixtureKind::None;

    fn setup() -> Result<Self, &'static str> {
        Ok(Self)
    }

    fn teardown(&mut self) {}
}

impl Drop for NoFixture {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Path of the program every fixture process starts from.
pub const INIT_PATH: &[u8] = b"/init";

/// A kernel with one process that has exec'd a small `/init` image.
pub struct KernelFixture {
    pub kernel: KernelContext,
    pub proc: Process,
}

impl KernelFixture {
    pub fn with_config(config: KernelConfig) -> Result<Self, &'static str> {
        let kernel = KernelContext::new(config);
        let init = ElfImage::new(0x10)
            .segment(0, &[0x90; 16], 2 * PAGE_SIZE)
            .build();
        kernel
            .fs
            .install(INIT_PATH, &init)
            .map_err(|_| "fixture: cannot install /init")?;
        let mut proc = kernel
            .new_process(b"fixture")
            .map_err(|_| "fixture: no frames for a process")?;
        pebble_core::do_exec(&kernel, &mut proc, INIT_PATH, &[b"init"])
            .map_err(|_| "fixture: exec /init failed")?;
        klog_info!("FIXTURE: kernel ready, pid {}", proc.pid);
        Ok(Self { kernel, proc })
    }
}

impl TestFixture for KernelFixture {
    const KIND: FixtureKind = FixtureKind::Kernel;

    fn setup() -> Result<Self, &'static str> {
        Self::with_config(KernelConfig::default())
    }

    fn teardown(&mut self) {
        self.proc.files.close_all();
        if let Err(why) = self.kernel.files.audit() {
            klog_warn!("FIXTURE: file table inconsistent at teardown: {}", why);
        }
    }
}

impl Drop for KernelFixture {
    fn drop(&mut self) {
        self.teardown();
    }
}
