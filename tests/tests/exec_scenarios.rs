use pebble_abi::addr::VirtAddr;
use pebble_abi::error::ExecError;
use pebble_abi::param::{FAKE_RETURN_PC, PAGE_SIZE};
use pebble_core::{KernelConfig, do_exec};
use pebble_mm::SlabPoolConfig;
use pebble_tests::{ElfImage, KernelFixture, TestFixture, captured_log, install_log_capture};

fn read_word(fx: &KernelFixture, va: u32) -> u32 {
    fx.proc.space.read_u32(VirtAddr::new(va)).unwrap()
}

#[test]
fn shell_execs_program_with_arguments() {
    let mut fx = KernelFixture::setup().unwrap();
    let text: Vec<u8> = (0..200u8).collect();
    let image = ElfImage::new(0x80)
        .segment(0, &text, PAGE_SIZE + 0x20)
        .segment(2 * PAGE_SIZE, &[0xAA; 8], 0x40)
        .build();
    fx.kernel.fs.install(b"/bin/cat", &image).unwrap();

    do_exec(&fx.kernel, &mut fx.proc, b"/bin/cat", &[b"cat", b"README", b"-n"]).unwrap();

    assert_eq!(fx.proc.tf.eip, 0x80);
    assert_eq!(fx.proc.size, 5 * PAGE_SIZE);
    assert_eq!(fx.proc.name(), b"cat");

    let mut loaded = vec![0u8; 200];
    fx.proc.space.copy_in(VirtAddr::new(0), &mut loaded).unwrap();
    assert_eq!(loaded, text);

    let sp = fx.proc.tf.esp;
    assert_eq!(read_word(&fx, sp), FAKE_RETURN_PC);
    assert_eq!(read_word(&fx, sp + 4), 3);
    let argv = read_word(&fx, sp + 8);
    let args: Vec<Vec<u8>> = (0..3)
        .map(|i| {
            let ptr = read_word(&fx, argv + 4 * i);
            fx.proc.space.copy_in_str(VirtAddr::new(ptr), 64).unwrap()
        })
        .collect();
    assert_eq!(args, vec![b"cat".to_vec(), b"README".to_vec(), b"-n".to_vec()]);
    assert_eq!(read_word(&fx, argv + 12), 0);
}

#[test]
fn failed_exec_keeps_running_image() {
    install_log_capture();
    let mut fx = KernelFixture::setup().unwrap();
    let bad = ElfImage::new(0).magic(0x1234_5678).segment(0, &[1; 4], 4).build();
    fx.kernel.fs.install(b"/bin/broken", &bad).unwrap();

    let eip = fx.proc.tf.eip;
    let size = fx.proc.size;
    let root = fx.proc.space.root();
    assert_eq!(
        do_exec(&fx.kernel, &mut fx.proc, b"/bin/broken", &[b"broken"]),
        Err(ExecError::NoExec)
    );
    assert_eq!(fx.proc.tf.eip, eip);
    assert_eq!(fx.proc.size, size);
    assert_eq!(fx.proc.space.root(), root);
    assert_eq!(fx.proc.name(), b"init");
    assert_eq!(fx.kernel.fs.journal().stats().outstanding, 0);
    assert!(captured_log().contains("failed to load /bin/broken"));
}

#[test]
fn exec_under_memory_pressure_fails_cleanly() {
    let config = KernelConfig {
        frame_budget: 12,
        file_slabs: SlabPoolConfig {
            initial_slabs: 0,
            max_slabs: 1,
        },
        ..Default::default()
    };
    let mut fx = KernelFixture::with_config(config).unwrap();
    let huge = ElfImage::new(0).segment(0, &[], 16 * PAGE_SIZE).build();
    fx.kernel.fs.install(b"/huge", &huge).unwrap();
    let frames = fx.kernel.frames.stats();

    assert_eq!(
        do_exec(&fx.kernel, &mut fx.proc, b"/huge", &[]),
        Err(ExecError::NoMem)
    );
    assert_eq!(fx.kernel.frames.stats(), frames);

    do_exec(&fx.kernel, &mut fx.proc, b"/init", &[b"init"]).unwrap();
    assert_eq!(fx.kernel.frames.stats(), frames);
}

#[test]
fn exec_keeps_open_descriptors() {
    let mut fx = KernelFixture::setup().unwrap();
    let (r, w) = pebble_fs::pipe_alloc(&fx.kernel.files).unwrap();
    fx.proc.files.alloc(r).unwrap();
    fx.proc.files.alloc(w).unwrap();

    do_exec(&fx.kernel, &mut fx.proc, b"/init", &[b"init", b"again"]).unwrap();
    assert_eq!(fx.proc.files.open_count(), 2);
    assert_eq!(fx.proc.files.get(1).unwrap().write(b"ok").unwrap(), 2);
}
