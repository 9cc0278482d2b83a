use std::sync::Arc;
use std::thread;

use pebble_abi::error::FileError;
use pebble_abi::fcntl::OpenFlags;
use pebble_abi::param::{MAX_WRITE_CHUNK, NUM_SLABS, SLAB_SIZE};
use pebble_core::KernelConfig;
use pebble_fs::{File, file_open, pipe_alloc};
use pebble_mm::SlabPoolConfig;
use pebble_tests::{KernelFixture, TestFixture};

fn fixture_with_slabs(initial_slabs: usize, max_slabs: usize) -> KernelFixture {
    KernelFixture::with_config(KernelConfig {
        file_slabs: SlabPoolConfig {
            initial_slabs,
            max_slabs,
        },
        ..Default::default()
    })
    .unwrap()
}

#[test]
fn handle_reuses_exact_slot_after_last_close() {
    let fx = KernelFixture::setup().unwrap();
    fx.kernel.fs.install(b"/etc/motd", b"welcome").unwrap();
    let open = || file_open(&fx.kernel.fs, &fx.kernel.files, b"/etc/motd", OpenFlags::RDONLY).unwrap();

    let pinned = open();
    let file = open();
    let slot = file.slot();
    let first = file.dup();
    let second = file.dup();
    assert_eq!(file.ref_count(), 3);

    drop(first);
    drop(file);
    assert_eq!(second.ref_count(), 1);
    drop(second);
    fx.kernel.files.audit().unwrap();

    let reopened = open();
    assert_eq!(reopened.slot(), slot);
    drop(pinned);
}

#[test]
fn pool_grows_then_returns_frames() {
    let fx = fixture_with_slabs(0, 3);
    let frames = fx.kernel.frames.stats().allocated_frames;
    let mut held: Vec<File> = Vec::new();
    for _ in 0..SLAB_SIZE + 1 {
        let (r, _w) = pipe_alloc(&fx.kernel.files).unwrap();
        held.push(r);
    }
    assert_eq!(fx.kernel.files.stats().slabs, 2);
    assert_eq!(fx.kernel.frames.stats().allocated_frames, frames + 2);

    held.clear();
    assert_eq!(fx.kernel.files.stats().slabs, 0);
    assert_eq!(fx.kernel.frames.stats().allocated_frames, frames);
}

#[test]
fn bounded_pool_reports_full() {
    let fx = fixture_with_slabs(1, 1);
    let held: Vec<(File, File)> = (0..SLAB_SIZE / 2)
        .map(|_| pipe_alloc(&fx.kernel.files).unwrap())
        .collect();
    assert_eq!(pipe_alloc(&fx.kernel.files).unwrap_err(), FileError::TableFull);
    assert_eq!(fx.kernel.files.stats().free, 0);
    drop(held);
    assert_eq!(fx.kernel.files.stats().slabs, 0);
    assert!(pipe_alloc(&fx.kernel.files).is_ok());
}

#[test]
fn large_write_lands_in_chunks() {
    let fx = KernelFixture::setup().unwrap();
    let file = file_open(
        &fx.kernel.fs,
        &fx.kernel.files,
        b"/var/log",
        OpenFlags::RDWR | OpenFlags::CREATE,
    )
    .unwrap();
    file.write(b"head").unwrap();

    let body = vec![0x5Au8; 2 * MAX_WRITE_CHUNK as usize + 7];
    let committed = fx.kernel.fs.journal().stats().committed;
    assert_eq!(file.write(&body).unwrap(), body.len());
    assert_eq!(file.offset(), 4 + body.len() as u32);
    assert_eq!(fx.kernel.fs.journal().stats().committed, committed + 3);
    assert_eq!(file.stat().unwrap().size, 4 + body.len() as u32);
}

#[test]
fn write_only_handle_never_reads() {
    let fx = KernelFixture::setup().unwrap();
    fx.kernel.fs.install(b"/secret", b"hunter2").unwrap();
    let file = file_open(&fx.kernel.fs, &fx.kernel.files, b"/secret", OpenFlags::WRONLY).unwrap();
    let journal = fx.kernel.fs.journal().stats();

    let mut buf = [0u8; 7];
    for _ in 0..3 {
        assert_eq!(file.read(&mut buf), Err(FileError::NotReadable));
    }
    assert_eq!(buf, [0; 7]);
    assert_eq!(file.offset(), 0);
    assert_eq!(fx.kernel.fs.journal().stats(), journal);
}

#[test]
fn threads_share_handles_safely() {
    let fx = fixture_with_slabs(1, 4);
    fx.kernel.fs.install(b"/shared", b"shared").unwrap();
    let table = Arc::clone(&fx.kernel.files);
    let file = file_open(&fx.kernel.fs, &table, b"/shared", OpenFlags::RDONLY).unwrap();

    let workers: Vec<_> = (0..8)
        .map(|_| {
            let file = file.clone();
            let table = Arc::clone(&table);
            thread::spawn(move || {
                for _ in 0..100 {
                    let (r, w) = pipe_alloc(&table).unwrap();
                    let copies: Vec<File> = (0..3).map(|_| file.dup()).collect();
                    drop(w);
                    drop(copies);
                    drop(r);
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(file.ref_count(), 1);
    table.audit().unwrap();
}

#[test]
fn default_table_keeps_its_boot_size() {
    let fx = KernelFixture::setup().unwrap();
    fx.kernel.fs.install(b"/dev/null", b"").unwrap();
    let open = || file_open(&fx.kernel.fs, &fx.kernel.files, b"/dev/null", OpenFlags::RDONLY);
    assert_eq!(fx.kernel.files.stats().slabs, NUM_SLABS);
    let frames = fx.kernel.frames.stats().allocated_frames;

    let held: Vec<File> = (0..NUM_SLABS * SLAB_SIZE).map(|_| open().unwrap()).collect();
    assert_eq!(open().unwrap_err(), FileError::TableFull);
    assert_eq!(pipe_alloc(&fx.kernel.files).unwrap_err(), FileError::TableFull);
    assert_eq!(fx.kernel.files.stats().slabs, NUM_SLABS);
    assert_eq!(fx.kernel.frames.stats().allocated_frames, frames);

    drop(held);
    fx.kernel.files.audit().unwrap();
    assert!(open().is_ok());
}
