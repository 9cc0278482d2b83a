//! In-memory klog backend so scenarios can assert on what was logged.

use spin::{Mutex, Once};

use pebble_lib::{KlogBackend, KlogLevel, klog_register_backend, klog_set_level};

static CAPTURE: Mutex<Vec<u8>> = Mutex::new(Vec::new());
static INSTALLED: Once = Once::new();

static BACKEND: KlogBackend = KlogBackend { write: capture };

fn capture(bytes: &[u8]) {
    CAPTURE.lock().extend_from_slice(bytes);
}

/// Route klog output into the capture buffer at debug level. Safe to call
/// from every test; the backend is attached once per process.
pub fn install_log_capture() {
    INSTALLED.call_once(|| {
        klog_register_backend(&BACKEND);
        klog_set_level(KlogLevel::Debug);
    });
}

/// Everything logged since the capture was installed, lossily decoded.
pub fn captured_log() -> String {
    String::from_utf8_lossy(&CAPTURE.lock()).into_owned()
}
