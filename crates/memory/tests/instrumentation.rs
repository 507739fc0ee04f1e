//! Structured events emitted on the pool lifecycle

use std::io;
use std::sync::{Arc, Mutex};
use tidepool_memory::{Pool, PoolConfig};
use tracing::Level;

#[derive(Clone, Default)]
struct Capture(Arc<Mutex<Vec<u8>>>);

impl io::Write for Capture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Capture {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

#[test]
fn lifecycle_events_carry_fields() {
    let capture = Capture::default();
    let writer = capture.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(Level::TRACE)
        .with_writer(move || writer.clone())
        .finish();

    tracing::subscriber::with_default(subscriber, || {
        let config = PoolConfig::production()
            .with_chunk_size(1024)
            .with_small_threshold(64);
        let pool = Pool::with_config(config).unwrap();
        pool.allocate(32).unwrap();
        let large = pool.allocate(500).unwrap();
        unsafe { pool.free(large.as_ptr()) };
        let _ = pool.destroy();
    });

    let text = capture.text();
    for needle in [
        "pool created",
        "chunk_size=1024",
        "small_threshold=64",
        "pool chunk allocated",
        "large allocation",
        "large allocation freed",
        "pool destroyed",
        "chunks=1",
    ] {
        assert!(text.contains(needle), "missing {needle:?} in:\n{text}");
    }
}

#[test]
fn out_of_memory_is_reported() {
    let capture = Capture::default();
    let writer = capture.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(Level::WARN)
        .with_writer(move || writer.clone())
        .finish();

    tracing::subscriber::with_default(subscriber, || {
        let pool = Pool::create(1024, 64).unwrap();
        assert!(pool.allocate(usize::MAX - 8).is_err());
    });

    let text = capture.text();
    assert!(text.contains("WARN"), "{text}");
    assert!(text.contains("system allocator refused pool memory"), "{text}");
}
