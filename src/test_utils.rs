//! Shared test-only helpers: logger initialization and a reference oracle
//! for correctness tests.

use std::sync::Once;

static LOGGER_INIT: Once = Once::new();

/// Initializes a `simplelog` term logger at `Debug` level, once per test
/// process. Safe to call at the top of every test; later calls are no-ops.
pub fn init_logger() {
    LOGGER_INIT.call_once(|| {
        let _ = simplelog::TermLogger::init(
            log::LevelFilter::Debug,
            simplelog::Config::default(),
            simplelog::TerminalMode::Stderr,
            simplelog::ColorChoice::Never,
        );
    });
}

/// A trivial in-memory oracle mirroring the logical contents of an ORAM
/// under test, used to check that a trace of writes followed by reads
/// returns the most recently written value.
#[derive(Default)]
pub struct ReferenceMap {
    entries: std::collections::HashMap<crate::Address, Vec<u8>>,
}

impl ReferenceMap {
    /// Creates an empty oracle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a write of `value` at `addr`.
    pub fn write(&mut self, addr: crate::Address, value: Vec<u8>) {
        self.entries.insert(addr, value);
    }

    /// Returns the last value written at `addr`, or `None` if never
    /// written.
    pub fn get(&self, addr: crate::Address) -> Option<&Vec<u8>> {
        self.entries.get(&addr)
    }
}
