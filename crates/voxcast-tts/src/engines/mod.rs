//! Bundled engine adapters

// Process-based espeak-ng adapter (platform-preferred on Unix)
pub mod espeak;

// Configurable mock engine for tests
pub mod mock;

// Always-available silent fallback
pub mod noop;
