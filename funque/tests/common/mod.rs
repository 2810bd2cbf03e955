//! Common test utilities for funque integration tests.
//!
//! Provides scratch file paths and writers for the on-disk frame formats.

#![allow(dead_code)]

pub mod generators;

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

/// Unique path in the system temp directory for this test process.
pub fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("funque-it-{}-{name}", std::process::id()))
}

/// Writes an 8-bit 4:2:0 Y4M file from packed `Y, U, V` frame buffers.
pub fn write_y4m(path: &PathBuf, width: usize, height: usize, frames: &[Vec<u8>]) {
    let mut f = File::create(path).unwrap_or_else(|e| panic!("create {}: {e}", path.display()));
    writeln!(f, "YUV4MPEG2 W{width} H{height} F25:1 Ip A1:1 C420jpeg").unwrap();
    for frame in frames {
        f.write_all(b"FRAME\n").unwrap();
        f.write_all(frame).unwrap();
    }
}

/// Writes headerless planar YUV.
pub fn write_raw(path: &PathBuf, frames: &[Vec<u8>]) {
    let mut f = File::create(path).unwrap_or_else(|e| panic!("create {}: {e}", path.display()));
    for frame in frames {
        f.write_all(frame).unwrap();
    }
}
