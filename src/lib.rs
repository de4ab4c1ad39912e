//! Oxipatch: IPS/BPS/UPS ROM patch application in Rust.
//!
//! The crate provides:
//! - A cursor-based byte buffer shared by the codecs (`buffer`)
//! - CRC-32 checksumming (`checksum`)
//! - The three patch format codecs (`formats`)
//! - The format-dispatching pipeline (`patcher`)
//! - File-oriented helpers (`io`)
//! - An optional CLI (`cli` feature)
//!
//! # Quick Start
//!
//! ```no_run
//! let rom = std::fs::read("game.rom").unwrap();
//! let patch = std::fs::read("game.bps").unwrap();
//!
//! let output = oxipatch::apply(rom, patch, true).unwrap();
//! std::fs::write("game-patched.rom", output.as_slice()).unwrap();
//! ```

pub mod buffer;
pub mod checksum;
pub mod formats;
pub mod io;
pub mod patcher;

#[cfg(feature = "cli")]
pub mod cli;

// Re-export the everyday surface.
pub use buffer::{ByteBuffer, ByteSource};
pub use formats::{ChecksumKind, PatchError, PatchFormat};
pub use patcher::{Patcher, apply};
