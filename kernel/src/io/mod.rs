/*
 * Input/Output System
 *
 * This module provides low-level I/O operations and interfaces
 * for hardware communication, replacing the syscall system
 * with direct hardware access patterns.
 *
 * Also provides the device abstraction layer backing the file
 * descriptor table.
 */

pub mod device;
pub mod fd;
pub mod pio;

pub use pio::{Io, Pio, ReadOnly};

// Re-export device abstraction types
pub use fd::FileDescriptorTable;
