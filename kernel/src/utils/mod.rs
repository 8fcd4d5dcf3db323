/*
 * Kernel Utilities and Support Functions
 *
 * This module contains various utility functions, macros, and support
 * code used throughout the kernel. It provides common functionality
 * like logging, text output, and debugging macros.
 *
 * Why this is important:
 * - Provides essential debugging and logging infrastructure
 * - Implements kernel-specific versions of common operations
 * - Enables consistent formatting and output across the kernel
 * - Provides macros for simplified kernel development
 * - Forms the support infrastructure for kernel debugging
 *
 * Key components:
 * - io: serial port text output and the print!/serial_println! macros
 * - debug: COM2 init, the log facade backend, and IRQ trace logging
 * - system: wall-clock/tick source and reboot control
 */

pub mod debug;
pub mod io;
pub mod reboot;
pub mod system;
