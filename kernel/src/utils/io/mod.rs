/*
 * Input/Output Utilities
 *
 * This module contains utilities for handling input and output operations:
 * serial communication and the print!/serial_println! formatting macros.
 */

pub mod writer;
#[macro_use]
pub mod macros;
