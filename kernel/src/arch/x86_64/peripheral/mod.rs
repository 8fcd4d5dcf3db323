/*
 * Peripheral Device Management
 *
 * This module manages the peripheral devices and hardware interfaces
 * available to the kernel: the COM2 serial port used for debug logging
 * and the 8259 PIC. Framebuffer/graphics output is out of scope.
 */

use spin::Mutex;

use crate::io::pio::Pio;

use self::uart_16550::SerialPort;

pub mod pic;
pub mod uart_16550;

/// Mutex-protected static instance of COM2 serial port.
pub static COM2: Mutex<SerialPort<Pio<u8>>> = Mutex::new(SerialPort::<Pio<u8>>::new(0x2F8));

/// Initializes the debug port (COM2) for logging.
///
/// This function should be called early in the boot process before any logging occurs.
pub fn init_debug_port() {
    COM2.lock().init();
}

/// Initializes the remaining peripherals (excluding the debug port).
pub fn init_peripherals() {
    pic::init_pic();
    log::info!("PIC initialization complete");
}
