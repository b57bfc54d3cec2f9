//! Errors reported by the driver.
use embedded_hal::{digital, spi};

/// Every fallible operation of the crate returns this error.
#[derive(Debug, thiserror_no_std::Error, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// An SPI transfer was rejected by the peripheral.
    #[error("SPI transfer failed: {0}")]
    Spi(spi::ErrorKind),
    /// A control pin (command/data, reset or backlight) could not be driven.
    #[error("control pin error: {0}")]
    Pin(digital::ErrorKind),
    /// The SPI bus could not be brought up.
    #[error("failed to initialize SPI bus")]
    BusInit,
    /// The display could not be bound as a device on the SPI bus.
    #[error("failed to add SPI device")]
    DeviceBind,
    /// A GPIO could not be configured as an output.
    #[error("failed to configure GPIO")]
    Gpio,
    /// The requested window is empty or falls outside the panel.
    #[error("invalid window ({x1}, {y1})..({x2}, {y2})")]
    InvalidWindow { x1: u8, y1: u8, x2: u8, y2: u8 },
}

impl Error {
    pub(crate) fn spi<E: spi::Error>(e: E) -> Self {
        Error::Spi(e.kind())
    }

    pub(crate) fn pin<E: digital::Error>(e: E) -> Self {
        Error::Pin(e.kind())
    }
}
