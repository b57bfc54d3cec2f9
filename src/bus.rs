//! Contracts with the platform for bringing up the SPI bus and the control pins.
//!
//! The driver itself only needs an [`SpiDevice`] and three [`OutputPin`]s. These traits let
//! [`Ssd1283a::initialize`](crate::Ssd1283a::initialize) take raw pin numbers instead, and
//! leave the HAL specific parts to a small implementation on the board side.
use embedded_hal::digital::OutputPin;
use embedded_hal::spi::{Mode, SpiDevice, MODE_0};

/// Clock the display is driven at.
pub const SPI_FREQUENCY_HZ: u32 = 4_000_000;
/// Largest single transfer the bus is configured for, in bytes.
pub const MAX_TRANSFER_SIZE: usize = 4096;
/// Transactions the device may have in flight.
pub const QUEUE_SIZE: usize = 7;

/// GPIO number on the host.
pub type PinId = u8;

/// The six lines wiring the display to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinAssignment {
    /// Chip select, active low.
    pub cs: PinId,
    /// Hardware reset, active low.
    pub rst: PinId,
    /// Command/data select: low for register addresses, high for values.
    pub cd: PinId,
    /// Backlight enable.
    pub led: PinId,
    /// SPI data out.
    pub mosi: PinId,
    /// SPI clock.
    pub sck: PinId,
}

/// SPI controllers a display can be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpiHostId {
    Spi1,
    Hspi,
    #[default]
    Vspi,
}

/// Bus level settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusConfig {
    pub host: SpiHostId,
    pub mosi: PinId,
    /// The panel is write-only.
    pub miso: Option<PinId>,
    pub sck: PinId,
    pub max_transfer_size: usize,
}

impl BusConfig {
    pub fn new(host: SpiHostId, pins: &PinAssignment) -> Self {
        Self {
            host,
            mosi: pins.mosi,
            miso: None,
            sck: pins.sck,
            max_transfer_size: MAX_TRANSFER_SIZE,
        }
    }
}

/// Device level settings.
///
/// Command and address phases are left at zero bits: the command/data pin does the framing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    pub command_bits: u8,
    pub address_bits: u8,
    pub frequency_hz: u32,
    pub mode: Mode,
    pub queue_size: usize,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            command_bits: 0,
            address_bits: 0,
            frequency_hz: SPI_FREQUENCY_HZ,
            mode: MODE_0,
            queue_size: QUEUE_SIZE,
        }
    }
}

/// Output pin settings applied to every control line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputConfig {
    pub pull_up: bool,
    pub pull_down: bool,
    pub interrupts: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            pull_up: true,
            pull_down: false,
            interrupts: false,
        }
    }
}

/// Hands out configured output pins.
pub trait Gpio {
    type Output: OutputPin;
    type Error: core::fmt::Debug;

    fn configure_output(
        &mut self,
        pin: PinId,
        config: OutputConfig,
    ) -> Result<Self::Output, Self::Error>;
}

/// Brings up an SPI bus and binds the display on it.
///
/// The returned device owns the chip select line and must assert it around every transaction,
/// which is the usual [`SpiDevice`] contract.
pub trait SpiHost<CS: OutputPin> {
    type Bus;
    type Device: SpiDevice;
    type Error: core::fmt::Debug;

    fn begin_bus(&mut self, config: &BusConfig) -> Result<Self::Bus, Self::Error>;

    fn bind_device(
        &mut self,
        bus: Self::Bus,
        config: &DeviceConfig,
        cs: CS,
    ) -> Result<Self::Device, Self::Error>;
}
