//! This module contains the register map of the controller and all the logic necessary to frame
//! register writes on the SPI bus.
//!
//! Every write is split in two phases: the register address goes out as one 8-bit frame with the
//! command/data pin low, then its value follows with the pin high. Register values are 16 bits
//! wide and sent big-endian.
use crate::error::Error;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiDevice;

/// Register addresses of the SSD1283A.
pub struct Reg;

impl Reg {
    pub const OSCILLATOR: u8 = 0x00;
    pub const DRIVER_OUTPUT_CONTROL: u8 = 0x01;
    pub const DRIVING_WAVEFORM_CONTROL: u8 = 0x02;
    pub const ENTRY_MODE: u8 = 0x03;
    pub const COMPARE_REGISTER_1: u8 = 0x04;
    pub const COMPARE_REGISTER_2: u8 = 0x05;
    pub const DISPLAY_CONTROL: u8 = 0x07;
    pub const FRAME_CYCLE_CONTROL: u8 = 0x0B;
    pub const POWER_CONTROL_1: u8 = 0x10;
    pub const POWER_CONTROL_2: u8 = 0x11;
    pub const POWER_CONTROL_3: u8 = 0x12;
    pub const POWER_CONTROL_4: u8 = 0x13;
    pub const HORIZONTAL_PORCH: u8 = 0x16;
    pub const VERTICAL_PORCH: u8 = 0x17;
    pub const POWER_CONTROL_5: u8 = 0x1E;
    pub const POWER_CONTROL_6: u8 = 0x1F;
    pub const RAM_ADDRESS_SET: u8 = 0x21;
    pub const WRITE_DATA_TO_GRAM: u8 = 0x22;
    pub const RAM_WRITE_DATA_MASK_1: u8 = 0x23;
    pub const RAM_WRITE_DATA_MASK_2: u8 = 0x24;
    pub const FURTHER_BIAS_CURRENT_SETTING: u8 = 0x27;
    pub const VCOM_OTP_1: u8 = 0x28;
    pub const VCOM_OTP_2: u8 = 0x29;
    pub const OSCILLATOR_FREQUENCY: u8 = 0x2C;
    /// Undocumented; written with 0xFFFF during bring-up.
    pub const EXTENDED_2F: u8 = 0x2F;
    pub const GAMMA_CONTROL_1: u8 = 0x30;
    pub const GAMMA_CONTROL_2: u8 = 0x31;
    pub const GAMMA_CONTROL_3: u8 = 0x32;
    pub const GAMMA_CONTROL_4: u8 = 0x33;
    pub const GAMMA_CONTROL_5: u8 = 0x34;
    pub const GAMMA_CONTROL_6: u8 = 0x35;
    pub const GAMMA_CONTROL_7: u8 = 0x36;
    pub const GAMMA_CONTROL_8: u8 = 0x37;
    pub const GAMMA_CONTROL_9: u8 = 0x38;
    pub const GAMMA_CONTROL_10: u8 = 0x39;
    pub const GATE_SCAN_POSITION: u8 = 0x40;
    pub const VERTICAL_SCROLL_CONTROL: u8 = 0x41;
    pub const FIRST_SCREEN_DRIVING_POSITION: u8 = 0x42;
    pub const SECOND_SCREEN_DRIVING_POSITION: u8 = 0x43;
    pub const HORIZONTAL_RAM_ADDRESS_POSITION: u8 = 0x44;
    pub const VERTICAL_RAM_ADDRESS_POSITION: u8 = 0x45;
}

/// Sends a register address: command/data pin low, one 8-bit frame.
pub fn write_command<SPI, DC>(spi: &mut SPI, dc: &mut DC, command: u8) -> Result<(), Error>
where
    SPI: SpiDevice,
    DC: OutputPin,
{
    dc.set_low().map_err(Error::pin)?;
    spi.write(&[command]).map_err(|e| {
        let e = Error::spi(e);
        log::error!("SPI write failed for command 0x{:02X}: {}", command, e);
        e
    })
}

/// Sends one 8-bit data frame with the command/data pin high.
pub fn write_data8<SPI, DC>(spi: &mut SPI, dc: &mut DC, value: u8) -> Result<(), Error>
where
    SPI: SpiDevice,
    DC: OutputPin,
{
    dc.set_high().map_err(Error::pin)?;
    spi.write(&[value]).map_err(Error::spi)
}

/// Sends one 16-bit big-endian data frame with the command/data pin high.
pub fn write_data16<SPI, DC>(spi: &mut SPI, dc: &mut DC, value: u16) -> Result<(), Error>
where
    SPI: SpiDevice,
    DC: OutputPin,
{
    dc.set_high().map_err(Error::pin)?;
    spi.write(&value.to_be_bytes()).map_err(Error::spi)
}

/// A full register write: command phase followed by a 16-bit data phase.
pub fn write_command_data<SPI, DC>(
    spi: &mut SPI,
    dc: &mut DC,
    command: u8,
    value: u16,
) -> Result<(), Error>
where
    SPI: SpiDevice,
    DC: OutputPin,
{
    write_command(spi, dc, command)?;
    write_data16(spi, dc, value)
}

/// Trait that every command must implement. It takes care of sending the register address and
/// writing its arguments to the display. Reading from the display is not supported.
pub trait Command {
    /// Sends the command and associated argument (if any) to the display.
    fn send<SPI, DC>(&self, spi: &mut SPI, dc: &mut DC) -> Result<(), Error>
    where
        SPI: SpiDevice,
        DC: OutputPin;
}

/// Convenience macro for implementing the `Command` trait for commands with no arguments.
macro_rules! cmd {
    ($t:ty, $r:expr) => {
        impl Command for $t {
            fn send<SPI, DC>(&self, spi: &mut SPI, dc: &mut DC) -> Result<(), Error>
            where
                SPI: SpiDevice,
                DC: OutputPin,
            {
                write_command(spi, dc, $r)
            }
        }
    };
}

/// Convenience macro for implementing the `Command` trait for commands whose argument is a
/// sequence of 8-bit frames.
macro_rules! cmd_arg {
    ($t:ty, $r:expr) => {
        impl Command for $t {
            fn send<SPI, DC>(&self, spi: &mut SPI, dc: &mut DC) -> Result<(), Error>
            where
                SPI: SpiDevice,
                DC: OutputPin,
            {
                write_command(spi, dc, $r)?;
                for byte in self.0 {
                    write_data8(spi, dc, byte)?;
                }
                Ok(())
            }
        }
    };
}

/// Write data to GRAM.
// 0x22
// Starts a pixel stream at the current RAM address. Sent again once the stream is complete.
pub struct WriteDataToGram;
cmd!(WriteDataToGram, Reg::WRITE_DATA_TO_GRAM);

/// Column window of the RAM.
// 0x45
//   2 Data bytes: end (inclusive), start
// The entry mode programmed at bring-up maps panel columns onto the chip's vertical RAM address
// register, so columns are set through 0x45 and rows through 0x44.
pub struct ColumnWindow(/** `[end, start]`, end inclusive. */ pub [u8; 2]);
cmd_arg!(ColumnWindow, Reg::VERTICAL_RAM_ADDRESS_POSITION);

/// Row window of the RAM.
// 0x44
//   2 Data bytes: end (inclusive), start
pub struct RowWindow(/** `[end, start]`, end inclusive. */ pub [u8; 2]);
cmd_arg!(RowWindow, Reg::HORIZONTAL_RAM_ADDRESS_POSITION);

/// RAM address set.
// 0x21
//   2 Data bytes: x, y
pub struct RamAddressSet(/** `[x, y]` */ pub [u8; 2]);
cmd_arg!(RamAddressSet, Reg::RAM_ADDRESS_SET);

/// One step of the power-up sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitStep {
    /// Write a 16-bit value into a register.
    Write { register: u8, value: u16 },
    /// Block for the given number of milliseconds without touching the bus.
    Delay { milliseconds: u32 },
}

/// Runs one step of the power-up sequence: a register write goes out on the bus, a delay blocks
/// the calling thread for its full duration and sends nothing.
pub(crate) fn run_step<SPI, DC, DLY>(
    spi: &mut SPI,
    dc: &mut DC,
    delay: &mut DLY,
    step: InitStep,
) -> Result<(), Error>
where
    SPI: SpiDevice,
    DC: OutputPin,
    DLY: DelayNs,
{
    match step {
        InitStep::Write { register, value } => write_command_data(spi, dc, register, value),
        InitStep::Delay { milliseconds } => {
            delay.delay_ms(milliseconds);
            Ok(())
        }
    }
}

const fn write(register: u8, value: u16) -> InitStep {
    InitStep::Write { register, value }
}

const fn delay(milliseconds: u32) -> InitStep {
    InitStep::Delay { milliseconds }
}

/// Power-up sequence of the controller. The order is part of the bring-up protocol: power
/// control, then the oscillator, then display on, with settling delays for the voltage rails.
pub const INIT_SEQUENCE: &[InitStep] = &[
    write(Reg::POWER_CONTROL_1, 0x2F8E),
    write(Reg::POWER_CONTROL_2, 0x000C),
    write(Reg::DISPLAY_CONTROL, 0x0021),
    write(Reg::VCOM_OTP_1, 0x0006),
    write(Reg::VCOM_OTP_1, 0x0005),
    write(Reg::FURTHER_BIAS_CURRENT_SETTING, 0x057F),
    write(Reg::VCOM_OTP_2, 0x89A1),
    write(Reg::OSCILLATOR, 0x0001),
    delay(100),
    write(Reg::VCOM_OTP_2, 0x80B0),
    delay(30),
    write(Reg::VCOM_OTP_2, 0xFFFE),
    write(Reg::DISPLAY_CONTROL, 0x0223),
    delay(30),
    write(Reg::DISPLAY_CONTROL, 0x0233),
    write(Reg::DRIVER_OUTPUT_CONTROL, 0x2183),
    // 0x6830 is the datasheet default, 0x6838 flips the scan direction.
    write(Reg::ENTRY_MODE, 0x6838),
    write(Reg::EXTENDED_2F, 0xFFFF),
    write(Reg::OSCILLATOR_FREQUENCY, 0x8000),
    write(Reg::FURTHER_BIAS_CURRENT_SETTING, 0x0570),
    write(Reg::DRIVING_WAVEFORM_CONTROL, 0x0300),
    write(Reg::FRAME_CYCLE_CONTROL, 0x580C),
    write(Reg::POWER_CONTROL_3, 0x0609),
    write(Reg::POWER_CONTROL_4, 0x3100),
];
