//! Simple SPI driver for the SSD1283A TFT LCD controller.
//! This crate is a `no_std` library built on [embedded-hal 1.0](https://docs.rs/embedded-hal/1.0.0/embedded_hal/).
//! It is also designed to be used together with [embedded-graphics](https://docs.rs/embedded-graphics/latest/embedded_graphics/).
//! The driver enforces at compile time that the controller has been brought up before anything
//! is drawn, using zero cost typestates.
//!
//! Bring-up blocks the calling thread for more than 600 ms (hardware reset plus the settling
//! delays of the power-up sequence). Hosts running a cooperative scheduler should initialize the
//! display from a task that can afford to stall.
#![cfg_attr(not(test), no_std)]

pub mod bus;
pub mod command;
pub mod error;

#[cfg(test)]
mod mock;

use bus::{BusConfig, DeviceConfig, Gpio, OutputConfig, PinAssignment, PinId, SpiHost, SpiHostId};
use command::*;
pub use error::Error;

use embedded_graphics::{
    draw_target::DrawTarget,
    geometry::{Dimensions, OriginDimensions, Size},
    pixelcolor::{IntoStorage, Rgb565},
    primitives::Rectangle,
    Pixel,
};

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiDevice;

/// Panel width in pixels.
pub const WIDTH: u8 = 130;
/// Panel height in pixels.
pub const HEIGHT: u8 = 130;
/// Last addressable column.
pub const MAX_X: u8 = WIDTH - 1;
/// Last addressable row.
pub const MAX_Y: u8 = HEIGHT - 1;
/// How long the reset line is held low.
pub const RESET_DELAY_MS: u32 = 500;
/// Pixels sent per SPI write by [`Ssd1283a::fill_batched`].
pub const FILL_CHUNK_PIXELS: usize = 64;

/// Main structure of the library, used to initialize and control the display.
pub struct Ssd1283a<SPI, DC, RST, LED, DLY, S> {
    interface: SPI,
    dc: DC,
    reset: RST,
    backlight: LED,
    delay: DLY,
    window: Window,
    #[allow(dead_code)]
    state: S,
}

/// Sets the display as initialized, only after calling `init()` or `initialize()`
/// the display is considered initialized.
pub struct Initialized;
/// Sets the display as not initialized. This state occurs when acquiring
/// a new instance of `Ssd1283a` or after doing a `reset()` of the display.
pub struct NotInitialized;

/// SPI device, control pins and delay handed back by [`Ssd1283a::release`].
pub type Parts<SPI, DC, RST, LED, DLY> = (SPI, DC, RST, LED, DLY);

/// Region of GRAM targeted by pixel writes. End bounds are exclusive.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub x_start: u8,
    pub x_end: u8,
    pub y_start: u8,
    pub y_end: u8,
}

impl Window {
    pub fn width(&self) -> u8 {
        self.x_end.saturating_sub(self.x_start)
    }

    pub fn height(&self) -> u8 {
        self.y_end.saturating_sub(self.y_start)
    }

    pub fn pixel_count(&self) -> u32 {
        u32::from(self.width()) * u32::from(self.height())
    }
}

impl<SPI, P, DLY> Ssd1283a<SPI, P, P, P, DLY, Initialized>
where
    SPI: SpiDevice,
    P: OutputPin,
    DLY: DelayNs,
{
    /// Configures the control pins, brings up the SPI bus, binds the display on it and runs the
    /// full power-up sequence.
    ///
    /// When `bus` is `None` the default host is used and a warning is logged. Bus and device
    /// failures are logged and returned; nothing is retried.
    pub fn initialize<G, H>(
        gpio: &mut G,
        host: &mut H,
        pins: PinAssignment,
        bus: Option<SpiHostId>,
        delay: DLY,
    ) -> Result<Self, Error>
    where
        G: Gpio<Output = P>,
        H: SpiHost<P, Device = SPI>,
    {
        let config = OutputConfig::default();
        let mut reset = configure_output(gpio, pins.rst, config)?;
        let dc = configure_output(gpio, pins.cd, config)?;
        let mut backlight = configure_output(gpio, pins.led, config)?;
        let mut cs = configure_output(gpio, pins.cs, config)?;

        backlight.set_high().map_err(Error::pin)?;
        // Reset is active low, keep the controller running until the explicit reset below.
        reset.set_high().map_err(Error::pin)?;
        cs.set_high().map_err(Error::pin)?;

        let host_id = bus.unwrap_or_else(|| {
            log::warn!("SPI host unspecified, using {:?}", SpiHostId::default());
            SpiHostId::default()
        });

        let spi_bus = host
            .begin_bus(&BusConfig::new(host_id, &pins))
            .map_err(|e| {
                log::error!("Failed to initialize bus: {:?}", e);
                Error::BusInit
            })?;
        let interface = host
            .bind_device(spi_bus, &DeviceConfig::default(), cs)
            .map_err(|e| {
                log::error!("Failed to add device: {:?}", e);
                Error::DeviceBind
            })?;

        Ssd1283a {
            interface,
            dc,
            reset,
            backlight,
            delay,
            window: Window::default(),
            state: NotInitialized,
        }
        .init()
    }
}

fn configure_output<G: Gpio>(
    gpio: &mut G,
    pin: PinId,
    config: OutputConfig,
) -> Result<G::Output, Error> {
    gpio.configure_output(pin, config).map_err(|e| {
        log::error!("Failed to configure GPIO{}: {:?}", pin, e);
        Error::Gpio
    })
}

impl<SPI, DC, RST, LED, DLY> Ssd1283a<SPI, DC, RST, LED, DLY, NotInitialized>
where
    SPI: SpiDevice,
    DC: OutputPin,
    RST: OutputPin,
    LED: OutputPin,
    DLY: DelayNs,
{
    /// Acquires an already bound SPI device and the control pins. Turns the backlight on and
    /// keeps the reset line released.
    pub fn new(
        interface: SPI,
        dc: DC,
        reset: RST,
        backlight: LED,
        delay: DLY,
    ) -> Result<Self, Error> {
        let mut disp = Self {
            interface,
            dc,
            reset,
            backlight,
            delay,
            window: Window::default(),
            state: NotInitialized,
        };
        disp.backlight.set_high().map_err(Error::pin)?;
        disp.reset.set_high().map_err(Error::pin)?;
        Ok(disp)
    }

    /// Sets the display into an initialized state: hardware reset followed by the power-up
    /// sequence. It is required to call this method once before anything can be drawn.
    pub fn init(self) -> Result<Ssd1283a<SPI, DC, RST, LED, DLY, Initialized>, Error> {
        let mut disp = self.reset()?;
        for step in INIT_SEQUENCE {
            run_step(&mut disp.interface, &mut disp.dc, &mut disp.delay, *step)?;
        }
        log::info!("Initialization completed");
        Ok(disp.into_state(Initialized))
    }
}

impl<SPI, DC, RST, LED, DLY> Ssd1283a<SPI, DC, RST, LED, DLY, Initialized>
where
    SPI: SpiDevice,
    DC: OutputPin,
    RST: OutputPin,
    LED: OutputPin,
    DLY: DelayNs,
{
    /// Restricts subsequent pixel writes to `x1..x2`, `y1..y2` and leaves the controller ready
    /// to receive pixel data.
    ///
    /// The window must be non-empty and lie within the panel. The stored window is only
    /// updated once every register has been written.
    pub fn set_window(&mut self, x1: u8, y1: u8, x2: u8, y2: u8) -> Result<(), Error> {
        if x1 >= x2 || y1 >= y2 || x2 > WIDTH || y2 > HEIGHT {
            return Err(Error::InvalidWindow { x1, y1, x2, y2 });
        }

        // The controller takes the inclusive end bound first.
        ColumnWindow([x2 - 1, x1]).send(&mut self.interface, &mut self.dc)?;
        RowWindow([y2 - 1, y1]).send(&mut self.interface, &mut self.dc)?;
        RamAddressSet([x1, y1]).send(&mut self.interface, &mut self.dc)?;
        WriteDataToGram.send(&mut self.interface, &mut self.dc)?;

        self.window = Window {
            x_start: x1,
            x_end: x2,
            y_start: y1,
            y_end: y2,
        };
        log::debug!("Window set to {:?}", self.window);
        Ok(())
    }

    /// Fills the current window with `color` (RGB565), one 16-bit transfer per pixel.
    pub fn flood_fill(&mut self, color: u16) -> Result<(), Error> {
        let Window {
            x_start,
            x_end,
            y_start,
            y_end,
        } = self.window;
        let pixel = color.to_be_bytes();

        WriteDataToGram.send(&mut self.interface, &mut self.dc)?;
        self.dc.set_high().map_err(Error::pin)?;
        for _x in x_start..x_end {
            for _y in y_start..y_end {
                self.interface.write(&pixel).map_err(Error::spi)?;
            }
        }
        // The same command closes the GRAM write.
        WriteDataToGram.send(&mut self.interface, &mut self.dc)?;

        log::debug!("Filled {:?} with 0x{:04X}", self.window, color);
        Ok(())
    }

    /// Same as [`flood_fill`](Self::flood_fill), but streams up to [`FILL_CHUNK_PIXELS`]
    /// pixels per SPI write.
    pub fn fill_batched(&mut self, color: u16) -> Result<(), Error> {
        let mut chunk = [0u8; FILL_CHUNK_PIXELS * 2];
        for pixel in chunk.chunks_exact_mut(2) {
            pixel.copy_from_slice(&color.to_be_bytes());
        }

        WriteDataToGram.send(&mut self.interface, &mut self.dc)?;
        self.dc.set_high().map_err(Error::pin)?;
        let mut remaining = self.window.pixel_count() as usize;
        while remaining > 0 {
            let n = remaining.min(FILL_CHUNK_PIXELS);
            self.interface.write(&chunk[..n * 2]).map_err(Error::spi)?;
            remaining -= n;
        }
        WriteDataToGram.send(&mut self.interface, &mut self.dc)?;

        log::debug!("Filled {:?} with 0x{:04X}", self.window, color);
        Ok(())
    }

    /// Window targeted by the last successful `set_window()`.
    pub fn window(&self) -> Window {
        self.window
    }
}

impl<SPI, DC, RST, LED, DLY, S> Ssd1283a<SPI, DC, RST, LED, DLY, S>
where
    SPI: SpiDevice,
    DC: OutputPin,
    RST: OutputPin,
    LED: OutputPin,
    DLY: DelayNs,
{
    /// Performs a hardware reset of the display. The controller forgets its configuration, so
    /// the display has to go through `init()` again.
    pub fn reset(mut self) -> Result<Ssd1283a<SPI, DC, RST, LED, DLY, NotInitialized>, Error> {
        self.reset.set_low().map_err(Error::pin)?;
        self.delay.delay_ms(RESET_DELAY_MS);
        self.reset.set_high().map_err(Error::pin)?;
        self.window = Window::default();
        Ok(self.into_state(NotInitialized))
    }

    /// Turns the backlight off, holds the controller in reset and releases the SPI device,
    /// control pins and delay.
    ///
    /// Both lines are driven even if the first one fails. The parts are handed back in either
    /// case, together with the first pin error on failure.
    #[allow(clippy::type_complexity)]
    pub fn release(
        mut self,
    ) -> Result<Parts<SPI, DC, RST, LED, DLY>, (Error, Parts<SPI, DC, RST, LED, DLY>)> {
        let backlight = self.backlight.set_low().map_err(Error::pin);
        let reset = self.reset.set_low().map_err(Error::pin);
        let parts = (
            self.interface,
            self.dc,
            self.reset,
            self.backlight,
            self.delay,
        );
        match backlight.and(reset) {
            Ok(()) => {
                log::info!("Display released");
                Ok(parts)
            }
            Err(e) => {
                log::error!("Failed to release display: {}", e);
                Err((e, parts))
            }
        }
    }

    fn into_state<T>(self, state: T) -> Ssd1283a<SPI, DC, RST, LED, DLY, T> {
        Ssd1283a {
            interface: self.interface,
            dc: self.dc,
            reset: self.reset,
            backlight: self.backlight,
            delay: self.delay,
            window: self.window,
            state,
        }
    }
}

impl<SPI, DC, RST, LED, DLY> DrawTarget for Ssd1283a<SPI, DC, RST, LED, DLY, Initialized>
where
    SPI: SpiDevice,
    DC: OutputPin,
    RST: OutputPin,
    LED: OutputPin,
    DLY: DelayNs,
{
    type Color = Rgb565;
    type Error = Error;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(coord, color) in pixels.into_iter() {
            // `DrawTarget` implementations are required to discard out of bounds pixels
            // without returning an error or causing a panic.
            if let (Ok(x @ 0..=MAX_X), Ok(y @ 0..=MAX_Y)) =
                (u8::try_from(coord.x), u8::try_from(coord.y))
            {
                self.set_window(x, y, x + 1, y + 1)?;
                write_data16(&mut self.interface, &mut self.dc, color.into_storage())?;
                WriteDataToGram.send(&mut self.interface, &mut self.dc)?;
            }
        }
        Ok(())
    }

    fn fill_solid(&mut self, area: &Rectangle, color: Self::Color) -> Result<(), Self::Error> {
        let area = area.intersection(&self.bounding_box());
        if let Some(bottom_right) = area.bottom_right() {
            self.set_window(
                area.top_left.x as u8,
                area.top_left.y as u8,
                bottom_right.x as u8 + 1,
                bottom_right.y as u8 + 1,
            )?;
            self.fill_batched(color.into_storage())?;
        }
        Ok(())
    }
}

impl<SPI, DC, RST, LED, DLY> OriginDimensions for Ssd1283a<SPI, DC, RST, LED, DLY, Initialized> {
    fn size(&self) -> Size {
        Size::new(WIDTH.into(), HEIGHT.into())
    }
}
