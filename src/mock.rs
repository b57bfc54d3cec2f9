//! Recording stand-ins for the SPI bus, control pins, delay and platform bring-up.
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::string::{String, ToString};
use std::sync::Once;
use std::vec::Vec;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{self, OutputPin};
use embedded_hal::spi::{self, ErrorKind, Operation, SpiDevice};

use crate::bus::{BusConfig, DeviceConfig, Gpio, OutputConfig, PinAssignment, PinId, SpiHost};

pub const PINS: PinAssignment = PinAssignment {
    cs: 5,
    rst: 33,
    cd: 27,
    led: 32,
    mosi: 23,
    sck: 18,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Dc(bool),
    Rst(bool),
    Led(bool),
    Cs(bool),
    Write(Vec<u8>),
    DelayMs(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line {
    Dc,
    Rst,
    Led,
    Cs,
}

#[derive(Default)]
struct Shared {
    events: RefCell<Vec<Event>>,
    /// SPI transactions left before every further one fails.
    transfers_left: Cell<Option<usize>>,
    broken_line: Cell<Option<Line>>,
}

/// Shared log every mock appends to, so ordering across pins, bus and delay is preserved.
#[derive(Clone, Default)]
pub struct Recorder(Rc<Shared>);

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, event: Event) {
        self.0.events.borrow_mut().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.events.borrow().clone()
    }

    pub fn clear(&self) {
        self.0.events.borrow_mut().clear();
    }

    /// Lets `n` more SPI transactions through, then fails every one after.
    pub fn fail_after(&self, n: usize) {
        self.0.transfers_left.set(Some(n));
    }

    /// Makes every write to `line` fail from now on.
    pub fn break_line(&self, line: Line) {
        self.0.broken_line.set(Some(line));
    }

    fn take_transfer(&self) -> bool {
        match self.0.transfers_left.get() {
            Some(0) => false,
            Some(n) => {
                self.0.transfers_left.set(Some(n - 1));
                true
            }
            None => true,
        }
    }

    /// SPI writes paired with the command/data level they went out with (`true` is data).
    pub fn frames(&self) -> Vec<(bool, Vec<u8>)> {
        let mut dc = false;
        let mut frames = Vec::new();
        for event in self.0.events.borrow().iter() {
            match event {
                Event::Dc(level) => dc = *level,
                Event::Write(bytes) => frames.push((dc, bytes.clone())),
                _ => {}
            }
        }
        frames
    }

    pub fn spi(&self) -> MockSpi {
        MockSpi {
            rec: self.clone(),
            cs: None,
            fail: false,
        }
    }

    pub fn failing_spi(&self) -> MockSpi {
        MockSpi {
            fail: true,
            ..self.spi()
        }
    }

    pub fn pin(&self, line: Line) -> MockPin {
        MockPin {
            rec: self.clone(),
            line,
        }
    }

    pub fn dc(&self) -> MockPin {
        self.pin(Line::Dc)
    }

    pub fn rst(&self) -> MockPin {
        self.pin(Line::Rst)
    }

    pub fn led(&self) -> MockPin {
        self.pin(Line::Led)
    }

    pub fn delay(&self) -> MockDelay {
        MockDelay { rec: self.clone() }
    }
}

pub struct MockSpi {
    rec: Recorder,
    cs: Option<MockPin>,
    fail: bool,
}

impl spi::ErrorType for MockSpi {
    type Error = ErrorKind;
}

impl SpiDevice for MockSpi {
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), Self::Error> {
        if self.fail || !self.rec.take_transfer() {
            return Err(ErrorKind::Other);
        }
        if let Some(cs) = self.cs.as_mut() {
            cs.set_low().ok();
        }
        for op in operations.iter() {
            if let Operation::Write(bytes) = op {
                self.rec.push(Event::Write(bytes.to_vec()));
            }
        }
        if let Some(cs) = self.cs.as_mut() {
            cs.set_high().ok();
        }
        Ok(())
    }
}

pub struct MockPin {
    rec: Recorder,
    line: Line,
}

impl digital::ErrorType for MockPin {
    type Error = digital::ErrorKind;
}

impl OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.set(false)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.set(true)
    }
}

impl MockPin {
    fn set(&self, level: bool) -> Result<(), digital::ErrorKind> {
        if self.rec.0.broken_line.get() == Some(self.line) {
            return Err(digital::ErrorKind::Other);
        }
        self.rec.push(match self.line {
            Line::Dc => Event::Dc(level),
            Line::Rst => Event::Rst(level),
            Line::Led => Event::Led(level),
            Line::Cs => Event::Cs(level),
        });
        Ok(())
    }
}

pub struct MockDelay {
    rec: Recorder,
}

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.rec.push(Event::DelayMs(ns / 1_000_000));
    }

    fn delay_ms(&mut self, ms: u32) {
        self.rec.push(Event::DelayMs(ms));
    }
}

pub struct MockGpio {
    rec: Recorder,
    pub configured: Vec<(PinId, OutputConfig)>,
    pub fail_on: Option<PinId>,
}

impl MockGpio {
    pub fn new(rec: &Recorder) -> Self {
        Self {
            rec: rec.clone(),
            configured: Vec::new(),
            fail_on: None,
        }
    }
}

impl Gpio for MockGpio {
    type Output = MockPin;
    type Error = &'static str;

    fn configure_output(
        &mut self,
        pin: PinId,
        config: OutputConfig,
    ) -> Result<Self::Output, Self::Error> {
        if self.fail_on == Some(pin) {
            return Err("pin unavailable");
        }
        self.configured.push((pin, config));
        let line = match pin {
            p if p == PINS.cd => Line::Dc,
            p if p == PINS.rst => Line::Rst,
            p if p == PINS.led => Line::Led,
            p if p == PINS.cs => Line::Cs,
            _ => return Err("pin not wired"),
        };
        Ok(self.rec.pin(line))
    }
}

#[derive(Default)]
pub struct MockHost {
    rec: Recorder,
    pub bus: Option<BusConfig>,
    pub device: Option<DeviceConfig>,
    pub fail_bus: bool,
    pub fail_device: bool,
}

impl MockHost {
    pub fn new(rec: &Recorder) -> Self {
        Self {
            rec: rec.clone(),
            ..Self::default()
        }
    }
}

impl SpiHost<MockPin> for MockHost {
    type Bus = ();
    type Device = MockSpi;
    type Error = &'static str;

    fn begin_bus(&mut self, config: &BusConfig) -> Result<Self::Bus, Self::Error> {
        if self.fail_bus {
            return Err("ESP_ERR_INVALID_STATE");
        }
        self.bus = Some(config.clone());
        Ok(())
    }

    fn bind_device(
        &mut self,
        _bus: Self::Bus,
        config: &DeviceConfig,
        cs: MockPin,
    ) -> Result<Self::Device, Self::Error> {
        if self.fail_device {
            return Err("ESP_ERR_NO_MEM");
        }
        self.device = Some(config.clone());
        Ok(MockSpi {
            rec: self.rec.clone(),
            cs: Some(cs),
            fail: false,
        })
    }
}

/// `log` sink keeping the records emitted on the current test thread.
struct RecordingLogger;

std::thread_local! {
    static RECORDS: RefCell<Vec<(log::Level, String)>> = const { RefCell::new(Vec::new()) };
}

impl log::Log for RecordingLogger {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        RECORDS.with(|records| {
            records
                .borrow_mut()
                .push((record.level(), record.args().to_string()))
        });
    }

    fn flush(&self) {}
}

static LOGGER: RecordingLogger = RecordingLogger;
static INSTALL_LOGGER: Once = Once::new();

/// Installs the recording logger and drops whatever this thread logged so far.
pub fn capture_logs() {
    INSTALL_LOGGER.call_once(|| {
        log::set_logger(&LOGGER).ok();
        log::set_max_level(log::LevelFilter::Trace);
    });
    RECORDS.with(|records| records.borrow_mut().clear());
}

/// Records logged on this thread at exactly `level`.
pub fn logged(level: log::Level) -> Vec<String> {
    RECORDS.with(|records| {
        records
            .borrow()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, msg)| msg.clone())
            .collect()
    })
}
