//! GPIO loopback self-test. Each configured output pin is wired to an input pin; driving the
//! output must be observed on the input for both levels.

use std::{collections::HashMap, thread, time::Duration};

use super::{SelfTest, SelfTestError};
use crate::{config::GpioConfig, report::TestReport};

pub trait LoopbackPins {
    /// Configures `pin` as output (if not done yet) and drives it
    fn drive(&mut self, pin: u8, high: bool) -> Result<(), SelfTestError>;

    /// Configures `pin` as pulled-down input (if not done yet) and reads it
    fn sense(&mut self, pin: u8) -> Result<bool, SelfTestError>;
}

#[cfg(not(feature = "mock"))]
pub struct RppalPins {
    gpio: rppal::gpio::Gpio,
    outputs: HashMap<u8, rppal::gpio::OutputPin>,
    inputs: HashMap<u8, rppal::gpio::InputPin>,
}

#[cfg(not(feature = "mock"))]
impl RppalPins {
    pub fn new() -> Result<Self, SelfTestError> {
        Ok(RppalPins {
            gpio: rppal::gpio::Gpio::new().map_err(hardware)?,
            outputs: HashMap::new(),
            inputs: HashMap::new(),
        })
    }
}

#[cfg(not(feature = "mock"))]
impl LoopbackPins for RppalPins {
    fn drive(&mut self, pin: u8, high: bool) -> Result<(), SelfTestError> {
        let output = match self.outputs.entry(pin) {
            std::collections::hash_map::Entry::Occupied(e) => e.into_mut(),
            std::collections::hash_map::Entry::Vacant(e) => {
                e.insert(self.gpio.get(pin).map_err(hardware)?.into_output())
            }
        };

        if high {
            output.set_high();
        } else {
            output.set_low();
        }
        Ok(())
    }

    fn sense(&mut self, pin: u8) -> Result<bool, SelfTestError> {
        let input = match self.inputs.entry(pin) {
            std::collections::hash_map::Entry::Occupied(e) => e.into_mut(),
            std::collections::hash_map::Entry::Vacant(e) => {
                e.insert(self.gpio.get(pin).map_err(hardware)?.into_input_pulldown())
            }
        };

        Ok(input.is_high())
    }
}

#[cfg(not(feature = "mock"))]
fn hardware(e: rppal::gpio::Error) -> SelfTestError {
    SelfTestError::Hardware(e.into())
}

/// Pins connected in memory. Used in place of real GPIO when built with the `mock` feature.
#[derive(Debug, Default)]
pub struct VirtualPins {
    /// input -> output
    wiring: HashMap<u8, u8>,
    levels: HashMap<u8, bool>,
}

impl VirtualPins {
    pub fn wired(pairs: &[(u8, u8)]) -> Self {
        VirtualPins {
            wiring: pairs.iter().map(|&(output, input)| (input, output)).collect(),
            levels: HashMap::new(),
        }
    }
}

impl LoopbackPins for VirtualPins {
    fn drive(&mut self, pin: u8, high: bool) -> Result<(), SelfTestError> {
        self.levels.insert(pin, high);
        Ok(())
    }

    fn sense(&mut self, pin: u8) -> Result<bool, SelfTestError> {
        let driver = self.wiring.get(&pin);
        Ok(driver.and_then(|output| self.levels.get(output)).copied().unwrap_or(false))
    }
}

#[cfg(not(feature = "mock"))]
fn open_pins(_config: &GpioConfig) -> Result<Box<dyn LoopbackPins>, SelfTestError> {
    Ok(Box::new(RppalPins::new()?))
}

#[cfg(feature = "mock")]
fn open_pins(config: &GpioConfig) -> Result<Box<dyn LoopbackPins>, SelfTestError> {
    Ok(Box::new(VirtualPins::wired(&config.pairs)))
}

/// Drives every output high then low and checks its partner input follows.
/// A pair stops at its first wrong level.
pub fn loopback_test(
    pins: &mut dyn LoopbackPins,
    pairs: &[(u8, u8)],
    settle: Duration,
) -> Result<TestReport, SelfTestError> {
    let mut reasons = Vec::new();

    for &(output, input) in pairs {
        for (level, stage) in [(true, "high"), (false, "low")] {
            pins.drive(output, level)?;
            thread::sleep(settle);
            if pins.sense(input)? != level {
                log::warn!("GPIO {output} -> GPIO {input} did not read {stage}");
                reasons.push(format!("GPIO {output} -> GPIO {input} loopback failed ({stage})"));
                break;
            }
        }
    }

    let passed = pairs.len() - reasons.len();
    Ok(TestReport::from_reasons(reasons)
        .with_detail("Pairs passed", format!("{passed} / {}", pairs.len())))
}

pub struct GpioSelfTest {
    config: GpioConfig,
}

impl GpioSelfTest {
    pub fn new(config: GpioConfig) -> Self {
        Self { config }
    }
}

impl SelfTest for GpioSelfTest {
    fn name(&self) -> &str {
        "GPIO Loopback"
    }

    fn run(&mut self) -> Result<TestReport, SelfTestError> {
        if self.config.pairs.is_empty() {
            return Ok(TestReport::fail("No GPIO loopback pairs configured"));
        }

        let mut pins = match open_pins(&self.config) {
            Ok(pins) => pins,
            Err(e) => return Ok(TestReport::fail(format!("GPIO initialization failed: {e}"))),
        };

        loopback_test(pins.as_mut(), &self.config.pairs, self.config.settle())
    }
}
