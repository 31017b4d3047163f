use crate::{communication::CommunicationError, report::TestReport};

pub mod ds18b20;
pub mod gpio;
pub mod gps;
pub mod suite;

pub use ds18b20::Ds18b20SelfTest;
pub use gpio::GpioSelfTest;
pub use gps::GpsSelfTest;

/// A self-contained hardware check that ends in a verdict.
///
/// Conditions the test was written to detect are reported through a FAIL [`TestReport`].
/// `Err` is reserved for faults the test could not account for.
pub trait SelfTest {
    fn name(&self) -> &str;

    fn run(&mut self) -> Result<TestReport, SelfTestError>;
}

#[derive(Debug, thiserror::Error)]
pub enum SelfTestError {
    #[error("Communication: {0}")]
    Communication(#[from] CommunicationError),
    #[error("Hardware: {0:?}")]
    Hardware(anyhow::Error),
}
