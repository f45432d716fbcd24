//! Pipeline orchestration: ports, artifact assembly, validation, driver.

pub mod artifact;
pub mod driver;
pub mod ports;
pub mod validation;
