// Licensed under the Apache-2.0 license

//! In-memory models of the trust element, to be called from tests.
//!
//! [`TrustElemModel`] answers APDUs the way the device does;
//! [`ModelTransport`] wraps it behind the transport-layer contract with a
//! configurable completion latency and fault injection; [`ModelTwi`] models
//! the device's bus register window for driver-level tests.

mod device;
mod transport;
mod wire;

pub use device::TrustElemModel;
pub use transport::ModelTransport;
pub use wire::ModelTwi;
