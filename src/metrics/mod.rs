//! Metrics export.
//!
//! Pushes the verdict of a run to a Prometheus Push Gateway so scheduled
//! checks can be alerted on.
//!
//! # Submodules
//!
//! - `prom` - Prometheus metrics integration

pub mod prom;
