//! OPAL Device - device management protocol client seam
//!
//! The device protocol client executes individual management-protocol
//! operations against one device. Each call is an independent
//! request/response with its own deadline; errors are classified once at
//! this seam as transient or permanent and never reinterpreted per call
//! site.
//!
//! Wire encoding of the underlying transport is out of scope; this crate
//! defines the typed surface the workflows drive.

#![deny(unsafe_code)]

pub mod client;
pub mod error;
pub mod scripted;

pub use client::{AclEntry, CertificatePayload, ControlMode, DeviceClient, UnprovisionOutcome};
pub use error::{DeviceError, Result};
pub use scripted::{ScriptStep, ScriptedDeviceClient};
