//! # Rustmiio
//!
//! Schema-driven client model for Xiaomi MIoT ("miio") smart-home devices.
//! Fetches and caches a device model's published schema, parses it into
//! typed service/property/action objects and drives generic property
//! reads, writes and action calls over a caller-supplied transport.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rustmiio::{GenericMiot, MiotCloud, MiotDevice};
//!
//! # async fn example(transport: impl rustmiio::MiotTransport) -> rustmiio::error::Result<()> {
//! let cloud = MiotCloud::new()?;
//! let device = MiotDevice::new(transport);
//! let mut fan = GenericMiot::new(device, cloud, "dmaker.fan.p5");
//!
//! let status = fan.status().await?;
//! println!("power: {:?}", status.get("on"));
//! fan.set_property("fan-level", serde_json::json!(2)).await?;
//! # Ok(())
//! # }
//! ```
//!
#[macro_use]
pub mod macros;
pub mod cloud;
pub mod descriptors;
pub mod device;
pub mod error;
pub mod generic;
pub mod protocol;
pub mod schema;
pub mod urn;

pub use cloud::{MiotCloud, ReleaseInfo, ReleaseList};
pub use descriptors::{ActionDescriptor, PropertyDescriptor};
pub use device::{MiotDevice, MiotTransport};
pub use error::MiotError;
pub use generic::{GenericMiot, GenericMiotStatus};
pub use schema::{DeviceModel, MiotProperty, MiotService};
pub use urn::URN;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn version() -> &'static str {
    VERSION
}
