//! The BLE transport seam.
//!
//! # Why a trait? (for beginners)
//!
//! Every operating system exposes Bluetooth Low Energy differently.  Rather
//! than tie the bridge to one of them, the connection code talks to a
//! [`BleTransport`] trait object.  A platform integration implements the
//! trait once; tests and the replay binary use [`mock::MockTransport`].
//!
//! Characteristics are addressed by UUID.  [`BleTransport::list_characteristics`]
//! returns the UUID strings exactly as the stack reports them (short or long
//! form, any case); the connection matches them against the vendor profile.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

pub mod mock;

/// Errors reported by a transport.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// No advertising device matched any of the requested name prefixes.
    #[error("no device found matching {0:?}")]
    NoDevice(Vec<String>),

    /// The link could not be opened or was lost.
    #[error("link error: {0}")]
    Link(String),

    /// The device does not expose the requested service.
    #[error("service {0} not found")]
    ServiceNotFound(Uuid),

    /// A characteristic operation (subscribe, unsubscribe, write) failed.
    #[error("characteristic {uuid}: {reason}")]
    Characteristic { uuid: Uuid, reason: String },
}

/// A device found during discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredDevice {
    /// Advertised name, e.g. `QY-QYSC-S-1234`.
    pub name: String,
}

/// Async operations the bridge needs from a BLE stack.
///
/// One transport instance serves one device at a time.
#[async_trait]
pub trait BleTransport: Send + Sync {
    /// Finds a device whose advertised name starts with one of `name_prefixes`.
    async fn discover(&self, name_prefixes: &[String]) -> Result<DiscoveredDevice, TransportError>;

    /// Opens the link to the discovered device.
    async fn connect_link(&self) -> Result<(), TransportError>;

    /// Resolves the primary service `service`.
    async fn resolve_service(&self, service: &Uuid) -> Result<(), TransportError>;

    /// UUID strings of every characteristic in `service`.
    async fn list_characteristics(&self, service: &Uuid) -> Result<Vec<String>, TransportError>;

    /// Starts notifications on `characteristic`.  Each notification payload
    /// arrives on the returned channel; the channel closes when the link does.
    async fn subscribe(
        &self,
        characteristic: &Uuid,
    ) -> Result<mpsc::Receiver<Vec<u8>>, TransportError>;

    /// Stops notifications on `characteristic`.
    async fn unsubscribe(&self, characteristic: &Uuid) -> Result<(), TransportError>;

    /// Writes `data` to `characteristic`.
    async fn write(&self, characteristic: &Uuid, data: &[u8]) -> Result<(), TransportError>;

    /// Closes the link.
    async fn disconnect_link(&self) -> Result<(), TransportError>;
}
