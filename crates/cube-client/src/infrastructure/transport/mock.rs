//! In-memory BLE transport for tests and capture replay.
//!
//! # Why a mock transport?
//!
//! A real BLE stack needs a radio, a powered-on cube, and an operating system
//! permission prompt.  None of that is available in CI.  `MockTransport`
//! replaces the radio with plain memory:
//!
//! - It "advertises" one device name, chosen at construction.
//! - It reports the GATT characteristics of that device's family (upper-cased,
//!   to exercise case-insensitive matching), or whatever list a test sets.
//! - Every call is appended to [`MockTransport::calls`] and every write to
//!   [`MockTransport::writes`], so tests can assert on order and content.
//! - Notifications are injected with [`MockTransport::notify`].
//!
//! # Failure injection
//!
//! Set [`MockTransport::fail_at`] to make one operation return an error.  This
//! lets tests check that a failed connection attempt tears down whatever it
//! had already set up.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::mpsc;
use uuid::Uuid;

use cube_core::DeviceModel;

use super::{BleTransport, DiscoveredDevice, TransportError};

/// One recorded transport call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    Discover,
    ConnectLink,
    ResolveService(Uuid),
    ListCharacteristics(Uuid),
    Subscribe(Uuid),
    Unsubscribe(Uuid),
    Write(Uuid),
    DisconnectLink,
}

/// Operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    ConnectLink,
    ResolveService,
    Subscribe,
    Write,
    Unsubscribe,
}

/// A transport backed by memory.
pub struct MockTransport {
    device_name: String,
    buffer: usize,
    /// Characteristic UUID strings reported by `list_characteristics`.
    pub characteristics: Mutex<Vec<String>>,
    /// Every call, in order.
    pub calls: Mutex<Vec<TransportCall>>,
    /// Every write, in order: (characteristic, bytes).
    pub writes: Mutex<Vec<(Uuid, Vec<u8>)>>,
    /// The operation that should fail, if any.
    pub fail_point: Mutex<Option<FailPoint>>,
    sender: Mutex<Option<mpsc::Sender<Vec<u8>>>>,
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockTransport {
    /// Creates a transport advertising `device_name`, with a notification
    /// channel holding up to `buffer` pending payloads.
    pub fn advertising(device_name: impl Into<String>, buffer: usize) -> Self {
        let device_name = device_name.into();
        let characteristics = DeviceModel::detect(&device_name)
            .map(|model| {
                let profile = model.gatt_profile();
                let mut list = vec![profile.notify.to_string().to_uppercase()];
                if profile.write != profile.notify {
                    list.push(profile.write.to_string().to_uppercase());
                }
                list
            })
            .unwrap_or_default();

        Self {
            device_name,
            buffer: buffer.max(1),
            characteristics: Mutex::new(characteristics),
            calls: Mutex::new(Vec::new()),
            writes: Mutex::new(Vec::new()),
            fail_point: Mutex::new(None),
            sender: Mutex::new(None),
        }
    }

    /// Makes `point` fail from now on.
    pub fn fail_at(&self, point: FailPoint) {
        *lock(&self.fail_point) = Some(point);
    }

    /// A copy of the recorded calls.
    pub fn recorded_calls(&self) -> Vec<TransportCall> {
        lock(&self.calls).clone()
    }

    /// A copy of the recorded writes.
    pub fn recorded_writes(&self) -> Vec<(Uuid, Vec<u8>)> {
        lock(&self.writes).clone()
    }

    /// `true` while a subscriber holds the notification channel.
    pub fn is_subscribed(&self) -> bool {
        lock(&self.sender).is_some()
    }

    /// Delivers one notification.  Returns `false` if nobody is subscribed.
    pub async fn notify(&self, payload: Vec<u8>) -> bool {
        let sender = lock(&self.sender).clone();
        match sender {
            Some(tx) => tx.send(payload).await.is_ok(),
            None => false,
        }
    }

    /// Closes the notification channel, as a dropped link would.
    pub fn close_notifications(&self) {
        lock(&self.sender).take();
    }

    fn record(&self, call: TransportCall) {
        lock(&self.calls).push(call);
    }

    fn check(&self, point: FailPoint) -> Result<(), TransportError> {
        if *lock(&self.fail_point) == Some(point) {
            return Err(TransportError::Link(format!("injected failure at {point:?}")));
        }
        Ok(())
    }
}

#[async_trait]
impl BleTransport for MockTransport {
    async fn discover(&self, name_prefixes: &[String]) -> Result<DiscoveredDevice, TransportError> {
        self.record(TransportCall::Discover);
        if name_prefixes.iter().any(|p| self.device_name.starts_with(p.as_str())) {
            Ok(DiscoveredDevice {
                name: self.device_name.clone(),
            })
        } else {
            Err(TransportError::NoDevice(name_prefixes.to_vec()))
        }
    }

    async fn connect_link(&self) -> Result<(), TransportError> {
        self.record(TransportCall::ConnectLink);
        self.check(FailPoint::ConnectLink)
    }

    async fn resolve_service(&self, service: &Uuid) -> Result<(), TransportError> {
        self.record(TransportCall::ResolveService(*service));
        self.check(FailPoint::ResolveService)
            .map_err(|_| TransportError::ServiceNotFound(*service))
    }

    async fn list_characteristics(&self, service: &Uuid) -> Result<Vec<String>, TransportError> {
        self.record(TransportCall::ListCharacteristics(*service));
        Ok(lock(&self.characteristics).clone())
    }

    async fn subscribe(
        &self,
        characteristic: &Uuid,
    ) -> Result<mpsc::Receiver<Vec<u8>>, TransportError> {
        self.record(TransportCall::Subscribe(*characteristic));
        self.check(FailPoint::Subscribe)?;
        let (tx, rx) = mpsc::channel(self.buffer);
        *lock(&self.sender) = Some(tx);
        Ok(rx)
    }

    async fn unsubscribe(&self, characteristic: &Uuid) -> Result<(), TransportError> {
        self.record(TransportCall::Unsubscribe(*characteristic));
        self.check(FailPoint::Unsubscribe)?;
        lock(&self.sender).take();
        Ok(())
    }

    async fn write(&self, characteristic: &Uuid, data: &[u8]) -> Result<(), TransportError> {
        self.record(TransportCall::Write(*characteristic));
        if *lock(&self.fail_point) == Some(FailPoint::Write) {
            return Err(TransportError::Characteristic {
                uuid: *characteristic,
                reason: "injected write failure".to_string(),
            });
        }
        lock(&self.writes).push((*characteristic, data.to_vec()));
        Ok(())
    }

    async fn disconnect_link(&self) -> Result<(), TransportError> {
        self.record(TransportCall::DisconnectLink);
        lock(&self.sender).take();
        Ok(())
    }
}
