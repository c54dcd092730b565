//! Connection lifecycle: from discovery to teardown.
//!
//! # Connect sequence (for beginners)
//!
//! Opening a session with a cube is a strict sequence of awaited steps.  Each
//! step depends on the one before it, so nothing runs in parallel:
//!
//! ```text
//! discover(prefixes)         advertised name, e.g. "WCU_MY32_ABCD"
//!  └─ detect model            unknown prefix → ConnectOutcome::Unsupported
//!  └─ rebuild address         from the last four hex digits of the name
//!  └─ connect_link
//!  └─ resolve_service         vendor GATT service
//!  └─ list_characteristics    must contain the notify and write UUIDs
//!  └─ derive key material     adapter constructor
//!  └─ subscribe(notify)
//!  └─ write handshake frames  one at a time, in order
//! ```
//!
//! If any step after `connect_link` fails, whatever was set up is torn down
//! again (unsubscribe, then disconnect) before the error is returned.  A
//! failed attempt never leaves a subscription or an open link behind.
//!
//! # Notification loop
//!
//! [`ConnectionHandle::run`] reads notifications until the channel closes.
//! Each one goes through the adapter; replies are written back in order and
//! moves are passed to the [`MoveSink`].  Corrupt frames are dropped inside
//! the adapter; only a transport write failure ends the loop.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use cube_core::cipher::KeyError;
use cube_core::protocol::gatt::uuid_matches;
use cube_core::{AddressError, DeviceModel, FrameError, GattProfile};

use crate::application::move_sink::MoveSink;
use crate::application::protocol::{create_protocol, CubeProtocol};
use crate::infrastructure::transport::{BleTransport, TransportError};

/// Fatal errors while opening a connection.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    #[error("cannot derive hardware address: {0}")]
    Address(#[from] AddressError),

    #[error("cannot load key material: {0}")]
    Key(#[from] KeyError),

    #[error("cannot build handshake: {0}")]
    Frame(#[from] FrameError),

    #[error("device does not expose characteristic {0}")]
    MissingCharacteristic(Uuid),
}

/// Result of a connection attempt that did not fail.
pub enum ConnectOutcome {
    /// The device is connected and the handshake has been sent.
    Connected(ConnectionHandle),
    /// A device was found but its name matches no supported family.
    Unsupported { name: String },
}

impl std::fmt::Debug for ConnectOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectOutcome::Connected(handle) => f
                .debug_tuple("Connected")
                .field(&handle.device_name)
                .finish(),
            ConnectOutcome::Unsupported { name } => {
                f.debug_struct("Unsupported").field("name", name).finish()
            }
        }
    }
}

/// An open session with one cube.
///
/// Owns exactly one adapter, one transport reference, and one notification
/// subscription.
pub struct ConnectionHandle {
    transport: Arc<dyn BleTransport>,
    protocol: Box<dyn CubeProtocol>,
    sink: Arc<dyn MoveSink>,
    profile: GattProfile,
    notifications: Option<mpsc::Receiver<Vec<u8>>>,
    device_name: String,
    closed: bool,
}

impl ConnectionHandle {
    /// Discovers a device and runs the full connect sequence.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectError`] if discovery or any setup step fails.  By the
    /// time the error is returned, the link has been torn down.
    pub async fn connect(
        transport: Arc<dyn BleTransport>,
        sink: Arc<dyn MoveSink>,
        name_prefixes: &[String],
    ) -> Result<ConnectOutcome, ConnectError> {
        let device = transport.discover(name_prefixes).await?;
        let Some(model) = DeviceModel::detect(&device.name) else {
            info!(name = %device.name, "device is not a supported cube");
            return Ok(ConnectOutcome::Unsupported { name: device.name });
        };
        let address = model.address_from_name(&device.name)?;
        info!(name = %device.name, %model, %address, "connecting");

        transport.connect_link().await?;
        let profile = model.gatt_profile();
        let mut subscribed = false;

        match Self::setup(transport.as_ref(), model, address, &profile, &mut subscribed).await {
            Ok((protocol, notifications)) => {
                info!(name = %device.name, "handshake sent");
                Ok(ConnectOutcome::Connected(ConnectionHandle {
                    transport,
                    protocol,
                    sink,
                    profile,
                    notifications: Some(notifications),
                    device_name: device.name,
                    closed: false,
                }))
            }
            Err(e) => {
                warn!(error = %e, "connection setup failed; tearing down");
                if subscribed {
                    if let Err(err) = transport.unsubscribe(&profile.notify).await {
                        debug!(error = %err, "unsubscribe during teardown failed");
                    }
                }
                if let Err(err) = transport.disconnect_link().await {
                    debug!(error = %err, "disconnect during teardown failed");
                }
                Err(e)
            }
        }
    }

    async fn setup(
        transport: &dyn BleTransport,
        model: DeviceModel,
        address: cube_core::HardwareAddress,
        profile: &GattProfile,
        subscribed: &mut bool,
    ) -> Result<(Box<dyn CubeProtocol>, mpsc::Receiver<Vec<u8>>), ConnectError> {
        transport.resolve_service(&profile.service).await?;

        let reported = transport.list_characteristics(&profile.service).await?;
        for needed in [profile.notify, profile.write] {
            if !reported.iter().any(|uuid| uuid_matches(uuid, &needed)) {
                return Err(ConnectError::MissingCharacteristic(needed));
            }
        }

        let mut protocol = create_protocol(model, address)?;
        let handshake = protocol.handshake()?;

        let notifications = transport.subscribe(&profile.notify).await?;
        *subscribed = true;

        for frame in &handshake {
            transport.write(&profile.write, frame).await?;
        }
        Ok((protocol, notifications))
    }

    /// Advertised name of the connected device.
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Device family of the connected device.
    pub fn model(&self) -> DeviceModel {
        self.protocol.model()
    }

    /// Last battery level the device reported.
    pub fn battery_level(&self) -> Option<u8> {
        self.protocol.battery_level()
    }

    /// Last sticker state the device reported, if its family reports one.
    pub fn facelets(&self) -> Option<&str> {
        self.protocol.facelets()
    }

    /// `true` once [`disconnect`](Self::disconnect) has run.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Handles one raw notification: writes any replies, then forwards moves
    /// to the sink.  Returns the number of moves forwarded.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if writing a reply fails.
    pub async fn process_notification(&mut self, raw: &[u8]) -> Result<usize, TransportError> {
        if self.closed {
            return Ok(0);
        }
        let outcome = self.protocol.on_notification(raw);
        for reply in &outcome.replies {
            self.transport.write(&self.profile.write, reply).await?;
        }
        for event in &outcome.moves {
            debug!(mv = %event, marker = event.marker, "move");
            self.sink.on_move(event);
        }
        Ok(outcome.moves.len())
    }

    /// Processes notifications until the channel closes, then disconnects.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if a reply write fails.  The connection is
    /// disconnected before the error is returned.
    pub async fn run(&mut self) -> Result<(), TransportError> {
        let Some(mut rx) = self.notifications.take() else {
            return Ok(());
        };
        let mut result = Ok(());
        while let Some(raw) = rx.recv().await {
            if let Err(e) = self.process_notification(&raw).await {
                warn!(error = %e, "write failed; closing connection");
                result = Err(e);
                break;
            }
        }
        drop(rx);
        self.disconnect().await;
        result
    }

    /// Unsubscribes, closes the link, and wipes key material.
    ///
    /// Best-effort and idempotent: transport errors are logged and swallowed,
    /// and calling it again does nothing.
    pub async fn disconnect(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.notifications = None;

        if let Err(e) = self.transport.unsubscribe(&self.profile.notify).await {
            debug!(error = %e, "unsubscribe failed during disconnect");
        }
        if let Err(e) = self.transport.disconnect_link().await {
            debug!(error = %e, "disconnect_link failed");
        }
        self.protocol.release();
        info!(name = %self.device_name, "disconnected");
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::move_sink::MockMoveSink;
    use crate::infrastructure::transport::mock::{FailPoint, MockTransport, TransportCall};
    use cube_core::cipher::keys::qiyi_key;
    use cube_core::protocol::frame::seal_frame;
    use cube_core::Aes128;

    const QIYI: &str = "QY-QYSC-S-1234";

    fn prefixes() -> Vec<String> {
        DeviceModel::ALL
            .iter()
            .map(|m| m.name_prefix().to_string())
            .collect()
    }

    fn quiet_sink() -> Arc<dyn MoveSink> {
        let mut sink = MockMoveSink::new();
        sink.expect_on_move().never();
        Arc::new(sink)
    }

    async fn connect(transport: &Arc<MockTransport>, sink: Arc<dyn MoveSink>) -> ConnectionHandle {
        let outcome = ConnectionHandle::connect(transport.clone(), sink, &prefixes())
            .await
            .unwrap();
        match outcome {
            ConnectOutcome::Connected(handle) => handle,
            other => panic!("expected connection, got {other:?}"),
        }
    }

    fn qiyi_hello(ts: u32) -> Vec<u8> {
        let cipher = Aes128::new(&qiyi_key().unwrap());
        let mut content = vec![0u8; 34];
        content[0] = 0x02;
        content[1..5].copy_from_slice(&ts.to_be_bytes());
        content[33] = 90;
        seal_frame(&cipher, &content).unwrap()
    }

    fn qiyi_move(ts: u32, code: u8) -> Vec<u8> {
        let cipher = Aes128::new(&qiyi_key().unwrap());
        let mut content = vec![0u8; 90];
        content[0] = 0x03;
        content[1..5].copy_from_slice(&ts.to_be_bytes());
        content[32] = code;
        seal_frame(&cipher, &content).unwrap()
    }

    #[tokio::test]
    async fn test_connect_runs_steps_in_order() {
        // Arrange
        let transport = Arc::new(MockTransport::advertising(QIYI, 8));
        let profile = DeviceModel::QiYi.gatt_profile();

        // Act
        let handle = connect(&transport, quiet_sink()).await;

        // Assert
        assert_eq!(handle.model(), DeviceModel::QiYi);
        assert_eq!(
            transport.recorded_calls(),
            [
                TransportCall::Discover,
                TransportCall::ConnectLink,
                TransportCall::ResolveService(profile.service),
                TransportCall::ListCharacteristics(profile.service),
                TransportCall::Subscribe(profile.notify),
                TransportCall::Write(profile.write),
            ]
        );
    }

    #[tokio::test]
    async fn test_unsupported_device_is_not_an_error() {
        let transport = Arc::new(MockTransport::advertising("GAN-i3-1234", 8));

        let outcome =
            ConnectionHandle::connect(transport.clone(), quiet_sink(), &["GAN".to_string()])
                .await
                .unwrap();

        assert!(matches!(outcome, ConnectOutcome::Unsupported { ref name } if name == "GAN-i3-1234"));
        assert_eq!(transport.recorded_calls(), [TransportCall::Discover]);
    }

    #[tokio::test]
    async fn test_missing_characteristic_tears_down_link() {
        // Arrange
        let transport = Arc::new(MockTransport::advertising(QIYI, 8));
        transport.characteristics.lock().unwrap().clear();

        // Act
        let result = ConnectionHandle::connect(transport.clone(), quiet_sink(), &prefixes()).await;

        // Assert
        assert!(matches!(result, Err(ConnectError::MissingCharacteristic(_))));
        assert_eq!(transport.recorded_calls().last(), Some(&TransportCall::DisconnectLink));
        assert!(!transport
            .recorded_calls()
            .iter()
            .any(|c| matches!(c, TransportCall::Subscribe(_))));
    }

    #[tokio::test]
    async fn test_handshake_write_failure_unsubscribes_then_disconnects() {
        // Arrange
        let transport = Arc::new(MockTransport::advertising(QIYI, 8));
        transport.fail_at(FailPoint::Write);
        let notify = DeviceModel::QiYi.gatt_profile().notify;

        // Act
        let result = ConnectionHandle::connect(transport.clone(), quiet_sink(), &prefixes()).await;

        // Assert
        assert!(matches!(result, Err(ConnectError::Transport(_))));
        let calls = transport.recorded_calls();
        assert_eq!(
            &calls[calls.len() - 2..],
            [TransportCall::Unsubscribe(notify), TransportCall::DisconnectLink]
        );
        assert!(!transport.is_subscribed());
    }

    #[tokio::test]
    async fn test_link_failure_propagates() {
        let transport = Arc::new(MockTransport::advertising(QIYI, 8));
        transport.fail_at(FailPoint::ConnectLink);

        let result = ConnectionHandle::connect(transport.clone(), quiet_sink(), &prefixes()).await;

        assert!(matches!(result, Err(ConnectError::Transport(_))));
    }

    #[tokio::test]
    async fn test_process_notification_acks_and_forwards_moves() {
        // Arrange – the sink must see exactly one R
        let mut sink = MockMoveSink::new();
        sink.expect_on_move()
            .withf(|e| e.to_string() == "R")
            .times(1)
            .return_const(());
        let transport = Arc::new(MockTransport::advertising(QIYI, 8));
        let mut handle = connect(&transport, Arc::new(sink)).await;

        // Act
        handle.process_notification(&qiyi_hello(100)).await.unwrap();
        let forwarded = handle.process_notification(&qiyi_move(200, 4)).await.unwrap();

        // Assert
        assert_eq!(forwarded, 1);
        assert_eq!(transport.recorded_writes().len(), 3, "hello + two acks");
        assert_eq!(handle.battery_level(), Some(90));
    }

    #[tokio::test]
    async fn test_corrupt_notification_writes_nothing() {
        let transport = Arc::new(MockTransport::advertising(QIYI, 8));
        let mut handle = connect(&transport, quiet_sink()).await;

        let forwarded = handle.process_notification(&[0xAA; 16]).await.unwrap();

        assert_eq!(forwarded, 0);
        assert_eq!(transport.recorded_writes().len(), 1, "handshake only");
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent_and_swallows_errors() {
        // Arrange
        let transport = Arc::new(MockTransport::advertising(QIYI, 8));
        let mut handle = connect(&transport, quiet_sink()).await;
        transport.fail_at(FailPoint::Unsubscribe);

        // Act
        handle.disconnect().await;
        handle.disconnect().await;

        // Assert
        assert!(handle.is_closed());
        let teardown: Vec<_> = transport
            .recorded_calls()
            .into_iter()
            .filter(|c| matches!(c, TransportCall::Unsubscribe(_) | TransportCall::DisconnectLink))
            .collect();
        assert_eq!(teardown.len(), 2, "teardown runs once");
        assert_eq!(handle.process_notification(&qiyi_hello(1)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_run_drains_channel_then_disconnects() {
        // Arrange
        let mut sink = MockMoveSink::new();
        sink.expect_on_move().times(2).return_const(());
        let transport = Arc::new(MockTransport::advertising(QIYI, 8));
        let mut handle = connect(&transport, Arc::new(sink)).await;

        for frame in [qiyi_hello(10), qiyi_move(20, 2), qiyi_move(30, 8)] {
            assert!(transport.notify(frame).await);
        }
        transport.close_notifications();

        // Act
        handle.run().await.unwrap();

        // Assert
        assert!(handle.is_closed());
        assert_eq!(
            transport.recorded_calls().last(),
            Some(&TransportCall::DisconnectLink)
        );
    }
}
