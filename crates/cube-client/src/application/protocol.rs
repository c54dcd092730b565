//! The capability trait shared by both device families.
//!
//! # Why a trait? (for beginners)
//!
//! QiYi and MoYu32 cubes speak completely different wire formats, but the
//! connection lifecycle around them is identical: send a handshake, feed
//! every notification in, write back whatever the device expects, and pass
//! moves on.  [`CubeProtocol`] captures exactly that surface, so the
//! connection code holds a `Box<dyn CubeProtocol>` and never needs to know
//! which vendor it is talking to.
//!
//! Construction *is* initialisation: an adapter derives its key material in
//! its constructor, and [`CubeProtocol::release`] wipes it again.

use cube_core::cipher::KeyError;
use cube_core::{DeviceModel, FrameError, HardwareAddress, MoveEvent};

use super::moyu32::MoYu32Protocol;
use super::qiyi::QiYiProtocol;

/// What a single notification produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationOutcome {
    /// Reconciled moves, oldest first.
    pub moves: Vec<MoveEvent>,
    /// Encrypted frames to write back to the device, in order.
    pub replies: Vec<Vec<u8>>,
}

/// A vendor protocol adapter.
///
/// Adapters are synchronous and perform no I/O.  Inbound problems (corrupt
/// frames, unknown opcodes, invalid move codes) are logged and dropped inside
/// [`on_notification`](CubeProtocol::on_notification); they never end the
/// connection.
pub trait CubeProtocol: Send {
    /// The device family this adapter speaks to.
    fn model(&self) -> DeviceModel;

    /// Encrypted frames to write, in order, right after subscribing.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError`] if a handshake frame cannot be built.
    fn handshake(&mut self) -> Result<Vec<Vec<u8>>, FrameError>;

    /// Processes one raw notification.
    fn on_notification(&mut self, raw: &[u8]) -> NotificationOutcome;

    /// Last battery level reported by the device, in percent.
    fn battery_level(&self) -> Option<u8>;

    /// Last sticker state reported by the device, if the family reports one.
    fn facelets(&self) -> Option<&str> {
        None
    }

    /// Wipes the key material.  Later notifications are ignored.
    fn release(&mut self);
}

/// Builds the adapter for `model`, deriving its key material.
///
/// # Errors
///
/// Returns [`KeyError`] if an embedded key literal cannot be decoded.
pub fn create_protocol(
    model: DeviceModel,
    address: HardwareAddress,
) -> Result<Box<dyn CubeProtocol>, KeyError> {
    Ok(match model {
        DeviceModel::QiYi => Box::new(QiYiProtocol::new(address)?),
        DeviceModel::MoYu32 => Box::new(MoYu32Protocol::new(address)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_protocol_picks_adapter_by_model() {
        for model in DeviceModel::ALL {
            // Arrange
            let address = HardwareAddress::new([1, 2, 3, 4, 5, 6]);

            // Act
            let protocol = create_protocol(model, address).unwrap();

            // Assert
            assert_eq!(protocol.model(), model);
            assert_eq!(protocol.battery_level(), None);
        }
    }
}
