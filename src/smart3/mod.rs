//! The wire layers of the Smart3 protocol: packet model and encoding, the
//! inbound framing state machine, the serial port driver, the
//! acknowledgement transceiver and the dialogue console.

pub mod console;
pub mod framer;
pub mod packet;
pub mod serial;
pub mod serial_mock;
pub mod transceiver;

pub use console::{Console, MessageHandler, MAX_RETRIES};
pub use framer::PacketFramer;
pub use packet::{pack_packet, BroadcastPacket, IndicatorPacket, MessagePacket, Packet};
pub use serial::{open_port, SerialLink, Smart3Port};
pub use serial_mock::MockSerialPort;
pub use transceiver::Transceiver;
