pub mod channel_sensor;
pub mod device;
mod listener;
pub mod sensor;
pub mod session;

pub use channel_sensor::ChannelSensor;
pub use device::ScannerDevice;
pub use sensor::{Detection, Permission, Sensor};
pub use session::{ScanSession, ScanState};
