mod command;
mod device;
mod event;

pub use command::Command;
pub use device::Device;
pub use event::Event;
