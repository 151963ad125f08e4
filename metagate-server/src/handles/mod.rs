mod device_handle;
mod event_handle;
mod health_handle;

pub use device_handle::{
    DeviceState, enqueue_command, get_devices, patch_device, ping_device, post_status,
};
pub use event_handle::stream_events;
pub use health_handle::check_health;
