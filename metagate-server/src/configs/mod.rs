mod settings;
mod state;

pub use settings::{Detector, Logger, Onvif, Settings, Web};
pub use state::{load_or_init, save_devices};
