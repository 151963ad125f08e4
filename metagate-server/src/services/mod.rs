mod audit;
mod command_hub;
mod discovery;
mod event_bus;
mod ingest;
mod monitor;
mod registry;
mod render;

pub use audit::CsvAudit;
pub use command_hub::CommandHub;
pub use discovery::DiscoveryResponder;
pub use event_bus::EventBus;
pub use ingest::{DetectionAudit, PacketIngest, ZoneRenderer};
pub use monitor::LivenessMonitor;
pub use registry::{BUILT_IN_UIDS, DeviceRegistry, is_built_in};
pub use render::PgmRenderer;
