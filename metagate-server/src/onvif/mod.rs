mod device_service;
mod event_service;
pub mod soap;
mod subscription;

pub use device_service::serve_device_services;
pub use event_service::{EventService, spawn_pump};
pub use subscription::{Subscription, SubscriptionManager};
