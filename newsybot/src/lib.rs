// Library interface for newsybot modules
// This allows tests and other binaries to import modules

pub mod category;
pub mod channel;
pub mod commands;
pub mod cycle;
pub mod digest;
pub mod distributor;
pub mod news;
pub mod platform;
pub mod scheduler;
pub mod subscriptions;

pub use category::{Categories, Category};
pub use cycle::{CycleReport, NewsCycle};
pub use digest::DigestMap;
pub use distributor::{DistributionReport, Distributor, TenantOutcome};
pub use scheduler::{readiness, CycleScheduler};
pub use subscriptions::SubscriptionStore;
