//! # Leadership
//!
//! Lease-based leader election and the run supervisor.
//!
//! - `LeaseLock`: versioned lease storage (`KubeLeaseLock`, `MemoryLeaseLock`)
//! - `LeaderElector`: acquire/renew loop around a leading task
//! - `Supervisor`: standalone or election-gated run; lease loss is fatal
//!
//! ## Usage Example
//!
//! ```ignore
//! use leadership::{new_identity, ElectionConfig, KubeLeaseLock, LeaderElector, RunMode, Supervisor};
//!
//! let lock = KubeLeaseLock::new(client, "monitoring", "loki-event-collector");
//! let elector = LeaderElector::new(lock, ElectionConfig::new(new_identity()))?;
//! let outcome = Supervisor::run(RunMode::LeaderElection(elector), stop, |token| {
//!     controller.run(workers, token)
//! })
//! .await;
//! ```

mod elector;
mod error;
mod identity;
mod kube_lock;
mod lock;
mod memory_lock;
mod supervisor;

pub use elector::{ElectionConfig, ElectionOutcome, LeaderElector};
pub use error::{LeadershipError, Result};
pub use identity::{hostname, new_identity};
pub use kube_lock::KubeLeaseLock;
pub use lock::{LeaseLock, LeaseRecord, LocalLeaseLock};
pub use memory_lock::MemoryLeaseLock;
pub use supervisor::{RunMode, Supervisor, SupervisorOutcome};
