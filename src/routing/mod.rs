//! Service router / weighted balancer / bounded client pool (C10).
//!
//! Three independent registries over the same idea — a set of named
//! services — composed by callers rather than each other: [`ServiceRouter`]
//! picks a service id by keyword or property match, [`ServiceBalancer`]
//! picks the next id by weighted round robin, and [`ServiceClientPool`]
//! bounds how many live client instances of a given service may exist at
//! once.

mod balancer;
mod pool;
mod router;


pub use balancer::ServiceBalancer;
pub use pool::{PoolError, ServiceClientPool};
pub use router::ServiceRouter;
