//! Database layer - connection pool, migrations, repositories
//!
//! # Design Principles
//!
//! - Connection pool (bounded) - no Arc<Mutex<Connection>>
//! - List operations use window-function totals - no N+1 queries
//! - Rely on DB constraints, handle conflicts - no check-then-insert
//! - Transactions for multi-step writes (status change + audit record)

pub mod migrations;
pub mod pool;
pub mod repos;

pub use pool::create_pool;
pub use repos::*;
