//! Order persistence and aggregation.
//!
//! Writes an order header and all of its line items in one transaction, and
//! rebuilds nested [`Order`] aggregates from the flat rows of a header/line
//! item join in a single pass.

pub mod assembler;
pub mod error;
pub mod memory;
pub mod model;
pub mod postgres;
pub mod pricing;
pub mod repository;

pub use assembler::{OrderAssembler, OrderRow, assemble_orders};
pub use common::{AccountId, Money, OrderId, ProductId};
pub use error::{ErrorKind, OrderStoreError, Result};
pub use memory::InMemoryOrderRepository;
pub use model::{Order, OrderedProduct};
pub use postgres::PostgresOrderRepository;
pub use pricing::compute_total;
pub use repository::{OrderRepository, validate_order_for_put};
