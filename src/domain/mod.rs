//! Domain layer: entities and value objects with no knowledge of the bus,
//! the state store or HTTP.

pub mod authorizer;
pub mod charge_point;
pub mod connector;
pub mod transaction;

pub use authorizer::{AlwaysAccept, AuthorizationStatus, Authorizer};
pub use charge_point::ChargePointInfo;
pub use connector::{ConnectorState, ConnectorStatus};
pub use transaction::{TransactionInfo, TransactionStatus};
