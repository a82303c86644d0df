//! Token broker (C1) and the five data-source adapters (C2). Each adapter
//! is an independent failure domain: recoverable remote errors return an
//! empty or partial result rather than propagating, per §4.2.

pub mod analytics;
pub mod cms;
pub mod link_checker;
pub mod performance;
pub mod search_index;
pub mod token_broker;

pub use token_broker::TokenBroker;
