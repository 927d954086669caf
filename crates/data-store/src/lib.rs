//! SQL persistence for statements, market data, companies and derived results.

mod rows;
mod store;


pub use store::SqlStore;
