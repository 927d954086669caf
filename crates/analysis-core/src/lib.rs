pub mod error;
pub mod math;
pub mod records;
pub mod traits;
pub mod types;

pub use error::*;
pub use records::*;
pub use traits::*;
pub use types::*;
