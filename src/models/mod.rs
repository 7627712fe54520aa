pub mod canonical;
pub mod enums;
pub mod lab;
pub mod plan;
pub mod query;

pub use canonical::*;
pub use enums::*;
pub use lab::*;
pub use plan::*;
pub use query::*;
