//! Command implementations for bmcfw

pub mod apply;
pub mod forget;
pub mod inventory;
pub mod read;

pub use apply::apply;
pub use forget::forget;
pub use inventory::inventory;
pub use read::read;
