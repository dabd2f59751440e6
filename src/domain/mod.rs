pub mod directory;
pub mod meter;
pub mod types;

pub use directory::*;
pub use meter::*;
pub use types::*;
