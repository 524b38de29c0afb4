pub mod errors;
pub mod params;
pub mod workflow;

pub use errors::*;
pub use params::*;
pub use workflow::*;
