pub mod candidate;
pub mod recipe;

pub use candidate::*;
pub use recipe::*;
