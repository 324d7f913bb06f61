pub mod error;
pub mod extraction;
pub mod processor;
pub mod structuring;

pub use error::{ConversionError, ConversionErrorKind};
pub use processor::{ConversionOutcome, RecipeConverter};
