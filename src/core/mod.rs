pub mod error;
pub mod identifier;

pub use error::{MapperError, MapperResult, PersistError, Result, UnsupportedKind};
pub use identifier::Identifier;
