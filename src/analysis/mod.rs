mod types;
mod error;
mod iupac;
mod dpal;
mod tm;
mod library;
mod scorer;
mod generator;
mod pair;
mod selector;
mod design;

pub use types::*;
pub use error::*;
pub use iupac::*;
pub use dpal::*;
pub use tm::*;
pub use library::*;
pub use scorer::*;
pub use generator::*;
pub use pair::*;
pub use selector::*;
pub use design::*;
