pub mod tunable;
pub mod experiment;
pub mod recommendation;
pub mod errors;

pub use tunable::*;
pub use experiment::*;
pub use recommendation::*;
pub use errors::*;
