mod executor;
mod output;
mod parser;
mod piper;
mod stage;

pub use executor::*;
pub use output::*;
pub use parser::*;
pub use piper::*;
pub use stage::*;
