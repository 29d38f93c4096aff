mod double;
mod snapshot;

pub use double::*;
pub use snapshot::*;
