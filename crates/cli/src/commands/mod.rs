pub mod info;
pub mod inspect;
pub mod update;
pub mod util;

pub use info::*;
pub use inspect::*;
pub use update::*;
pub use util::*;
