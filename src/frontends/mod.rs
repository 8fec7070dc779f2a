//! Interactive fuzzy pickers used when a command needs the user to choose.

pub mod fzf;
pub mod skim;
pub mod traits;

pub use fzf::*;
pub use skim::*;
pub use traits::*;
