pub mod assignee;
pub mod board;
pub mod column;
pub mod errors;
pub mod extraction;
pub mod identifiers;
pub mod mention;
pub mod profile;
pub mod team;
pub mod todo;

pub use assignee::*;
pub use board::*;
pub use column::*;
pub use errors::*;
pub use extraction::*;
pub use identifiers::*;
pub use mention::*;
pub use profile::*;
pub use team::*;
pub use todo::*;
