pub mod checklist;
pub mod confirm;
pub mod reconciler;
pub mod session;
pub mod teams;
pub mod transcript;

pub use checklist::*;
pub use confirm::*;
pub use reconciler::*;
pub use session::*;
pub use teams::*;
pub use transcript::*;
