pub mod dynamodb;
pub mod dynamodb_store;
pub mod extractor;
pub mod llm;
pub mod memory;
pub mod models;
pub mod store;

pub use dynamodb::*;
pub use dynamodb_store::*;
pub use extractor::*;
pub use llm::*;
pub use memory::*;
pub use models::*;
pub use store::*;
