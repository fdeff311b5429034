pub mod message;
pub mod request;
pub mod response;

pub use message::{MessageType, OperationMessage};
pub use request::QueryPayload;
pub use response::{DataPayload, GraphQLResponse};
