pub mod error;
pub mod ids;
pub mod messages;
pub mod requests;
pub mod responses;
pub mod status;


pub use error::{LedgerError, Result};
pub use ids::{AccountId, Timestamp, TopicId, TransactionId};
pub use requests::{CallKind, CallRequest, MethodName, RequestId};
pub use responses::CallResponse;
pub use status::{Code, Status};
