pub mod backend;
pub mod dispatch;
pub mod retry;
pub mod storage;

pub use backend::{Backend, Credentials, DocumentMail, Token};
pub use dispatch::{
  academic_year_id, dispatch, plan, DispatchReport, OlympiadRecord, OlympiadSink, PlanOptions,
  UploadFailure,
};
pub use retry::{Backoff, RetryPolicy};
pub use storage::Storage;
