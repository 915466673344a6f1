pub mod error;
mod reply;
pub mod service;

pub use crate::reply::Reply;
pub use crate::service::RemoteService;
use std::sync::Arc;

pub type RemoteHandle = Arc<dyn RemoteService + Send + Sync>;
