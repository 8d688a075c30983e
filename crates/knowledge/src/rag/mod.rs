//! RAG answering: the request pipeline and its wire types.

pub mod ask;
pub mod types;

pub use ask::RagPipeline;
pub use types::{AnswerWarning, AskRequest, AskResponse, Citation};
