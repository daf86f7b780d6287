pub mod bundle;
pub mod chat;
pub mod engine;
pub mod landing;
pub mod publication;
pub mod workshop;

pub use crate::domain::ports::{
    ChatModel, ChatRequest, Deliverable, FormInfo, FormPublisher, Pipeline, Storage,
};
pub use crate::utils::error::Result;
