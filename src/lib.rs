pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use adapters::{
    forms::{FormsClient, GoogleAuth, GoogleForms},
    github::GitHubClient,
    llm::{OpenAiCompatClient, Provider},
    storage::LocalStorage,
};
pub use config::HubConfig;
pub use core::{
    engine::{HubEngine, RunReport},
    landing::LandingPipeline,
    publication::PublicationPipeline,
    workshop::WorkshopPipeline,
};
pub use utils::error::{HubError, Result};
