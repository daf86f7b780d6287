use crate::domain::model::{CustomFileRequest, LandingRequest, License, RepoSettings, WorkshopRequest};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "project-hub")]
#[command(about = "Research, plan and produce landing pages, workshop kits and research letters")]
pub struct Cli {
    /// TOML config file (defaults to ./hub.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Emit logs as JSON lines")]
    pub json_logs: bool,

    /// Overrides [output].dir
    #[arg(long, global = true)]
    pub output: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Build a landing page and optionally push it to GitHub
    Landing(LandingArgs),
    /// Plan a workshop and produce its promotion kit
    Workshop(WorkshopArgs),
    /// Write a research letter and a blog post on a topic
    Letter(LetterArgs),
    /// Create a standalone Google Forms registration form
    Form(FormArgs),
}

#[derive(Debug, Args)]
pub struct LandingArgs {
    #[arg(long)]
    pub brief: String,

    #[arg(long)]
    pub product: String,

    #[arg(long, default_value = "Developers")]
    pub audience: String,

    #[arg(long, default_value = "landing-page")]
    pub repo_name: String,

    #[arg(long, default_value = "AI-generated landing page")]
    pub repo_description: String,

    /// Account or organization to create the repo under
    #[arg(long)]
    pub owner: Option<String>,

    #[arg(long, help = "Create a public repository")]
    pub public: bool,

    #[arg(long, default_value = "MIT")]
    pub license: License,

    #[arg(long, help = "Add a lint workflow under .github/workflows")]
    pub ci: bool,

    /// Extra file as type:name:prompt, e.g. js:tabs.js:Tabbed code samples
    #[arg(long = "file")]
    pub files: Vec<CustomFileRequest>,

    #[arg(long, help = "Push the generated files to GitHub")]
    pub push: bool,

    #[arg(long, help = "Write self-contained HTML previews next to the bundle")]
    pub preview: bool,
}

impl LandingArgs {
    pub fn to_request(&self, default_owner: Option<String>) -> LandingRequest {
        LandingRequest {
            brief: self.brief.clone(),
            product: self.product.clone(),
            audience: self.audience.clone(),
            repo: RepoSettings {
                owner: self.owner.clone().or(default_owner),
                name: self.repo_name.clone(),
                description: self.repo_description.clone(),
                private: !self.public,
                license: self.license,
                add_ci: self.ci,
            },
            custom_files: self.files.clone(),
        }
    }
}

#[derive(Debug, Args)]
pub struct WorkshopArgs {
    #[arg(long, default_value = "1-day AI workshop")]
    pub goal: String,

    #[arg(long, default_value = "high-school students")]
    pub audience: String,

    #[arg(long, default_value = "budget < $200")]
    pub constraints: String,

    /// Workshop date (YYYY-MM-DD); ten days from today when omitted
    #[arg(long)]
    pub date: Option<NaiveDate>,

    #[arg(long, help = "Create a Google Forms registration form")]
    pub form: bool,
}

impl WorkshopArgs {
    pub fn to_request(&self, today: NaiveDate) -> WorkshopRequest {
        WorkshopRequest {
            goal: self.goal.clone(),
            audience: self.audience.clone(),
            constraints: self.constraints.clone(),
            date: self
                .date
                .unwrap_or_else(|| today + chrono::Duration::days(10)),
            today,
            create_form: self.form,
        }
    }
}

#[derive(Debug, Args)]
pub struct LetterArgs {
    #[arg(long)]
    pub topic: String,
}

#[derive(Debug, Args)]
pub struct FormArgs {
    #[arg(long, default_value = "Workshop Registration Form")]
    pub title: String,

    #[arg(long, default_value = "Auto-generated registration form")]
    pub description: String,
}
