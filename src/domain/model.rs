use crate::utils::error::Result as HubResult;
use crate::utils::validation::{
    validate_bundle_path, validate_non_empty_string, validate_repo_name, Validate,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Model name used for each pipeline step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepModels {
    pub research: String,
    pub planner: String,
    pub producer: String,
}

impl StepModels {
    pub fn uniform(model: impl Into<String>) -> Self {
        let model = model.into();
        Self {
            research: model.clone(),
            planner: model.clone(),
            producer: model,
        }
    }
}

// ---------- Shared ----------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Reference {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RiskItem {
    #[serde(default)]
    pub risk: String,
    #[serde(default)]
    pub mitigation: String,
}

pub fn format_references(references: &[Reference]) -> String {
    references
        .iter()
        .map(|r| format!("- {}: {}", r.title, r.url))
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------- Landing page ----------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum License {
    #[default]
    #[serde(rename = "MIT")]
    Mit,
    #[serde(rename = "Apache-2.0")]
    Apache2,
    #[serde(rename = "None")]
    None,
}

impl fmt::Display for License {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            License::Mit => write!(f, "MIT"),
            License::Apache2 => write!(f, "Apache-2.0"),
            License::None => write!(f, "None"),
        }
    }
}

impl FromStr for License {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mit" => Ok(License::Mit),
            "apache-2.0" | "apache2" | "apache" => Ok(License::Apache2),
            "none" | "" => Ok(License::None),
            other => Err(format!("unknown license '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepoSettings {
    /// Account or organization; the token's own login when unset.
    pub owner: Option<String>,
    pub name: String,
    pub description: String,
    pub private: bool,
    pub license: License,
    pub add_ci: bool,
}

impl Default for RepoSettings {
    fn default() -> Self {
        Self {
            owner: None,
            name: "landing-page".to_string(),
            description: "AI-generated landing page".to_string(),
            private: true,
            license: License::Mit,
            add_ci: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CustomFileKind {
    Html,
    Css,
    Js,
}

impl CustomFileKind {
    pub fn label(&self) -> &'static str {
        match self {
            CustomFileKind::Html => "HTML",
            CustomFileKind::Css => "CSS",
            CustomFileKind::Js => "JS",
        }
    }

    pub fn instructions(&self) -> &'static str {
        match self {
            CustomFileKind::Html => "Generate semantic HTML5 code with proper structure.",
            CustomFileKind::Css => "Generate modern CSS with variables and responsive design.",
            CustomFileKind::Js => "Generate vanilla JavaScript ES6+ code.",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            CustomFileKind::Html => "html",
            CustomFileKind::Css => "css",
            CustomFileKind::Js => "js",
        }
    }
}

impl FromStr for CustomFileKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "html" => Ok(CustomFileKind::Html),
            "css" => Ok(CustomFileKind::Css),
            "js" | "javascript" => Ok(CustomFileKind::Js),
            other => Err(format!("unknown file type '{}' (expected html, css or js)", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomFileRequest {
    pub kind: CustomFileKind,
    pub name: String,
    pub prompt: String,
}

impl FromStr for CustomFileRequest {
    type Err = String;

    /// `type:name:prompt`, e.g. `js:tabs.js:Tabbed code samples`.
    /// An empty name falls back to `custom.<ext>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');
        let kind: CustomFileKind = parts.next().unwrap_or_default().parse()?;
        let name = parts.next().unwrap_or_default().trim();
        let prompt = parts
            .next()
            .ok_or_else(|| format!("expected type:name:prompt, got '{}'", s))?
            .trim();

        let name = if name.is_empty() {
            format!("custom.{}", kind.extension())
        } else {
            name.to_string()
        };

        Ok(Self {
            kind,
            name,
            prompt: prompt.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandingRequest {
    pub brief: String,
    pub product: String,
    pub audience: String,
    pub repo: RepoSettings,
    pub custom_files: Vec<CustomFileRequest>,
}

impl Validate for LandingRequest {
    fn validate(&self) -> HubResult<()> {
        validate_non_empty_string("brief", &self.brief)?;
        validate_non_empty_string("product", &self.product)?;
        validate_repo_name("repo.name", &self.repo.name)?;
        for custom in &self.custom_files {
            validate_bundle_path("file", &custom.name)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct LandingResearch {
    pub markdown: String,
    pub overview: String,
    pub competitors: Vec<String>,
    pub hooks: Vec<String>,
    pub keywords: Vec<String>,
    pub risks: Vec<String>,
}

impl LandingResearch {
    pub fn clamp(mut self) -> Self {
        self.competitors.truncate(3);
        self.hooks.truncate(5);
        self.keywords.truncate(10);
        self.risks.truncate(3);
        self
    }
}

pub const DEFAULT_COPY_OUTLINE: [&str; 5] = ["Hero", "Quickstart", "Features", "FAQ", "Footer"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct LandingPlan {
    pub markdown: String,
    pub strategy: String,
    pub milestones: Vec<String>,
    pub success_metrics: Vec<String>,
    pub copy_outline: Vec<String>,
    pub risks: Vec<String>,
    pub repo_notes: Vec<String>,
}

impl LandingPlan {
    pub fn clamp(mut self) -> Self {
        self.milestones.truncate(5);
        self.success_metrics.truncate(6);
        self.copy_outline.truncate(8);
        if self.copy_outline.is_empty() {
            self.copy_outline = DEFAULT_COPY_OUTLINE.iter().map(|s| s.to_string()).collect();
        }
        self
    }
}

/// Generated site files, path -> content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct LandingFiles {
    pub files: BTreeMap<String, String>,
    pub bundle_date: Option<NaiveDate>,
}

impl LandingFiles {
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

// ---------- Workshop ----------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkshopRequest {
    pub goal: String,
    pub audience: String,
    pub constraints: String,
    pub date: NaiveDate,
    pub today: NaiveDate,
    pub create_form: bool,
}

impl WorkshopRequest {
    pub fn days_until(&self) -> i64 {
        (self.date - self.today).num_days()
    }

    /// Goal as sent to the model, e.g. "1-day AI workshop in 10 days".
    pub fn full_goal(&self) -> String {
        let days = self.days_until();
        if days > 0 {
            format!("{} in {} days", self.goal, days)
        } else {
            self.goal.clone()
        }
    }

    pub fn date_context(&self) -> String {
        format!(
            "Today is {}. The workshop is scheduled for {}.",
            self.today.format("%Y-%m-%d"),
            self.date.format("%Y-%m-%d")
        )
    }
}

impl Validate for WorkshopRequest {
    fn validate(&self) -> HubResult<()> {
        validate_non_empty_string("goal", &self.goal)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct WorkshopResearch {
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub risks: Vec<RiskItem>,
    #[serde(default)]
    pub budget_notes: String,
    #[serde(default)]
    pub references: Vec<Reference>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct WorkshopTask {
    pub desc: String,
    #[serde(default)]
    pub effort_hrs: Option<f64>,
    #[serde(default)]
    pub owner: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct WorkshopMilestone {
    pub title: String,
    #[serde(default)]
    pub due: Option<String>,
    #[serde(default)]
    pub tasks: Vec<WorkshopTask>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct WorkshopPlan {
    #[serde(default)]
    pub agenda: Vec<String>,
    #[serde(default)]
    pub milestones: Vec<WorkshopMilestone>,
    #[serde(default)]
    pub success_metrics: Vec<String>,
    #[serde(default)]
    pub risks: Vec<String>,
    /// Human-readable rendering shown to the user.
    #[serde(default)]
    pub markdown: String,
}

impl WorkshopPlan {
    pub fn clamp(mut self) -> Self {
        self.agenda.truncate(6);
        self.milestones.truncate(5);
        for milestone in &mut self.milestones {
            milestone.tasks.truncate(3);
        }
        self.success_metrics.truncate(6);
        self.risks.truncate(4);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct WorkshopAssets {
    #[serde(default)]
    pub invite_email: String,
    #[serde(default)]
    pub poster_text: String,
    #[serde(default)]
    pub checklist: String,
    #[serde(default)]
    pub google_form_url: Option<String>,
    #[serde(skip)]
    pub date: Option<NaiveDate>,
    #[serde(skip)]
    pub days_until: Option<i64>,
}

// ---------- Research letter & blog ----------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ResearchLetter {
    #[serde(default)]
    pub introduction: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub conclusion: String,
    #[serde(default)]
    pub references: Vec<Reference>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct BlogPost {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub introduction: String,
    #[serde(default)]
    pub background: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub conclusion: String,
    #[serde(default)]
    pub references: Vec<Reference>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PublicationPlan {
    pub letter: ResearchLetter,
    pub blog: BlogPost,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(from = "RawFinalAssets")]
pub struct FinalAssets {
    pub letter_content: String,
    pub blog_content: String,
    #[serde(skip)]
    pub topic: String,
    #[serde(skip)]
    pub generated_on: Option<NaiveDate>,
}

/// Every key the model has been seen to use for the two texts.
#[derive(Debug, Deserialize)]
struct RawFinalAssets {
    letter_content: Option<String>,
    letter: Option<String>,
    email_text: Option<String>,
    blog_content: Option<String>,
    blog: Option<String>,
    post_markdown: Option<String>,
}

/// First candidate with visible text, in key priority order.
fn first_filled(candidates: [Option<String>; 3]) -> String {
    candidates
        .into_iter()
        .flatten()
        .find(|text| !text.trim().is_empty())
        .unwrap_or_default()
}

impl From<RawFinalAssets> for FinalAssets {
    fn from(raw: RawFinalAssets) -> Self {
        Self {
            letter_content: first_filled([raw.letter_content, raw.letter, raw.email_text]),
            blog_content: first_filled([raw.blog_content, raw.blog, raw.post_markdown]),
            ..Self::default()
        }
    }
}

impl FinalAssets {
    pub fn is_empty(&self) -> bool {
        self.letter_content.trim().is_empty() && self.blog_content.trim().is_empty()
    }
}
