use crate::core::chat::{chat_json, chat_text, DEFAULT_JSON_RETRIES};
use crate::core::{ChatModel, ChatRequest, Deliverable, FormPublisher, Pipeline};
use crate::domain::model::{
    StepModels, WorkshopAssets, WorkshopMilestone, WorkshopPlan, WorkshopRequest,
    WorkshopResearch, WorkshopTask,
};
use crate::utils::error::Result;
use crate::utils::markdown::{parse_sections, unescape_literals, Section};
use async_trait::async_trait;
use regex::Regex;
use std::sync::OnceLock;

const PLAN_SYSTEM: &str = "You are an operations planner. Produce a concise, practical workshop plan. \
Return JSON with keys agenda (list of strings), milestones (list of {title, due, tasks: [{desc, effort_hrs, owner}]}), \
success_metrics (list of strings), risks (list of strings). \
HARD LIMITS: agenda 5-6 bullets, one time range per bullet; milestones 4-5 distinct items, each with <= 3 tasks; \
success_metrics 4-6 items; risks 2-4 items. \
Do NOT put 'Risks' or 'Success Metrics' as milestone titles. \
Use short phrases (<= 14 words each). Dates use YYYY-MM-DD when possible.";

const PLAN_FALLBACK_SYSTEM: &str = "You are an operations planner. Write a readable plan in Markdown (no JSON). \
Use short, clear sentences. Headings to include exactly:\n\
1) Agenda\n2) Milestones\n3) Success Metrics\n4) Risks\n\n\
HARD LIMITS: agenda max 6 bullets; milestones max 5, each with <= 3 tasks; success metrics max 6; risks max 4.\n\
For Milestones, use bullets like:\n\
- Title — due YYYY-MM-DD — tasks: task A; task B; task C";

const ASSETS_SYSTEM: &str = "You are a creative event producer. Generate assets for the workshop. \
Use actual line breaks and formatting, NOT escape characters. \
Format the checklist as a readable timeline with dates and tasks, not as code. \
Return JSON with keys invite_email, poster_text, checklist.";

fn milestone_split_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+—\s+|\s+-\s+").expect("valid regex"))
}

pub struct WorkshopPipeline<M: ChatModel> {
    model: M,
    models: StepModels,
    request: WorkshopRequest,
    forms: Option<Box<dyn FormPublisher>>,
}

impl<M: ChatModel> WorkshopPipeline<M> {
    pub fn new(model: M, models: StepModels, request: WorkshopRequest) -> Self {
        Self {
            model,
            models,
            request,
            forms: None,
        }
    }

    /// Publisher used when the request asks for a registration form.
    pub fn with_forms(mut self, forms: Box<dyn FormPublisher>) -> Self {
        self.forms = Some(forms);
        self
    }

    pub fn request(&self) -> &WorkshopRequest {
        &self.request
    }

    fn brief(&self) -> String {
        let req = &self.request;
        format!(
            "Goal: {}\nAudience: {}\nConstraints: {}\nDate context: {}",
            req.full_goal(),
            req.audience,
            req.constraints,
            req.date_context()
        )
    }

    async fn registration_form_url(&self) -> Option<String> {
        let req = &self.request;
        if !req.create_form {
            return None;
        }
        let Some(forms) = self.forms.as_ref() else {
            tracing::warn!("Registration form requested but Google Forms is not configured");
            return None;
        };

        let title = format!("{} — Registration", req.full_goal());
        let description = format!(
            "Audience: {}\nConstraints: {}\n{}",
            req.audience,
            req.constraints,
            req.date_context()
        );

        match forms.create_registration_form(&title, &description).await {
            Ok(info) => {
                let url = info.share_url();
                tracing::info!("📝 Registration form created: {}", url);
                Some(url)
            }
            Err(e) => {
                tracing::warn!("Skipping registration form: {}", e);
                None
            }
        }
    }
}

#[async_trait]
impl<M: ChatModel> Pipeline for WorkshopPipeline<M> {
    type Research = WorkshopResearch;
    type Plan = WorkshopPlan;
    type Output = WorkshopAssets;

    fn name(&self) -> &str {
        "workshop"
    }

    async fn research(&self) -> Result<WorkshopResearch> {
        let req = &self.request;
        if req.days_until() < 0 {
            tracing::warn!(
                "Workshop date {} is {} days in the past",
                req.date,
                -req.days_until()
            );
        }

        let user = format!(
            "{}\n\nWorkshop Goal: {}\nAudience: {}\nConstraints: {}\n\n\
             Consider the current date when researching:\n\
             - Seasonal considerations and timing\n\
             - Current trends and technologies relevant to the workshop\n\
             - Time-sensitive budget considerations\n\
             - Venue availability and booking lead times\n\n\
             Return JSON with:\n\
             - topics (list of strings)\n\
             - risks (list of objects with keys 'risk' and 'mitigation')\n\
             - budget_notes (string - plain text)\n\
             - references (list of objects with keys 'title' and 'url')",
            req.date_context(),
            req.full_goal(),
            req.audience,
            req.constraints
        );
        let request = ChatRequest::new(
            &self.models.research,
            "You are a researcher. Provide topics, risks, and budget notes for a workshop. \
             Use the provided date context for time-sensitive research and recommendations.",
            user,
        )
        .temperature(0.3);

        let research: WorkshopResearch =
            chat_json(&self.model, &request, DEFAULT_JSON_RETRIES).await?;
        tracing::info!(
            "Research: {} topics, {} risks, {} references",
            research.topics.len(),
            research.risks.len(),
            research.references.len()
        );
        Ok(research)
    }

    async fn plan(&self, _research: &WorkshopResearch) -> Result<WorkshopPlan> {
        let request =
            ChatRequest::new(&self.models.planner, PLAN_SYSTEM, self.brief()).temperature(0.25);

        match chat_json::<_, WorkshopPlan>(&self.model, &request, DEFAULT_JSON_RETRIES).await {
            Ok(plan) => {
                let mut plan = plan.clamp();
                plan.markdown = render_plan_markdown(&plan, &self.request);
                Ok(plan)
            }
            Err(e) => {
                tracing::warn!("Structured plan failed ({}), asking for Markdown instead", e);
                let request = ChatRequest::new(
                    &self.models.planner,
                    PLAN_FALLBACK_SYSTEM,
                    format!("{}\n\nReturn the full plan now.", self.brief()),
                )
                .temperature(0.25);
                let markdown = chat_text(&self.model, &request).await?;
                Ok(parse_plan_markdown(&markdown))
            }
        }
    }

    async fn produce(
        &self,
        research: &WorkshopResearch,
        plan: &WorkshopPlan,
    ) -> Result<WorkshopAssets> {
        let req = &self.request;
        let google_form_url = self.registration_form_url().await;

        let user = format!(
            "{}\n\nGoal: {}\nAudience: {}\nConstraints: {}\n\nPlan: {}\nResearch: {}\n\n\
             Generate workshop assets with:\n\
             1. invite_email: Professional email with proper greeting, body paragraphs, and closing.\n\
             2. poster_text: Eye-catching poster content with event details.\n\
             3. checklist: A readable preparation timeline with dates and tasks, as bullet points.",
            req.date_context(),
            req.full_goal(),
            req.audience,
            req.constraints,
            serde_json::to_string(plan)?,
            serde_json::to_string(research)?,
        );
        let request =
            ChatRequest::new(&self.models.producer, ASSETS_SYSTEM, user).temperature(0.25);

        let mut assets = match chat_json::<_, WorkshopAssets>(
            &self.model,
            &request,
            DEFAULT_JSON_RETRIES,
        )
        .await
        {
            Ok(generated) => WorkshopAssets {
                invite_email: unescape_literals(&generated.invite_email),
                poster_text: unescape_literals(&generated.poster_text),
                checklist: unescape_literals(&generated.checklist),
                ..WorkshopAssets::default()
            },
            Err(e) => {
                tracing::warn!("Asset generation failed ({}), using templates", e);
                fallback_assets(req)
            }
        };

        assets.google_form_url = google_form_url;
        assets.date = Some(req.date);
        assets.days_until = Some(req.days_until());
        Ok(assets)
    }
}

impl Deliverable for WorkshopAssets {
    fn bundle_name(&self) -> String {
        let date = self
            .date
            .unwrap_or_else(|| chrono::Local::now().date_naive());
        format!("workshop-assets-{}.zip", date.format("%Y-%m-%d"))
    }

    fn entries(&self) -> Vec<(String, String)> {
        let date = self
            .date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "N/A".to_string());
        let days = self
            .days_until
            .map(|d| d.to_string())
            .unwrap_or_else(|| "N/A".to_string());

        let mut entries = vec![
            ("invite_email.txt".to_string(), self.invite_email.clone()),
            ("poster.txt".to_string(), self.poster_text.clone()),
            ("checklist.txt".to_string(), self.checklist.clone()),
            (
                "workshop_info.txt".to_string(),
                format!("Workshop Date: {}\nDays until workshop: {}", date, days),
            ),
        ];
        if let Some(url) = self.google_form_url.as_ref().filter(|u| !u.is_empty()) {
            entries.push(("google_form_url.txt".to_string(), url.clone()));
        }
        entries
    }
}

pub fn render_plan_markdown(plan: &WorkshopPlan, request: &WorkshopRequest) -> String {
    let mut lines = vec![
        "## Workshop Plan".to_string(),
        format!("**Goal:** {}", request.full_goal()),
        format!("**Audience:** {}", request.audience),
        String::new(),
        "### Agenda".to_string(),
    ];
    lines.extend(plan.agenda.iter().map(|a| format!("- {}", a)));

    lines.push(String::new());
    lines.push("### Milestones".to_string());
    for milestone in &plan.milestones {
        let due = milestone
            .due
            .as_ref()
            .filter(|d| !d.is_empty())
            .map(|d| format!(" — due {}", d))
            .unwrap_or_default();
        lines.push(format!("- {}{}", milestone.title, due));

        let tasks: Vec<&str> = milestone
            .tasks
            .iter()
            .map(|t| t.desc.as_str())
            .filter(|d| !d.is_empty())
            .collect();
        if !tasks.is_empty() {
            lines.push(format!("  - tasks: {}", tasks.join("; ")));
        }
    }

    if !plan.success_metrics.is_empty() {
        lines.push(String::new());
        lines.push("### Success Metrics".to_string());
        lines.extend(plan.success_metrics.iter().map(|s| format!("- {}", s)));
    }
    if !plan.risks.is_empty() {
        lines.push(String::new());
        lines.push("### Risks".to_string());
        lines.extend(plan.risks.iter().map(|r| format!("- {}", r)));
    }

    lines.join("\n")
}

/// Recover a plan from a Markdown reply. The reply itself is kept as the plan's text.
pub fn parse_plan_markdown(md: &str) -> WorkshopPlan {
    let sections = parse_sections(md);
    let mut plan = WorkshopPlan {
        markdown: md.to_string(),
        ..WorkshopPlan::default()
    };

    for section in &sections {
        let title = section.title.to_lowercase();
        if title.contains("agenda") {
            plan.agenda.extend(section.bullets());
        } else if title.contains("milestone") {
            plan.milestones.extend(milestones_from(section));
        } else if title.contains("metric") {
            plan.success_metrics.extend(section.bullets());
        } else if title.contains("risk") {
            plan.risks.extend(section.bullets());
        }
    }

    plan.clamp()
}

fn milestones_from(section: &Section) -> Vec<WorkshopMilestone> {
    section
        .bullets()
        .iter()
        .map(|item| parse_milestone(item))
        .collect()
}

/// `Title — due 2026-10-20 — tasks: book room; print badges`
pub fn parse_milestone(item: &str) -> WorkshopMilestone {
    let mut parts = milestone_split_re().split(item).map(str::trim);
    let title = parts
        .next()
        .filter(|t| !t.is_empty())
        .unwrap_or(item)
        .to_string();

    let mut milestone = WorkshopMilestone {
        title,
        ..WorkshopMilestone::default()
    };

    for part in parts {
        let lower = part.to_lowercase();
        if lower.starts_with("due") {
            let due = part
                .split_once(char::is_whitespace)
                .map(|(_, rest)| rest.trim())
                .unwrap_or(part);
            milestone.due = Some(due.to_string());
        } else if lower.starts_with("tasks:") {
            let (_, list) = part.split_once(':').unwrap_or((part, ""));
            milestone.tasks = list
                .split(';')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .take(3)
                .map(|t| WorkshopTask {
                    desc: t.to_string(),
                    ..WorkshopTask::default()
                })
                .collect();
        }
    }

    milestone
}

pub fn fallback_assets(request: &WorkshopRequest) -> WorkshopAssets {
    let goal = request.full_goal();
    WorkshopAssets {
        invite_email: format!(
            "Dear Students and Teachers,\n\n\
             We are excited to invite you to our {}.\n\n\
             Audience: {}\n{}\n\n\
             Please RSVP by replying to this email.\n\n\
             Best regards,\nWorkshop Team",
            goal,
            request.audience,
            request.date_context()
        ),
        poster_text: format!(
            "{}\n\nFor: {}\nWhen: See workshop schedule\nWhere: TBA\n\n\
             Join us for an exciting learning experience!\n\n{}",
            goal.to_uppercase(),
            request.audience,
            request.constraints
        ),
        checklist: format!(
            "Workshop Preparation Checklist:\n\n\
             • Book venue (2 weeks before)\n\
             • Create materials (1 week before)\n\
             • Send invitations (1 week before)\n\
             • Confirm attendees (3 days before)\n\
             • Setup equipment (1 day before)\n\
             • Final review (day of event)\n\
             \nBudget/Constraints: {}",
            request.constraints
        ),
        ..WorkshopAssets::default()
    }
}
