use crate::adapters::github::{CreateRepoOptions, GitHubClient};
use crate::core::chat::{chat_text, parse_json_reply};
use crate::core::{ChatModel, ChatRequest, Deliverable, Pipeline};
use crate::domain::model::{
    CustomFileRequest, LandingFiles, LandingPlan, LandingRequest, LandingResearch, License,
    RepoSettings, StepModels,
};
use crate::utils::error::{HubError, Result};
use crate::utils::markdown::{clean_markdown, find_section, parse_sections};
use crate::utils::validation::validate_bundle_path;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use std::collections::BTreeMap;

const RESEARCH_SYSTEM: &str = "You are a concise product researcher.\n\
Write in plain English sentences.\n\
Output MUST be human-readable Markdown with headings and bullet points.\n\
Do NOT return JSON, code blocks, or lists of objects.";

const PLAN_SYSTEM: &str = "You are a product planner.\n\
Write in plain English sentences.\n\
Output MUST be human-readable Markdown with headings and bullets.\n\
Do NOT return JSON, tables of objects, or code blocks.\n\
Keep each bullet under 18 words.";

const FILES_SYSTEM: &str = "You are a code generator that must return ONLY valid JSON.\n\
Schema:\n\
{\n  \"files\": {\n    \"index.html\": \"<HTML5 string>\",\n    \"styles.css\": \"<CSS string>\",\n    \
\"script.js\": \"<JS string>\",\n    \"README.md\": \"<Markdown string>\",\n    \"DEPLOY.md\": \"<Markdown string>\"\n  }\n}\n\
No comments, no trailing commas, no prose before/after. JSON only.";

pub struct LandingPipeline<M: ChatModel> {
    model: M,
    models: StepModels,
    request: LandingRequest,
    today: NaiveDate,
}

impl<M: ChatModel> LandingPipeline<M> {
    pub fn new(model: M, models: StepModels, request: LandingRequest, today: NaiveDate) -> Self {
        Self {
            model,
            models,
            request,
            today,
        }
    }

    pub fn request(&self) -> &LandingRequest {
        &self.request
    }

    async fn generate_site_files(
        &self,
        research: &LandingResearch,
        plan: &LandingPlan,
    ) -> Result<BTreeMap<String, String>> {
        let req = &self.request;
        let user = format!(
            "Create a developer-focused landing page.\n\n\
             Product: {}\nAudience: {}\nBrief: {}\n\n\
             Hooks: {}\nKeywords: {}\nSections: {}\n\n\
             Requirements:\n\
             - Mobile-first responsive\n\
             - Dark mode support (CSS prefers-color-scheme)\n\
             - Copy-to-clipboard for code blocks (JS)\n\
             - Accessible semantics (landmarks, labels)\n\
             - SEO basics (title, meta description, open graph)\n\
             - No frameworks: pure HTML/CSS/JS\n\
             - Keep inline <script> minimal; use script.js for logic\n\n\
             Return ONLY JSON using the schema above.",
            req.product,
            req.audience,
            req.brief,
            research.hooks.join(", "),
            research.keywords.iter().take(8).cloned().collect::<Vec<_>>().join(", "),
            plan.copy_outline.join(", "),
        );

        let request = ChatRequest::new(&self.models.producer, FILES_SYSTEM, user).max_tokens(4000);
        let raw = self.model.complete(&request).await?;

        match parse_json_reply(raw.trim()) {
            Some(value) => Ok(files_from_value(value)),
            None => {
                tracing::warn!("Could not extract a files object from the model reply");
                Ok(BTreeMap::new())
            }
        }
    }

    /// One extra file from a free-form description.
    pub async fn generate_custom_file(
        &self,
        custom: &CustomFileRequest,
        research: &LandingResearch,
    ) -> Result<String> {
        let keywords = research
            .keywords
            .iter()
            .take(5)
            .cloned()
            .collect::<Vec<_>>()
            .join(", ");
        let system = format!(
            "{} Return ONLY the code, no explanations or fences.",
            custom.kind.instructions()
        );
        let user = format!(
            "Create {} for {}.\nUser request: {}\nKeywords: {}\n\n\
             Return ONLY the code (no comments, no fences).",
            custom.kind.label(),
            self.request.product,
            custom.prompt,
            keywords
        );

        let request = ChatRequest::new(&self.models.producer, system, user).max_tokens(2000);
        let content = self.model.complete(&request).await?;
        Ok(clean_markdown(&content))
    }
}

#[async_trait]
impl<M: ChatModel> Pipeline for LandingPipeline<M> {
    type Research = LandingResearch;
    type Plan = LandingPlan;
    type Output = LandingFiles;

    fn name(&self) -> &str {
        "landing"
    }

    async fn research(&self) -> Result<LandingResearch> {
        let req = &self.request;
        let user = format!(
            "Research the landing page inputs for:\n\
             • Product: {}\n• Audience: {}\n• Brief: {}\n\n\
             Please produce:\n\
             # Overview — 2–3 sentences\n\
             # Top Competitors — 3 concise bullets\n\
             # Hooks — 5 compelling one-line messages\n\
             # Keywords — 8 short, comma-separated phrases (single line)\n\
             # Risks — 3 one-line risks with a mitigation phrase each\n\n\
             Only return the Markdown. No JSON.",
            req.product, req.audience, req.brief
        );

        let request =
            ChatRequest::new(&self.models.research, RESEARCH_SYSTEM, user).max_tokens(1200);
        let markdown = chat_text(&self.model, &request).await?;
        let research = parse_research_markdown(&markdown);

        tracing::info!(
            "Research: {} hooks, {} keywords, {} competitors",
            research.hooks.len(),
            research.keywords.len(),
            research.competitors.len()
        );
        Ok(research)
    }

    async fn plan(&self, research: &LandingResearch) -> Result<LandingPlan> {
        let req = &self.request;
        let repo = &req.repo;
        let user = format!(
            "Based on this prior research (verbatim below), create a concise plan for a landing page project.\n\n\
             --- Research ---\n{}\n--- End Research ---\n\n\
             Product: {}\nAudience: {}\nBrief: {}\n\
             Repo: name={}, desc={}, private={}, license={}, CI={}\n\n\
             Please produce:\n\
             # One-Line Strategy — 1 sentence\n\
             # Milestones — 5 bullets; each bullet: title — goal — owner (placeholder) — ETA in days\n\
             # Success Metrics — 6 bullets, measurable\n\
             # Copy Outline — list sections in order (Hero, Quickstart, Features, Playground, FAQ, Footer + any others)\n\
             # Risks & Mitigations — 3 bullets\n\
             # Repo Settings — short bullets for privacy, license, CI choice\n\n\
             Only return the Markdown. No JSON.",
            research.markdown,
            req.product,
            req.audience,
            req.brief,
            repo.name,
            repo.description,
            repo.private,
            repo.license,
            repo.add_ci
        );

        let request = ChatRequest::new(&self.models.planner, PLAN_SYSTEM, user).max_tokens(1600);
        let markdown = chat_text(&self.model, &request).await?;
        let plan = parse_plan_markdown(&markdown);

        tracing::info!(
            "Plan: {} milestones, {} outline sections",
            plan.milestones.len(),
            plan.copy_outline.len()
        );
        Ok(plan)
    }

    async fn produce(&self, research: &LandingResearch, plan: &LandingPlan) -> Result<LandingFiles> {
        let mut files = self.generate_site_files(research, plan).await?;
        tracing::info!("Model returned {} site files", files.len());

        if self.request.repo.license == License::Mit {
            files.insert("LICENSE".to_string(), mit_license(self.today));
        }
        if self.request.repo.add_ci {
            files.insert(".github/workflows/ci.yml".to_string(), ci_workflow().to_string());
        }

        for custom in &self.request.custom_files {
            if custom.prompt.trim().is_empty() {
                continue;
            }
            tracing::info!("Generating custom {} file {}", custom.kind.label(), custom.name);
            let content = self.generate_custom_file(custom, research).await?;
            files.insert(custom.name.clone(), content);
        }

        Ok(LandingFiles {
            files,
            bundle_date: Some(self.today),
        })
    }
}

impl Deliverable for LandingFiles {
    fn bundle_name(&self) -> String {
        let date = self
            .bundle_date
            .unwrap_or_else(|| chrono::Local::now().date_naive());
        format!("landing-{}.zip", date.format("%Y%m%d"))
    }

    fn entries(&self) -> Vec<(String, String)> {
        self.files
            .iter()
            .map(|(name, content)| (name.clone(), content.clone()))
            .collect()
    }
}

/// Accepts `{"files": {...}}` or a bare path -> content object; non-string values are dropped.
pub fn files_from_value(value: Value) -> BTreeMap<String, String> {
    let object = match value {
        Value::Object(mut map) => match map.remove("files") {
            Some(Value::Object(files)) => files,
            Some(_) => return BTreeMap::new(),
            None => map,
        },
        _ => return BTreeMap::new(),
    };

    object
        .into_iter()
        .filter_map(|(path, content)| match content {
            Value::String(_) if validate_bundle_path("file", &path).is_err() => {
                tracing::warn!("Skipping {}: path escapes the bundle", path);
                None
            }
            Value::String(text) => Some((path, text)),
            other => {
                tracing::debug!("Skipping {}: expected string content, got {}", path, other);
                None
            }
        })
        .collect()
}

pub fn parse_research_markdown(markdown: &str) -> LandingResearch {
    let sections = parse_sections(markdown);
    let items = |keyword: &str| {
        find_section(&sections, keyword)
            .map(|s| s.items())
            .unwrap_or_default()
    };

    let keywords = items("keyword")
        .iter()
        .flat_map(|line| line.split(','))
        .map(|k| k.trim().trim_end_matches('.').to_string())
        .filter(|k| !k.is_empty())
        .collect();

    LandingResearch {
        markdown: markdown.to_string(),
        overview: find_section(&sections, "overview")
            .map(|s| s.text())
            .unwrap_or_default(),
        competitors: items("competitor"),
        hooks: items("hook"),
        keywords,
        risks: items("risk"),
    }
    .clamp()
}

pub fn parse_plan_markdown(markdown: &str) -> LandingPlan {
    let sections = parse_sections(markdown);
    let bullets = |keyword: &str| {
        find_section(&sections, keyword)
            .map(|s| s.items())
            .unwrap_or_default()
    };

    let copy_outline = bullets("outline")
        .iter()
        .flat_map(|line| line.split(','))
        .map(|s| s.trim().trim_end_matches(['.', ';']).trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    LandingPlan {
        markdown: markdown.to_string(),
        strategy: find_section(&sections, "strategy")
            .map(|s| s.text())
            .unwrap_or_default(),
        milestones: bullets("milestone"),
        success_metrics: bullets("metric"),
        copy_outline,
        risks: bullets("risk"),
        repo_notes: bullets("repo"),
    }
    .clamp()
}

/// Each HTML page with every CSS file inlined before `</head>` and every JS file before `</body>`.
pub fn preview_pages(files: &LandingFiles) -> Vec<(String, String)> {
    let mut all_css = String::new();
    let mut all_js = String::new();
    for (name, content) in &files.files {
        if name.ends_with(".css") {
            all_css.push_str(&format!("\n/* {} */\n{}\n", name, content));
        } else if name.ends_with(".js") {
            all_js.push_str(&format!("\n// {} \n{}\n", name, content));
        }
    }

    files
        .files
        .iter()
        .filter(|(name, _)| name.ends_with(".html"))
        .map(|(name, html)| {
            let mut page = html.clone();
            if !all_css.is_empty() && page.contains("</head>") {
                page = page.replacen("</head>", &format!("<style>{}</style>\n</head>", all_css), 1);
            }
            if !all_js.is_empty() && page.contains("</body>") {
                page = page.replacen("</body>", &format!("<script>{}</script>\n</body>", all_js), 1);
            }
            (name.clone(), page)
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct PublishedRepo {
    pub owner: String,
    pub name: String,
    pub html_url: String,
    pub files_pushed: usize,
}

/// Create (or reuse) the repository and push every file to its default branch.
pub async fn publish_landing(
    github: &GitHubClient,
    repo: &RepoSettings,
    files: &LandingFiles,
) -> Result<PublishedRepo> {
    if files.is_empty() {
        return Err(HubError::ProcessingError {
            message: "no files to deploy".to_string(),
        });
    }

    let owner = match repo.owner.as_deref().filter(|o| !o.trim().is_empty()) {
        Some(owner) => owner.to_string(),
        None => github.authenticated_user().await?.login,
    };

    let created = github
        .create_repo(&CreateRepoOptions {
            name: repo.name.clone(),
            private: repo.private,
            description: repo.description.clone(),
            auto_init: true,
            owner: Some(owner.clone()),
        })
        .await?;

    github
        .upsert_files(&owner, &repo.name, &files.files, "Add")
        .await?;

    tracing::info!("✅ Deployed {} files to {}", files.len(), created.html_url);
    Ok(PublishedRepo {
        owner,
        name: repo.name.clone(),
        html_url: created.html_url,
        files_pushed: files.len(),
    })
}

pub fn mit_license(today: NaiveDate) -> String {
    format!(
        "MIT License\n\n\
Copyright (c) {}\n\n\
Permission is hereby granted, free of charge, to any person obtaining a copy\n\
of this software and associated documentation files (the \"Software\"), to deal\n\
in the Software without restriction, including without limitation the rights\n\
to use, copy, modify, merge, publish, distribute, sublicense, and/or sell\n\
copies of the Software, and to permit persons to whom the Software is\n\
furnished to do so, subject to the following conditions:\n\n\
The above copyright notice and this permission notice shall be included in\n\
all copies or substantial portions of the Software.\n\n\
THE SOFTWARE IS PROVIDED \"AS IS\", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR\n\
IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,\n\
FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT.\n",
        today.format("%Y")
    )
}

pub fn ci_workflow() -> &'static str {
    "name: CI
on:
  push:
    branches: [ main ]
  pull_request:
    branches: [ main ]

jobs:
  lint:
    runs-on: ubuntu-latest
    steps:
      - uses: actions/checkout@v3
      - run: npx htmlhint index.html
      - run: npx stylelint styles.css
"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::chat::testing::ScriptedChat;
    use crate::domain::model::CustomFileKind;

    const RESEARCH_MD: &str = "# Overview\nFastAPI-style SDK for payments.\n\n\
# Top Competitors\n- Stripe: polished docs\n- Adyen: enterprise focus\n- Paddle: merchant of record\n- Square: retail\n\n\
# Hooks\n- Ship payments in 5 minutes\n- One SDK, every currency\n\n\
# Keywords\npayments api, sdk, checkout, webhooks\n\n\
# Risks\n- Trust — publish SOC2 report";

    const PLAN_MD: &str = "## One-Line Strategy\nWin developers with a 5-minute quickstart.\n\n\
## Milestones\n- Copy draft — hero + features — PM — 2 days\n- Build — static site — Dev — 3 days\n\n\
## Success Metrics\n- 500 signups\n- 3% conversion\n\n\
## Copy Outline\n- Hero\n- Quickstart\n- Playground\n- FAQ\n\n\
## Risks & Mitigations\n- Low traffic — launch on HN\n\n\
## Repo Settings\n- Private, MIT, no CI";

    fn request() -> LandingRequest {
        LandingRequest {
            brief: "Payments SDK landing page".to_string(),
            product: "PayKit".to_string(),
            audience: "Developers".to_string(),
            repo: RepoSettings {
                add_ci: true,
                ..RepoSettings::default()
            },
            custom_files: vec![CustomFileRequest {
                kind: CustomFileKind::Js,
                name: "tabs.js".to_string(),
                prompt: "Tabbed code samples".to_string(),
            }],
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
    }

    #[test]
    fn test_parse_research_markdown() {
        let research = parse_research_markdown(RESEARCH_MD);
        assert_eq!(research.overview, "FastAPI-style SDK for payments.");
        assert_eq!(research.competitors.len(), 3);
        assert_eq!(research.hooks, vec!["Ship payments in 5 minutes", "One SDK, every currency"]);
        assert_eq!(
            research.keywords,
            vec!["payments api", "sdk", "checkout", "webhooks"]
        );
        assert_eq!(research.risks, vec!["Trust — publish SOC2 report"]);
    }

    #[test]
    fn test_parse_research_with_intro_line_under_heading() {
        let research = parse_research_markdown(
            "# Overview\nA fast SDK.\n\n# Hooks\nHere are five hooks:\n- Ship faster\n- Zero config",
        );
        assert_eq!(research.overview, "A fast SDK.");
        assert_eq!(research.hooks, vec!["Ship faster", "Zero config"]);
    }

    #[test]
    fn test_parse_plan_markdown() {
        let plan = parse_plan_markdown(PLAN_MD);
        assert_eq!(plan.strategy, "Win developers with a 5-minute quickstart.");
        assert_eq!(plan.milestones.len(), 2);
        assert_eq!(plan.success_metrics, vec!["500 signups", "3% conversion"]);
        assert_eq!(plan.copy_outline, vec!["Hero", "Quickstart", "Playground", "FAQ"]);
        assert_eq!(plan.risks, vec!["Low traffic — launch on HN"]);
        assert_eq!(plan.repo_notes, vec!["Private, MIT, no CI"]);
    }

    #[test]
    fn test_parse_plan_without_outline_uses_default() {
        let plan = parse_plan_markdown("## Milestones\n- Build it");
        assert_eq!(plan.copy_outline[0], "Hero");
        assert_eq!(plan.copy_outline.len(), 5);
    }

    #[test]
    fn test_files_from_value() {
        let value = serde_json::json!({"files": {"index.html": "<html></html>", "bad": 3, "../x.sh": "rm"}});
        let files = files_from_value(value);
        assert_eq!(files.len(), 1);
        assert!(files.contains_key("index.html"));

        let bare = serde_json::json!({"styles.css": "body{}"});
        assert_eq!(files_from_value(bare)["styles.css"], "body{}");

        assert!(files_from_value(serde_json::json!(["a"])).is_empty());
    }

    #[tokio::test]
    async fn test_full_landing_flow() {
        let chat = ScriptedChat::new(vec![
            RESEARCH_MD,
            PLAN_MD,
            "Here you go:\n```json\n{\"files\": {\"index.html\": \"<html><head></head><body></body></html>\", \"styles.css\": \"body { margin: 0; }\"}}\n```",
            "```js\nconsole.log('tabs');\n```",
        ]);
        let pipeline = LandingPipeline::new(chat, StepModels::uniform("m"), request(), today());

        let research = pipeline.research().await.unwrap();
        let plan = pipeline.plan(&research).await.unwrap();
        let files = pipeline.produce(&research, &plan).await.unwrap();

        let names: Vec<&str> = files.files.keys().map(|k| k.as_str()).collect();
        assert_eq!(
            names,
            vec![".github/workflows/ci.yml", "LICENSE", "index.html", "styles.css", "tabs.js"]
        );
        assert_eq!(files.files["tabs.js"], "console.log('tabs');");
        assert!(files.files["LICENSE"].contains("Copyright (c) 2026"));
        assert_eq!(files.bundle_name(), "landing-20261016.zip");

        let plan_prompt = pipeline.model.request(1).user;
        assert!(plan_prompt.contains("Ship payments in 5 minutes"));
        let files_prompt = pipeline.model.request(2).user;
        assert!(files_prompt.contains("Sections: Hero, Quickstart, Playground, FAQ"));
    }

    #[tokio::test]
    async fn test_produce_tolerates_unparseable_reply() {
        let chat = ScriptedChat::new(vec!["Sorry, I can't help with that."]);
        let mut req = request();
        req.custom_files.clear();
        req.repo.add_ci = false;
        req.repo.license = License::None;
        let pipeline = LandingPipeline::new(chat, StepModels::uniform("m"), req, today());

        let files = pipeline
            .produce(&LandingResearch::default(), &LandingPlan::default().clamp())
            .await
            .unwrap();

        assert!(files.is_empty());
    }

    #[test]
    fn test_preview_pages_inlines_assets() {
        let mut files = LandingFiles::default();
        files.files.insert(
            "index.html".to_string(),
            "<html><head></head><body><p>x</p></body></html>".to_string(),
        );
        files.files.insert("styles.css".to_string(), "p{color:red}".to_string());
        files.files.insert("script.js".to_string(), "run()".to_string());

        let pages = preview_pages(&files);

        assert_eq!(pages.len(), 1);
        let html = &pages[0].1;
        assert!(html.contains("<style>\n/* styles.css */\np{color:red}\n</style>\n</head>"));
        assert!(html.contains("run()\n</script>\n</body>"));
    }

    #[tokio::test]
    async fn test_publish_landing_to_org_owner() {
        use httpmock::prelude::*;
        use serde_json::json;

        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/user");
            then.status(200).json_body(json!({"login": "octo", "type": "User"}));
        });
        server.mock(|when, then| {
            when.method(GET).path("/users/acme");
            then.status(200).json_body(json!({"login": "acme", "type": "Organization"}));
        });
        let create = server.mock(|when, then| {
            when.method(POST)
                .path("/orgs/acme/repos")
                .json_body_partial(r#"{"name": "paykit-site", "auto_init": true}"#);
            then.status(201).json_body(json!({
                "name": "paykit-site",
                "full_name": "acme/paykit-site",
                "html_url": "https://github.com/acme/paykit-site",
                "default_branch": "main"
            }));
        });
        server.mock(|when, then| {
            when.method(GET).path("/repos/acme/paykit-site");
            then.status(200)
                .json_body(json!({"name": "paykit-site", "default_branch": "main"}));
        });
        server.mock(|when, then| {
            when.method(GET).path("/repos/acme/paykit-site/contents/index.html");
            then.status(404).json_body(json!({"message": "Not Found"}));
        });
        let put = server.mock(|when, then| {
            when.method(PUT)
                .path("/repos/acme/paykit-site/contents/index.html")
                .json_body_partial(r#"{"message": "Add index.html", "branch": "main"}"#);
            then.status(201).json_body(json!({}));
        });

        let repo = RepoSettings {
            owner: Some("acme".to_string()),
            name: "paykit-site".to_string(),
            ..RepoSettings::default()
        };
        let mut files = LandingFiles::default();
        files
            .files
            .insert("index.html".to_string(), "<h1>PayKit</h1>".to_string());

        let github = GitHubClient::new("ghp_test")
            .unwrap()
            .with_base_url(server.base_url());
        let published = publish_landing(&github, &repo, &files).await.unwrap();

        create.assert();
        put.assert();
        assert_eq!(published.owner, "acme");
        assert_eq!(published.files_pushed, 1);
    }

    #[tokio::test]
    async fn test_publish_landing_requires_files() {
        let github = GitHubClient::new("ghp_test").unwrap();
        let result = publish_landing(&github, &RepoSettings::default(), &LandingFiles::default()).await;
        assert!(matches!(result, Err(HubError::ProcessingError { .. })));
    }
}
