use crate::core::chat::{chat_json, DEFAULT_JSON_RETRIES};
use crate::core::{ChatModel, ChatRequest, Deliverable, Pipeline};
use crate::domain::model::{
    format_references, BlogPost, FinalAssets, PublicationPlan, ResearchLetter, StepModels,
};
use crate::utils::error::{HubError, Result};
use crate::utils::markdown::{tidy_publication, unescape_literals};
use async_trait::async_trait;
use chrono::NaiveDate;

const RESEARCH_SYSTEM: &str = "You are an expert researcher. Research the given topic and provide: \
a comprehensive introduction; latest trends, insights, analysis and risks in the body; \
a conclusive summary; and 3-5 credible references. \
Return JSON with keys introduction, body, conclusion (strings) and references (list of {title, url}).";

const LETTER_SYSTEM: &str = "You are a professional content planner specializing in research letters. \
Transform the research content into a well-structured research letter suitable for email distribution. \
Return JSON with keys introduction, body, conclusion (strings) and references (list of {title, url}).";

const BLOG_SYSTEM: &str = "You are a professional content planner specializing in blog posts. \
Transform the research content into a well-structured blog post suitable for web publishing. \
The title must be compelling and SEO-friendly. \
Return JSON with keys title, introduction, background, body, conclusion (strings) and references (list of {title, url}).";

const FINAL_SYSTEM: &str = "You are an assistant that transforms structured research and blog plans \
into final, polished publications. Return JSON with keys letter_content and blog_content.";

/// Research letter and blog post for one topic.
pub struct PublicationPipeline<M: ChatModel> {
    model: M,
    models: StepModels,
    topic: String,
    today: NaiveDate,
}

impl<M: ChatModel> PublicationPipeline<M> {
    pub fn new(model: M, models: StepModels, topic: impl Into<String>, today: NaiveDate) -> Self {
        Self {
            model,
            models,
            topic: topic.into(),
            today,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn date_context(&self) -> String {
        format!("Today's date is {}", self.today.format("%Y-%m-%d"))
    }

    fn structure_prompt(&self, research: &ResearchLetter, closing: &str) -> String {
        format!(
            "Date Context: {}\n\nResearch Topic: {}\n\nResearch Content to Structure:\n\
             Introduction: {}\nBody: {}\nConclusion: {}\nReferences: {}\n\n{}",
            self.date_context(),
            self.topic,
            research.introduction,
            research.body,
            research.conclusion,
            format_references(&research.references),
            closing
        )
    }

    async fn structured_assets(&self, letter_text: &str, blog_text: &str) -> Result<FinalAssets> {
        let user = format!(
            "{}\nTopic/Goal: {}\n\nResearch Letter Structure:\n{}\n\nBlog Structure:\n{}\n\n\
             Generate the final outputs as high-quality text. \
             Return them in the fields letter_content and blog_content.",
            self.date_context(),
            self.topic,
            letter_text,
            blog_text
        );
        let request =
            ChatRequest::new(&self.models.producer, FINAL_SYSTEM, user).temperature(0.25);
        let generated: FinalAssets = chat_json(&self.model, &request, DEFAULT_JSON_RETRIES).await?;

        Ok(FinalAssets {
            letter_content: unescape_literals(&generated.letter_content).trim().to_string(),
            blog_content: unescape_literals(&generated.blog_content).trim().to_string(),
            ..FinalAssets::default()
        })
    }

    async fn plain_assets(&self, letter_text: &str) -> Result<FinalAssets> {
        let user = format!(
            "Generate two pieces of content for the topic '{}':\n\n\
             1) A professional research letter (start with LETTER:)\n\
             2) A blog post (start with BLOG:)\n\n\
             Base it on this research:\n{}\n\n\
             Use proper formatting with real line breaks.",
            self.topic, letter_text
        );
        let request = ChatRequest::new(
            &self.models.producer,
            "Generate publication-ready content. Use actual line breaks, not escape sequences.",
            user,
        )
        .temperature(0.25);
        let reply = self.model.complete(&request).await?;
        Ok(split_letter_and_blog(&unescape_literals(&reply)))
    }
}

#[async_trait]
impl<M: ChatModel> Pipeline for PublicationPipeline<M> {
    type Research = ResearchLetter;
    type Plan = PublicationPlan;
    type Output = FinalAssets;

    fn name(&self) -> &str {
        "letter"
    }

    async fn research(&self) -> Result<ResearchLetter> {
        if self.topic.trim().is_empty() {
            return Err(HubError::ValidationError {
                message: "Please enter a research topic".to_string(),
            });
        }

        let user = format!(
            "Date Context: {}\n\nResearch Topic: {}\n\n\
             Please provide comprehensive research on this topic with the structure:\n\
             - Introduction: Brief overview and importance of the topic\n\
             - Body: Latest trends, key insights, detailed analysis, and associated risks\n\
             - Conclusion: Summary of key findings and implications\n\
             - References: Credible sources (academic papers, industry reports, reputable websites)",
            self.date_context(),
            self.topic
        );
        let request =
            ChatRequest::new(&self.models.research, RESEARCH_SYSTEM, user).temperature(0.25);
        let research: ResearchLetter = chat_json(&self.model, &request, DEFAULT_JSON_RETRIES).await?;

        tracing::info!("Research: {} references", research.references.len());
        Ok(research)
    }

    async fn plan(&self, research: &ResearchLetter) -> Result<PublicationPlan> {
        let letter_request = ChatRequest::new(
            &self.models.planner,
            LETTER_SYSTEM,
            self.structure_prompt(
                research,
                "Please structure this into a professional research letter format.",
            ),
        )
        .temperature(0.25);
        let letter: ResearchLetter =
            chat_json(&self.model, &letter_request, DEFAULT_JSON_RETRIES).await?;
        tracing::info!("✅ Letter planned");

        let blog_request = ChatRequest::new(
            &self.models.planner,
            BLOG_SYSTEM,
            self.structure_prompt(
                research,
                "Please structure this into an engaging blog post format.",
            ),
        )
        .temperature(0.25);
        let blog: BlogPost = chat_json(&self.model, &blog_request, DEFAULT_JSON_RETRIES).await?;
        tracing::info!("✅ Blog planned: {}", blog.title);

        Ok(PublicationPlan { letter, blog })
    }

    async fn produce(
        &self,
        _research: &ResearchLetter,
        plan: &PublicationPlan,
    ) -> Result<FinalAssets> {
        let letter_text = flatten_letter(&plan.letter);
        let blog_text = flatten_blog(&plan.blog);

        let assets = match self.structured_assets(&letter_text, &blog_text).await {
            Ok(assets) if !assets.is_empty() => Some(assets),
            Ok(_) => {
                tracing::warn!("Structured publication came back empty");
                None
            }
            Err(e) => {
                tracing::warn!("Structured publication failed: {}", e);
                None
            }
        };

        let assets = match assets {
            Some(assets) => assets,
            None => match self.plain_assets(&letter_text).await {
                Ok(assets) if !assets.is_empty() => assets,
                Ok(_) => template_assets(&self.topic, plan),
                Err(e) => {
                    tracing::warn!("Plain publication failed ({}), using templates", e);
                    template_assets(&self.topic, plan)
                }
            },
        };

        Ok(FinalAssets {
            letter_content: tidy_publication(&assets.letter_content),
            blog_content: tidy_publication(&assets.blog_content),
            topic: self.topic.clone(),
            generated_on: Some(self.today),
        })
    }
}

impl Deliverable for FinalAssets {
    fn bundle_name(&self) -> String {
        let date = self
            .generated_on
            .unwrap_or_else(|| chrono::Local::now().date_naive());
        format!("research_pack_{}.zip", date.format("%Y%m%d"))
    }

    fn entries(&self) -> Vec<(String, String)> {
        let mut entries = Vec::new();
        if !self.letter_content.is_empty() {
            entries.push(("research_letter.txt".to_string(), self.letter_content.clone()));
        }
        if !self.blog_content.is_empty() {
            entries.push(("blog_post.txt".to_string(), self.blog_content.clone()));
        }

        let topic = if self.topic.is_empty() {
            "N/A"
        } else {
            self.topic.as_str()
        };
        let generated = self
            .generated_on
            .unwrap_or_else(|| chrono::Local::now().date_naive());
        entries.push((
            "meta.txt".to_string(),
            format!("Topic: {}\nGenerated: {}\n", topic, generated.format("%Y-%m-%d")),
        ));
        entries
    }
}

fn flatten_letter(letter: &ResearchLetter) -> String {
    format!(
        "Introduction: {}\n\nBody: {}\n\nConclusion: {}\n\nReferences:\n{}",
        letter.introduction,
        letter.body,
        letter.conclusion,
        format_references(&letter.references)
    )
    .trim()
    .to_string()
}

fn flatten_blog(blog: &BlogPost) -> String {
    format!(
        "Title: {}\n\nIntroduction: {}\n\nBackground: {}\n\nBody: {}\n\nConclusion: {}\n\nReferences:\n{}",
        blog.title,
        blog.introduction,
        blog.background,
        blog.body,
        blog.conclusion,
        format_references(&blog.references)
    )
    .trim()
    .to_string()
}

/// Split a `LETTER: ... BLOG: ...` reply. Without both markers the whole
/// reply becomes the blog and is wrapped as a letter.
pub fn split_letter_and_blog(content: &str) -> FinalAssets {
    if content.contains("LETTER:") {
        if let Some((letter, blog)) = content.split_once("BLOG:") {
            return FinalAssets {
                letter_content: letter.replace("LETTER:", "").trim().to_string(),
                blog_content: blog.trim().to_string(),
                ..FinalAssets::default()
            };
        }
    }

    let body = content.trim();
    if body.is_empty() {
        return FinalAssets::default();
    }
    FinalAssets {
        letter_content: format!("Dear Reader,\n\n{}\n\nBest regards,\n[Your Name]", body),
        blog_content: body.to_string(),
        ..FinalAssets::default()
    }
}

pub fn template_assets(topic: &str, plan: &PublicationPlan) -> FinalAssets {
    let letter = &plan.letter;
    let blog = &plan.blog;
    FinalAssets {
        letter_content: format!(
            "Dear Reader,\n\nI'm writing to share insights on {}.\n\n{}\n\n{}\n\n{}\n\nBest regards,\n[Your Name]",
            topic, letter.introduction, letter.body, letter.conclusion
        ),
        blog_content: format!(
            "# {}\n\n{}\n\n## Background\n{}\n\n## Analysis\n{}\n\n## Conclusion\n{}",
            topic, blog.introduction, blog.background, blog.body, blog.conclusion
        ),
        ..FinalAssets::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::chat::testing::ScriptedChat;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
    }

    const RESEARCH: &str = r#"{"introduction": "Solid-state batteries are coming.",
        "body": "Costs are falling.", "conclusion": "Watch 2027.",
        "references": [{"title": "IEA report", "url": "https://iea.org/r"}]}"#;
    const LETTER: &str = r#"{"introduction": "Dear colleagues", "body": "Trends", "conclusion": "Bye", "references": []}"#;
    const BLOG: &str = r#"{"title": "Batteries 2027", "introduction": "Hook", "background": "Context",
        "body": "Analysis", "conclusion": "Wrap", "references": []}"#;

    #[test]
    fn test_split_letter_and_blog() {
        let assets = split_letter_and_blog("LETTER:\nDear team,\nhello\n\nBLOG:\n# Post\nBody");
        assert_eq!(assets.letter_content, "Dear team,\nhello");
        assert_eq!(assets.blog_content, "# Post\nBody");

        let wrapped = split_letter_and_blog("Just some text");
        assert_eq!(
            wrapped.letter_content,
            "Dear Reader,\n\nJust some text\n\nBest regards,\n[Your Name]"
        );
        assert_eq!(wrapped.blog_content, "Just some text");

        assert!(split_letter_and_blog("   ").is_empty());
    }

    #[tokio::test]
    async fn test_full_publication_flow() {
        let chat = ScriptedChat::new(vec![
            RESEARCH,
            LETTER,
            BLOG,
            r###"{"letter": "Dear reader,\\nBatteries.", "post_markdown": "##Batteries\nBody"}"###,
        ]);
        let pipeline =
            PublicationPipeline::new(chat, StepModels::uniform("m"), "Solid-state batteries", today());

        let research = pipeline.research().await.unwrap();
        assert_eq!(research.references[0].title, "IEA report");
        let plan = pipeline.plan(&research).await.unwrap();
        assert_eq!(plan.blog.title, "Batteries 2027");

        let letter_prompt = pipeline.model.request(1).user;
        assert!(letter_prompt.starts_with("Date Context: Today's date is 2026-10-16"));
        assert!(letter_prompt.contains("References: - IEA report: https://iea.org/r"));

        let assets = pipeline.produce(&research, &plan).await.unwrap();
        let final_prompt = pipeline.model.request(3).user;
        assert!(final_prompt.starts_with("Today's date is 2026-10-16\nTopic/Goal: Solid-state batteries"));
        assert!(!final_prompt.contains("Today's date: "));
        assert_eq!(assets.letter_content, "Dear reader,\nBatteries.");
        assert_eq!(assets.blog_content, "## Batteries\nBody");

        assert_eq!(assets.bundle_name(), "research_pack_20261016.zip");
        let entries = assets.entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(
            entries[2].1,
            "Topic: Solid-state batteries\nGenerated: 2026-10-16\n"
        );
    }

    #[tokio::test]
    async fn test_produce_falls_back_to_plain_then_templates() {
        let plan = PublicationPlan {
            letter: serde_json::from_str(LETTER).unwrap(),
            blog: serde_json::from_str(BLOG).unwrap(),
        };

        // Empty structured reply, then a plain reply with both markers.
        let chat = ScriptedChat::new(vec![
            r#"{"letter_content": "", "blog_content": "  "}"#,
            "LETTER: Hi\nBLOG: Post",
        ]);
        let pipeline = PublicationPipeline::new(chat, StepModels::uniform("m"), "Topic", today());
        let assets = pipeline.produce(&ResearchLetter::default(), &plan).await.unwrap();
        assert_eq!(assets.letter_content, "Hi");
        assert_eq!(assets.blog_content, "Post");

        // Every call fails.
        let chat = ScriptedChat::default();
        let pipeline = PublicationPipeline::new(chat, StepModels::uniform("m"), "Topic", today());
        let assets = pipeline.produce(&ResearchLetter::default(), &plan).await.unwrap();
        assert!(assets
            .letter_content
            .starts_with("Dear Reader,\n\nI'm writing to share insights on Topic.\n\nDear colleagues"));
        assert!(assets.blog_content.starts_with("# Topic\n\nHook\n\n## Background\nContext"));
    }

    #[tokio::test]
    async fn test_research_requires_topic() {
        let pipeline =
            PublicationPipeline::new(ScriptedChat::default(), StepModels::uniform("m"), " ", today());
        let result = pipeline.research().await;
        assert!(matches!(result, Err(HubError::ValidationError { .. })));
        assert_eq!(pipeline.model.call_count(), 0);
    }

    #[test]
    fn test_entries_skip_empty_texts() {
        let assets = FinalAssets {
            blog_content: "# Post".to_string(),
            generated_on: Some(today()),
            ..FinalAssets::default()
        };
        let entries = assets.entries();
        let names: Vec<&str> = entries.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["blog_post.txt", "meta.txt"]);
        assert!(entries[1].1.starts_with("Topic: N/A\n"));
    }
}
