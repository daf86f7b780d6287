use chrono::NaiveDate;
use httpmock::prelude::*;
use project_hub::domain::model::StepModels;
use project_hub::{HubEngine, HubError, LocalStorage, OpenAiCompatClient, Provider, PublicationPipeline};
use std::io::Read;
use tempfile::TempDir;

fn reply(content: &str) -> serde_json::Value {
    serde_json::json!({"choices": [{"message": {"role": "assistant", "content": content}}]})
}

fn mock_structure(server: &MockServer) {
    server.mock(|when, then| {
        when.method(POST)
            .path("/chat/completions")
            .body_contains("expert researcher");
        then.status(200).json_body(reply(
            r#"{"introduction": "Edge AI is growing.", "body": "Chips got cheaper.",
                "conclusion": "Expect more on-device models.",
                "references": [{"title": "Survey", "url": "https://example.org/survey"}]}"#,
        ));
    });
    server.mock(|when, then| {
        when.method(POST)
            .path("/chat/completions")
            .body_contains("specializing in research letters");
        then.status(200).json_body(reply(
            r#"{"introduction": "Dear colleagues", "body": "Three trends stand out.",
                "conclusion": "Thanks for reading", "references": []}"#,
        ));
    });
    server.mock(|when, then| {
        when.method(POST)
            .path("/chat/completions")
            .body_contains("specializing in blog posts");
        then.status(200).json_body(reply(
            r#"{"title": "Edge AI in 2025", "introduction": "Hook", "background": "Context",
                "body": "Analysis", "conclusion": "Wrap-up", "references": []}"#,
        ));
    });
}

fn pipeline(server: &MockServer, topic: &str) -> PublicationPipeline<OpenAiCompatClient> {
    let client = OpenAiCompatClient::new(Provider::OpenAi, "sk").with_base_url(server.base_url());
    PublicationPipeline::new(
        client,
        StepModels::uniform("gpt-4o"),
        topic,
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
    )
}

#[tokio::test]
async fn test_letter_run_writes_research_pack() {
    let temp_dir = TempDir::new().unwrap();
    let llm = MockServer::start();
    mock_structure(&llm);
    let final_mock = llm.mock(|when, then| {
        when.method(POST)
            .path("/chat/completions")
            .body_contains("transforms structured research")
            .body_contains("Today's date is 2025-06-01");
        then.status(200).json_body(reply(
            r##"{"letter_content": "Dear colleagues,\n\nEdge AI keeps moving.",
                "blog_content": "#Edge AI in 2025\nOn-device inference is here."}"##,
        ));
    });

    let engine = HubEngine::new(pipeline(&llm, "Edge AI"), LocalStorage::new(temp_dir.path()));
    let report = engine.run().await.unwrap();

    final_mock.assert();
    assert_eq!(report.plan.blog.title, "Edge AI in 2025");
    assert_eq!(report.output.letter_content, "Dear colleagues,\n\nEdge AI keeps moving.");
    assert_eq!(
        report.output.blog_content,
        "# Edge AI in 2025\nOn-device inference is here."
    );
    assert_eq!(report.bundle_path, "research_pack_20250601.zip");

    let zip_data = std::fs::read(temp_dir.path().join(&report.bundle_path)).unwrap();
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(zip_data)).unwrap();
    assert_eq!(archive.len(), 3);

    let mut meta = String::new();
    archive.by_name("meta.txt").unwrap().read_to_string(&mut meta).unwrap();
    assert_eq!(meta, "Topic: Edge AI\nGenerated: 2025-06-01\n");
}

#[tokio::test]
async fn test_letter_falls_back_to_plain_text() {
    let temp_dir = TempDir::new().unwrap();
    let llm = MockServer::start();
    mock_structure(&llm);
    llm.mock(|when, then| {
        when.method(POST)
            .path("/chat/completions")
            .body_contains("transforms structured research");
        then.status(200).json_body(reply("Sorry, I cannot format that as JSON."));
    });
    let plain_mock = llm.mock(|when, then| {
        when.method(POST)
            .path("/chat/completions")
            .body_contains("Generate publication-ready content");
        then.status(200).json_body(reply(
            "LETTER:\nDear colleagues, edge AI is here.\n\nBLOG:\n# Edge AI\nShort post.",
        ));
    });

    let engine = HubEngine::new(pipeline(&llm, "Edge AI"), LocalStorage::new(temp_dir.path()));
    let report = engine.run().await.unwrap();

    plain_mock.assert();
    assert_eq!(report.output.letter_content, "Dear colleagues, edge AI is here.");
    assert_eq!(report.output.blog_content, "# Edge AI\nShort post.");
}

#[tokio::test]
async fn test_empty_topic_is_rejected_before_any_call() {
    let temp_dir = TempDir::new().unwrap();
    let llm = MockServer::start();
    let any_call = llm.mock(|when, then| {
        when.method(POST).path("/chat/completions");
        then.status(200).json_body(reply("{}"));
    });

    let engine = HubEngine::new(pipeline(&llm, "   "), LocalStorage::new(temp_dir.path()));
    let result = engine.run().await;

    assert!(matches!(result, Err(HubError::ValidationError { .. })));
    any_call.assert_hits(0);
    assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 0);
}
