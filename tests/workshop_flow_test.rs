use chrono::NaiveDate;
use httpmock::prelude::*;
use project_hub::domain::model::{StepModels, WorkshopRequest};
use project_hub::{GoogleAuth, GoogleForms, HubEngine, LocalStorage, OpenAiCompatClient, Provider, WorkshopPipeline};
use std::io::Read;
use tempfile::TempDir;

fn reply(content: &str) -> serde_json::Value {
    serde_json::json!({"choices": [{"message": {"role": "assistant", "content": content}}]})
}

fn request(create_form: bool) -> WorkshopRequest {
    WorkshopRequest {
        goal: "1-day AI workshop".to_string(),
        audience: "Product managers".to_string(),
        constraints: "Budget $2k, 30 seats".to_string(),
        date: NaiveDate::from_ymd_opt(2025, 3, 24).unwrap(),
        today: NaiveDate::from_ymd_opt(2025, 3, 14).unwrap(),
        create_form,
    }
}

fn mock_research(server: &MockServer) {
    server.mock(|when, then| {
        when.method(POST)
            .path("/chat/completions")
            .body_contains("You are a researcher.");
        then.status(200).json_body(reply(
            r#"{"topics": ["Prompt design", "Evaluation"],
                "risks": [{"risk": "Low turnout", "mitigation": "Promote early"}],
                "budget_notes": "Catering is the largest cost.",
                "references": [{"title": "Guide", "url": "https://example.com/guide"}]}"#,
        ));
    });
}

fn read_entry(archive: &mut zip::ZipArchive<std::io::Cursor<Vec<u8>>>, name: &str) -> String {
    let mut text = String::new();
    archive.by_name(name).unwrap().read_to_string(&mut text).unwrap();
    text
}

#[tokio::test]
async fn test_workshop_run_with_registration_form() {
    let temp_dir = TempDir::new().unwrap();
    let llm = MockServer::start();
    mock_research(&llm);
    llm.mock(|when, then| {
        when.method(POST)
            .path("/chat/completions")
            .body_contains("operations planner");
        then.status(200).json_body(reply(
            r#"{"agenda": ["Welcome", "Hands-on lab", "Wrap-up"],
                "milestones": [{"title": "Book venue", "due": "2025-03-17",
                                "tasks": [{"desc": "Call venues", "effort_hrs": 2, "owner": "Ana"}]}],
                "success_metrics": ["25 attendees"],
                "risks": ["Speaker cancels"]}"#,
        ));
    });
    llm.mock(|when, then| {
        when.method(POST)
            .path("/chat/completions")
            .body_contains("creative event producer");
        then.status(200).json_body(reply(
            r#"{"invite_email": "Hi team,\n\nJoin us on March 24.",
                "poster_text": "AI DAY",
                "checklist": "- Mar 17: book venue"}"#,
        ));
    });

    let forms = MockServer::start();
    let create_mock = forms.mock(|when, then| {
        when.method(POST)
            .path("/v1/forms")
            .header("authorization", "Bearer ya29.cached")
            .json_body_partial(
                r#"{"info": {"title": "1-day AI workshop in 10 days — Registration"}}"#,
            );
        then.status(200).json_body(serde_json::json!({
            "formId": "form-1",
            "responderUri": "https://docs.google.com/forms/d/e/form-1/viewform"
        }));
    });
    let update_mock = forms.mock(|when, then| {
        when.method(POST).path("/v1/forms/form-1:batchUpdate");
        then.status(200).json_body(serde_json::json!({"replies": []}));
    });

    let credentials = temp_dir.path().join("credentials.json");
    std::fs::write(
        &credentials,
        r#"{"installed": {"client_id": "cid", "client_secret": "secret"}}"#,
    )
    .unwrap();
    let token = temp_dir.path().join("token.json");
    std::fs::write(
        &token,
        r#"{"access_token": "ya29.cached", "refresh_token": "r", "expires_at": "2099-01-01T00:00:00Z"}"#,
    )
    .unwrap();

    let auth = GoogleAuth::from_files(&credentials, token).await.unwrap();
    let publisher = GoogleForms::new(auth).with_base_url(forms.base_url());

    let client = OpenAiCompatClient::new(Provider::Groq, "gsk").with_base_url(llm.base_url());
    let pipeline = WorkshopPipeline::new(client, StepModels::uniform("m"), request(true))
        .with_forms(Box::new(publisher));
    let output_dir = temp_dir.path().join("out");
    let engine = HubEngine::new(pipeline, LocalStorage::new(&output_dir));

    let report = engine.run().await.unwrap();

    create_mock.assert();
    update_mock.assert();
    assert_eq!(report.research.topics.len(), 2);
    assert!(report.plan.markdown.contains("- Book venue — due 2025-03-17"));
    assert!(report.plan.markdown.contains("  - tasks: Call venues"));
    assert_eq!(
        report.output.google_form_url.as_deref(),
        Some("https://docs.google.com/forms/d/e/form-1/viewform")
    );
    assert_eq!(report.bundle_path, "workshop-assets-2025-03-24.zip");

    let zip_data = std::fs::read(output_dir.join(&report.bundle_path)).unwrap();
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(zip_data)).unwrap();
    assert_eq!(archive.len(), 5);
    assert_eq!(read_entry(&mut archive, "invite_email.txt"), "Hi team,\n\nJoin us on March 24.");
    assert_eq!(
        read_entry(&mut archive, "workshop_info.txt"),
        "Workshop Date: 2025-03-24\nDays until workshop: 10"
    );
    assert_eq!(
        read_entry(&mut archive, "google_form_url.txt"),
        "https://docs.google.com/forms/d/e/form-1/viewform"
    );
}

#[tokio::test]
async fn test_workshop_falls_back_to_markdown_plan_and_templates() {
    let temp_dir = TempDir::new().unwrap();
    let llm = MockServer::start();
    mock_research(&llm);
    llm.mock(|when, then| {
        when.method(POST)
            .path("/chat/completions")
            .body_contains("Produce a concise, practical workshop plan");
        then.status(200).json_body(reply("Here is a plan, hope it helps!"));
    });
    let markdown_mock = llm.mock(|when, then| {
        when.method(POST)
            .path("/chat/completions")
            .body_contains("Write a readable plan in Markdown");
        then.status(200).json_body(reply(
            "## Agenda\n- Welcome\n- Lab\n\n## Milestones\n- Book venue - due 2025-03-17 - tasks: call; sign\n\n\
             ## Success Metrics\n- 25 attendees\n\n## Risks\n- Rain",
        ));
    });
    llm.mock(|when, then| {
        when.method(POST)
            .path("/chat/completions")
            .body_contains("creative event producer");
        then.status(500).json_body(serde_json::json!({"error": {"message": "overloaded"}}));
    });

    let client = OpenAiCompatClient::new(Provider::Groq, "gsk").with_base_url(llm.base_url());
    let pipeline = WorkshopPipeline::new(client, StepModels::uniform("m"), request(false));
    let engine = HubEngine::new(pipeline, LocalStorage::new(temp_dir.path()));

    let report = engine.run().await.unwrap();

    markdown_mock.assert();
    assert_eq!(report.plan.agenda, vec!["Welcome", "Lab"]);
    assert_eq!(report.plan.milestones[0].title, "Book venue");
    assert_eq!(report.plan.milestones[0].due.as_deref(), Some("2025-03-17"));
    assert_eq!(report.plan.milestones[0].tasks.len(), 2);

    assert!(report.output.invite_email.contains("1-day AI workshop"));
    assert!(!report.output.checklist.is_empty());
    assert!(report.output.google_form_url.is_none());

    let zip_data = std::fs::read(temp_dir.path().join(&report.bundle_path)).unwrap();
    let archive = zip::ZipArchive::new(std::io::Cursor::new(zip_data)).unwrap();
    assert_eq!(archive.len(), 4);
}
