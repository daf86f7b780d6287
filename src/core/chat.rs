use crate::core::{ChatModel, ChatRequest};
use crate::utils::error::{HubError, Result};
use crate::utils::extract::extract_json_object;
use crate::utils::markdown::{clean_markdown, remove_fences};
use serde::de::DeserializeOwned;
use std::time::Duration;

pub const DEFAULT_JSON_RETRIES: u32 = 1;
const RETRY_DELAY: Duration = Duration::from_millis(400);
const JSON_SYSTEM_SUFFIX: &str = " Return STRICT JSON only. No backticks.";
const JSON_RETRY_HINT: &str = "\n\nReturn STRICT JSON ONLY.";

/// Plain-text call; code fences are stripped from the reply.
pub async fn chat_text<M: ChatModel + ?Sized>(model: &M, request: &ChatRequest) -> Result<String> {
    let reply = model.complete(request).await?;
    Ok(remove_fences(&reply))
}

/// Call the model and deserialize a JSON object salvaged from its reply.
///
/// On a transient failure or an unparseable reply the request is sent again
/// with a stronger hint and a lower temperature, at most `retries` more times.
pub async fn chat_json<M, T>(model: &M, request: &ChatRequest, retries: u32) -> Result<T>
where
    M: ChatModel + ?Sized,
    T: DeserializeOwned,
{
    let mut request = request.clone();
    request.system.push_str(JSON_SYSTEM_SUFFIX);
    request.json_mode = true;

    let mut attempts_left = retries;
    loop {
        match attempt_json(model, &request).await {
            Ok(value) => return Ok(value),
            Err(e) if attempts_left > 0 && e.is_retryable() => {
                tracing::warn!("Structured call failed ({}), retrying with a stricter hint", e);
                attempts_left -= 1;
                tokio::time::sleep(RETRY_DELAY).await;
                request.user.push_str(JSON_RETRY_HINT);
                request.temperature = 0.1;
            }
            Err(e) => return Err(e),
        }
    }
}

async fn attempt_json<M, T>(model: &M, request: &ChatRequest) -> Result<T>
where
    M: ChatModel + ?Sized,
    T: DeserializeOwned,
{
    let reply = model.complete(request).await?;
    let value = parse_json_reply(&reply).ok_or_else(|| HubError::ExtractionError {
        message: format!("no JSON object found in {} chars of output", reply.len()),
    })?;
    Ok(serde_json::from_value(value)?)
}

/// Raw reply first, then the reply with Markdown fences and inline code unwrapped.
pub fn parse_json_reply(reply: &str) -> Option<serde_json::Value> {
    extract_json_object(reply).or_else(|| extract_json_object(&clean_markdown(reply)))
}


#[cfg(test)]
mod tests {
    use super::testing::ScriptedChat;
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Topics {
        topics: Vec<String>,
    }

    #[tokio::test]
    async fn test_chat_json_parses_first_reply() {
        let chat = ScriptedChat::new(vec![r#"{"topics": ["a", "b"]}"#]);
        let request = ChatRequest::new("m", "You are a researcher.", "Find topics");

        let topics: Topics = chat_json(&chat, &request, 1).await.unwrap();

        assert_eq!(topics.topics, vec!["a", "b"]);
        let sent = chat.request(0);
        assert!(sent.system.ends_with("Return STRICT JSON only. No backticks."));
        assert!(sent.json_mode);
        assert_eq!(sent.max_tokens, None);
    }

    #[tokio::test]
    async fn test_chat_json_retries_once_with_hint() {
        let chat = ScriptedChat::new(vec!["I cannot produce JSON today", r#"{"topics": []}"#]);
        let request = ChatRequest::new("m", "sys", "user");

        let topics: Topics = chat_json(&chat, &request, 1).await.unwrap();

        assert!(topics.topics.is_empty());
        assert_eq!(chat.call_count(), 2);
        let retry = chat.request(1);
        assert!(retry.user.ends_with("Return STRICT JSON ONLY."));
        assert_eq!(retry.temperature, 0.1);
    }

    #[tokio::test]
    async fn test_chat_json_gives_up_after_retry() {
        let chat = ScriptedChat::new(vec!["nope", "still nope"]);
        let request = ChatRequest::new("m", "sys", "user");

        let result: Result<Topics> = chat_json(&chat, &request, 1).await;

        assert!(matches!(result, Err(HubError::ExtractionError { .. })));
        assert_eq!(chat.call_count(), 2);
    }

    #[tokio::test]
    async fn test_chat_json_retries_provider_errors() {
        let chat = ScriptedChat::default();
        chat.push_error(503);
        chat.push_reply(r#"```json
{"topics": ["x"]}
```"#);
        let request = ChatRequest::new("m", "sys", "user");

        let topics: Topics = chat_json(&chat, &request, 1).await.unwrap();
        assert_eq!(topics.topics, vec!["x"]);
    }

    #[tokio::test]
    async fn test_chat_json_does_not_retry_auth_failures() {
        let chat = ScriptedChat::default();
        chat.push_error(401);
        chat.push_reply(r#"{"topics": ["never read"]}"#);
        let request = ChatRequest::new("m", "sys", "user");

        let result: Result<Topics> = chat_json(&chat, &request, 1).await;

        assert!(matches!(result, Err(HubError::ProviderError { status: 401, .. })));
        assert_eq!(chat.call_count(), 1);
    }

    #[tokio::test]
    async fn test_chat_json_retries_wrong_shape() {
        let chat = ScriptedChat::new(vec![r#"{"topics": "RAG"}"#, r#"{"topics": ["RAG"]}"#]);
        let request = ChatRequest::new("m", "sys", "user");

        let topics: Topics = chat_json(&chat, &request, 1).await.unwrap();

        assert_eq!(topics.topics, vec!["RAG"]);
        assert_eq!(chat.call_count(), 2);
    }

    #[test]
    fn test_parse_json_reply_recovers_inline_code() {
        let reply = r#"Here you go: {"topics": [`"RAG"`, `"Agents"`]}"#;
        assert!(crate::utils::extract::extract_json_object(reply).is_none());

        let value = parse_json_reply(reply).unwrap();
        assert_eq!(value["topics"][1], "Agents");
    }

    #[tokio::test]
    async fn test_chat_text_strips_fences() {
        let chat = ScriptedChat::new(vec!["```\n# Overview\nHello\n```"]);
        let request = ChatRequest::new("m", "sys", "user");
        assert_eq!(chat_text(&chat, &request).await.unwrap(), "# Overview\nHello");
    }
}
