use std::sync::Arc;
use std::time::Duration;

use infoviz::inference::{ChatCompletionModel, ProviderErrorKind, ProviderKind, ProviderResponse, TextInsightProvider};
use infoviz::pipeline::{Analyzer, EXTERNAL_KEY, LOCAL_KEY};
use infoviz::prompting::ExtractionType;
use serde_json::json;
use url::Url;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn completion(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [{"index": 0, "message": {"role": "assistant", "content": content}, "finish_reason": "stop"}]
    })
}

fn model_for(server: &MockServer) -> ChatCompletionModel {
    ChatCompletionModel::new(ProviderKind::DeepSeek, Some("test-key".to_string()))
        .unwrap()
        .with_base_url(Url::parse(&server.uri()).unwrap())
}

#[tokio::test]
async fn test_structured_reply() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("Authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(
            "```json\n{\"entities\": [\"北京\", \"上海\"]}\n```",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let response = model_for(&server)
        .extract("北京和上海", ExtractionType::Entities)
        .await
        .unwrap();
    assert_eq!(response, ProviderResponse::Structured(json!({"entities": ["北京", "上海"]})));
}

#[tokio::test]
async fn test_plain_text_reply_becomes_content() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("文本整体偏正面。")))
        .mount(&server)
        .await;

    let response = model_for(&server)
        .extract("今天很好", ExtractionType::Sentiment)
        .await
        .unwrap();
    assert_eq!(response, ProviderResponse::Content("文本整体偏正面。".to_string()));
}

#[tokio::test]
async fn test_unauthorized_is_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
        .mount(&server)
        .await;

    let err = model_for(&server)
        .extract("文本", ExtractionType::Comprehensive)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ProviderErrorKind::Auth);
    assert!(err.message.contains("invalid api key"));
}

#[tokio::test]
async fn test_server_error_is_http_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = model_for(&server)
        .extract("文本", ExtractionType::Comprehensive)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ProviderErrorKind::Http);
}

#[tokio::test]
async fn test_malformed_json_is_parse_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("{\"entities\": [")))
        .mount(&server)
        .await;

    let err = model_for(&server)
        .extract("文本", ExtractionType::Entities)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ProviderErrorKind::Parse);
}

#[tokio::test]
async fn test_slow_reply_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion("{}"))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let err = model_for(&server)
        .with_timeout(Duration::from_millis(100))
        .extract("文本", ExtractionType::Keywords)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ProviderErrorKind::Timeout);
}

#[tokio::test]
async fn test_analyzer_plans_provider_reply() {
    let server = MockServer::start().await;
    let reply = json!({
        "categories": [{"name": "线上", "proportion": 62}, {"name": "线下", "proportion": 38}],
        "core_arguments": ["线上渠道占比62%"]
    });
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(&reply.to_string())))
        .mount(&server)
        .await;

    let analyzer = Analyzer::default().with_provider(Arc::new(model_for(&server)));
    let report = analyzer.analyze("线上渠道占比62%，线下占比38%。").await;

    assert!(report.errors.is_empty(), "{:?}", report.errors);
    assert_eq!(report.external_analysis, Some(reply));
    assert!(report.items(LOCAL_KEY).is_some());
    let external = report.items(EXTERNAL_KEY).unwrap();
    assert!(external.iter().any(|item| item.as_chart().is_some()));
    assert!(!report.authenticity[EXTERNAL_KEY].has_virtual_data);
}

#[tokio::test]
async fn test_analyzer_survives_unreachable_provider() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let analyzer = Analyzer::default().with_provider(Arc::new(model_for(&server)));
    let report = analyzer.analyze("公司营收增长了20%。").await;

    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.external_analysis.as_ref().unwrap()["kind"], "http");
    assert!(report.items(LOCAL_KEY).is_some_and(|items| !items.is_empty()));
    let external = report.items(EXTERNAL_KEY).unwrap();
    assert_eq!(external.len(), 1);
    assert!(external[0].as_card().is_some_and(|card| card.is_error()));
}
