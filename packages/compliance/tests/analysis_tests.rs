use std::sync::Arc;

use pccc_compliance::prompt::system_prompt;
use pccc_compliance::{
    ComplianceAnalyzer, ComplianceConfig, ComplianceError, ComplianceResponse, OpenRouterClient,
    Section,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path};
use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

/// Matches chat requests whose system message is the prompt for `section`.
struct SectionMatcher(Section);

impl Match for SectionMatcher {
    fn matches(&self, request: &Request) -> bool {
        request
            .body_json::<Value>()
            .ok()
            .and_then(|body| body["messages"][0]["content"].as_str().map(String::from))
            .is_some_and(|system| system == system_prompt(self.0))
    }
}

fn chat_response(content: &str) -> Value {
    json!({
        "id": "gen-test",
        "object": "chat.completion",
        "model": "google/gemini-2.0-flash-exp:free",
        "choices": [
            {
                "index": 0,
                "message": { "role": "assistant", "content": content },
                "finish_reason": "stop"
            }
        ],
        "usage": { "prompt_tokens": 800, "completion_tokens": 400 }
    })
}

fn section_outputs() -> Vec<(Section, Value)> {
    vec![
        (
            Section::Overview,
            json!({
                "buildingInfo": {
                    "floors": 25,
                    "height": null,
                    "floorArea": 1000,
                    "buildingType": "F1.3 Nhà chung cư",
                    "fireClass": "Bậc I",
                    "hazardGroup": "Nhóm II"
                }
            }),
        ),
        (
            Section::Escape,
            json!({
                "escapeSolutions": [
                    {
                        "title": "Số lượng lối ra thoát nạn",
                        "content": "Mỗi tầng bố trí tối thiểu 2 lối ra thoát nạn phân tán, dẫn vào buồng thang bộ không nhiễm khói N1.",
                        "references": [
                            { "source": "QCVN 06:2022/BXD", "clause": "3.2.6", "requirement": "Tối thiểu 2 lối ra" }
                        ]
                    },
                    {
                        "title": "Chiều rộng vế thang",
                        "content": "Chiều rộng thông thủy của vế thang thoát nạn không nhỏ hơn 1,05 m.",
                        "references": []
                    }
                ],
                "citations": [
                    { "source": "QCVN 06:2022/BXD", "clause": "3.2.6", "text": "Số lượng lối ra thoát nạn từ mỗi tầng" }
                ]
            }),
        ),
        (
            Section::FireSpread,
            json!({
                "fireSpreadPrevention": [
                    { "title": "Khoang cháy", "content": "Phân chia khoang cháy bằng tường ngăn cháy loại 1 REI 150." }
                ]
            }),
        ),
        (
            Section::Traffic,
            json!({
                "fireTraffic": [
                    { "content": "Đường cho xe chữa cháy rộng tối thiểu 3,5 m, chiều cao thông thủy 4,25 m." }
                ]
            }),
        ),
        (
            Section::Technical,
            json!({
                "technicalSystems": [
                    { "content": "Hệ thống báo cháy tự động địa chỉ theo TCVN 5738:2021." }
                ],
                "citations": [
                    { "source": "TCVN 5738:2021", "text": "Hệ thống báo cháy tự động" }
                ]
            }),
        ),
    ]
}

async fn mount_sections(server: &MockServer, fenced: bool) {
    for (section, output) in section_outputs() {
        let pretty = serde_json::to_string_pretty(&output).expect("serialize");
        let content = if fenced {
            format!("```json\n{pretty}\n```")
        } else {
            pretty
        };
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(SectionMatcher(section))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_response(&content)))
            .expect(1)
            .mount(server)
            .await;
    }
}

fn analyzer(config: &ComplianceConfig) -> ComplianceAnalyzer {
    let client = OpenRouterClient::new(config).expect("client creation");
    ComplianceAnalyzer::new(Arc::new(client), config).expect("analyzer creation")
}

fn hanoi_request() -> Value {
    json!({ "description": "Toà nhà chung cư 25 tầng, diện tích sàn 1000m2 ở Hà Nội." })
}

async fn run_against(fenced: bool) -> ComplianceResponse {
    let server = MockServer::start().await;
    mount_sections(&server, fenced).await;
    let config = ComplianceConfig::builder("test-key")
        .api_base_url(server.uri())
        .max_attempts(1)
        .build();
    analyzer(&config)
        .analyze(&hanoi_request())
        .await
        .expect("analysis should succeed")
}

#[tokio::test]
async fn test_hanoi_apartment_e2e() {
    let report = run_against(false).await;

    assert_eq!(report.building_info.floors, Some(25));
    assert!(!report.escape_solutions.is_empty());
    for item in &report.escape_solutions {
        assert!(!item.content.is_empty());
        for reference in &item.references {
            assert!(!reference.source.is_empty());
        }
    }
    assert_eq!(report.fire_spread_prevention.len(), 1);
    assert_eq!(report.fire_traffic.len(), 1);
    assert_eq!(report.technical_systems.len(), 1);
    assert_eq!(report.citations_for("tech").count(), 1);
}

#[tokio::test]
async fn test_fenced_output_matches_bare_output() {
    let fenced = run_against(true).await;
    let bare = run_against(false).await;
    assert_eq!(fenced, bare);
}

#[tokio::test]
async fn test_short_description_makes_no_calls() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_response("{}")))
        .expect(0)
        .mount(&server)
        .await;

    let config = ComplianceConfig::builder("test-key")
        .api_base_url(server.uri())
        .build();
    let err = analyzer(&config)
        .analyze(&json!({ "description": "short" }))
        .await
        .expect_err("should be rejected");

    match err {
        ComplianceError::InvalidRequest(errors) => {
            assert!(!errors.messages("description").is_empty());
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_sends_attribution_headers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(header("HTTP-Referer", "https://pccc.example"))
        .and(header("X-Title", "PCCC Test"))
        .and(SectionMatcher(Section::Full))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_response(
            &json!({
                "buildingInfo": { "floors": 2 },
                "escapeSolutions": [{ "content": "Hai lối ra thoát nạn" }],
                "fireSpreadPrevention": [],
                "fireTraffic": [],
                "technicalSystems": []
            })
            .to_string(),
        )))
        .expect(1)
        .mount(&server)
        .await;

    let config = ComplianceConfig::builder("test-key")
        .api_base_url(server.uri())
        .site("https://pccc.example", "PCCC Test")
        .mode(pccc_compliance::AnalysisMode::Full)
        .build();
    let report = analyzer(&config)
        .analyze(&json!({ "description": "Nhà ở riêng lẻ hai tầng tại Đà Nẵng" }))
        .await
        .expect("full analysis");
    assert_eq!(report.building_info.floors, Some(2));
}

#[tokio::test]
async fn test_transient_status_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_response(
            r#"{"buildingInfo": {}, "escapeSolutions": [{"content": "Lối ra thoát nạn"}], "fireSpreadPrevention": [], "fireTraffic": [], "technicalSystems": []}"#,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let config = ComplianceConfig::builder("test-key")
        .api_base_url(server.uri())
        .mode(pccc_compliance::AnalysisMode::Full)
        .max_attempts(2)
        .build();
    let report = analyzer(&config)
        .analyze(&hanoi_request())
        .await
        .expect("retry should recover");
    assert_eq!(report.escape_solutions.len(), 1);
}

#[tokio::test]
async fn test_client_errors_are_not_retried_and_fail_everything() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({ "error": { "message": "No auth credentials found" } })),
        )
        .expect(5)
        .mount(&server)
        .await;

    let config = ComplianceConfig::builder("bad-key")
        .api_base_url(server.uri())
        .max_attempts(3)
        .build();
    let err = analyzer(&config)
        .analyze(&hanoi_request())
        .await
        .expect_err("every section fails");

    assert!(matches!(err, ComplianceError::TotalFailure { attempted: 5 }));
    assert!(!err.to_string().contains("No auth credentials"));
}

#[tokio::test]
async fn test_empty_choices_count_as_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(SectionMatcher(Section::Overview))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(SectionMatcher(Section::Escape))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_response(
            r#"{"escapeSolutions": [{"content": "Hai cầu thang thoát nạn"}]}"#,
        )))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_response("")))
        .mount(&server)
        .await;

    let config = ComplianceConfig::builder("test-key")
        .api_base_url(server.uri())
        .max_attempts(1)
        .build();
    let analysis = analyzer(&config)
        .analyze_detailed(&hanoi_request())
        .await
        .expect("escape alone is enough");

    assert!(analysis.report.building_info.is_empty());
    assert_eq!(analysis.report.escape_solutions.len(), 1);
    let failed: Vec<Section> = analysis
        .outcomes
        .iter()
        .filter(|o| !o.succeeded())
        .map(|o| o.section)
        .collect();
    assert_eq!(
        failed,
        vec![Section::Overview, Section::FireSpread, Section::Traffic, Section::Technical]
    );
}

#[tokio::test]
async fn test_any_success_status_is_accepted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(201).set_body_json(chat_response(
            r#"{"buildingInfo": {"floors": 4}, "escapeSolutions": [{"content": "Hai lối ra thoát nạn"}], "fireSpreadPrevention": [], "fireTraffic": [], "technicalSystems": []}"#,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let config = ComplianceConfig::builder("test-key")
        .api_base_url(server.uri())
        .mode(pccc_compliance::AnalysisMode::Full)
        .max_attempts(1)
        .build();
    let report = analyzer(&config)
        .analyze(&hanoi_request())
        .await
        .expect("201 carries a usable completion");
    assert_eq!(report.building_info.floors, Some(4));
}
