use mockito::Matcher;
use serde_json::{json, Value};

use edugen::config::{EduGenConfig, ProviderConfig, Route, StorageConfig};
use edugen::error::{GenerateError, OrchestrationError, ProviderErrorKind};
use edugen::request::{
  respond, EvaluationRequest, GenerationRequest, ImageRequest
, QuestionRequest, QuestionType, ResponseStatus, SummaryFormat
, SummaryRequest
};
use edugen::{EduGenBackend, FallbackOrchestrator, ProviderId, ProviderRole};

fn init_logger()
{   let _ = env_logger::builder().is_test(true).try_init();
}

/// Both providers pointed at the mock server
fn test_config(base: &str) -> EduGenConfig
{   let mut gemini = ProviderConfig::gemini();
    gemini.api_base = Some(base.to_string());
    gemini.api_key = Some("gemini-test-key".to_string());

    let mut openai = ProviderConfig::openai();
    openai.api_base = Some(base.to_string());
    openai.api_key = Some("openai-test-key".to_string());

    EduGenConfig
    {   providers: vec![gemini, openai]
      , timeout_secs: 5
      , ..EduGenConfig::default()
    }
}

fn gemini_envelope(text: &str) -> String
{   json!({
      "candidates": [
        {"content": {"role": "model", "parts": [{"text": text}]}, "finishReason": "STOP"}
      ]
    }).to_string()
}

fn openai_envelope(text: &str) -> String
{   json!({
      "choices": [
        {"index": 0, "message": {"role": "assistant", "content": text}, "finish_reason": "stop"}
      ]
    }).to_string()
}

fn five_questions() -> Value
{   let items: Vec<Value> = (1..=5).map(|i| json!({
      "question": format!("Pregunta {}", i),
      "type": "multiple_choice",
      "options": ["1789", "1792", "1799", "1804"],
      "answer": "1789"
    })).collect();
    Value::Array(items)
}

#[tokio::test]
async fn test_questions_fall_back_when_primary_transport_fails()
{   init_logger();
    let mut server = mockito::Server::new_async().await;

    let gemini = server
      .mock("POST", Matcher::Regex("generateContent".to_string()))
      .match_header("x-goog-api-key", "gemini-test-key")
      .with_status(503)
      .with_header("content-type", "application/json")
      .with_body(r#"{"error": {"code": 503, "message": "overloaded"}}"#)
      .expect(1)
      .create_async()
      .await;

    let completion = format!("```json\n{}\n```", five_questions());
    let openai = server
      .mock("POST", "/chat/completions")
      .match_header("authorization", "Bearer openai-test-key")
      .match_body(Matcher::Regex("no inventar hechos".to_string()))
      .with_status(200)
      .with_header("content-type", "application/json")
      .with_body(openai_envelope(&completion))
      .expect(1)
      .create_async()
      .await;

    let orchestrator = FallbackOrchestrator::from_config(&test_config(&server.url()))
      .expect("config is valid");
    let request = GenerationRequest::Questions(QuestionRequest
    {   course: "Historia".to_string()
      , topic: "Revolución Francesa".to_string()
      , count: 5
      , question_type: QuestionType::MultipleChoice
      , material: Some("En 1789 cayó la Bastilla y comenzó la revolución.".to_string())
    });

    let reply: edugen::GenerateReply = orchestrator.run(&request).await
      .map_err(GenerateError::from);
    let response = respond(&request, &reply);

    gemini.assert_async().await;
    openai.assert_async().await;

    assert_eq!(response.status, ResponseStatus::Ok);
    assert_eq!(response.body["provider"], "secondary");
    let questions = response.body["questions"].as_array().expect("questions array");
    assert!(questions.len() <= 5);
    for q in questions
    {   assert!(q["question"].is_string());
        assert_eq!(q["type"], "multiple_choice");
        assert!(q["options"].is_array());
        assert!(q["answer"].is_string());
    }
}

#[tokio::test]
async fn test_summary_answered_by_primary_skips_secondary()
{   init_logger();
    let mut server = mockito::Server::new_async().await;

    let summary = json!({
      "topic": "La célula",
      "format": "simple",
      "paragraphs": ["La célula es la unidad básica de la vida."]
    });
    let gemini = server
      .mock("POST", Matcher::Regex("generateContent".to_string()))
      .match_query(Matcher::Any)
      .match_body(Matcher::Regex("conocimiento general confiable".to_string()))
      .with_status(200)
      .with_body(gemini_envelope(&summary.to_string()))
      .expect(1)
      .create_async()
      .await;
    let openai = server
      .mock("POST", "/chat/completions")
      .expect(0)
      .create_async()
      .await;

    let orchestrator = FallbackOrchestrator::from_config(&test_config(&server.url()))
      .expect("config is valid");
    let request = GenerationRequest::Summary(SummaryRequest
    {   topic: "La célula".to_string()
      , paragraphs: 1
      , format: SummaryFormat::Simple
      , material: None
    });

    let done = orchestrator.run(&request).await.expect("primary answers");
    assert_eq!(done.role, ProviderRole::Primary);
    assert_eq!(done.provider, ProviderId::Gemini);
    assert_eq!(done.payload, summary);

    gemini.assert_async().await;
    openai.assert_async().await;
}

#[tokio::test]
async fn test_evaluation_in_band_error_falls_back()
{   init_logger();
    let mut server = mockito::Server::new_async().await;

    let gemini = server
      .mock("POST", Matcher::Regex("generateContent".to_string()))
      .match_query(Matcher::Any)
      .with_status(200)
      .with_body(gemini_envelope(r#"{"error": true, "message": "no pude evaluar"}"#))
      .expect(1)
      .create_async()
      .await;
    let evaluation = json!({
      "score": 72,
      "grade": "Buena",
      "feedback": "Respuesta correcta en lo esencial.",
      "strengths": ["claridad"],
      "improvements": ["dar un ejemplo"]
    });
    let openai = server
      .mock("POST", "/chat/completions")
      .with_status(200)
      .with_body(openai_envelope(&evaluation.to_string()))
      .expect(1)
      .create_async()
      .await;

    let orchestrator = FallbackOrchestrator::from_config(&test_config(&server.url()))
      .expect("config is valid");
    let request = GenerationRequest::Evaluation(EvaluationRequest
    {   topic: "Física".to_string()
      , question: "¿Qué es la inercia?".to_string()
      , student_answer: "Resistencia al cambio de movimiento.".to_string()
      , material: None
    });

    let done = orchestrator.run(&request).await.expect("secondary answers");
    assert_eq!(done.role, ProviderRole::Secondary);
    assert_eq!(done.payload, evaluation);

    gemini.assert_async().await;
    openai.assert_async().await;
}

#[tokio::test]
async fn test_dual_failure_reports_both_providers()
{   init_logger();
    let mut server = mockito::Server::new_async().await;

    let _gemini = server
      .mock("POST", Matcher::Regex("generateContent".to_string()))
      .match_query(Matcher::Any)
      .with_status(500)
      .with_body(r#"{"error": {"message": "internal"}}"#)
      .create_async()
      .await;
    let _openai = server
      .mock("POST", "/chat/completions")
      .with_status(200)
      .with_body(openai_envelope("Lo siento, no puedo generar JSON."))
      .create_async()
      .await;

    let orchestrator = FallbackOrchestrator::from_config(&test_config(&server.url()))
      .expect("config is valid");
    let request = GenerationRequest::Summary(SummaryRequest
    {   topic: "Roma".to_string()
      , paragraphs: 2
      , format: SummaryFormat::Detailed
      , material: Some("Roma fue fundada según la leyenda en 753 a.C.".to_string())
    });

    let reply: edugen::GenerateReply = orchestrator.run(&request).await
      .map_err(GenerateError::from);
    match &reply
    {   Err(GenerateError::Orchestration(OrchestrationError::DualFailure
        {   primary, secondary
        })) => {
          assert_eq!(primary.kind, ProviderErrorKind::TransportFailure);
          assert_eq!(primary.message, "could not reach provider");
          assert_eq!(
            primary.details.as_ref().map(|d| d["body"]["error"]["message"].clone()),
            Some(json!("internal"))
          );
          assert_eq!(secondary.kind, ProviderErrorKind::MalformedOutput);
          assert_eq!(
            secondary.raw.as_deref(),
            Some("Lo siento, no puedo generar JSON.")
          );
        }
      , other => panic!("expected dual failure, got {:?}", other)
    }

    let response = respond(&request, &reply);
    assert_eq!(response.status, ResponseStatus::Failure);
    assert!(response.body.get("primary_error").is_some());
    assert!(response.body.get("secondary_error").is_some());
}

#[tokio::test]
async fn test_image_url_is_downloaded_and_encoded()
{   init_logger();
    let mut server = mockito::Server::new_async().await;

    let image_url = format!("{}/files/generated.png", server.url());
    let images = server
      .mock("POST", "/images/generations")
      .with_status(200)
      .with_body(json!({"data": [{"url": image_url}]}).to_string())
      .expect(1)
      .create_async()
      .await;
    let download = server
      .mock("GET", "/files/generated.png")
      .with_status(200)
      .with_header("content-type", "image/png")
      .with_body("PNGDATA")
      .expect(1)
      .create_async()
      .await;

    let orchestrator = FallbackOrchestrator::from_config(&test_config(&server.url()))
      .expect("config is valid");
    let request = GenerationRequest::Image(ImageRequest
    {   topic: "Ciclo del agua".to_string()
      , description: "Evaporación, condensación y precipitación".to_string()
    });

    let done = orchestrator.run(&request).await.expect("image generated");
    assert_eq!(done.role, ProviderRole::Primary);
    assert_eq!(done.provider, ProviderId::OpenAi);
    assert_eq!(done.payload["success"], true);
    assert_eq!(done.payload["image_base64"], "UE5HREFUQQ==");

    images.assert_async().await;
    download.assert_async().await;
}

#[tokio::test]
async fn test_image_download_failure_is_a_value()
{   init_logger();
    let mut server = mockito::Server::new_async().await;

    let image_url = format!("{}/files/missing.png", server.url());
    let _images = server
      .mock("POST", "/images/generations")
      .with_status(200)
      .with_body(json!({"data": [{"url": image_url}]}).to_string())
      .create_async()
      .await;
    let _download = server
      .mock("GET", "/files/missing.png")
      .with_status(404)
      .with_body("not found")
      .create_async()
      .await;

    let orchestrator = FallbackOrchestrator::from_config(&test_config(&server.url()))
      .expect("config is valid");
    let request = GenerationRequest::Image(ImageRequest
    {   topic: "Ciclo del agua".to_string()
      , description: "Diagrama".to_string()
    });

    let reply: edugen::GenerateReply = orchestrator.run(&request).await
      .map_err(GenerateError::from);
    match &reply
    {   Err(GenerateError::Orchestration(OrchestrationError::PrimaryOnly(e))) => {
          assert_eq!(e.kind, ProviderErrorKind::TransportFailure);
        }
      , other => panic!("expected primary-only failure, got {:?}", other)
    }
    let response = respond(&request, &reply);
    assert_eq!(response.body["success"], false);
    assert!(response.body.get("secondary_error").is_none());
}

#[tokio::test]
async fn test_gemini_inline_image_when_routed_there()
{   init_logger();
    let mut server = mockito::Server::new_async().await;

    let predict = server
      .mock("POST", Matcher::Regex(":predict".to_string()))
      .match_query(Matcher::Any)
      .with_status(200)
      .with_body(json!({
        "predictions": [{"bytesBase64Encoded": "aW5saW5lLWJ5dGVz", "mimeType": "image/png"}]
      }).to_string())
      .expect(1)
      .create_async()
      .await;

    let mut config = test_config(&server.url());
    config.routing.image = Route::with_fallback(ProviderId::Gemini, ProviderId::OpenAi);
    let orchestrator = FallbackOrchestrator::from_config(&config)
      .expect("config is valid");
    let request = GenerationRequest::Image(ImageRequest
    {   topic: "Volcanes".to_string()
      , description: "Corte transversal".to_string()
    });

    let done = orchestrator.run(&request).await.expect("image generated");
    assert_eq!(done.provider, ProviderId::Gemini);
    assert_eq!(done.payload["image_base64"], "aW5saW5lLWJ5dGVz");
    predict.assert_async().await;
}

#[tokio::test]
async fn test_missing_api_key_falls_back()
{   init_logger();
    let mut server = mockito::Server::new_async().await;

    let openai = server
      .mock("POST", "/chat/completions")
      .with_status(200)
      .with_body(openai_envelope(&five_questions().to_string()))
      .expect(1)
      .create_async()
      .await;

    let mut config = test_config(&server.url());
    config.providers[0].api_key = None;
    let orchestrator = FallbackOrchestrator::from_config(&config)
      .expect("config is valid");
    let request = GenerationRequest::Questions(QuestionRequest
    {   course: "Historia".to_string()
      , topic: "Roma".to_string()
      , count: 5
      , question_type: QuestionType::Mixed
      , material: None
    });

    let done = orchestrator.run(&request).await.expect("secondary answers");
    assert_eq!(done.role, ProviderRole::Secondary);
    openai.assert_async().await;
}

#[tokio::test]
async fn test_backend_initialization()
{   init_logger();
    let backend = EduGenBackend::new(&EduGenConfig::default())
      .expect("default config is valid");
    println!("Backend created successfully");

    let result = backend.shutdown().await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_backend_rejects_invalid_request_before_calling_providers()
{   init_logger();
    let mut server = mockito::Server::new_async().await;
    let gemini = server
      .mock("POST", Matcher::Any)
      .expect(0)
      .create_async()
      .await;

    let backend = EduGenBackend::new(&test_config(&server.url()))
      .expect("config is valid");
    let request = GenerationRequest::Summary(SummaryRequest
    {   topic: "Roma".to_string()
      , paragraphs: 11
      , format: SummaryFormat::Simple
      , material: None
    });

    let mut rx = backend.generate(request).await.expect("backend running");
    match tokio::time::timeout(std::time::Duration::from_secs(5), rx.recv()).await
    {   Ok(Some(Err(GenerateError::Invalid(edugen::Error::InvalidRequest(_))))) => {}
      , other => panic!("expected validation error, got {:?}", other)
    }

    gemini.assert_async().await;
    let _ = backend.shutdown().await;
}

#[tokio::test]
async fn test_backend_generate_round_trip()
{   init_logger();
    let mut server = mockito::Server::new_async().await;
    let plan = json!({
      "course_title": "Química básica",
      "education_level": "Secundaria",
      "topics": [
        {"title": "La materia", "objective": "Reconocer estados", "estimated_sessions": 2, "summary": "Sólido, líquido y gas"}
      ]
    });
    let _openai = server
      .mock("POST", "/chat/completions")
      .with_status(200)
      .with_body(openai_envelope(&plan.to_string()))
      .create_async()
      .await;

    let backend = EduGenBackend::new(&test_config(&server.url()))
      .expect("config is valid");
    let request = GenerationRequest::Topics(edugen::request::TopicPlanRequest
    {   title: "Química básica".to_string()
      , description: "Primer curso de química".to_string()
      , education_level: "Secundaria".to_string()
    });

    let mut rx = backend.generate(request.clone()).await.expect("backend running");
    let reply = tokio::time::timeout(std::time::Duration::from_secs(5), rx.recv())
      .await
      .expect("reply in time")
      .expect("reply sent");
    let response = respond(&request, &reply);
    assert_eq!(response.status, ResponseStatus::Ok);
    assert_eq!(response.body["success"], true);
    assert_eq!(response.body["data"], plan);
    assert_eq!(response.body["provider"], "primary");

    let _ = backend.shutdown().await;
}

#[tokio::test]
async fn test_storage_disabled_without_config()
{   let backend = EduGenBackend::new(&EduGenConfig::default())
      .expect("default config is valid");
    let mut rx = backend.list_materials(String::new(), false).await
      .expect("backend running");
    match rx.recv().await
    {   Some(Err(edugen::Error::InvalidConfiguration(_))) => {}
      , other => panic!("expected configuration error, got {:?}", other)
    }
    let _ = backend.shutdown().await;
}

#[test]
fn test_config_validation_rejects_unconfigured_route()
{   let mut config = EduGenConfig::default();
    config.providers.retain(|p| p.id == ProviderId::Gemini);
    assert!(matches!(
      config.validate(),
      Err(edugen::Error::InvalidConfiguration(_))
    ));

    config.routing.questions = Route::single(ProviderId::Gemini);
    config.routing.summary = Route::single(ProviderId::Gemini);
    config.routing.evaluation = Route::single(ProviderId::Gemini);
    config.routing.topics = Route::single(ProviderId::Gemini);
    config.routing.image = Route::single(ProviderId::Gemini);
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_from_json()
{   let raw = json!({
      "providers": [
        {"id": "gemini", "api_base": null, "api_key": "k1", "model": "gemini-2.0-flash", "image_model": "imagen-3.0-generate-002", "timeout_secs": 30},
        {"id": "openai", "api_base": null, "api_key": "k2", "model": "gpt-4.1-mini", "image_model": "gpt-image-1", "timeout_secs": null}
      ],
      "routing": {
        "questions": {"primary": "gemini", "secondary": "openai"},
        "summary": {"primary": "gemini", "secondary": "openai"},
        "evaluation": {"primary": "gemini", "secondary": "openai"},
        "topics": {"primary": "openai", "secondary": "gemini"},
        "image": {"primary": "openai"}
      },
      "storage": {"url": "https://x.supabase.co/", "api_key": "s", "bucket": "materiales"}
    });
    let path = std::env::temp_dir().join("edugen-config-test.json");
    std::fs::write(&path, raw.to_string()).expect("write temp config");

    let config = EduGenConfig::from_json_file(&path).expect("valid config");
    assert_eq!(config.timeout_secs, 60);
    assert_eq!(config.routing.topics.secondary, Some(ProviderId::Gemini));
    assert_eq!(config.routing.image.secondary, None);
    assert_eq!(
      config.provider(ProviderId::Gemini).map(|p| p.model.as_str()),
      Some("gemini-2.0-flash")
    );
    let storage: &StorageConfig = config.storage.as_ref().expect("storage");
    assert_eq!(storage.bucket, "materiales");

    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn test_wrong_question_shape_falls_back()
{   init_logger();
    let mut server = mockito::Server::new_async().await;

    let gemini = server
      .mock("POST", Matcher::Regex("generateContent".to_string()))
      .with_status(200)
      .with_body(gemini_envelope(r#"{"preguntas": [{"question": "q"}]}"#))
      .expect(1)
      .create_async()
      .await;
    let openai = server
      .mock("POST", "/chat/completions")
      .with_status(200)
      .with_body(openai_envelope(&five_questions().to_string()))
      .expect(1)
      .create_async()
      .await;

    let orchestrator = FallbackOrchestrator::from_config(&test_config(&server.url()))
      .expect("config is valid");
    let request = GenerationRequest::Questions(QuestionRequest
    {   course: "Historia".to_string()
      , topic: "Roma".to_string()
      , count: 3
      , question_type: QuestionType::MultipleChoice
      , material: None
    });

    let reply: edugen::GenerateReply = orchestrator.run(&request).await
      .map_err(GenerateError::from);
    let response = respond(&request, &reply);

    gemini.assert_async().await;
    openai.assert_async().await;
    assert_eq!(response.status, ResponseStatus::Ok);
    assert_eq!(response.body["provider"], "secondary");
    assert_eq!(response.body["questions"].as_array().map(Vec::len), Some(3));
}

#[tokio::test]
async fn test_unreachable_gemini_never_exposes_api_key()
{   init_logger();
    let mut gemini = ProviderConfig::gemini();
    // nothing listens on port 1
    gemini.api_base = Some("http://127.0.0.1:1".to_string());
    gemini.api_key = Some("SUPERSECRETKEY".to_string());
    let mut openai = ProviderConfig::openai();
    openai.api_base = Some("http://127.0.0.1:1".to_string());
    openai.api_key = Some("OTHERSECRETKEY".to_string());
    let config = EduGenConfig
    {   providers: vec![gemini, openai]
      , timeout_secs: 5
      , ..EduGenConfig::default()
    };

    let orchestrator = FallbackOrchestrator::from_config(&config)
      .expect("config is valid");
    let request = GenerationRequest::Summary(SummaryRequest
    {   topic: "Roma".to_string()
      , paragraphs: 2
      , format: SummaryFormat::Simple
      , material: None
    });

    let reply: edugen::GenerateReply = orchestrator.run(&request).await
      .map_err(GenerateError::from);
    let response = respond(&request, &reply);

    assert_eq!(response.status, ResponseStatus::Failure);
    assert_eq!(response.body["primary_error"]["kind"], "transport_failure");
    let body = response.body.to_string();
    assert!(!body.contains("SUPERSECRETKEY"), "key leaked: {}", body);
    assert!(!body.contains("OTHERSECRETKEY"), "key leaked: {}", body);
}
