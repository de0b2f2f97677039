//! Request types, boundary validation and boundary responses

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const MAX_QUESTIONS: u32 = 15;
pub const MAX_PARAGRAPHS: u32 = 10;

// ===== Selectors =====

/// Kind of questions to generate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum QuestionType
{   #[default]
    Mixed
  , MultipleChoice
  , TrueFalse
  , Open
}

impl QuestionType
{   /// Accepts the front-end aliases. Anything unknown is `Mixed`.
    pub fn from_selector(selector: &str) -> Self
    {   match selector.trim().to_lowercase().as_str()
        {   "multiple_choice" | "opcion_multiple" => QuestionType::MultipleChoice
          , "true_false" | "vf" => QuestionType::TrueFalse
          , "open" | "abiertas" => QuestionType::Open
          , _ => QuestionType::Mixed
        }
    }

    pub fn as_str(&self) -> &'static str
    {   match self
        {   QuestionType::Mixed => "mixed"
          , QuestionType::MultipleChoice => "multiple_choice"
          , QuestionType::TrueFalse => "true_false"
          , QuestionType::Open => "open"
        }
    }
}

impl From<String> for QuestionType
{   fn from(s: String) -> Self
    {   QuestionType::from_selector(&s)
    }
}

/// Shape of a generated summary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum SummaryFormat
{   #[default]
    Simple
  , Detailed
  , BulletPoints
}

impl SummaryFormat
{   /// Anything unknown is `Simple`.
    pub fn from_selector(selector: &str) -> Self
    {   match selector.trim().to_lowercase().as_str()
        {   "detailed" | "detallado" => SummaryFormat::Detailed
          , "bullet_points" | "bullet-points" => SummaryFormat::BulletPoints
          , _ => SummaryFormat::Simple
        }
    }

    pub fn as_str(&self) -> &'static str
    {   match self
        {   SummaryFormat::Simple => "simple"
          , SummaryFormat::Detailed => "detailed"
          , SummaryFormat::BulletPoints => "bullet_points"
        }
    }
}

impl From<String> for SummaryFormat
{   fn from(s: String) -> Self
    {   SummaryFormat::from_selector(&s)
    }
}

// ===== Requests =====

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionRequest
{   pub course: String
  , pub topic: String
  , pub count: u32
  , #[serde(rename = "type", default)]
    pub question_type: QuestionType
  , #[serde(default)]
    pub material: Option<String>
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRequest
{   pub topic: String
  , pub paragraphs: u32
  , #[serde(default)]
    pub format: SummaryFormat
  , #[serde(default)]
    pub material: Option<String>
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRequest
{   pub topic: String
  , pub question: String
  , pub student_answer: String
  , #[serde(default)]
    pub material: Option<String>
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicPlanRequest
{   pub title: String
  , pub description: String
  , pub education_level: String
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRequest
{   pub topic: String
  , pub description: String
}

/// One inbound generation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum GenerationRequest
{   Questions(QuestionRequest)
  , Summary(SummaryRequest)
  , Evaluation(EvaluationRequest)
  , Topics(TopicPlanRequest)
  , Image(ImageRequest)
}

impl GenerationRequest
{   pub fn kind(&self) -> crate::OperationKind
    {   match self
        {   GenerationRequest::Questions(_) => crate::OperationKind::Questions
          , GenerationRequest::Summary(_) => crate::OperationKind::Summary
          , GenerationRequest::Evaluation(_) => crate::OperationKind::Evaluation
          , GenerationRequest::Topics(_) => crate::OperationKind::Topics
          , GenerationRequest::Image(_) => crate::OperationKind::Image
        }
    }

    /// Reference material, if any non-blank text was supplied
    pub fn material(&self) -> Option<&str>
    {   let material = match self
        {   GenerationRequest::Questions(r) => r.material.as_deref()
          , GenerationRequest::Summary(r) => r.material.as_deref()
          , GenerationRequest::Evaluation(r) => r.material.as_deref()
          , _ => None
        };
        material.filter(|m| !m.trim().is_empty())
    }

    /// Boundary checks. Runs before any provider is called.
    pub fn validate(&self) -> Result<(), crate::error::Error>
    {   match self
        {   GenerationRequest::Questions(r) => {
              required("course", &r.course, None)?;
              required("topic", &r.topic, None)?;
              in_range("count", r.count, MAX_QUESTIONS)
            }
          , GenerationRequest::Summary(r) => {
              required("topic", &r.topic, None)?;
              in_range("paragraphs", r.paragraphs, MAX_PARAGRAPHS)
            }
          , GenerationRequest::Evaluation(r) => {
              required("topic", &r.topic, None)?;
              required("question", &r.question, None)?;
              required("student_answer", &r.student_answer, None)
            }
          , GenerationRequest::Topics(r) => {
              required("title", &r.title, Some(255))?;
              required("description", &r.description, Some(3000))?;
              required("education_level", &r.education_level, Some(255))
            }
          , GenerationRequest::Image(r) => {
              required("topic", &r.topic, Some(255))?;
              required("description", &r.description, Some(1000))
            }
        }
    }
}

fn required(
  field: &str
, value: &str
, max_chars: Option<usize>
) -> Result<(), crate::error::Error>
{   if value.trim().is_empty()
    {   return Err(crate::error::Error::InvalidRequest(
          format!("{} is required", field)
        ));
    }
    if let Some(max) = max_chars
    {   if value.chars().count() > max
        {   return Err(crate::error::Error::InvalidRequest(
              format!("{} must be at most {} characters", field, max)
            ));
        }
    }
    Ok(())
}

fn in_range(
  field: &str
, value: u32
, max: u32
) -> Result<(), crate::error::Error>
{   if value < 1 || value > max
    {   return Err(crate::error::Error::InvalidRequest(
          format!("{} must be between 1 and {}", field, max)
        ));
    }
    Ok(())
}

// ===== Boundary responses =====

/// Outcome class, mapped to an HTTP status by whoever serves it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus
{   Ok
  , Invalid
  , Failure
}

impl ResponseStatus
{   pub fn http_code(&self) -> u16
    {   match self
        {   ResponseStatus::Ok => 200
          , ResponseStatus::Invalid => 422
          , ResponseStatus::Failure => 500
        }
    }
}

/// What the boundary layer serialises back to the caller
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoundaryResponse
{   pub status: ResponseStatus
  , pub body: Value
}

impl BoundaryResponse
{   pub fn ok(body: Value) -> Self
    {   BoundaryResponse { status: ResponseStatus::Ok, body }
    }

    /// Rendering of a non-provider error
    pub fn from_error(error: &crate::error::Error) -> Self
    {   let status = match error
        {   crate::error::Error::InvalidRequest(_)
          | crate::error::Error::UnsupportedInput(_) => ResponseStatus::Invalid
          , _ => ResponseStatus::Failure
        };
        BoundaryResponse
        {   status
          , body: json!({
              "error": true,
              "success": false,
              "message": error.to_string(),
            })
        }
    }
}

/// Assemble the response for a generate reply.
pub fn respond(
  request: &GenerationRequest
, reply: &crate::GenerateReply
) -> BoundaryResponse
{   use crate::error::{GenerateError, OrchestrationError};

    let done = match reply
    {   Ok(done) => done
      , Err(GenerateError::Invalid(e)) => {
          return BoundaryResponse::from_error(e);
        }
      , Err(GenerateError::Orchestration(e)) => {
          let mut body = json!({
            "error": true,
            "success": false,
            "message": failure_message(request.kind()),
          });
          match e
          {   OrchestrationError::PrimaryOnly(primary) => {
                body["primary_error"] = primary.to_payload();
              }
            , OrchestrationError::DualFailure { primary, secondary } => {
                body["primary_error"] = primary.to_payload();
                body["secondary_error"] = secondary.to_payload();
              }
          }
          return BoundaryResponse
          {   status: ResponseStatus::Failure
            , body
          };
        }
    };

    let provider = done.role.as_str();
    let body = match request
    {   GenerationRequest::Questions(r) => {
          json!({
            "course": r.course,
            "topic": r.topic,
            "count": r.count,
            "type": r.question_type.as_str(),
            "questions": question_list(&done.payload, r.count),
            "provider": provider,
          })
        }
      , GenerationRequest::Summary(r) => {
          json!({
            "topic": r.topic,
            "paragraphs": r.paragraphs,
            "format": r.format.as_str(),
            "summary": done.payload,
            "provider": provider,
          })
        }
      , GenerationRequest::Evaluation(r) => {
          json!({
            "topic": r.topic,
            "question": r.question,
            "student_answer": r.student_answer,
            "evaluation": done.payload,
            "provider": provider,
          })
        }
      , GenerationRequest::Topics(r) => {
          json!({
            "success": true,
            "title": r.title,
            "description": r.description,
            "education_level": r.education_level,
            "data": done.payload,
            "provider": provider,
          })
        }
      , GenerationRequest::Image(r) => {
          json!({
            "success": true,
            "topic": r.topic,
            "description": r.description,
            "image_base64": done.payload
              .get("image_base64")
              .cloned()
              .unwrap_or(Value::Null),
            "provider": provider,
          })
        }
    };
    BoundaryResponse::ok(body)
}

/// Questions as a list of at most `count` items. Accepts a bare array
/// or an object wrapping one under `questions`.
fn question_list(payload: &Value, count: u32) -> Value
{   let items = match payload
    {   Value::Array(items) => items.clone()
      , Value::Object(map) => match map.get("questions")
        {   Some(Value::Array(items)) => items.clone()
          , _ => vec![]
        }
      , _ => vec![]
    };
    Value::Array(items.into_iter().take(count as usize).collect())
}

fn failure_message(kind: crate::OperationKind) -> &'static str
{   match kind
    {   crate::OperationKind::Questions => "could not generate questions with any provider"
      , crate::OperationKind::Summary => "could not generate the summary with any provider"
      , crate::OperationKind::Evaluation => "could not evaluate the answer with any provider"
      , crate::OperationKind::Topics => "could not generate course topics"
      , crate::OperationKind::Image => "could not generate the image"
    }
}
