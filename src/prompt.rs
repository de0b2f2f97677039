//! Instruction rendering shared by every provider.
//!
//! Rendering is deterministic: the same request always yields the same
//! text. Each operation has one template; selectors map to fixed phrases.

use crate::request::{
  EvaluationRequest, GenerationRequest, ImageRequest, QuestionRequest
, QuestionType, SummaryFormat, SummaryRequest, TopicPlanRequest
};

/// Directive added when reference material is supplied
pub const GROUNDED_DIRECTIVE: &str
  = "Debes usar únicamente el material proporcionado y no inventar hechos fuera de él.";
/// Directive added when no reference material is supplied
pub const GENERAL_KNOWLEDGE_DIRECTIVE: &str
  = "No se proporcionó material de referencia: usa conocimiento general confiable.";

const JSON_ONLY: &str = "IMPORTANTE:
- Devuelve SOLO el JSON válido.
- No agregues texto, explicaciones ni comentarios antes o después del JSON.";

/// Approximate number of topics requested for a course plan
pub const TOPIC_COUNT: u32 = 8;

/// A rendered instruction ready to send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPrompt
{   /// Role instruction (system message / systemInstruction)
    pub system: Option<&'static str>
  , /// The instruction block itself
    pub instruction: String
}

pub fn question_type_phrase(question_type: QuestionType) -> &'static str
{   match question_type
    {   QuestionType::MultipleChoice => {
          "solo preguntas de opción múltiple con 4 alternativas y una única respuesta correcta"
        }
      , QuestionType::TrueFalse => "solo preguntas de verdadero/falso"
      , QuestionType::Open => "solo preguntas abiertas que requieran desarrollo"
      , QuestionType::Mixed => {
          "una mezcla de opción múltiple, verdadero/falso y preguntas abiertas"
        }
    }
}

pub fn summary_format_phrase(format: SummaryFormat) -> &'static str
{   match format
    {   SummaryFormat::Simple => "un resumen sencillo, claro y en prosa continua"
      , SummaryFormat::Detailed => {
          "un resumen detallado, bien estructurado y explicativo"
        }
      , SummaryFormat::BulletPoints => {
          "un resumen en formato de viñetas (bullet points), con ideas clave"
        }
    }
}

pub fn render(request: &GenerationRequest) -> RenderedPrompt
{   match request
    {   GenerationRequest::Questions(r) => render_questions(r)
      , GenerationRequest::Summary(r) => render_summary(r)
      , GenerationRequest::Evaluation(r) => render_evaluation(r)
      , GenerationRequest::Topics(r) => render_topics(r)
      , GenerationRequest::Image(r) => render_image(r)
    }
}

/// Grounding block: the material plus the restrictive directive, or the
/// general-knowledge directive alone. Never both.
fn grounding(material: Option<&str>) -> String
{   match material.filter(|m| !m.trim().is_empty())
    {   Some(material) => format!(
          "MATERIAL DE REFERENCIA:\n\"\"\"\n{}\n\"\"\"\n\n{}",
          material.trim(),
          GROUNDED_DIRECTIVE
        )
      , None => GENERAL_KNOWLEDGE_DIRECTIVE.to_string()
    }
}

fn render_questions(r: &QuestionRequest) -> RenderedPrompt
{   let count = r.count.clamp(1, crate::request::MAX_QUESTIONS);
    let instruction = format!(
"Actúa como un docente experto del curso \"{course}\".
Genera {count} preguntas sobre el tema \"{topic}\".

{grounding}

- Tipo de preguntas: {type_phrase}.
- Devuelve la respuesta en formato JSON con esta estructura:

[
  {{
    \"question\": \"...\",
    \"type\": \"multiple_choice|true_false|open\",
    \"options\": [\"opción 1\", \"opción 2\", \"opción 3\", \"opción 4\"],
    \"answer\": \"respuesta correcta o ejemplo de respuesta\"
  }}
]

Usa \"options\": null cuando la pregunta no tenga alternativas.

{json_only}",
      course = r.course,
      count = count,
      topic = r.topic,
      grounding = grounding(r.material.as_deref()),
      type_phrase = question_type_phrase(r.question_type),
      json_only = JSON_ONLY,
    );
    RenderedPrompt
    {   system: Some("Eres un generador de cuestionarios para un LMS educativo.")
      , instruction
    }
}

fn render_summary(r: &SummaryRequest) -> RenderedPrompt
{   let paragraphs = r.paragraphs.clamp(1, crate::request::MAX_PARAGRAPHS);
    let instruction = format!(
"Genera un resumen sobre el tema \"{topic}\".

{grounding}

Requisitos:
- Extensión aproximada: {paragraphs} párrafos.
- Formato del resumen: {format_phrase}.
- Idioma: español.

Si el formato es \"bullet_points\", cada elemento de \"paragraphs\" es un punto de la lista.
Devuelve la respuesta en formato JSON con esta estructura:

{{
  \"topic\": \"...\",
  \"format\": \"{format}\",
  \"paragraphs\": [\"párrafo o ítem 1\", \"párrafo o ítem 2\"]
}}

{json_only}",
      topic = r.topic,
      grounding = grounding(r.material.as_deref()),
      paragraphs = paragraphs,
      format_phrase = summary_format_phrase(r.format),
      format = r.format.as_str(),
      json_only = JSON_ONLY,
    );
    RenderedPrompt
    {   system: Some("Eres un asistente que resume contenidos para un LMS educativo.")
      , instruction
    }
}

fn render_evaluation(r: &EvaluationRequest) -> RenderedPrompt
{   let instruction = format!(
"Eres un docente experto en el tema \"{topic}\".

Debes evaluar la siguiente respuesta de un estudiante:

PREGUNTA:
\"{question}\"

RESPUESTA DEL ESTUDIANTE:
\"{answer}\"

{grounding}

Tareas:
1. Evalúa la precisión conceptual, claridad y profundidad.
2. Asigna una puntuación numérica entera de 0 a 100.
3. Clasifica la respuesta en una categoría: \"Excelente\", \"Buena\", \"Regular\" o \"Insuficiente\".
4. Da retroalimentación constructiva y concreta.
5. Señala fortalezas y aspectos a mejorar.

Devuelve la respuesta en JSON con esta estructura:

{{
  \"score\": 0,
  \"grade\": \"Excelente|Buena|Regular|Insuficiente\",
  \"feedback\": \"comentario general en 3-6 líneas\",
  \"strengths\": [\"punto fuerte 1\", \"punto fuerte 2\"],
  \"improvements\": [\"mejora 1\", \"mejora 2\"]
}}

{json_only}",
      topic = r.topic,
      question = r.question,
      answer = r.student_answer,
      grounding = grounding(r.material.as_deref()),
      json_only = JSON_ONLY,
    );
    RenderedPrompt
    {   system: Some("Eres un evaluador de respuestas para un LMS educativo.")
      , instruction
    }
}

fn render_topics(r: &TopicPlanRequest) -> RenderedPrompt
{   let instruction = format!(
"Actúas como un docente experto en diseño curricular y planificación de clases.

Debes proponer aproximadamente {topics} temas o lecciones para un curso con los siguientes datos:

- Título general del curso o unidad: \"{title}\"
- Descripción del curso: \"{description}\"
- Nivel educativo: \"{level}\"

Cada tema debe:
- Estar redactado en lenguaje claro para estudiantes de ese nivel.
- Seguir un orden lógico de aprendizaje (de básico a avanzado).
- Tener un objetivo de aprendizaje breve.
- Indicar una cantidad aproximada de sesiones (entre 1 y 3).

Devuelve la información en formato JSON con esta estructura:

{{
  \"course_title\": \"...\",
  \"education_level\": \"...\",
  \"topics\": [
    {{
      \"title\": \"Título del tema\",
      \"objective\": \"Objetivo de aprendizaje claro\",
      \"estimated_sessions\": 2,
      \"summary\": \"Breve descripción del contenido del tema\"
    }}
  ]
}}

{json_only}",
      topics = TOPIC_COUNT,
      title = r.title,
      description = r.description,
      level = r.education_level,
      json_only = JSON_ONLY,
    );
    RenderedPrompt
    {   system: Some(
          "Eres un planificador curricular para un LMS educativo. Generas temarios estructurados en JSON."
        )
      , instruction
    }
}

fn render_image(r: &ImageRequest) -> RenderedPrompt
{   RenderedPrompt
    {   system: None
      , instruction: format!(
          "Tema: {}\nDescripción: {}\nGenera una imagen educativa y visualmente clara.",
          r.topic,
          r.description
        )
    }
}
