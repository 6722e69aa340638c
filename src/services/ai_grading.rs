use std::time::{Duration, Instant};

use anyhow::Context;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::core::config::GradingSettings;
use crate::services::grading::{
    GradeOutcome, GradeRequest, GradedQuestion, Grader, GradingError, QuestionTemplate,
};

const GRADING_SYSTEM_PROMPT: &str = r#"You are an experienced examiner grading a student's handwritten answer sheet.
Grade every question listed by the user against its maximum marks. Never award more than the maximum.
If a question cannot be found on the sheet, award 0 and say so in the comment.

Respond with strict JSON:
{
  "questions": [
    {"question_number": <integer>, "marks": <number>, "comment": "one or two sentences of feedback"}
  ]
}
"#;

const MAX_BACKOFF_SECONDS: u64 = 16;
const MISSING_QUESTION_COMMENT: &str = "Not assessed by the grading service.";

/// Grader backed by an OpenAI-compatible chat completions endpoint.
#[derive(Debug, Clone)]
pub(crate) struct HttpGrader {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    max_retries: u32,
}

#[derive(Debug, Deserialize)]
struct ModelReply {
    #[serde(default)]
    questions: Vec<ModelQuestion>,
}

#[derive(Debug, Deserialize)]
struct ModelQuestion {
    question_number: i32,
    marks: f64,
    #[serde(default)]
    comment: String,
}

impl HttpGrader {
    pub(crate) fn from_settings(settings: &GradingSettings) -> anyhow::Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .timeout(Duration::from_secs(settings.request_timeout_seconds))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_key: settings.api_key.clone(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            max_tokens: settings.max_tokens,
            max_retries: settings.max_retries,
        })
    }

    fn payload(&self, request: &GradeRequest) -> Value {
        let questions = request
            .template
            .questions()
            .iter()
            .map(|question| format!("Question {}: maximum {} marks", question.number, question.total))
            .collect::<Vec<_>>()
            .join("\n");
        let user_prompt = format!(
            "Evaluation: {}\nStudent: {} ({})\n\nQuestions:\n{}\n\nGrade the attached answer sheet. Use the JSON format from the system prompt.",
            request.evaluation_title, request.student_name, request.roll_number, questions
        );

        let mut content = vec![json!({"type": "text", "text": user_prompt})];
        if let Some(paper) = &request.question_paper {
            content.push(json!({"type": "text", "text": "Question paper:"}));
            content.push(attachment(&paper.filename, &paper.mime_type, &paper.content));
        }
        content.push(json!({"type": "text", "text": "Answer sheet:"}));
        content.push(attachment(&request.filename, &request.mime_type, &request.content));

        json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": GRADING_SYSTEM_PROMPT},
                {"role": "user", "content": content}
            ],
            "max_completion_tokens": self.max_tokens,
            "response_format": {"type": "json_object"}
        })
    }

    async fn send_once(&self, url: &str, payload: &Value) -> Result<Value, GradingError> {
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(payload)
            .send()
            .await
            .map_err(|err| GradingError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GradingError::Upstream { status: status.as_u16(), body });
        }

        response.json().await.map_err(|err| GradingError::InvalidResponse(err.to_string()))
    }
}

#[async_trait]
impl Grader for HttpGrader {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn grade(&self, request: &GradeRequest) -> Result<GradeOutcome, GradingError> {
        let timer = Instant::now();
        let url = format!("{}/chat/completions", self.base_url);
        let payload = self.payload(request);

        tracing::info!(sheet_id = %request.sheet_id, model = %self.model, "Sending grading request");

        let mut attempt = 0;
        let body = loop {
            match self.send_once(&url, &payload).await {
                Ok(body) => break body,
                Err(err) if err.is_retryable() && attempt < self.max_retries => {
                    let delay = backoff(attempt);
                    tracing::warn!(
                        sheet_id = %request.sheet_id,
                        attempt = attempt + 1,
                        delay_seconds = delay.as_secs(),
                        error = %err,
                        "Grading request failed; retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        };

        let content = body
            .get("choices")
            .and_then(|choices| choices.get(0))
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(Value::as_str)
            .ok_or_else(|| GradingError::InvalidResponse("missing message content".to_string()))?;

        let outcome = parse_reply(content, &request.template)?;

        tracing::info!(
            sheet_id = %request.sheet_id,
            duration_seconds = timer.elapsed().as_secs_f64(),
            tokens_used = body.pointer("/usage/total_tokens").and_then(serde_json::Value::as_u64),
            "Grading completed"
        );

        Ok(outcome)
    }
}

fn backoff(attempt: u32) -> Duration {
    Duration::from_secs(2_u64.saturating_pow(attempt).min(MAX_BACKOFF_SECONDS))
}

fn attachment(filename: &str, mime_type: &str, content: &[u8]) -> Value {
    let data_url = format!("data:{mime_type};base64,{}", STANDARD.encode(content));
    if mime_type == "application/pdf" {
        json!({"type": "file", "file": {"filename": filename, "file_data": data_url}})
    } else {
        json!({"type": "image_url", "image_url": {"url": data_url}})
    }
}

/// Maps the model reply onto the template. Marks are clamped and missing questions score zero.
fn parse_reply(content: &str, template: &QuestionTemplate) -> Result<GradeOutcome, GradingError> {
    let reply: ModelReply = serde_json::from_str(content)
        .map_err(|err| GradingError::InvalidResponse(format!("reply is not valid JSON: {err}")))?;

    let questions = template
        .questions()
        .iter()
        .map(|expected| {
            match reply.questions.iter().find(|item| item.question_number == expected.number) {
                Some(item) => {
                    let marks = if item.marks.is_finite() { item.marks } else { 0.0 };
                    GradedQuestion {
                        question_number: expected.number,
                        marks: marks.clamp(0.0, expected.total),
                        total: expected.total,
                        comment: item.comment.trim().to_string(),
                    }
                }
                None => GradedQuestion {
                    question_number: expected.number,
                    marks: 0.0,
                    total: expected.total,
                    comment: MISSING_QUESTION_COMMENT.to_string(),
                },
            }
        })
        .collect();

    Ok(GradeOutcome { questions })
}
