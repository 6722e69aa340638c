use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::core::config::{GradingProvider, Settings};
use crate::services::ai_grading::HttpGrader;
use crate::services::evaluation_review::QuestionResult;
use crate::services::mock_grading::MockGrader;

/// Question count used when an evaluation has no explicit structure.
pub(crate) const DEFAULT_QUESTION_COUNT: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TemplateQuestion {
    pub(crate) number: i32,
    pub(crate) total: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct QuestionTemplate {
    questions: Vec<TemplateQuestion>,
}

impl QuestionTemplate {
    /// Splits `total_marks` into `count` whole-mark questions; the last one takes the remainder.
    pub(crate) fn split_evenly(total_marks: f64, count: usize) -> Self {
        let count = count.max(1);
        let base = (total_marks / count as f64).floor();
        let questions = (0..count)
            .map(|index| {
                let total = if index + 1 == count {
                    total_marks - base * (count - 1) as f64
                } else {
                    base
                };
                TemplateQuestion { number: index as i32 + 1, total }
            })
            .collect();
        Self { questions }
    }

    pub(crate) fn questions(&self) -> &[TemplateQuestion] {
        &self.questions
    }
}

#[derive(Debug, Clone)]
pub(crate) struct QuestionPaper {
    pub(crate) filename: String,
    pub(crate) mime_type: String,
    pub(crate) content: Vec<u8>,
}

#[derive(Debug, Clone)]
pub(crate) struct GradeRequest {
    pub(crate) sheet_id: String,
    pub(crate) student_name: String,
    pub(crate) roll_number: String,
    pub(crate) filename: String,
    pub(crate) mime_type: String,
    pub(crate) content: Vec<u8>,
    pub(crate) evaluation_title: String,
    pub(crate) template: QuestionTemplate,
    pub(crate) question_paper: Option<QuestionPaper>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct GradedQuestion {
    pub(crate) question_number: i32,
    pub(crate) marks: f64,
    pub(crate) total: f64,
    pub(crate) comment: String,
}

#[derive(Debug, Clone)]
pub(crate) struct GradeOutcome {
    pub(crate) questions: Vec<GradedQuestion>,
}

impl GradeOutcome {
    pub(crate) fn into_breakdown(self) -> Vec<QuestionResult> {
        self.questions
            .into_iter()
            .map(|question| QuestionResult {
                question_number: question.question_number,
                ai_marks: question.marks,
                total: question.total,
                ai_comment: question.comment,
                teacher_comment: None,
                teacher_adjusted_marks: None,
            })
            .collect()
    }
}

#[derive(Debug, Error)]
pub(crate) enum GradingError {
    #[error("grading service unreachable: {0}")]
    Transport(String),
    #[error("grading service returned {status}: {body}")]
    Upstream { status: u16, body: String },
    #[error("grading service returned an unusable response: {0}")]
    InvalidResponse(String),
}

impl GradingError {
    pub(crate) fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Upstream { status, .. } => *status == 429 || *status >= 500,
            Self::InvalidResponse(_) => false,
        }
    }
}

/// Produces a per-question breakdown for one answer sheet.
#[async_trait]
pub(crate) trait Grader: Send + Sync {
    fn name(&self) -> &'static str;

    async fn grade(&self, request: &GradeRequest) -> Result<GradeOutcome, GradingError>;
}

pub(crate) fn grader_from_settings(settings: &Settings) -> anyhow::Result<Arc<dyn Grader>> {
    let grading = settings.grading();
    let grader: Arc<dyn Grader> = match grading.provider {
        GradingProvider::Mock => Arc::new(MockGrader::from_settings(grading)),
        GradingProvider::Http => Arc::new(HttpGrader::from_settings(grading)?),
    };
    Ok(grader)
}
