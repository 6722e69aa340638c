use std::time::Duration;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};

use crate::core::config::GradingSettings;
use crate::services::grading::{GradeOutcome, GradeRequest, GradedQuestion, Grader, GradingError};

const PROGRESS_STEPS: [u8; 5] = [20, 45, 70, 90, 100];
const BASE_RATIO: f64 = 0.55;
const RATIO_SPREAD: f64 = 0.40;

/// Offline grader: fake progress, then marks between 55% and 95% of each question.
#[derive(Debug, Clone)]
pub(crate) struct MockGrader {
    seed: Option<u64>,
    step_delay: Duration,
}

impl MockGrader {
    pub(crate) fn new(seed: Option<u64>, step_delay: Duration) -> Self {
        Self { seed, step_delay }
    }

    pub(crate) fn from_settings(settings: &GradingSettings) -> Self {
        Self::new(settings.mock_seed, Duration::from_millis(settings.mock_step_delay_ms))
    }

    fn rng_for(&self, request: &GradeRequest) -> StdRng {
        match self.seed {
            // Same seed and same student always produce the same marks.
            Some(seed) => StdRng::seed_from_u64(seed ^ identity_hash(request)),
            None => StdRng::from_entropy(),
        }
    }
}

#[async_trait]
impl Grader for MockGrader {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn grade(&self, request: &GradeRequest) -> Result<GradeOutcome, GradingError> {
        for progress in PROGRESS_STEPS {
            if !self.step_delay.is_zero() {
                tokio::time::sleep(self.step_delay).await;
            }
            tracing::debug!(sheet_id = %request.sheet_id, progress, "Mock grading step");
        }

        let mut rng = self.rng_for(request);
        let questions = request
            .template
            .questions()
            .iter()
            .map(|question| {
                let ratio = BASE_RATIO + rng.gen_range(0.0..RATIO_SPREAD);
                let marks = (question.total * ratio).round().clamp(0.0, question.total);
                GradedQuestion {
                    question_number: question.number,
                    marks,
                    total: question.total,
                    comment: comment_for(marks, question.total).to_string(),
                }
            })
            .collect();

        Ok(GradeOutcome { questions })
    }
}

fn comment_for(marks: f64, total: f64) -> &'static str {
    let ratio = if total > 0.0 { marks / total } else { 0.0 };
    if ratio >= 0.85 {
        "Excellent answer; method and result are correct."
    } else if ratio >= 0.70 {
        "Good attempt with minor errors in the working."
    } else {
        "Partially correct; key steps are missing or unclear."
    }
}

fn identity_hash(request: &GradeRequest) -> u64 {
    let digest = Sha256::new()
        .chain_update(request.student_name.as_bytes())
        .chain_update([0u8])
        .chain_update(request.roll_number.as_bytes())
        .finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}
