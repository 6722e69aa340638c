//! Teacher review of graded answer sheets.
//!
//! An [`EvaluationSession`] is the unit of persistence: handlers load it, apply one
//! transition in memory and commit it back under the session `version`. A record's
//! `score` is never written directly; it is recomputed from the breakdown after every
//! edit, so it always equals the sum of the effective question marks.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::PrimitiveDateTime;

use crate::db::models::{EvaluationRecordRow, EvaluationSessionRow};
use crate::db::types::{EvaluationStatus, ReviewStatus};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct QuestionResult {
    pub(crate) question_number: i32,
    pub(crate) ai_marks: f64,
    pub(crate) total: f64,
    pub(crate) ai_comment: String,
    #[serde(default)]
    pub(crate) teacher_comment: Option<String>,
    #[serde(default)]
    pub(crate) teacher_adjusted_marks: Option<f64>,
}

impl QuestionResult {
    pub(crate) fn effective_marks(&self) -> f64 {
        self.teacher_adjusted_marks.unwrap_or(self.ai_marks)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReviewAction {
    Approve,
    Revise,
    Undo,
}

impl ReviewAction {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Revise => "revise",
            Self::Undo => "undo",
        }
    }

    fn target(self, from: ReviewStatus) -> Option<ReviewStatus> {
        use ReviewStatus::*;
        match (self, from) {
            (Self::Approve, Pending | NeedsRevision) => Some(Approved),
            (Self::Revise, Pending | Approved) => Some(NeedsRevision),
            (Self::Undo, Approved) => Some(Pending),
            _ => None,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub(crate) enum ReviewError {
    #[error("cannot {action} a record that is {from}")]
    InvalidTransition { action: &'static str, from: &'static str },
    #[error("record is approved; undo the approval before editing it")]
    RecordLocked,
    #[error("question {0} is not part of this record")]
    QuestionNotFound(i32),
    #[error("marks for question {question} must be between 0 and {total}")]
    MarksOutOfRange { question: i32, total: f64 },
    #[error("record {0} not found")]
    RecordNotFound(String),
    #[error("evaluation is finalized and can no longer change")]
    SessionLocked,
    #[error("evaluation has not been graded yet")]
    NotGraded,
    #[error("at least one record must be approved before finalizing")]
    NothingApproved,
    #[error("{unapproved} of {total} records are not approved; confirm to finalize anyway")]
    UnreviewedRecords { unapproved: usize, total: usize },
}

/// Fields a teacher may change on one question in a single request.
#[derive(Debug, Clone, Default)]
pub(crate) struct QuestionEdit {
    pub(crate) marks: Option<f64>,
    pub(crate) comment: Option<String>,
    pub(crate) clear_adjustment: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct EvaluationRecord {
    id: String,
    sheet_id: String,
    student_name: String,
    roll_number: String,
    total_marks: f64,
    score: f64,
    breakdown: Vec<QuestionResult>,
    status: ReviewStatus,
    reviewed_by: Option<String>,
    reviewed_at: Option<PrimitiveDateTime>,
    created_at: PrimitiveDateTime,
    updated_at: PrimitiveDateTime,
    dirty: bool,
}

impl EvaluationRecord {
    pub(crate) fn graded(
        id: String,
        sheet_id: String,
        student_name: String,
        roll_number: String,
        total_marks: f64,
        breakdown: Vec<QuestionResult>,
        now: PrimitiveDateTime,
    ) -> Self {
        let mut record = Self {
            id,
            sheet_id,
            student_name,
            roll_number,
            total_marks,
            score: 0.0,
            breakdown,
            status: ReviewStatus::Pending,
            reviewed_by: None,
            reviewed_at: None,
            created_at: now,
            updated_at: now,
            dirty: true,
        };
        record.recompute_score();
        record
    }

    /// Rebuilds a record from storage. The stored score is ignored in favour of the breakdown.
    pub(crate) fn from_row(row: EvaluationRecordRow) -> Self {
        let mut record = Self {
            id: row.id,
            sheet_id: row.sheet_id,
            student_name: row.student_name,
            roll_number: row.roll_number,
            total_marks: row.total_marks,
            score: row.score,
            breakdown: row.breakdown.0,
            status: row.status,
            reviewed_by: row.reviewed_by,
            reviewed_at: row.reviewed_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
            dirty: false,
        };
        let stored = record.score;
        record.recompute_score();
        record.dirty = stored != record.score;
        record
    }

    pub(crate) fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn sheet_id(&self) -> &str {
        &self.sheet_id
    }

    pub(crate) fn student_name(&self) -> &str {
        &self.student_name
    }

    pub(crate) fn roll_number(&self) -> &str {
        &self.roll_number
    }

    pub(crate) fn total_marks(&self) -> f64 {
        self.total_marks
    }

    pub(crate) fn score(&self) -> f64 {
        self.score
    }

    pub(crate) fn breakdown(&self) -> &[QuestionResult] {
        &self.breakdown
    }

    pub(crate) fn status(&self) -> ReviewStatus {
        self.status
    }

    pub(crate) fn reviewed_by(&self) -> Option<&str> {
        self.reviewed_by.as_deref()
    }

    pub(crate) fn reviewed_at(&self) -> Option<PrimitiveDateTime> {
        self.reviewed_at
    }

    pub(crate) fn created_at(&self) -> PrimitiveDateTime {
        self.created_at
    }

    pub(crate) fn updated_at(&self) -> PrimitiveDateTime {
        self.updated_at
    }

    pub(crate) fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn teacher_approved(&self) -> bool {
        self.status == ReviewStatus::Approved
    }

    pub(crate) fn teacher_reviewed(&self) -> bool {
        self.status != ReviewStatus::Pending
    }

    pub(crate) fn is_editable(&self) -> bool {
        !self.teacher_approved()
    }

    pub(crate) fn apply(
        &mut self,
        action: ReviewAction,
        reviewer: &str,
        now: PrimitiveDateTime,
    ) -> Result<(), ReviewError> {
        let next = action.target(self.status).ok_or(ReviewError::InvalidTransition {
            action: action.as_str(),
            from: self.status.as_str(),
        })?;

        self.status = next;
        if next == ReviewStatus::Pending {
            self.reviewed_by = None;
            self.reviewed_at = None;
        } else {
            self.reviewed_by = Some(reviewer.to_string());
            self.reviewed_at = Some(now);
        }
        self.touch(now);
        Ok(())
    }

    pub(crate) fn edit_question(
        &mut self,
        question_number: i32,
        edit: QuestionEdit,
        now: PrimitiveDateTime,
    ) -> Result<(), ReviewError> {
        if !self.is_editable() {
            return Err(ReviewError::RecordLocked);
        }

        let question = self
            .breakdown
            .iter_mut()
            .find(|question| question.question_number == question_number)
            .ok_or(ReviewError::QuestionNotFound(question_number))?;

        if let Some(marks) = edit.marks {
            if !marks.is_finite() || marks < 0.0 || marks > question.total {
                return Err(ReviewError::MarksOutOfRange {
                    question: question_number,
                    total: question.total,
                });
            }
        }

        if edit.clear_adjustment {
            question.teacher_adjusted_marks = None;
        }
        if let Some(marks) = edit.marks {
            question.teacher_adjusted_marks = Some(marks);
        }
        if let Some(comment) = edit.comment {
            let trimmed = comment.trim();
            question.teacher_comment =
                if trimmed.is_empty() { None } else { Some(trimmed.to_string()) };
        }

        self.recompute_score();
        self.touch(now);
        Ok(())
    }

    fn recompute_score(&mut self) {
        self.score = self.breakdown.iter().map(QuestionResult::effective_marks).sum();
    }

    fn touch(&mut self, now: PrimitiveDateTime) {
        self.updated_at = now;
        self.dirty = true;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct ReviewSummary {
    pub(crate) total: usize,
    pub(crate) approved: usize,
    pub(crate) needs_revision: usize,
    pub(crate) pending: usize,
    pub(crate) can_finalize: bool,
    pub(crate) progress_label: String,
    pub(crate) average_score: Option<f64>,
}

#[derive(Debug, Clone)]
pub(crate) struct EvaluationSession {
    header: EvaluationSessionRow,
    records: Vec<EvaluationRecord>,
    header_dirty: bool,
}

impl EvaluationSession {
    pub(crate) fn from_rows(header: EvaluationSessionRow, rows: Vec<EvaluationRecordRow>) -> Self {
        Self {
            header,
            records: rows.into_iter().map(EvaluationRecord::from_row).collect(),
            header_dirty: false,
        }
    }

    pub(crate) fn header(&self) -> &EvaluationSessionRow {
        &self.header
    }

    pub(crate) fn id(&self) -> &str {
        &self.header.id
    }

    pub(crate) fn status(&self) -> EvaluationStatus {
        self.header.status
    }

    pub(crate) fn version(&self) -> i32 {
        self.header.version
    }

    pub(crate) fn records(&self) -> &[EvaluationRecord] {
        &self.records
    }

    pub(crate) fn dirty_records(&self) -> impl Iterator<Item = &EvaluationRecord> {
        self.records.iter().filter(|record| record.is_dirty())
    }

    pub(crate) fn is_header_dirty(&self) -> bool {
        self.header_dirty
    }

    fn ensure_reviewable(&self) -> Result<(), ReviewError> {
        match self.header.status {
            EvaluationStatus::Finalized => Err(ReviewError::SessionLocked),
            EvaluationStatus::Draft => Err(ReviewError::NotGraded),
            EvaluationStatus::InReview => Ok(()),
        }
    }

    fn record_mut(&mut self, record_id: &str) -> Result<&mut EvaluationRecord, ReviewError> {
        self.records
            .iter_mut()
            .find(|record| record.id == record_id)
            .ok_or_else(|| ReviewError::RecordNotFound(record_id.to_string()))
    }

    pub(crate) fn transition(
        &mut self,
        record_id: &str,
        action: ReviewAction,
        reviewer: &str,
        now: PrimitiveDateTime,
    ) -> Result<(), ReviewError> {
        self.ensure_reviewable()?;
        self.record_mut(record_id)?.apply(action, reviewer, now)
    }

    pub(crate) fn edit_question(
        &mut self,
        record_id: &str,
        question_number: i32,
        edit: QuestionEdit,
        now: PrimitiveDateTime,
    ) -> Result<(), ReviewError> {
        self.ensure_reviewable()?;
        self.record_mut(record_id)?.edit_question(question_number, edit, now)
    }

    /// Approves every record that is not approved yet and returns how many changed.
    pub(crate) fn approve_all(
        &mut self,
        reviewer: &str,
        now: PrimitiveDateTime,
    ) -> Result<usize, ReviewError> {
        self.ensure_reviewable()?;

        let mut changed = 0;
        for record in self.records.iter_mut().filter(|record| !record.teacher_approved()) {
            record.apply(ReviewAction::Approve, reviewer, now)?;
            changed += 1;
        }
        Ok(changed)
    }

    pub(crate) fn summary(&self) -> ReviewSummary {
        let total = self.records.len();
        let count = |status: ReviewStatus| {
            self.records.iter().filter(|record| record.status == status).count()
        };
        let approved = count(ReviewStatus::Approved);
        let average_score = (total > 0).then(|| {
            self.records.iter().map(EvaluationRecord::score).sum::<f64>() / total as f64
        });

        ReviewSummary {
            total,
            approved,
            needs_revision: count(ReviewStatus::NeedsRevision),
            pending: count(ReviewStatus::Pending),
            can_finalize: approved > 0 && self.header.status == EvaluationStatus::InReview,
            progress_label: format!("{approved}/{total}"),
            average_score,
        }
    }

    /// Locks the evaluation. Unapproved records only pass with explicit confirmation.
    pub(crate) fn finalize(
        &mut self,
        confirm_unreviewed: bool,
        finalized_by: &str,
        now: PrimitiveDateTime,
    ) -> Result<ReviewSummary, ReviewError> {
        self.ensure_reviewable()?;

        let summary = self.summary();
        if summary.approved == 0 {
            return Err(ReviewError::NothingApproved);
        }
        let unapproved = summary.total - summary.approved;
        if unapproved > 0 && !confirm_unreviewed {
            return Err(ReviewError::UnreviewedRecords { unapproved, total: summary.total });
        }

        self.header.status = EvaluationStatus::Finalized;
        self.header.finalized_at = Some(now);
        self.header.finalized_by = Some(finalized_by.to_string());
        self.header.updated_at = now;
        self.header_dirty = true;
        Ok(self.summary())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::time::primitive_now_utc;
    use crate::db::types::EvaluationMode;

    pub(crate) fn question(number: i32, ai_marks: f64, total: f64) -> QuestionResult {
        QuestionResult {
            question_number: number,
            ai_marks,
            total,
            ai_comment: format!("Q{number} reviewed"),
            teacher_comment: None,
            teacher_adjusted_marks: None,
        }
    }

    fn record(id: &str, marks: [f64; 3]) -> EvaluationRecord {
        EvaluationRecord::graded(
            id.to_string(),
            format!("sheet-{id}"),
            format!("Student {id}"),
            format!("R{id}"),
            100.0,
            vec![question(1, marks[0], 33.0), question(2, marks[1], 33.0), question(3, marks[2], 34.0)],
            primitive_now_utc(),
        )
    }

    fn session(status: EvaluationStatus, records: Vec<EvaluationRecord>) -> EvaluationSession {
        let now = primitive_now_utc();
        EvaluationSession {
            header: EvaluationSessionRow {
                id: "eval-1".to_string(),
                teacher_id: "teacher-1".to_string(),
                title: "Midterm".to_string(),
                mode: EvaluationMode::Bulk,
                total_marks: 100.0,
                status,
                question_paper_filename: None,
                question_paper_mime: None,
                question_paper_size: None,
                question_paper_sha256: None,
                grading_progress: 100,
                version: 0,
                created_at: now,
                updated_at: now,
                finalized_at: None,
                finalized_by: None,
            },
            records,
            header_dirty: false,
        }
    }

    fn effective_sum(record: &EvaluationRecord) -> f64 {
        record.breakdown().iter().map(|q| q.teacher_adjusted_marks.unwrap_or(q.ai_marks)).sum()
    }

    #[test]
    fn new_records_start_pending_with_score_from_breakdown() {
        let record = record("1", [20.0, 25.0, 30.0]);
        assert_eq!(record.status(), ReviewStatus::Pending);
        assert_eq!(record.score(), 75.0);
        assert!(!record.teacher_approved());
        assert!(!record.teacher_reviewed());
    }

    #[test]
    fn score_tracks_every_mark_edit() {
        let mut record = record("1", [20.0, 25.0, 30.0]);
        let now = primitive_now_utc();

        let edits = [(1, 10.0), (3, 34.0), (2, 0.0), (1, 12.5)];
        for (question, marks) in edits {
            record
                .edit_question(question, QuestionEdit { marks: Some(marks), ..Default::default() }, now)
                .expect("edit");
            assert_eq!(record.score(), effective_sum(&record));
        }
        assert_eq!(record.score(), 12.5 + 0.0 + 34.0);

        record
            .edit_question(3, QuestionEdit { clear_adjustment: true, ..Default::default() }, now)
            .expect("clear");
        assert_eq!(record.score(), 12.5 + 0.0 + 30.0);
        assert_eq!(record.score(), effective_sum(&record));
    }

    #[test]
    fn approve_then_undo_returns_to_pending() {
        let mut record = record("1", [20.0, 25.0, 30.0]);
        let now = primitive_now_utc();

        record.apply(ReviewAction::Approve, "teacher-1", now).expect("approve");
        assert!(record.teacher_approved());
        assert!(record.teacher_reviewed());
        assert_eq!(record.reviewed_by(), Some("teacher-1"));

        record.apply(ReviewAction::Undo, "teacher-1", now).expect("undo");
        assert_eq!(record.status(), ReviewStatus::Pending);
        assert!(!record.teacher_approved());
        assert!(!record.teacher_reviewed());
        assert_eq!(record.reviewed_by(), None);
    }

    #[test]
    fn transition_table_rejects_illegal_moves() {
        let now = primitive_now_utc();
        let mut record = record("1", [1.0, 1.0, 1.0]);

        assert_eq!(
            record.apply(ReviewAction::Undo, "t", now),
            Err(ReviewError::InvalidTransition { action: "undo", from: "pending" })
        );

        record.apply(ReviewAction::Revise, "t", now).expect("pending -> needs_revision");
        assert_eq!(
            record.apply(ReviewAction::Revise, "t", now),
            Err(ReviewError::InvalidTransition { action: "revise", from: "needs_revision" })
        );
        assert!(record.apply(ReviewAction::Undo, "t", now).is_err());

        record.apply(ReviewAction::Approve, "t", now).expect("needs_revision -> approved");
        assert!(record.apply(ReviewAction::Approve, "t", now).is_err());
        record.apply(ReviewAction::Revise, "t", now).expect("approved -> needs_revision");
        assert_eq!(record.status(), ReviewStatus::NeedsRevision);
    }

    #[test]
    fn approved_records_reject_edits() {
        let now = primitive_now_utc();
        let mut record = record("1", [20.0, 25.0, 30.0]);
        record.apply(ReviewAction::Approve, "t", now).expect("approve");

        let marks = record.edit_question(1, QuestionEdit { marks: Some(5.0), ..Default::default() }, now);
        assert_eq!(marks, Err(ReviewError::RecordLocked));
        let comment = record.edit_question(
            1,
            QuestionEdit { comment: Some("nope".to_string()), ..Default::default() },
            now,
        );
        assert_eq!(comment, Err(ReviewError::RecordLocked));
        assert_eq!(record.score(), 75.0);
    }

    #[test]
    fn edits_validate_question_and_range_without_partial_writes() {
        let now = primitive_now_utc();
        let mut record = record("1", [20.0, 25.0, 30.0]);

        assert_eq!(
            record.edit_question(9, QuestionEdit { marks: Some(1.0), ..Default::default() }, now),
            Err(ReviewError::QuestionNotFound(9))
        );
        let out_of_range = record.edit_question(
            1,
            QuestionEdit { marks: Some(40.0), comment: Some("too generous".to_string()), ..Default::default() },
            now,
        );
        assert_eq!(out_of_range, Err(ReviewError::MarksOutOfRange { question: 1, total: 33.0 }));
        assert!(record.edit_question(1, QuestionEdit { marks: Some(f64::NAN), ..Default::default() }, now).is_err());
        assert_eq!(record.breakdown()[0].teacher_comment, None);

        record
            .edit_question(2, QuestionEdit { comment: Some("  Show units  ".to_string()), ..Default::default() }, now)
            .expect("comment");
        assert_eq!(record.breakdown()[1].teacher_comment.as_deref(), Some("Show units"));
        record
            .edit_question(2, QuestionEdit { comment: Some("   ".to_string()), ..Default::default() }, now)
            .expect("clear comment");
        assert_eq!(record.breakdown()[1].teacher_comment, None);
    }

    #[test]
    fn approve_all_marks_every_record_approved() {
        let now = primitive_now_utc();
        let mut session = session(
            EvaluationStatus::InReview,
            vec![record("1", [1.0, 2.0, 3.0]), record("2", [4.0, 5.0, 6.0]), record("3", [7.0, 8.0, 9.0]), record("4", [0.0, 0.0, 0.0])],
        );
        session.transition("2", ReviewAction::Approve, "t", now).unwrap();
        session.transition("3", ReviewAction::Revise, "t", now).unwrap();

        let changed = session.approve_all("t", now).expect("approve all");
        assert_eq!(changed, 3);

        let summary = session.summary();
        assert_eq!(summary.approved, 4);
        assert_eq!(summary.total, 4);
        assert!(session.records().iter().all(|r| r.status() == ReviewStatus::Approved));
    }

    #[test]
    fn finalize_requires_an_approval() {
        let now = primitive_now_utc();
        let mut session = session(EvaluationStatus::InReview, vec![record("1", [1.0, 1.0, 1.0])]);

        assert!(!session.summary().can_finalize);
        assert_eq!(session.finalize(true, "t", now), Err(ReviewError::NothingApproved));
        assert_eq!(session.status(), EvaluationStatus::InReview);
    }

    #[test]
    fn three_sheet_scenario_reaches_two_of_three() {
        let now = primitive_now_utc();
        let mut session = session(
            EvaluationStatus::InReview,
            vec![record("1", [30.0, 30.0, 30.0]), record("2", [20.0, 20.0, 20.0]), record("3", [10.0, 10.0, 10.0])],
        );
        for record in session.records() {
            assert_eq!(record.breakdown().len(), 3);
            assert_eq!(record.score(), effective_sum(record));
        }

        session.transition("1", ReviewAction::Approve, "t", now).unwrap();
        session.transition("2", ReviewAction::Approve, "t", now).unwrap();
        session.transition("3", ReviewAction::Revise, "t", now).unwrap();

        let summary = session.summary();
        assert_eq!(summary.approved, 2);
        assert_eq!(summary.needs_revision, 1);
        assert_eq!(summary.pending, 0);
        assert!(summary.can_finalize);
        assert_eq!(summary.progress_label, "2/3");

        assert_eq!(
            session.finalize(false, "t", now),
            Err(ReviewError::UnreviewedRecords { unapproved: 1, total: 3 })
        );
        let finalized = session.finalize(true, "t", now).expect("confirmed finalize");
        assert!(!finalized.can_finalize);
        assert_eq!(session.status(), EvaluationStatus::Finalized);
        assert!(session.is_header_dirty());
        assert_eq!(session.header().finalized_by.as_deref(), Some("t"));
    }

    #[test]
    fn finalized_and_draft_sessions_reject_changes() {
        let now = primitive_now_utc();
        let mut finalized = session(EvaluationStatus::Finalized, vec![record("1", [1.0, 1.0, 1.0])]);
        assert_eq!(
            finalized.transition("1", ReviewAction::Approve, "t", now),
            Err(ReviewError::SessionLocked)
        );
        assert_eq!(finalized.approve_all("t", now), Err(ReviewError::SessionLocked));

        let mut draft = session(EvaluationStatus::Draft, Vec::new());
        assert_eq!(draft.finalize(true, "t", now), Err(ReviewError::NotGraded));
        assert_eq!(
            draft.transition("missing", ReviewAction::Approve, "t", now),
            Err(ReviewError::NotGraded)
        );
    }

    #[test]
    fn unknown_record_is_reported() {
        let now = primitive_now_utc();
        let mut session = session(EvaluationStatus::InReview, vec![record("1", [1.0, 1.0, 1.0])]);
        assert_eq!(
            session.transition("nope", ReviewAction::Approve, "t", now),
            Err(ReviewError::RecordNotFound("nope".to_string()))
        );
    }

    #[test]
    fn only_touched_records_are_dirty_after_reload() {
        let now = primitive_now_utc();
        let rows: Vec<EvaluationRecordRow> = ["1", "2"]
            .iter()
            .map(|id| {
                let record = record(id, [1.0, 2.0, 3.0]);
                EvaluationRecordRow {
                    id: record.id().to_string(),
                    session_id: "eval-1".to_string(),
                    sheet_id: record.sheet_id().to_string(),
                    student_name: record.student_name().to_string(),
                    roll_number: record.roll_number().to_string(),
                    total_marks: 100.0,
                    score: record.score(),
                    status: ReviewStatus::Pending,
                    breakdown: sqlx::types::Json(record.breakdown().to_vec()),
                    reviewed_by: None,
                    reviewed_at: None,
                    created_at: now,
                    updated_at: now,
                }
            })
            .collect();
        let mut session = EvaluationSession::from_rows(session(EvaluationStatus::InReview, Vec::new()).header, rows);
        assert_eq!(session.dirty_records().count(), 0);

        session.transition("2", ReviewAction::Approve, "t", now).unwrap();
        let dirty: Vec<&str> = session.dirty_records().map(EvaluationRecord::id).collect();
        assert_eq!(dirty, vec!["2"]);
    }
}
