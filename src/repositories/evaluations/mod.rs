mod commands;
mod queries;
mod types;

pub(crate) use commands::{
    create_session, insert_sheets, mark_in_review, record_graded, save_review, set_question_paper,
    update_progress,
};
pub(crate) use queries::{
    count_sheets, fetch_question_paper, find_session, finalized_count, list_sessions,
    list_sheets, list_ungraded_sheets, load_aggregate, pending_records_for_teacher,
    status_counts,
};
pub(crate) use types::{EvaluationListRow, NewEvaluation, SheetForGrading, SheetInsert, StoredQuestionPaper};
