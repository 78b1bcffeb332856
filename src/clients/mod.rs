pub mod exam_api;
pub mod wire;

pub use exam_api::{ExamApiClient, ExamBackend};
pub use wire::{CurrentUser, ExamCreate, ExamOut, ExamUpdate, ImportSummaryOut, QuestionCreate, QuestionOut};
