pub mod exam;
pub mod loaders;
pub mod preview;
pub mod question;

pub use exam::{parse_form_time, Exam, ExamId, ExamStatus};
pub use loaders::{load_preview_rows, SheetFormat};
pub use preview::ImportPreviewRow;
pub use question::{Complexity, Question, QuestionId, QuestionOption, QuestionType};
