//! Built-in schemas for each operation kind.
//!
//! Bounds follow the resume conventions the prompts ask for: bullets of at
//! most 150 characters, five to seven skills and three follow-up
//! questions. The bullet count depends on how much the user wrote: a
//! detailed experience (more than [`DETAILED_WORDS`] words or
//! [`DETAILED_CHARS`] characters) asks for five to seven bullets, a brief
//! one for three to five. Config may override any of these.

use super::{ListSchema, ResponseSchema};
use crate::types::{OperationKind, RequestInput};

/// Length ceiling for a resume bullet.
pub const BULLET_MAX_CHARS: usize = 150;

/// Length ceiling for a single skill.
pub const SKILL_MAX_CHARS: usize = 40;

/// Length ceiling for a follow-up question.
pub const QUESTION_MAX_CHARS: usize = 200;

/// Length ceiling for an experience title.
pub const TITLE_MAX_CHARS: usize = 80;

/// Length ceiling for the free-text suggestions block.
pub const SUGGESTIONS_MAX_CHARS: usize = 1000;

/// Word count above which an experience counts as detailed.
pub const DETAILED_WORDS: usize = 150;

/// Character count above which an experience counts as detailed.
pub const DETAILED_CHARS: usize = 800;

/// How much material the user supplied, which sets the bullet range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detail {
    /// Three to five bullets.
    Brief,
    /// Five to seven bullets.
    Detailed,
    /// Input not known: the union of both ranges.
    Any,
}

impl Detail {
    /// Classify experience text. Strictly more than either threshold is
    /// detailed.
    pub fn of(text: &str) -> Self {
        let words = text.split_whitespace().count();
        if words > DETAILED_WORDS || text.chars().count() > DETAILED_CHARS {
            Detail::Detailed
        } else {
            Detail::Brief
        }
    }

    fn bullets(self) -> ListSchema {
        match self {
            Detail::Brief => ListSchema::new(3, 5, BULLET_MAX_CHARS),
            Detail::Detailed => ListSchema::new(5, 7, BULLET_MAX_CHARS),
            Detail::Any => ListSchema::new(3, 7, BULLET_MAX_CHARS),
        }
    }
}

fn skills() -> ListSchema {
    ListSchema::new(5, 7, SKILL_MAX_CHARS)
}

fn questions() -> ListSchema {
    ListSchema::new(3, 3, QUESTION_MAX_CHARS)
}

/// Default schema for `kind` when the input is not known.
///
/// Bullet lists accept anything from the brief minimum to the detailed
/// maximum.
pub fn for_operation(kind: OperationKind) -> ResponseSchema {
    with_detail(kind, Detail::Any)
}

/// Default schema for `kind` sized to `input`.
///
/// Only the draft and finalize bullet lists depend on the input; the
/// other operations get the same schema as [`for_operation`].
pub fn for_input(kind: OperationKind, input: &RequestInput) -> ResponseSchema {
    with_detail(kind, Detail::of(&input.text))
}

/// Default schema for `kind` at a given level of detail.
pub fn with_detail(kind: OperationKind, detail: Detail) -> ResponseSchema {
    match kind {
        OperationKind::GenerateDraft => ResponseSchema::object()
            .text_field("title", Some(TITLE_MAX_CHARS), true)
            .list_field("bullet_points", detail.bullets(), true)
            .list_field("skills", skills(), true)
            .list_field("questions", questions(), true),
        OperationKind::GenerateFollowups => ResponseSchema::List(questions()),
        OperationKind::Finalize => ResponseSchema::object()
            .list_field("final_bullets", detail.bullets(), true)
            .list_field("final_skills", skills(), true)
            .text_field("suggestions", Some(SUGGESTIONS_MAX_CHARS), false),
        OperationKind::Improve => ResponseSchema::list(1, 7, BULLET_MAX_CHARS),
    }
}
