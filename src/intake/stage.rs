//! Conversation stages: one enum with a single total order.

use serde::{Deserialize, Serialize};

/// The three linear flows an applicant can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Flow {
    /// Name, city, birth date → applicant record.
    Identity,
    /// Five questions and a verification video note.
    Interview,
    /// Lesson video note and kit delivery address.
    Lesson,
}

impl Flow {
    /// The stage a user enters when the flow is triggered.
    pub fn first_stage(&self) -> Stage {
        match self {
            Self::Identity => Stage::IdentityName,
            Self::Interview => Stage::InterviewQ1,
            Self::Lesson => Stage::LessonVideo,
        }
    }
}

/// A single step of a flow, waiting for a specific input shape.
///
/// Declaration order is the total order:
/// identity stages < interview stages < lesson stages.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    IdentityName,
    IdentityCity,
    IdentityBirthDate,
    InterviewQ1,
    InterviewQ2,
    InterviewQ3,
    InterviewQ4,
    InterviewQ5,
    InterviewVideo,
    LessonVideo,
    AddressCollect,
    AddressConfirm,
}

impl Stage {
    /// Every stage, in order.
    pub const ALL: [Stage; 12] = [
        Stage::IdentityName,
        Stage::IdentityCity,
        Stage::IdentityBirthDate,
        Stage::InterviewQ1,
        Stage::InterviewQ2,
        Stage::InterviewQ3,
        Stage::InterviewQ4,
        Stage::InterviewQ5,
        Stage::InterviewVideo,
        Stage::LessonVideo,
        Stage::AddressCollect,
        Stage::AddressConfirm,
    ];

    pub fn flow(&self) -> Flow {
        use Stage::*;
        match self {
            IdentityName | IdentityCity | IdentityBirthDate => Flow::Identity,
            InterviewQ1 | InterviewQ2 | InterviewQ3 | InterviewQ4 | InterviewQ5
            | InterviewVideo => Flow::Interview,
            LessonVideo | AddressCollect | AddressConfirm => Flow::Lesson,
        }
    }

    /// The next stage in the same flow, or `None` for the last one.
    pub fn next(&self) -> Option<Stage> {
        use Stage::*;
        match self {
            IdentityName => Some(IdentityCity),
            IdentityCity => Some(IdentityBirthDate),
            IdentityBirthDate => None,
            InterviewQ1 => Some(InterviewQ2),
            InterviewQ2 => Some(InterviewQ3),
            InterviewQ3 => Some(InterviewQ4),
            InterviewQ4 => Some(InterviewQ5),
            InterviewQ5 => Some(InterviewVideo),
            InterviewVideo => None,
            LessonVideo => Some(AddressCollect),
            AddressCollect => Some(AddressConfirm),
            AddressConfirm => None,
        }
    }

    /// Check if a transition from `self` to `target` is valid.
    ///
    /// Besides the forward step, address confirmation may return to
    /// address collection when the applicant edits the address.
    pub fn can_transition_to(&self, target: Stage) -> bool {
        self.next() == Some(target)
            || (*self == Stage::AddressConfirm && target == Stage::AddressCollect)
    }

    /// Zero-based interview question index for `InterviewQ1..=InterviewQ5`.
    pub fn question_index(&self) -> Option<usize> {
        use Stage::*;
        match self {
            InterviewQ1 => Some(0),
            InterviewQ2 => Some(1),
            InterviewQ3 => Some(2),
            InterviewQ4 => Some(3),
            InterviewQ5 => Some(4),
            _ => None,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::IdentityName => "identity_name",
            Self::IdentityCity => "identity_city",
            Self::IdentityBirthDate => "identity_birth_date",
            Self::InterviewQ1 => "interview_q1",
            Self::InterviewQ2 => "interview_q2",
            Self::InterviewQ3 => "interview_q3",
            Self::InterviewQ4 => "interview_q4",
            Self::InterviewQ5 => "interview_q5",
            Self::InterviewVideo => "interview_video",
            Self::LessonVideo => "lesson_video",
            Self::AddressCollect => "address_collect",
            Self::AddressConfirm => "address_confirm",
        };
        write!(f, "{s}")
    }
}
