//! Where downloaded video notes are written.

use std::path::PathBuf;

use crate::store::UserId;

/// What a video note is for. Each purpose has a fixed file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoPurpose {
    Verification,
    Lesson,
}

impl VideoPurpose {
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Verification => "verification_video.mp4",
            Self::Lesson => "lesson_video.mp4",
        }
    }
}

/// Lays out video files as `<root>/<normalized name>/<purpose file>`.
///
/// Applicants whose names normalize to the same directory share it, and a
/// later upload overwrites the earlier one.
#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path for an applicant's video. Falls back to `user_<id>` when the
    /// applicant has no usable name on record.
    pub fn video_path(
        &self,
        full_name: Option<&str>,
        user_id: UserId,
        purpose: VideoPurpose,
    ) -> PathBuf {
        let dir = full_name
            .map(normalize_name)
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| format!("user_{user_id}"));
        self.root.join(dir).join(purpose.file_name())
    }
}

/// Lowercase, whitespace runs become `_`, anything but letters, digits,
/// `_` and `-` is dropped.
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .map(|part| {
            part.chars()
                .filter(|c| c.is_alphanumeric() || *c == '-' || *c == '_')
                .flat_map(char::to_lowercase)
                .collect::<String>()
        })
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}
