use serde::{Deserialize, Serialize};

use crate::utils::scoring::round2;

/// Penalty rule attached to a moment. When `state` is false the reduction is
/// authored but disabled, and wrong events do not reduce the score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WrongReduction {
    pub state: bool,
    pub reduction: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MomentDef {
    pub moment_index: u32,
    pub moment_name: String,
    pub weightage: f64,
    pub wrong_reduction: WrongReduction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterDef {
    pub chapter_index: u32,
    pub chapter_name: String,
    /// Sum of the chapter's moment weightages.
    pub total_mark: f64,
    pub moments: Vec<MomentDef>,
}

impl ChapterDef {
    pub fn moment(&self, moment_index: u32) -> Option<&MomentDef> {
        self.moments.iter().find(|m| m.moment_index == moment_index)
    }

    pub fn last_moment_index(&self) -> Option<u32> {
        self.moments.iter().map(|m| m.moment_index).max()
    }
}

/// Static scoring rules for a module. Immutable once attached to a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleDefinition {
    pub module_name: String,
    pub chapters: Vec<ChapterDef>,
    /// Evaluation threshold: `round2(totalMark x passPercentage)`.
    pub pass_mark: f64,
}

impl LifecycleDefinition {
    pub fn chapter(&self, chapter_index: u32) -> Option<&ChapterDef> {
        self.chapters
            .iter()
            .find(|c| c.chapter_index == chapter_index)
    }

    pub fn total_mark(&self) -> f64 {
        round2(self.chapters.iter().map(|c| c.total_mark).sum())
    }

    pub fn last_chapter_index(&self) -> Option<u32> {
        self.chapters.iter().map(|c| c.chapter_index).max()
    }
}
