use serde::{Deserialize, Serialize};

use super::lifecycle::{LifecycleDefinition, WrongReduction};
use crate::utils::scoring::round2;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MomentProgress {
    pub moment_index: u32,
    pub moment_name: String,
    pub weightage: f64,
    pub wrong_reduction: WrongReduction,
    pub total_scored: f64,
    pub start_time: Option<f64>,
    /// Set at most once; a moment with an end time is terminal.
    pub end_time: Option<f64>,
    pub total_time_taken: f64,
}

impl MomentProgress {
    pub fn is_ended(&self) -> bool {
        self.end_time.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterProgress {
    pub chapter_index: u32,
    pub chapter_name: String,
    pub total_mark: f64,
    pub total_scored: f64,
    pub start_time: Option<f64>,
    pub end_time: Option<f64>,
    pub total_time_taken: f64,
    pub moments: Vec<MomentProgress>,
}

impl ChapterProgress {
    pub fn moment(&self, moment_index: u32) -> Option<&MomentProgress> {
        self.moments.iter().find(|m| m.moment_index == moment_index)
    }

    pub fn moment_mut(&mut self, moment_index: u32) -> Option<&mut MomentProgress> {
        self.moments
            .iter_mut()
            .find(|m| m.moment_index == moment_index)
    }
}

/// Mutable per-session scoring and timing state, mirroring the definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressTree {
    pub total_scored: f64,
    pub total_time_taken: f64,
    pub start_time: Option<f64>,
    pub end_time: Option<f64>,
    pub chapters: Vec<ChapterProgress>,
}

impl ProgressTree {
    pub fn from_definition(definition: &LifecycleDefinition) -> Self {
        let chapters = definition
            .chapters
            .iter()
            .map(|chapter| ChapterProgress {
                chapter_index: chapter.chapter_index,
                chapter_name: chapter.chapter_name.clone(),
                total_mark: chapter.total_mark,
                total_scored: 0.0,
                start_time: None,
                end_time: None,
                total_time_taken: 0.0,
                moments: chapter
                    .moments
                    .iter()
                    .map(|moment| MomentProgress {
                        moment_index: moment.moment_index,
                        moment_name: moment.moment_name.clone(),
                        weightage: moment.weightage,
                        wrong_reduction: moment.wrong_reduction,
                        total_scored: 0.0,
                        start_time: None,
                        end_time: None,
                        total_time_taken: 0.0,
                    })
                    .collect(),
            })
            .collect();

        Self {
            total_scored: 0.0,
            total_time_taken: 0.0,
            start_time: None,
            end_time: None,
            chapters,
        }
    }

    pub fn chapter(&self, chapter_index: u32) -> Option<&ChapterProgress> {
        self.chapters
            .iter()
            .find(|c| c.chapter_index == chapter_index)
    }

    pub fn chapter_mut(&mut self, chapter_index: u32) -> Option<&mut ChapterProgress> {
        self.chapters
            .iter_mut()
            .find(|c| c.chapter_index == chapter_index)
    }

    pub fn moment(&self, chapter_index: u32, moment_index: u32) -> Option<&MomentProgress> {
        self.chapter(chapter_index)
            .and_then(|c| c.moment(moment_index))
    }

    /// Recompute chapter and session aggregates from the moment leaves.
    ///
    /// Runs after every mutation so the invariant
    /// `session.totalScored == sum(chapter.totalScored) == sum(moment.totalScored)`
    /// holds at every observable point.
    pub fn rollup(&mut self) {
        let mut session_scored = 0.0;
        let mut session_time = 0.0;
        for chapter in &mut self.chapters {
            let scored: f64 = chapter.moments.iter().map(|m| m.total_scored).sum();
            let time: f64 = chapter.moments.iter().map(|m| m.total_time_taken).sum();
            chapter.total_scored = round2(scored);
            chapter.total_time_taken = time;
            session_scored += chapter.total_scored;
            session_time += time;
        }
        self.total_scored = round2(session_scored);
        self.total_time_taken = session_time;
    }
}
