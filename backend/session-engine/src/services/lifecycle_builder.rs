use serde::Deserialize;

use crate::config::EngineConfig;
use crate::errors::{EngineError, EngineResult};
use crate::models::lifecycle::{ChapterDef, LifecycleDefinition, MomentDef, WrongReduction};
use crate::utils::scoring::round2;

/// Scoring defaults threaded explicitly into the builder, never read from
/// globals, so tests and multi-tenant deployments can vary them per module.
#[derive(Debug, Clone)]
pub struct ScoringConfig {
    pub pass_percentage: f64,
    pub default_weightage: f64,
    pub default_wrong_reduction: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            pass_percentage: 0.5,
            default_weightage: 1.0,
            default_wrong_reduction: 0.5,
        }
    }
}

impl From<&EngineConfig> for ScoringConfig {
    fn from(config: &EngineConfig) -> Self {
        Self {
            pass_percentage: config.pass_percentage,
            default_weightage: config.default_weightage,
            default_wrong_reduction: config.default_wrong_reduction,
        }
    }
}

/// Authoring-time module tree, as exported by the module editor.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthoringModule {
    pub name: String,
    pub chapters: Vec<AuthoringChapter>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthoringChapter {
    pub chapter_index: u32,
    pub chapter_name: String,
    pub moments: Vec<AuthoringMoment>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthoringMoment {
    pub moment_index: u32,
    pub moment_name: String,
    /// Empty or a JSON-encoded object with `weightage` / `wrongReduction`.
    #[serde(default)]
    pub defaults: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MomentDefaults {
    weightage: Option<f64>,
    wrong_reduction: Option<WrongReduction>,
}

/// Converts an authoring chapter/moment tree into the immutable scoring
/// definition attached to every session of the module.
pub struct LifecycleBuilder {
    scoring: ScoringConfig,
}

impl LifecycleBuilder {
    pub fn new(scoring: ScoringConfig) -> Self {
        Self { scoring }
    }

    pub fn build_from_json(&self, raw: &str) -> EngineResult<LifecycleDefinition> {
        let module: AuthoringModule = serde_json::from_str(raw)
            .map_err(|e| EngineError::InvalidDefinition(format!("malformed module JSON: {}", e)))?;
        self.build(module)
    }

    pub fn build(&self, module: AuthoringModule) -> EngineResult<LifecycleDefinition> {
        if module.chapters.is_empty() {
            return Err(EngineError::InvalidDefinition(format!(
                "module '{}' has no chapters",
                module.name
            )));
        }

        let mut chapters = Vec::with_capacity(module.chapters.len());
        for chapter in module.chapters {
            chapters.push(self.build_chapter(chapter)?);
        }
        chapters.sort_by_key(|c: &ChapterDef| c.chapter_index);
        check_unique(chapters.iter().map(|c| c.chapter_index), "chapter")?;

        let total_mark: f64 = chapters.iter().map(|c| c.total_mark).sum();
        let pass_mark = round2(total_mark * self.scoring.pass_percentage);

        Ok(LifecycleDefinition {
            module_name: module.name,
            chapters,
            pass_mark,
        })
    }

    fn build_chapter(&self, chapter: AuthoringChapter) -> EngineResult<ChapterDef> {
        if chapter.moments.is_empty() {
            return Err(EngineError::InvalidDefinition(format!(
                "chapter {} has no moments",
                chapter.chapter_index
            )));
        }

        let mut moments = Vec::with_capacity(chapter.moments.len());
        for moment in chapter.moments {
            let defaults = self.parse_defaults(moment.defaults.as_deref())?;
            moments.push(MomentDef {
                moment_index: moment.moment_index,
                moment_name: moment.moment_name,
                weightage: defaults.weightage.unwrap_or(self.scoring.default_weightage),
                wrong_reduction: defaults.wrong_reduction.unwrap_or(WrongReduction {
                    state: true,
                    reduction: self.scoring.default_wrong_reduction,
                }),
            });
        }
        moments.sort_by_key(|m: &MomentDef| m.moment_index);
        check_unique(moments.iter().map(|m| m.moment_index), "moment")?;

        let total_mark = round2(moments.iter().map(|m| m.weightage).sum());

        Ok(ChapterDef {
            chapter_index: chapter.chapter_index,
            chapter_name: chapter.chapter_name,
            total_mark,
            moments,
        })
    }

    fn parse_defaults(&self, raw: Option<&str>) -> EngineResult<MomentDefaults> {
        match raw {
            None => Ok(MomentDefaults::default()),
            Some(s) if s.trim().is_empty() => Ok(MomentDefaults::default()),
            Some(s) => serde_json::from_str(s).map_err(|e| {
                EngineError::InvalidDefinition(format!("malformed moment defaults: {}", e))
            }),
        }
    }
}

fn check_unique(indices: impl Iterator<Item = u32>, label: &str) -> EngineResult<()> {
    let mut previous: Option<u32> = None;
    for index in indices {
        if previous == Some(index) {
            return Err(EngineError::InvalidDefinition(format!(
                "duplicate {} index {}",
                label, index
            )));
        }
        previous = Some(index);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> LifecycleBuilder {
        LifecycleBuilder::new(ScoringConfig::default())
    }

    #[test]
    fn builds_definition_with_defaults() {
        let definition = builder()
            .build_from_json(
                r#"{
                    "name": "Fire Safety",
                    "chapters": [{
                        "chapterIndex": 0,
                        "chapterName": "Extinguishers",
                        "moments": [
                            {"momentIndex": 0, "momentName": "Pick", "defaults": ""},
                            {"momentIndex": 1, "momentName": "Aim"}
                        ]
                    }]
                }"#,
            )
            .unwrap();

        assert_eq!(definition.module_name, "Fire Safety");
        assert_eq!(definition.chapters.len(), 1);
        assert_eq!(definition.chapters[0].total_mark, 2.0);
        assert_eq!(definition.pass_mark, 1.0);
        let moment = &definition.chapters[0].moments[0];
        assert_eq!(moment.weightage, 1.0);
        assert!(moment.wrong_reduction.state);
        assert_eq!(moment.wrong_reduction.reduction, 0.5);
    }

    #[test]
    fn moment_defaults_override_weightage_and_reduction() {
        let definition = builder()
            .build_from_json(
                r#"{
                    "name": "Welding",
                    "chapters": [{
                        "chapterIndex": 0,
                        "chapterName": "Setup",
                        "moments": [{
                            "momentIndex": 0,
                            "momentName": "Gear up",
                            "defaults": "{\"weightage\": 2.5, \"wrongReduction\": {\"state\": false, \"reduction\": 0.1}}"
                        }]
                    }]
                }"#,
            )
            .unwrap();

        let moment = &definition.chapters[0].moments[0];
        assert_eq!(moment.weightage, 2.5);
        assert!(!moment.wrong_reduction.state);
        assert_eq!(definition.chapters[0].total_mark, 2.5);
        assert_eq!(definition.pass_mark, 1.25);
    }

    #[test]
    fn malformed_defaults_is_fatal() {
        let err = builder()
            .build_from_json(
                r#"{
                    "name": "Broken",
                    "chapters": [{
                        "chapterIndex": 0,
                        "chapterName": "C",
                        "moments": [{"momentIndex": 0, "momentName": "M", "defaults": "{not json"}]
                    }]
                }"#,
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidDefinition(_)));
    }

    #[test]
    fn duplicate_moment_index_is_rejected() {
        let err = builder()
            .build_from_json(
                r#"{
                    "name": "Dup",
                    "chapters": [{
                        "chapterIndex": 0,
                        "chapterName": "C",
                        "moments": [
                            {"momentIndex": 1, "momentName": "A"},
                            {"momentIndex": 1, "momentName": "B"}
                        ]
                    }]
                }"#,
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidDefinition(_)));
    }

    #[test]
    fn chapter_without_moments_is_rejected() {
        let err = builder()
            .build_from_json(
                r#"{"name": "Empty", "chapters": [{"chapterIndex": 0, "chapterName": "C", "moments": []}]}"#,
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidDefinition(_)));
    }

    #[test]
    fn pass_mark_uses_configured_percentage() {
        let builder = LifecycleBuilder::new(ScoringConfig {
            pass_percentage: 0.75,
            ..ScoringConfig::default()
        });
        let definition = builder
            .build_from_json(
                r#"{
                    "name": "Threshold",
                    "chapters": [{
                        "chapterIndex": 0,
                        "chapterName": "C",
                        "moments": [
                            {"momentIndex": 0, "momentName": "A"},
                            {"momentIndex": 1, "momentName": "B"},
                            {"momentIndex": 2, "momentName": "C"}
                        ]
                    }]
                }"#,
            )
            .unwrap();
        assert_eq!(definition.pass_mark, 2.25);
    }
}
