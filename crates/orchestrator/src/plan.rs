//! Stage DAG.
//!
//! The pipeline is a fixed chain of stages, each declaring the datasets it
//! reads and the one it writes. The plan is checked before anything runs:
//! every input must be a source or the output of an earlier stage, and no
//! dataset may be written twice.

use crate::config::PipelineConfig;
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Datasets materialized under the base root
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dataset {
    Ratings,
    Extracted,
    Normalized,
    UserColumns,
    SimilarityRows,
    PartialProducts,
    Aggregated,
    Recommendations,
}

impl Dataset {
    pub fn dir_name(self) -> &'static str {
        match self {
            Dataset::Ratings => "input",
            Dataset::Extracted => "step1",
            Dataset::Normalized => "step2",
            Dataset::UserColumns => "step3_1",
            Dataset::SimilarityRows => "step3_2",
            Dataset::PartialProducts => "step4_1",
            Dataset::Aggregated => "step4_2",
            Dataset::Recommendations => "step5",
        }
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    Extraction,
    Normalization,
    SimilarityRows,
    UserColumns,
    PartialMultiply,
    Aggregate,
    Ranking,
}

impl StageKind {
    pub fn label(self) -> &'static str {
        match self {
            StageKind::Extraction => "S1",
            StageKind::Normalization => "S2",
            StageKind::SimilarityRows => "S3a",
            StageKind::UserColumns => "S3b",
            StageKind::PartialMultiply => "S4a",
            StageKind::Aggregate => "S4b",
            StageKind::Ranking => "S5",
        }
    }
}

/// One stage with its resolved input and output locations
#[derive(Debug, Clone)]
pub struct StageDescriptor {
    pub kind: StageKind,
    pub inputs: Vec<Dataset>,
    pub input_paths: Vec<PathBuf>,
    pub output: Dataset,
    pub output_path: PathBuf,
}

impl StageDescriptor {
    fn new(config: &PipelineConfig, kind: StageKind, inputs: &[Dataset], output: Dataset) -> Self {
        Self {
            kind,
            inputs: inputs.to_vec(),
            input_paths: inputs.iter().map(|d| config.dataset_path(*d)).collect(),
            output,
            output_path: config.dataset_path(output),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum PlanError {
    #[error("stage {stage} reads {dataset}, which no earlier stage produces")]
    MissingInput { stage: &'static str, dataset: Dataset },

    #[error("stage {stage} writes {dataset}, which is already produced")]
    DuplicateOutput { stage: &'static str, dataset: Dataset },
}

/// Ordered stages of one pipeline run
#[derive(Debug, Clone)]
pub struct PipelinePlan {
    stages: Vec<StageDescriptor>,
}

impl PipelinePlan {
    pub fn from_config(config: &PipelineConfig) -> Self {
        use Dataset::*;

        let mut ranking_inputs = vec![Aggregated];
        if config.exclude_rated {
            ranking_inputs.push(UserColumns);
        }

        let stages = vec![
            StageDescriptor::new(config, StageKind::Extraction, &[Ratings], Extracted),
            StageDescriptor::new(config, StageKind::Normalization, &[Extracted], Normalized),
            StageDescriptor::new(config, StageKind::SimilarityRows, &[Normalized], SimilarityRows),
            StageDescriptor::new(config, StageKind::UserColumns, &[Extracted], UserColumns),
            StageDescriptor::new(
                config,
                StageKind::PartialMultiply,
                &[SimilarityRows, UserColumns],
                PartialProducts,
            ),
            StageDescriptor::new(config, StageKind::Aggregate, &[PartialProducts], Aggregated),
            StageDescriptor::new(config, StageKind::Ranking, &ranking_inputs, Recommendations),
        ];
        Self { stages }
    }

    #[cfg(test)]
    fn from_stages(stages: Vec<StageDescriptor>) -> Self {
        Self { stages }
    }

    pub fn stages(&self) -> &[StageDescriptor] {
        &self.stages
    }

    /// Check the DAG against the datasets that exist before the first stage
    pub fn validate(&self, sources: &[Dataset]) -> Result<(), PlanError> {
        let mut available: HashSet<Dataset> = sources.iter().copied().collect();

        for stage in &self.stages {
            if let Some(missing) = stage.inputs.iter().find(|d| !available.contains(d)) {
                return Err(PlanError::MissingInput {
                    stage: stage.kind.label(),
                    dataset: *missing,
                });
            }
            if !available.insert(stage.output) {
                return Err(PlanError::DuplicateOutput {
                    stage: stage.kind.label(),
                    dataset: stage.output,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> PipelineConfig {
        PipelineConfig::new("/tmp/recommend", "/tmp/ratings.csv")
    }

    #[test]
    fn test_default_plan_is_valid() {
        let plan = PipelinePlan::from_config(&config());
        assert_eq!(plan.stages().len(), 7);
        assert_eq!(plan.validate(&[Dataset::Ratings]), Ok(()));

        let last = &plan.stages()[6];
        assert_eq!(last.kind, StageKind::Ranking);
        assert_eq!(last.inputs, vec![Dataset::Aggregated]);
        assert_eq!(last.output_path, PathBuf::from("/tmp/recommend/step5"));
    }

    #[test]
    fn test_exclude_rated_adds_user_columns_to_ranking() {
        let plan = PipelinePlan::from_config(&config().with_exclude_rated(true));
        let ranking = &plan.stages()[6];
        assert_eq!(ranking.inputs, vec![Dataset::Aggregated, Dataset::UserColumns]);
        assert!(plan.validate(&[Dataset::Ratings]).is_ok());
    }

    #[test]
    fn test_missing_source_is_rejected() {
        let plan = PipelinePlan::from_config(&config());
        assert_eq!(
            plan.validate(&[]),
            Err(PlanError::MissingInput {
                stage: "S1",
                dataset: Dataset::Ratings
            })
        );
    }

    #[test]
    fn test_out_of_order_stage_is_rejected() {
        use Dataset::*;

        let config = config();
        let plan = PipelinePlan::from_stages(vec![
            StageDescriptor::new(&config, StageKind::Aggregate, &[PartialProducts], Aggregated),
            StageDescriptor::new(&config, StageKind::PartialMultiply, &[Ratings], PartialProducts),
        ]);
        assert!(matches!(
            plan.validate(&[Dataset::Ratings]),
            Err(PlanError::MissingInput { stage: "S4b", .. })
        ));
    }

    #[test]
    fn test_duplicate_output_is_rejected() {
        use Dataset::*;

        let config = config();
        let plan = PipelinePlan::from_stages(vec![
            StageDescriptor::new(&config, StageKind::Extraction, &[Ratings], Extracted),
            StageDescriptor::new(&config, StageKind::Normalization, &[Ratings], Extracted),
        ]);
        assert_eq!(
            plan.validate(&[Dataset::Ratings]),
            Err(PlanError::DuplicateOutput {
                stage: "S2",
                dataset: Dataset::Extracted
            })
        );
    }
}
