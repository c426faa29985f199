//! # Pipeline Driver
//!
//! Runs the recommendation pipeline end to end:
//! 0. Ingest the raw ratings file as the `input` dataset
//! 1. Extraction (S1)
//! 2. Normalization (S2)
//! 3. Similarity rows and user columns (S3a, S3b)
//! 4. Partial multiply and aggregation (S4a, S4b)
//! 5. Ranking (S5)
//!
//! Stages run strictly one after another. Each stage executes on a blocking
//! thread and is awaited before the next one starts; the first failure stops
//! the run and names the stage.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::info;

use crate::config::{CONFIG_FILE, PipelineConfig};
use crate::plan::{Dataset, PipelinePlan, StageDescriptor, StageKind};
use data_loader::Recommendation;
use data_loader::parser::read_lines_latin1;
use dataflow::{DatasetStore, LocalStore, StageReport, StageRunner, part_name};
use stages::{
    AggregateStage, ExtractionStage, NormalizationStage, PartialMultiplyStage, RankingStage,
    SimilarityRowsStage, UserColumnsStage,
};

/// Label of the ingest step in reports and errors
pub const INGEST_LABEL: &str = "S0";

/// Result of a successful run
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    /// The final dataset directory
    pub output: PathBuf,
    /// Every part file of the final dataset, one per reduce partition
    pub parts: Vec<PathBuf>,
    pub stages: Vec<StageReport>,
    pub elapsed: Duration,
}

#[derive(Clone)]
pub struct RecommendationPipeline {
    config: Arc<PipelineConfig>,
    runner: StageRunner,
}

impl RecommendationPipeline {
    /// Create a pipeline over the local filesystem
    pub fn new(config: PipelineConfig) -> Result<Self> {
        Self::with_store(config, Arc::new(LocalStore))
    }

    /// Create a pipeline over any dataset store
    ///
    /// Relative paths in the config are resolved against the current
    /// directory, so the saved config stays valid from anywhere.
    pub fn with_store(config: PipelineConfig, store: Arc<dyn DatasetStore>) -> Result<Self> {
        config.validate().context("Invalid pipeline configuration")?;
        let config = config.into_absolute()?;
        let runner = StageRunner::new(store)
            .with_reduce_tasks(config.reduce_tasks)
            .with_split_lines(config.split_lines);
        Ok(Self {
            config: Arc::new(config),
            runner,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn plan(&self) -> PipelinePlan {
        PipelinePlan::from_config(&self.config)
    }

    /// Run every stage in order
    pub async fn run(&self) -> Result<PipelineOutcome> {
        let start_time = Instant::now();

        let plan = self.plan();
        plan.validate(&[Dataset::Ratings])
            .context("Invalid stage plan")?;
        info!(
            "Running {} stages under {}",
            plan.stages().len() + 1,
            self.config.root.display()
        );

        let mut reports = Vec::with_capacity(plan.stages().len() + 1);

        let ingest = tokio::task::spawn_blocking({
            let pipeline = self.clone();
            move || pipeline.ingest_ratings()
        })
        .await
        .context("Ingest task failed to complete")?
        .with_context(|| format!("pipeline aborted at stage {}", INGEST_LABEL))?;
        reports.push(ingest);

        for descriptor in plan.stages() {
            let label = descriptor.kind.label();
            let report = tokio::task::spawn_blocking({
                let runner = self.runner.clone();
                let config = self.config.clone();
                let descriptor = descriptor.clone();
                move || run_stage(&runner, &config, &descriptor)
            })
            .await
            .with_context(|| format!("Stage {} task failed to complete", label))?
            .with_context(|| format!("pipeline aborted at stage {}", label))?;
            reports.push(report);
        }

        // show and verify locate a finished run through this file
        let config_path = self.config.root.join(CONFIG_FILE);
        self.config
            .save_json(&config_path)
            .context("Failed to save pipeline config")?;

        let elapsed = start_time.elapsed();
        let output = self.output_path();
        info!("Pipeline finished in {:.2?}: {}", elapsed, output.display());

        Ok(PipelineOutcome {
            output,
            parts: self.output_parts(),
            stages: reports,
            elapsed,
        })
    }

    /// Copy the raw ratings file into the `input` dataset
    ///
    /// The file is decoded as Latin-1 and blank lines are dropped. Records
    /// are not parsed here; S1 rejects malformed ones.
    pub fn ingest_ratings(&self) -> Result<StageReport> {
        let start = Instant::now();
        let ratings = &self.config.ratings;
        let location = self.config.dataset_path(Dataset::Ratings);

        let lines: Vec<String> = read_lines_latin1(ratings)
            .with_context(|| format!("Failed to read ratings file {}", ratings.display()))?
            .into_iter()
            .filter(|line| !line.trim().is_empty())
            .collect();
        let records = lines.len();

        let store = self.runner.store();
        store.delete_if_exists(&location)?;
        store
            .write_dataset(&location, &[lines])
            .with_context(|| format!("Failed to write {}", location.display()))?;

        let report = StageReport {
            name: "S0-ingest".to_string(),
            input_records: records,
            map_tasks: 0,
            intermediate_records: 0,
            groups: 0,
            output_records: records,
            elapsed: start.elapsed(),
        };
        info!(
            "Ingested {} ratings from {} in {:.2?}",
            records,
            ratings.display(),
            report.elapsed
        );
        Ok(report)
    }

    /// Directory of the final dataset
    pub fn output_path(&self) -> PathBuf {
        self.config.dataset_path(Dataset::Recommendations)
    }

    /// Part files of the final dataset
    pub fn output_parts(&self) -> Vec<PathBuf> {
        let output = self.output_path();
        (0..self.config.reduce_tasks)
            .map(|partition| output.join(part_name(partition)))
            .collect()
    }

    /// Parse the final dataset, ordered by user
    pub fn read_recommendations(&self) -> Result<Vec<Recommendation>> {
        let location = self.config.dataset_path(Dataset::Recommendations);
        let mut recommendations = self
            .runner
            .store()
            .read_lines(&location)?
            .iter()
            .map(|line| {
                Recommendation::parse(line)
                    .with_context(|| format!("Bad recommendation record {:?}", line))
            })
            .collect::<Result<Vec<_>>>()?;
        recommendations.sort_by_key(|rec| rec.user_id);
        Ok(recommendations)
    }
}

/// Build the stage logic for a descriptor and run it
fn run_stage(
    runner: &StageRunner,
    config: &PipelineConfig,
    descriptor: &StageDescriptor,
) -> Result<StageReport> {
    let inputs = &descriptor.input_paths;
    let output = &descriptor.output_path;

    match descriptor.kind {
        StageKind::Extraction => runner.run(&ExtractionStage, inputs, output),
        StageKind::Normalization => runner.run(&NormalizationStage, inputs, output),
        StageKind::SimilarityRows => runner.run(&SimilarityRowsStage, inputs, output),
        StageKind::UserColumns => runner.run(&UserColumnsStage, inputs, output),
        StageKind::PartialMultiply => runner.run(&PartialMultiplyStage, inputs, output),
        StageKind::Aggregate => runner.run(&AggregateStage, inputs, output),
        StageKind::Ranking => {
            let stage = RankingStage::new(config.top_n).with_exclude_rated(config.exclude_rated);
            runner.run(&stage, inputs, output)
        }
    }
}
