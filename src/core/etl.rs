use crate::domain::model::LoadSummary;
use crate::domain::ports::Pipeline;
use crate::utils::error::Result;
use std::time::Instant;

pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self { pipeline }
    }

    /// Run extract, transform and load once, in order.
    pub async fn run(&self) -> Result<LoadSummary> {
        let started = Instant::now();
        tracing::info!("Starting deck build");

        let records = self.pipeline.extract().await?;
        tracing::info!("Extract finished: {} records ({:?})", records.len(), started.elapsed());

        let transformed = self.pipeline.transform(records).await?;
        tracing::info!(
            "Transform finished: {} records, {} images to fetch",
            transformed.records.len(),
            transformed.downloads.len()
        );

        let summary = self.pipeline.load(transformed).await?;
        tracing::info!(
            "Load finished: {} rows, {} images ({:?} total)",
            summary.rows_written,
            summary.images_written,
            started.elapsed()
        );

        Ok(summary)
    }
}
