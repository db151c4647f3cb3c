use crate::domain::ports::Pipeline;
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;

pub struct ValidationEngine<P: Pipeline> {
    pipeline: P,
    monitor: SystemMonitor,
}

impl<P: Pipeline> ValidationEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    /// Runs extract, transform and load. Returns where the table was written.
    pub async fn run(&self) -> Result<String> {
        tracing::info!("Starting phone validation run...");
        self.monitor.log_stats("Start");

        let numbers = self.pipeline.extract().await?;
        self.monitor.log_stats("Extract");

        let report = self.pipeline.transform(numbers).await?;
        tracing::info!("Classified {} numbers", report.rows.len());
        self.monitor.log_stats("Lookup");

        let output_path = self.pipeline.load(report).await?;
        self.monitor.log_stats("Load");
        if self.monitor.is_enabled() {
            self.monitor.log_final_stats();
        }

        Ok(output_path)
    }
}
