use std::process::ExitCode;

use rotation_normalizer::logging::init_logging;
use rotation_normalizer::NormalizerSettings;

#[tokio::main]
async fn main() -> ExitCode {
    let settings = match NormalizerSettings::load() {
        Ok(settings) => settings,
        Err(error) => {
            init_logging("info");
            tracing::error!("Failed to load normalizer settings: {error}");
            return ExitCode::FAILURE;
        }
    };

    init_logging(&settings.log_filter);

    match rotation_normalizer::run(&settings).await {
        Ok(report) => {
            tracing::info!(
                documents_written = report.documents_written.len(),
                empty_artifacts = report.empty_artifacts.len(),
                builds_inserted = report.merge_summary.inserted,
                builds_replaced = report.merge_summary.replaced,
                builds_enriched = report.merge_summary.enriched,
                "Rotation normalization complete"
            );
            ExitCode::SUCCESS
        }
        Err(error) => {
            tracing::error!("Rotation normalization failed: {error}");
            ExitCode::FAILURE
        }
    }
}
