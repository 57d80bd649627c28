mod gemini;
mod loader;
mod output;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use triage_config::{init_tracing, AppConfig};
use triage_scoring::{conversation_samples, run_batch, Classifier, ConversationGrader};

use crate::gemini::GeminiGrader;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // from_env loads .env first, so LOG_LEVEL from the file reaches tracing.
    let config = AppConfig::from_env();
    init_tracing(config.as_ref().map_or("info", |c| c.log_level.as_str()));
    let config = config?;

    tracing::info!(service = "triage-classifier", "starting");

    let mut classifier_config =
        loader::load_classifier_config(config.classifier_config.as_deref())?;
    if config.skip_model_grading {
        classifier_config.grading.enabled = false;
    }
    let grading_timeout = Duration::from_secs(classifier_config.grading.timeout_secs);
    let classifier = Arc::new(Classifier::new(classifier_config)?);

    let conversations = loader::load_conversations(&config.input_path)?;

    let grader: Option<Arc<dyn ConversationGrader>> = match &config.grader {
        Some(settings) if config.grading_requested() => {
            let grader = GeminiGrader::new(settings, grading_timeout)
                .context("failed to build grader client")?;
            tracing::info!(model = grader.model(), "model grading enabled");
            Some(Arc::new(grader) as Arc<dyn ConversationGrader>)
        }
        _ => {
            tracing::info!(
                skip_flag = config.skip_model_grading,
                "model grading not requested, local signals only"
            );
            None
        }
    };

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, no new grading calls will start");
            interrupt.cancel();
        }
    });

    let outcome = run_batch(classifier, &conversations, grader, cancel).await;

    let samples = conversation_samples(&outcome.records, &conversations, config.sample_size);
    output::write_outputs(
        &config.output_dir,
        &outcome.records,
        &outcome.summary,
        &samples,
    )?;

    tracing::info!(
        run_id = %outcome.summary.run.run_id,
        output_dir = %config.output_dir.display(),
        "classification complete"
    );
    Ok(())
}
