//! One-shot recognition of an image file.

use std::path::Path;
use std::time::Duration;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;

use crate::config::Config;
use crate::pipeline::{PipelineSnapshot, RecognitionPipeline};
use crate::upload::UploadPolicy;

/// Flags that override the `[ocr]` section for one run.
pub struct RecognizeOptions {
    pub backend: Option<String>,
    pub language: Option<String>,
    pub json: bool,
    pub timeout: Option<u64>,
}

/// Recognize a file and print its text.
pub async fn cmd_recognize(
    mut config: Config,
    file: &Path,
    options: RecognizeOptions,
) -> anyhow::Result<()> {
    if let Some(backend) = options.backend {
        config.ocr.backend = backend;
    }
    if let Some(language) = options.language {
        config.ocr.language = language;
    }
    if let Some(timeout) = options.timeout {
        config.ocr.timeout_secs = timeout;
    }

    let policy = UploadPolicy::from_config(&config.upload);
    let image = policy
        .admit_path(file)
        .await
        .map_err(|e| anyhow::anyhow!("{}: {}", file.display(), e))?;

    let pipeline = RecognitionPipeline::from_config(&config)?;
    if !pipeline.backend().is_available() {
        anyhow::bail!(
            "{} backend is not available: {}",
            config.ocr.backend,
            pipeline.backend().availability_hint()
        );
    }

    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:30.cyan/blue}] {pos:>3}% {wide_msg}")?
            .progress_chars("█▓░"),
    );
    pb.enable_steady_tick(Duration::from_millis(120));
    if options.json {
        pb.set_draw_target(indicatif::ProgressDrawTarget::hidden());
    }

    let mut rx = pipeline.subscribe();
    let bar = pb.clone();
    let watcher = tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let snapshot = rx.borrow_and_update().clone();
            render(&bar, &snapshot);
        }
    });

    let outcome = pipeline.recognize(&image).await;
    render(&pb, &pipeline.snapshot());
    pipeline.teardown().await;
    watcher.abort();

    let result = match outcome {
        Ok(result) => {
            pb.finish_and_clear();
            result
        }
        Err(e) => {
            pb.abandon();
            return Err(e.into());
        }
    };

    if options.json {
        let output = json!({
            "file": file.display().to_string(),
            "backend": result.backend.as_str(),
            "text": result.text,
            "confidence": result.confidence,
            "processing_time_ms": result.processing_time_ms,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print!("{}", result.text);
        if !result.text.ends_with('\n') {
            println!();
        }
        eprintln!(
            "{} {} characters in {}ms ({})",
            style("✓").green(),
            result.text.chars().count(),
            result.processing_time_ms,
            result.backend
        );
    }

    Ok(())
}

fn render(bar: &ProgressBar, snapshot: &PipelineSnapshot) {
    let progress = &snapshot.progress;
    bar.set_position(progress.percent().round() as u64);
    bar.set_message(progress.display_label().to_string());
}
