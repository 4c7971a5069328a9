use std::path::Path;
use std::sync::Arc;

use anyhow::Context as _;
use tokio::fs;

use crate::bria::BriaClient;
use crate::cli::GenerateArgs;
use crate::config::Settings;
use crate::fetch::HttpImageFetcher;
use crate::formats::DialogFormat;
use crate::gemini::GeminiClient;
use crate::samples::sample_story;
use crate::studio::Studio;
use crate::studio::progress::PipelineEvent;
use crate::style::Style;

/// Runs one full generation and writes the resulting snapshot.
///
/// The snapshot is written even when the run fails, so partial results
/// survive; the error is returned afterwards.
pub async fn run(args: GenerateArgs, settings: &Settings) -> anyhow::Result<()> {
    let out = Path::new(&args.out);
    if out.exists() && !args.force {
        anyhow::bail!(
            "output file already exists: {} (use --force to overwrite)",
            out.display()
        );
    }

    let style = Style::parse_lossy(&args.style);
    let dialogs = args
        .dialogs
        .as_deref()
        .map(str::parse::<DialogFormat>)
        .transpose()
        .context("parse --dialogs")?;
    let story = match &args.story {
        Some(path) => fs::read_to_string(path)
            .await
            .with_context(|| format!("read story: {path}"))?,
        None => sample_story(style).to_owned(),
    };

    let (events_tx, mut events_rx) = tokio::sync::mpsc::unbounded_channel();
    let studio = Studio::new(
        Arc::new(BriaClient::from_settings(settings).context("configure image generation")?),
        Arc::new(GeminiClient::from_settings(settings).context("configure story analysis")?),
        Arc::new(HttpImageFetcher::new(settings.http_client()?)),
    )
    .with_regeneration_scope(settings.regeneration_scope)
    .with_events(events_tx);

    let reporter = tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            match event {
                PipelineEvent::Progress { step, percent } => {
                    tracing::info!(percent, "{step}");
                }
                PipelineEvent::Finished { operation } => {
                    tracing::debug!(?operation, "operation finished");
                }
                PipelineEvent::Failed { operation, error } => {
                    tracing::warn!(?operation, %error, "operation failed");
                }
            }
        }
    });

    let mut outcome = studio.generate(&story, style).await;
    if outcome.is_ok()
        && let Some(format) = dialogs
    {
        outcome = studio.generate_dialogs(format).await;
    }
    let snapshot = studio.snapshot().await;
    drop(studio);
    let _ = reporter.await;

    write_json_atomic(out, &snapshot)
        .await
        .context("write snapshot")?;
    tracing::info!(
        out = %out.display(),
        characters = snapshot.characters.len(),
        scenes = snapshot.scenes.len(),
        "wrote snapshot"
    );

    outcome.context("generation failed")?;
    Ok(())
}

async fn write_json_atomic<T: serde::Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("create parent dir: {}", parent.display()))?;
    }

    let tmp_path = path.with_extension(format!("tmp.{}", uuid::Uuid::new_v4().simple()));
    let data = serde_json::to_vec_pretty(value).context("serialize json")?;
    fs::write(&tmp_path, &data)
        .await
        .with_context(|| format!("write tmp: {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path)
        .await
        .with_context(|| format!("rename tmp to final: {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn atomic_write_replaces_file_without_leftovers() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("nested").join("story.json");

        write_json_atomic(&path, &serde_json::json!({"a": 1})).await?;
        write_json_atomic(&path, &serde_json::json!({"a": 2})).await?;

        let written: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
        assert_eq!(written["a"], 2);
        assert_eq!(std::fs::read_dir(path.parent().unwrap())?.count(), 1);
        Ok(())
    }
}
