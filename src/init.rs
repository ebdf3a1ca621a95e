use crate::config::{Config, GpuMode};
use crate::encoder::{EncoderParams, select_encoder};
use crate::{logi, logw};
use anyhow::{Context, Result};
use std::path::Path;
use tokio::fs;

pub async fn ensure_output_dir(dir: &Path) -> Result<()> {
    if dir.as_os_str().is_empty() || dir.exists() {
        return Ok(());
    }
    fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
    logi(format!("Created directory: {}", dir.display()));
    Ok(())
}

pub async fn check_ffmpeg(program: &str) -> bool {
    match tokio::process::Command::new(program)
        .arg("-version")
        .output()
        .await
    {
        Ok(output) => output.status.success(),
        Err(_) => false,
    }
}

fn lists_encoder(listing: &str, codec: &str) -> bool {
    listing
        .lines()
        .any(|line| line.split_whitespace().nth(1) == Some(codec))
}

/// Whether `ffmpeg -encoders` lists `codec`.
pub async fn detect_gpu_encoder(program: &str, codec: &str) -> bool {
    match tokio::process::Command::new(program)
        .args(["-hide_banner", "-encoders"])
        .output()
        .await
    {
        Ok(output) if output.status.success() => {
            lists_encoder(&String::from_utf8_lossy(&output.stdout), codec)
        }
        _ => false,
    }
}

/// Resolves the `gpu` setting into concrete encoder parameters.
pub async fn resolve_encoder(config: &Config) -> EncoderParams {
    let profiles = &config.encoder_profiles;
    let gpu = match config.gpu {
        GpuMode::On => true,
        GpuMode::Off => false,
        GpuMode::Auto => detect_gpu_encoder(&config.ffmpeg_program, &profiles.gpu.codec).await,
    };
    if config.gpu == GpuMode::Auto && !gpu {
        logw(format!("{} not available; using {}", profiles.gpu.codec, profiles.cpu.codec));
    }
    let params = select_encoder(gpu, profiles);
    logi(format!("Encoder: {}", params.codec()));
    params
}
