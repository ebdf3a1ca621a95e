use serde::{Deserialize, Serialize};

/// Hardware path. Quality is passed as constant-quality (`-cq`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GpuProfile {
    pub codec: String,
    pub preset: String,
    pub quality: u32,
    pub pixel_format: String,
    pub audio_codec: String,
    pub audio_bitrate: String,
}

impl Default for GpuProfile {
    fn default() -> Self {
        Self {
            codec: "h264_nvenc".into(),
            preset: "p4".into(),
            quality: 23,
            pixel_format: "yuv420p".into(),
            audio_codec: "aac".into(),
            audio_bitrate: "192k".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BitrateCaps {
    pub target: Option<String>,
    pub max: String,
    pub buffer: String,
}

impl Default for BitrateCaps {
    fn default() -> Self {
        Self {
            target: None,
            max: "6M".into(),
            buffer: "12M".into(),
        }
    }
}

/// Software path with rate caps sized for modest machines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CpuProfile {
    pub codec: String,
    pub preset: String,
    pub crf: u32,
    pub bitrate_caps: BitrateCaps,
    pub pixel_format: String,
    pub audio_codec: String,
    pub audio_bitrate: String,
}

impl Default for CpuProfile {
    fn default() -> Self {
        Self {
            codec: "libx264".into(),
            preset: "veryfast".into(),
            crf: 23,
            bitrate_caps: BitrateCaps::default(),
            pixel_format: "yuv420p".into(),
            audio_codec: "aac".into(),
            audio_bitrate: "192k".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderProfiles {
    pub gpu: GpuProfile,
    pub cpu: CpuProfile,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EncoderParams {
    Gpu(GpuProfile),
    Cpu(CpuProfile),
}

pub fn select_encoder(gpu_available: bool, profiles: &EncoderProfiles) -> EncoderParams {
    if gpu_available {
        EncoderParams::Gpu(profiles.gpu.clone())
    } else {
        EncoderParams::Cpu(profiles.cpu.clone())
    }
}

impl EncoderParams {
    pub fn is_gpu(&self) -> bool {
        matches!(self, EncoderParams::Gpu(_))
    }

    pub fn codec(&self) -> &str {
        match self {
            EncoderParams::Gpu(p) => &p.codec,
            EncoderParams::Cpu(p) => &p.codec,
        }
    }

    /// Concurrent encodes a batch may run: one hardware session, or one per core.
    pub fn concurrency_limit(&self, cores: usize) -> usize {
        match self {
            EncoderParams::Gpu(_) => 1,
            EncoderParams::Cpu(_) => cores.max(1),
        }
    }

    /// Codec, rate control, pixel format and audio flags.
    pub fn args(&self) -> Vec<String> {
        let mut args: Vec<String> = Vec::new();
        let (pixel_format, audio_codec, audio_bitrate) = match self {
            EncoderParams::Gpu(p) => {
                args.extend([
                    "-c:v".into(),
                    p.codec.clone(),
                    "-preset".into(),
                    p.preset.clone(),
                    "-cq".into(),
                    p.quality.to_string(),
                ]);
                (&p.pixel_format, &p.audio_codec, &p.audio_bitrate)
            }
            EncoderParams::Cpu(p) => {
                args.extend([
                    "-c:v".into(),
                    p.codec.clone(),
                    "-preset".into(),
                    p.preset.clone(),
                    "-crf".into(),
                    p.crf.to_string(),
                ]);
                if let Some(target) = &p.bitrate_caps.target {
                    args.extend(["-b:v".into(), target.clone()]);
                }
                args.extend([
                    "-maxrate".into(),
                    p.bitrate_caps.max.clone(),
                    "-bufsize".into(),
                    p.bitrate_caps.buffer.clone(),
                ]);
                (&p.pixel_format, &p.audio_codec, &p.audio_bitrate)
            }
        };

        args.extend(["-pix_fmt".into(), pixel_format.clone()]);
        args.extend(["-c:a".into(), audio_codec.clone()]);
        if audio_codec != "copy" {
            args.extend(["-b:a".into(), audio_bitrate.clone()]);
        }
        args
    }
}
