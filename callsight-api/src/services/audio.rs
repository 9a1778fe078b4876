//! Recording storage and duration probing.

use async_trait::async_trait;
use std::path::PathBuf;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::TimeBase;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("Failed to store recording {file}: {reason}")]
    Store { file: String, reason: String },
}

/// Destination for uploaded recordings.
#[async_trait]
pub trait AudioStore: Send + Sync {
    /// Persist `bytes` under `file_name` and return the public URL.
    async fn store(&self, file_name: &str, bytes: &[u8]) -> Result<String, AudioError>;

    /// Base URL recordings are served from.
    fn public_base_url(&self) -> &str;

    /// URL recorded when an upload fails, so the call is still ingested.
    fn placeholder_url(&self) -> String {
        format!(
            "{}/calls/upload_failed_{}.mp3",
            self.public_base_url(),
            uuid::Uuid::now_v7().simple()
        )
    }
}

/// Writes recordings into a local directory served under
/// `{public_base_url}/calls/`.
#[derive(Debug, Clone)]
pub struct LocalAudioStore {
    dir: PathBuf,
    public_base_url: String,
}

impl LocalAudioStore {
    pub fn new(dir: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl AudioStore for LocalAudioStore {
    async fn store(&self, file_name: &str, bytes: &[u8]) -> Result<String, AudioError> {
        let calls_dir = self.dir.join("calls");
        let fail = |e: std::io::Error| AudioError::Store {
            file: file_name.to_string(),
            reason: e.to_string(),
        };
        tokio::fs::create_dir_all(&calls_dir).await.map_err(fail)?;
        tokio::fs::write(calls_dir.join(file_name), bytes)
            .await
            .map_err(fail)?;
        Ok(format!("{}/calls/{}", self.public_base_url, file_name))
    }

    fn public_base_url(&self) -> &str {
        &self.public_base_url
    }
}

/// Storage name for an upload: a fresh id plus the sanitized original name.
pub fn storage_file_name(original: &str) -> String {
    let base = original.rsplit(['/', '\\']).next().unwrap_or(original);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{}_{}", uuid::Uuid::now_v7().simple(), cleaned)
}

/// Whole seconds of audio in an MP3 buffer, or 0 if it cannot be read.
pub fn probe_duration_secs(bytes: &[u8]) -> i32 {
    match probe_duration(bytes) {
        Some(secs) if secs.is_finite() && secs >= 0.0 => secs.floor() as i32,
        _ => 0,
    }
}

fn probe_duration(bytes: &[u8]) -> Option<f64> {
    let cursor = std::io::Cursor::new(bytes.to_vec());
    let stream = MediaSourceStream::new(Box::new(cursor), Default::default());

    let mut hint = Hint::new();
    hint.with_extension("mp3");

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            stream,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .ok()?;
    let mut format = probed.format;

    let track = format.default_track()?;
    let track_id = track.id;
    let params = track.codec_params.clone();
    let time_base = params
        .time_base
        .or_else(|| params.sample_rate.map(|rate| TimeBase::new(1, rate)))?;

    if let Some(frames) = params.n_frames {
        let time = time_base.calc_time(frames);
        return Some(time.seconds as f64 + time.frac);
    }

    // No frame count in the header: walk the packets.
    let mut total: u64 = 0;
    while let Ok(packet) = format.next_packet() {
        if packet.track_id() == track_id {
            total += packet.dur;
        }
    }
    if total == 0 {
        return None;
    }
    let time = time_base.calc_time(total);
    Some(time.seconds as f64 + time.frac)
}
