use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::commands::process;
use crate::config::VoiceConfig;

const DEFAULT_VOICE_ID: &str = "pNInz6obpgDQGcFmaJgB"; // Adam
const ELEVENLABS_TTS_URL: &str = "https://api.elevenlabs.io/v1/text-to-speech";
const ELEVENLABS_STT_URL: &str = "https://api.elevenlabs.io/v1/speech-to-text";

/// Speech I/O: ElevenLabs for TTS/STT, external programs for capture and playback
pub struct VoiceEngine {
    client: reqwest::Client,
    api_key: String,
    voice_id: String,
    cache_dir: PathBuf,
    recorder: Vec<String>,
    player: Vec<String>,
    record_seconds: u32,
}

impl VoiceEngine {
    pub fn new(api_key: String, config: &VoiceConfig) -> Result<Self> {
        let cache_dir = dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join("gengar")
            .join("voice-cache");
        std::fs::create_dir_all(&cache_dir)
            .with_context(|| format!("creating {}", cache_dir.display()))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .context("building HTTP client")?;

        Ok(Self {
            client,
            api_key,
            voice_id: config
                .voice_id
                .clone()
                .unwrap_or_else(|| DEFAULT_VOICE_ID.to_string()),
            cache_dir,
            recorder: config.recorder.clone(),
            player: config.player.clone(),
            record_seconds: config.record_seconds,
        })
    }

    /// Convert text to speech, return path to the mp3
    pub async fn tts(&self, text: &str) -> Result<PathBuf> {
        let cache_path = self
            .cache_dir
            .join(format!("{}.mp3", cache_key(text, &self.voice_id)));
        if cache_path.exists() {
            return Ok(cache_path);
        }

        let url = format!("{}/{}", ELEVENLABS_TTS_URL, self.voice_id);
        let body = serde_json::json!({
            "text": text,
            "model_id": "eleven_multilingual_v2",
            "voice_settings": {
                "stability": 0.5,
                "similarity_boost": 0.75
            }
        });

        let response = self
            .client
            .post(&url)
            .header("xi-api-key", &self.api_key)
            .header("Accept", "audio/mpeg")
            .json(&body)
            .send()
            .await
            .context("ElevenLabs TTS request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("ElevenLabs TTS error {status}: {text}");
        }

        let bytes = response.bytes().await?;
        tokio::fs::write(&cache_path, &bytes).await?;
        Ok(cache_path)
    }

    /// Transcribe an audio file to text (ElevenLabs Scribe)
    pub async fn stt(&self, audio_path: &Path) -> Result<String> {
        let file_bytes = tokio::fs::read(audio_path)
            .await
            .with_context(|| format!("reading {}", audio_path.display()))?;
        let file_name = audio_path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();

        let part = reqwest::multipart::Part::bytes(file_bytes)
            .file_name(file_name)
            .mime_str(mime_for(audio_path))?;
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("model_id", "scribe_v1");

        let response = self
            .client
            .post(ELEVENLABS_STT_URL)
            .header("xi-api-key", &self.api_key)
            .multipart(form)
            .send()
            .await
            .context("ElevenLabs STT request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("ElevenLabs STT error {status}: {text}");
        }

        let data: serde_json::Value = response.json().await?;
        Ok(data["text"].as_str().unwrap_or("").trim().to_string())
    }

    /// Record one utterance with the configured recorder
    pub async fn record(&self, dir: &Path) -> Result<PathBuf> {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("creating {}", dir.display()))?;
        let path = dir.join(format!("utterance-{}.wav", uuid::Uuid::new_v4()));
        let argv = fill_template(&self.recorder, &path, self.record_seconds);
        let timeout = Duration::from_secs(u64::from(self.record_seconds) + 10);
        process::run_checked(&argv, timeout)
            .await
            .context("recording audio")?;
        Ok(path)
    }

    /// Play an audio file with the configured player
    pub async fn play(&self, path: &Path) -> Result<()> {
        let argv = fill_template(&self.player, path, self.record_seconds);
        process::run_checked(&argv, Duration::from_secs(300))
            .await
            .context("playing audio")?;
        Ok(())
    }

    /// Synthesize and play `text`
    pub async fn speak(&self, text: &str) -> Result<()> {
        let audio = self.tts(&speakable(text)).await?;
        self.play(&audio).await
    }

    /// Record, then transcribe; the recording is removed afterwards
    pub async fn listen(&self, dir: &Path) -> Result<String> {
        let recording = self.record(dir).await?;
        let text = self.stt(&recording).await;
        let _ = tokio::fs::remove_file(&recording).await;
        text
    }
}

/// Substitute `{file}` and `{seconds}` in a command template
pub fn fill_template(template: &[String], file: &Path, seconds: u32) -> Vec<String> {
    let file = file.to_string_lossy();
    template
        .iter()
        .map(|a| {
            a.replace("{file}", &file)
                .replace("{seconds}", &seconds.to_string())
        })
        .collect()
}

/// Strip markdown markers and long code blocks that read badly aloud
pub fn speakable(text: &str) -> String {
    let mut out = Vec::new();
    let mut in_code = false;
    for line in text.lines() {
        if line.trim_start().starts_with("```") {
            in_code = !in_code;
            continue;
        }
        if in_code {
            continue;
        }
        let line = line
            .trim_start_matches(['#', '>', '-', '*', '•', ' '])
            .replace(['*', '`', '_'], "");
        if !line.trim().is_empty() {
            out.push(line.trim().to_string());
        }
    }
    out.join(". ").replace("..", ".")
}

fn mime_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("wav") => "audio/wav",
        Some("mp3") => "audio/mpeg",
        Some("oga") | Some("ogg") => "audio/ogg",
        _ => "application/octet-stream",
    }
}

/// Cache key from text and voice
fn cache_key(text: &str, voice_id: &str) -> String {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    voice_id.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}
