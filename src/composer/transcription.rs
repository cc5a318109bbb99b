// REELFORGE Transcriber Adapter
// Copyright (c) 2026 Xing_The_Creator | REELFORGE
//
// Wraps the speech-to-text service behind one trait. Three backends:
// native Whisper (whisper-rs), an OpenAI-compatible HTTP endpoint, and
// pre-computed transcript files. No retries happen here; failures go
// straight back to the unit.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::composer::audio::{ensure_speech, AudioTrack};
use crate::config::TranscriberConfig;
use crate::error::TranscriptionError;

/// One recognised word with its own timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptWord {
    pub text: String,
    pub start: f64,
    pub end: f64,
}

/// A contiguous span of speech. `start <= end` always holds after
/// `finalize_segments`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub text: String,
    pub start: f64,
    pub end: f64,
    /// Word timings when the backend provides them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub words: Vec<TranscriptWord>,
}

impl TranscriptSegment {
    pub fn new(text: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            text: text.into(),
            start,
            end,
            words: Vec::new(),
        }
    }
}

#[async_trait]
pub trait Transcriber: Send + Sync {
    fn name(&self) -> &str;

    /// Ordered, non-blank segments for the whole track.
    async fn transcribe(
        &self,
        audio: &AudioTrack,
    ) -> Result<Vec<TranscriptSegment>, TranscriptionError>;
}

/// Normalise raw backend output: trim text, drop blanks, repair inverted
/// timings and sort by start.
pub fn finalize_segments(
    path: &Path,
    raw: Vec<TranscriptSegment>,
) -> Result<Vec<TranscriptSegment>, TranscriptionError> {
    let mut segments: Vec<TranscriptSegment> = raw
        .into_iter()
        .filter_map(|seg| {
            let text = seg.text.trim().to_string();
            if text.is_empty() {
                return None;
            }
            let start = seg.start.max(0.0);
            let end = seg.end.max(start);
            let words = seg
                .words
                .into_iter()
                .filter_map(|w| {
                    let text = w.text.trim().to_string();
                    if text.is_empty() {
                        return None;
                    }
                    let start = w.start.max(0.0);
                    Some(TranscriptWord {
                        text,
                        start,
                        end: w.end.max(start),
                    })
                })
                .collect();
            Some(TranscriptSegment {
                text,
                start,
                end,
                words,
            })
        })
        .collect();

    if segments.is_empty() {
        return Err(TranscriptionError::EmptyTranscript {
            path: path.to_path_buf(),
        });
    }

    segments.sort_by(|a, b| a.start.total_cmp(&b.start));
    Ok(segments)
}

/// Distribute a flat word list over the segments whose span contains each
/// word's start. Words outside every segment go to the nearest earlier one.
pub fn attach_words(segments: &mut [TranscriptSegment], words: Vec<TranscriptWord>) {
    if segments.is_empty() {
        return;
    }
    for word in words {
        let idx = segments
            .iter()
            .rposition(|seg| seg.start <= word.start + 1e-6)
            .unwrap_or(0);
        segments[idx].words.push(word);
    }
}

/// Build the configured backend.
pub fn build_transcriber(
    config: &TranscriberConfig,
) -> Result<Arc<dyn Transcriber>, TranscriptionError> {
    match config {
        TranscriberConfig::Whisper {
            model,
            language,
            word_timestamps,
        } => build_whisper(model, language.clone(), *word_timestamps),
        TranscriberConfig::Remote {
            base_url,
            model,
            api_key_env,
            word_timestamps,
            timeout_secs,
        } => {
            let api_key = api_key_env
                .as_deref()
                .and_then(|var| std::env::var(var).ok());
            Ok(Arc::new(RemoteTranscriber::new(
                base_url,
                model,
                api_key,
                *word_timestamps,
                Duration::from_secs(*timeout_secs),
            )))
        }
        TranscriberConfig::TranscriptFile { dir } => {
            Ok(Arc::new(TranscriptFileTranscriber::new(dir.clone())))
        }
    }
}

#[cfg(feature = "whisper")]
fn build_whisper(
    model: &str,
    language: Option<String>,
    word_timestamps: bool,
) -> Result<Arc<dyn Transcriber>, TranscriptionError> {
    Ok(Arc::new(whisper::WhisperTranscriber::new(
        model,
        language,
        word_timestamps,
    )?))
}

#[cfg(not(feature = "whisper"))]
fn build_whisper(
    _model: &str,
    _language: Option<String>,
    _word_timestamps: bool,
) -> Result<Arc<dyn Transcriber>, TranscriptionError> {
    Err(TranscriptionError::Model {
        reason: "this build has no native Whisper support (enable the `whisper` feature)"
            .to_string(),
    })
}

#[cfg(feature = "whisper")]
pub mod whisper {
    //! Native Whisper via whisper.cpp bindings.

    use super::*;
    use crate::composer::audio::load_speech_pcm;
    use hf_hub::api::sync::Api;
    use std::fs;
    use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

    pub struct WhisperTranscriber {
        model_path: PathBuf,
        language: Option<String>,
        word_timestamps: bool,
    }

    impl WhisperTranscriber {
        pub fn new(
            model_name: &str,
            language: Option<String>,
            word_timestamps: bool,
        ) -> Result<Self, TranscriptionError> {
            let model_path = Self::ensure_model(model_name).map_err(|e| {
                TranscriptionError::Model {
                    reason: e.to_string(),
                }
            })?;
            Ok(Self {
                model_path,
                language,
                word_timestamps,
            })
        }

        /// Locate the GGML model in the cache, downloading it on first use.
        fn ensure_model(model_name: &str) -> anyhow::Result<PathBuf> {
            let base_dir = if let Ok(cache_env) = std::env::var("REELFORGE_CACHE_DIR") {
                PathBuf::from(cache_env).join("models")
            } else {
                dirs::cache_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("reelforge")
                    .join("models")
            };
            fs::create_dir_all(&base_dir)?;

            let filename = format!("ggml-{}.bin", model_name);
            let model_path = base_dir.join(&filename);
            if model_path.exists() {
                info!("[TRANSCRIBE] Found cached Whisper model: {:?}", model_path);
                return Ok(model_path);
            }

            info!("[TRANSCRIBE] Downloading Whisper model: {}...", filename);
            let api = Api::new()?;
            let repo = api.model("ggerganov/whisper.cpp".to_string());
            let downloaded_path = repo.get(&filename)?;
            fs::copy(&downloaded_path, &model_path)?;

            info!("[TRANSCRIBE] Model stored: {:?}", model_path);
            Ok(model_path)
        }

        fn transcribe_blocking(
            model_path: &Path,
            audio_path: &Path,
            language: Option<&str>,
            word_timestamps: bool,
        ) -> Result<Vec<TranscriptSegment>, TranscriptionError> {
            let model_err = |reason: String| TranscriptionError::Model { reason };

            let pcm = load_speech_pcm(audio_path)?;

            let model_str = model_path
                .to_str()
                .ok_or_else(|| model_err(format!("non UTF-8 model path {:?}", model_path)))?;
            let ctx = WhisperContext::new_with_params(model_str, WhisperContextParameters::default())
                .map_err(|e| model_err(format!("failed to load model: {:?}", e)))?;
            let mut state = ctx
                .create_state()
                .map_err(|e| model_err(format!("failed to create state: {:?}", e)))?;

            let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
            params.set_language(language);
            params.set_print_special(false);
            params.set_print_progress(false);
            params.set_print_realtime(false);
            params.set_print_timestamps(false);
            if word_timestamps {
                // One segment per word; the caption planner regroups them
                params.set_token_timestamps(true);
                params.set_split_on_word(true);
                params.set_max_len(1);
            }
            let num_threads = std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4) as i32;
            params.set_n_threads(num_threads);

            state
                .full(params, &pcm)
                .map_err(|e| model_err(format!("inference failed: {:?}", e)))?;

            let num_segments = state
                .full_n_segments()
                .map_err(|e| model_err(format!("segment count: {:?}", e)))?;

            let mut segments = Vec::with_capacity(num_segments.max(0) as usize);
            for i in 0..num_segments {
                // Whisper timestamps are centiseconds
                let start = state.full_get_segment_t0(i).unwrap_or(0) as f64 / 100.0;
                let end = state.full_get_segment_t1(i).unwrap_or(0) as f64 / 100.0;
                let text = state.full_get_segment_text(i).unwrap_or_default();

                let mut segment = TranscriptSegment::new(text.clone(), start, end);
                if word_timestamps {
                    segment.words.push(TranscriptWord { text, start, end });
                }
                segments.push(segment);
            }

            finalize_segments(audio_path, segments)
        }
    }

    #[async_trait]
    impl Transcriber for WhisperTranscriber {
        fn name(&self) -> &str {
            "whisper"
        }

        async fn transcribe(
            &self,
            audio: &AudioTrack,
        ) -> Result<Vec<TranscriptSegment>, TranscriptionError> {
            info!("[TRANSCRIBE] Whisper transcribing: {:?}", audio.path);

            let audio_path = audio.path.clone();
            let model_path = self.model_path.clone();
            let language = self.language.clone();
            let word_timestamps = self.word_timestamps;

            let segments = tokio::task::spawn_blocking(move || {
                Self::transcribe_blocking(
                    &model_path,
                    &audio_path,
                    language.as_deref(),
                    word_timestamps,
                )
            })
            .await
            .map_err(|e| TranscriptionError::Model {
                reason: format!("transcription worker failed: {}", e),
            })??;

            info!(
                "[TRANSCRIBE] Transcription complete: {} segments",
                segments.len()
            );
            Ok(segments)
        }
    }
}

#[derive(Debug, Deserialize)]
struct VerboseResponse {
    #[serde(default)]
    segments: Vec<VerboseSegment>,
    #[serde(default)]
    words: Vec<VerboseWord>,
}

#[derive(Debug, Deserialize)]
struct VerboseSegment {
    start: f64,
    end: f64,
    text: String,
}

#[derive(Debug, Deserialize)]
struct VerboseWord {
    word: String,
    start: f64,
    end: f64,
}

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// OpenAI-compatible `/audio/transcriptions` client.
pub struct RemoteTranscriber {
    base_url: String,
    model: String,
    api_key: Option<String>,
    word_timestamps: bool,
    timeout: Duration,
    client: reqwest::Client,
}

impl RemoteTranscriber {
    pub fn new(
        base_url: &str,
        model: &str,
        api_key: Option<String>,
        word_timestamps: bool,
        timeout: Duration,
    ) -> Self {
        Self {
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            model: model.trim().to_string(),
            api_key,
            word_timestamps,
            timeout,
            client: reqwest::Client::builder()
                .timeout(timeout)
                .connect_timeout(timeout.min(CONNECT_TIMEOUT))
                .build()
                .unwrap_or_default(),
        }
    }

    fn request_error(&self, e: reqwest::Error) -> TranscriptionError {
        let reason = if e.is_timeout() {
            format!("no response within {}s", self.timeout.as_secs_f64())
        } else {
            e.to_string()
        };
        TranscriptionError::ServiceUnavailable { reason }
    }

    fn endpoint(&self) -> String {
        format!("{}/audio/transcriptions", self.base_url)
    }
}

fn parse_verbose_response(
    path: &Path,
    body: &str,
) -> Result<Vec<TranscriptSegment>, TranscriptionError> {
    let response: VerboseResponse =
        serde_json::from_str(body).map_err(|e| TranscriptionError::InvalidResponse {
            reason: e.to_string(),
        })?;

    let mut segments: Vec<TranscriptSegment> = response
        .segments
        .into_iter()
        .map(|s| TranscriptSegment::new(s.text, s.start, s.end))
        .collect();
    let words = response
        .words
        .into_iter()
        .map(|w| TranscriptWord {
            text: w.word,
            start: w.start,
            end: w.end,
        })
        .collect();
    attach_words(&mut segments, words);

    finalize_segments(path, segments)
}

#[async_trait]
impl Transcriber for RemoteTranscriber {
    fn name(&self) -> &str {
        "remote"
    }

    async fn transcribe(
        &self,
        audio: &AudioTrack,
    ) -> Result<Vec<TranscriptSegment>, TranscriptionError> {
        use reqwest::multipart::{Form, Part};

        if self.base_url.is_empty() {
            return Err(TranscriptionError::ServiceUnavailable {
                reason: "remote transcription base URL is empty".to_string(),
            });
        }

        // Hosted Whisper models invent text for silence, so reject it first
        ensure_speech(&audio.path).await?;

        let bytes = tokio::fs::read(&audio.path)
            .await
            .map_err(|e| TranscriptionError::Unreadable {
                path: audio.path.clone(),
                reason: e.to_string(),
            })?;
        let file_name = audio
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio".to_string());

        let mut form = Form::new()
            .part("file", Part::bytes(bytes).file_name(file_name))
            .text("model", self.model.clone())
            .text("response_format", "verbose_json");
        if self.word_timestamps {
            form = form
                .text("timestamp_granularities[]", "segment")
                .text("timestamp_granularities[]", "word");
        }

        let url = self.endpoint();
        info!("[TRANSCRIBE] Sending {:?} to {}", audio.path, url);

        let mut request = self.client.post(&url).multipart(form);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| self.request_error(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.request_error(e))?;
        if !status.is_success() {
            return Err(TranscriptionError::ServiceUnavailable {
                reason: format!("HTTP {}: {}", status, body.trim()),
            });
        }

        let segments = parse_verbose_response(&audio.path, &body)?;
        info!(
            "[TRANSCRIBE] Remote transcription complete: {} segments",
            segments.len()
        );
        Ok(segments)
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TranscriptFile {
    Bare(Vec<TranscriptSegment>),
    Wrapped { segments: Vec<TranscriptSegment> },
}

/// Reads `<dir>/<audio stem>.json`, either a bare segment array or an
/// object with a `segments` field.
pub struct TranscriptFileTranscriber {
    dir: PathBuf,
}

impl TranscriptFileTranscriber {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn transcript_path(&self, audio: &AudioTrack) -> PathBuf {
        let stem = audio
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.dir.join(format!("{}.json", stem))
    }
}

#[async_trait]
impl Transcriber for TranscriptFileTranscriber {
    fn name(&self) -> &str {
        "transcript_file"
    }

    async fn transcribe(
        &self,
        audio: &AudioTrack,
    ) -> Result<Vec<TranscriptSegment>, TranscriptionError> {
        let path = self.transcript_path(audio);
        let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
            warn!("[TRANSCRIBE] No transcript at {:?}: {}", path, e);
            TranscriptionError::Unreadable {
                path: path.clone(),
                reason: e.to_string(),
            }
        })?;

        let parsed: TranscriptFile =
            serde_json::from_str(&content).map_err(|e| TranscriptionError::InvalidResponse {
                reason: format!("{:?}: {}", path, e),
            })?;
        let raw = match parsed {
            TranscriptFile::Bare(segments) => segments,
            TranscriptFile::Wrapped { segments } => segments,
        };

        finalize_segments(&audio.path, raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(path: &str) -> AudioTrack {
        AudioTrack {
            path: PathBuf::from(path),
            duration: 10.0,
        }
    }

    #[test]
    fn test_finalize_drops_blank_and_sorts() {
        let raw = vec![
            TranscriptSegment::new(" second ", 3.0, 4.0),
            TranscriptSegment::new("   ", 1.0, 2.0),
            TranscriptSegment::new("first", 0.0, 1.5),
        ];
        let segments = finalize_segments(Path::new("a.wav"), raw).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "first");
        assert_eq!(segments[1].text, "second");
    }

    #[test]
    fn test_finalize_repairs_inverted_timing() {
        let raw = vec![TranscriptSegment::new("oops", 2.0, 1.0)];
        let segments = finalize_segments(Path::new("a.wav"), raw).unwrap();
        assert_eq!(segments[0].start, 2.0);
        assert_eq!(segments[0].end, 2.0);
    }

    #[test]
    fn test_finalize_empty_is_error() {
        let raw = vec![TranscriptSegment::new("", 0.0, 1.0)];
        let err = finalize_segments(Path::new("a.wav"), raw).unwrap_err();
        assert!(matches!(err, TranscriptionError::EmptyTranscript { .. }));
    }

    #[test]
    fn test_attach_words() {
        let mut segments = vec![
            TranscriptSegment::new("hello there", 0.0, 1.0),
            TranscriptSegment::new("general", 1.2, 2.0),
        ];
        let words = vec![
            TranscriptWord { text: "hello".into(), start: 0.0, end: 0.4 },
            TranscriptWord { text: "there".into(), start: 0.5, end: 0.9 },
            TranscriptWord { text: "general".into(), start: 1.2, end: 1.9 },
        ];
        attach_words(&mut segments, words);
        assert_eq!(segments[0].words.len(), 2);
        assert_eq!(segments[1].words.len(), 1);
    }

    #[test]
    fn test_parse_verbose_response() {
        let body = r#"{
            "text": "Hello world. Bye.",
            "segments": [
                { "id": 0, "start": 0.0, "end": 1.4, "text": " Hello world." },
                { "id": 1, "start": 1.6, "end": 2.2, "text": " Bye." }
            ],
            "words": [
                { "word": "Hello", "start": 0.0, "end": 0.5 },
                { "word": "world.", "start": 0.6, "end": 1.4 },
                { "word": "Bye.", "start": 1.6, "end": 2.2 }
            ]
        }"#;
        let segments = parse_verbose_response(Path::new("a.mp3"), body).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "Hello world.");
        assert_eq!(segments[0].words.len(), 2);
        assert_eq!(segments[1].words[0].text, "Bye.");
    }

    #[test]
    fn test_parse_verbose_response_garbage() {
        let err = parse_verbose_response(Path::new("a.mp3"), "<html>").unwrap_err();
        assert!(matches!(err, TranscriptionError::InvalidResponse { .. }));
    }

    #[tokio::test]
    async fn test_transcript_file_backend() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("story.json"),
            r#"{ "segments": [ { "text": "Once upon a time", "start": 0.0, "end": 2.0 } ] }"#,
        )
        .unwrap();

        let backend = TranscriptFileTranscriber::new(dir.path().to_path_buf());
        let segments = backend.transcribe(&track("AudioAssets/story.mp3")).await.unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "Once upon a time");

        let err = backend.transcribe(&track("missing.mp3")).await.unwrap_err();
        assert!(matches!(err, TranscriptionError::Unreadable { .. }));
    }

    mod remote {
        use super::*;
        use hound::{SampleFormat, WavSpec, WavWriter};
        use std::sync::atomic::{AtomicUsize, Ordering};
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::{TcpListener, TcpStream};

        const THANK_YOU: &str =
            r#"{"text":" Thank you.","segments":[{"start":0.0,"end":1.5,"text":" Thank you."}]}"#;

        fn write_wav(path: &Path, samples: impl Iterator<Item = i16>) {
            let spec = WavSpec {
                channels: 1,
                sample_rate: 16_000,
                bits_per_sample: 16,
                sample_format: SampleFormat::Int,
            };
            let mut writer = WavWriter::create(path, spec).unwrap();
            for s in samples {
                writer.write_sample(s).unwrap();
            }
            writer.finalize().unwrap();
        }

        fn silent_track(dir: &Path) -> AudioTrack {
            let path = dir.join("silent.wav");
            write_wav(&path, std::iter::repeat(0i16).take(32_000));
            AudioTrack { path, duration: 2.0 }
        }

        fn speech_track(dir: &Path) -> AudioTrack {
            let path = dir.join("voice.wav");
            write_wav(
                &path,
                (0..32_000).map(|i| ((i as f32 * 0.05).sin() * 8000.0) as i16),
            );
            AudioTrack { path, duration: 2.0 }
        }

        fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
            haystack.windows(needle.len()).position(|w| w == needle)
        }

        /// Read one full HTTP request (Content-Length or chunked body).
        async fn read_request(socket: &mut TcpStream) {
            let mut buf = Vec::new();
            let mut chunk = [0u8; 8192];
            loop {
                let n = match socket.read(&mut chunk).await {
                    Ok(0) | Err(_) => return,
                    Ok(n) => n,
                };
                buf.extend_from_slice(&chunk[..n]);
                let Some(end) = find(&buf, b"\r\n\r\n") else {
                    continue;
                };
                let headers = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
                if headers.contains("transfer-encoding: chunked") {
                    if buf.ends_with(b"0\r\n\r\n") {
                        return;
                    }
                    continue;
                }
                let length = headers
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + length {
                    return;
                }
            }
        }

        /// Local endpoint answering every request with `body`.
        async fn canned_service(body: &'static str) -> (String, Arc<AtomicUsize>) {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            let hits = Arc::new(AtomicUsize::new(0));
            let counter = hits.clone();
            tokio::spawn(async move {
                while let Ok((mut socket, _)) = listener.accept().await {
                    counter.fetch_add(1, Ordering::SeqCst);
                    read_request(&mut socket).await;
                    let response = format!(
                        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        body.len(),
                        body
                    );
                    socket.write_all(response.as_bytes()).await.ok();
                    socket.shutdown().await.ok();
                }
            });
            (format!("http://{}/v1", addr), hits)
        }

        fn backend(base_url: &str, timeout: Duration) -> RemoteTranscriber {
            RemoteTranscriber::new(base_url, "whisper-1", None, false, timeout)
        }

        #[tokio::test]
        async fn test_silent_audio_is_rejected_before_upload() {
            let dir = tempfile::tempdir().unwrap();
            let (url, hits) = canned_service(THANK_YOU).await;

            let err = backend(&url, Duration::from_secs(5))
                .transcribe(&silent_track(dir.path()))
                .await
                .unwrap_err();
            assert!(matches!(err, TranscriptionError::Silent { .. }), "{:?}", err);
            assert_eq!(hits.load(Ordering::SeqCst), 0);
        }

        #[tokio::test]
        async fn test_speech_is_sent_and_parsed() {
            let dir = tempfile::tempdir().unwrap();
            let (url, hits) = canned_service(THANK_YOU).await;

            let segments = backend(&url, Duration::from_secs(5))
                .transcribe(&speech_track(dir.path()))
                .await
                .unwrap();
            assert_eq!(segments.len(), 1);
            assert_eq!(segments[0].text, "Thank you.");
            assert_eq!(hits.load(Ordering::SeqCst), 1);
        }

        #[tokio::test]
        async fn test_unresponsive_service_times_out() {
            let dir = tempfile::tempdir().unwrap();
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let url = format!("http://{}/v1", listener.local_addr().unwrap());
            tokio::spawn(async move {
                // Accept and never answer
                if let Ok((socket, _)) = listener.accept().await {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    drop(socket);
                }
            });

            let result = tokio::time::timeout(
                Duration::from_secs(15),
                backend(&url, Duration::from_secs(1)).transcribe(&speech_track(dir.path())),
            )
            .await
            .expect("transcribe should give up on its own");
            match result {
                Err(TranscriptionError::ServiceUnavailable { reason }) => {
                    assert!(reason.contains("no response within"), "{}", reason)
                }
                other => panic!("expected a service error, got {:?}", other),
            }
        }

        #[tokio::test]
        async fn test_unreachable_is_service_error() {
            let dir = tempfile::tempdir().unwrap();
            // Port 9 (discard) on localhost is closed on test machines
            let err = backend("http://127.0.0.1:9/v1", Duration::from_secs(5))
                .transcribe(&speech_track(dir.path()))
                .await
                .unwrap_err();
            assert!(matches!(err, TranscriptionError::ServiceUnavailable { .. }));
        }
    }
}
