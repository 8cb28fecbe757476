//! Continuous listening
//!
//! A capture thread segments microphone audio into utterances and hands them
//! to a transcription task, which publishes non-empty transcripts in capture
//! order.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use super::{AudioCapture, AudioChunk, SAMPLE_RATE, SpeechSegmenter, SttEngine, Transcriber};
use crate::{Error, Result};

/// How often the capture thread drains the device buffer
const CAPTURE_INTERVAL: Duration = Duration::from_millis(100);

/// Engine selection and the latest utterance, shared with the control loop
#[derive(Debug, Default)]
pub struct ListenerState {
    cloud: AtomicBool,
    last_chunk: Mutex<Option<AudioChunk>>,
}

impl ListenerState {
    #[must_use]
    pub fn engine(&self) -> SttEngine {
        if self.cloud.load(Ordering::Acquire) {
            SttEngine::Cloud
        } else {
            SttEngine::Local
        }
    }

    /// Choose the engine for subsequent utterances
    pub fn set_engine(&self, engine: SttEngine) {
        let previous = self.engine();
        self.cloud
            .store(engine == SttEngine::Cloud, Ordering::Release);
        if previous != engine {
            tracing::info!(from = %previous, to = %engine, "transcription engine switched");
        }
    }

    /// The most recently captured utterance
    #[must_use]
    pub fn last_chunk(&self) -> Option<AudioChunk> {
        self.last_chunk
            .lock()
            .map(|chunk| chunk.clone())
            .unwrap_or_default()
    }

    pub fn record_chunk(&self, chunk: AudioChunk) {
        if let Ok(mut last) = self.last_chunk.lock() {
            *last = Some(chunk);
        }
    }
}

/// Handle to the running capture thread and transcription task
pub struct Listener {
    state: Arc<ListenerState>,
    stop: Arc<AtomicBool>,
    capture: Option<thread::JoinHandle<()>>,
    transcription: Option<JoinHandle<()>>,
}

impl Listener {
    /// Start listening on the input device whose name contains
    /// `device_name` (or the default device).
    ///
    /// Returns the listener and the receiving end of the transcript channel.
    ///
    /// # Errors
    ///
    /// Returns error if the input device cannot be opened
    pub async fn spawn(
        device_name: Option<String>,
        transcriber: Arc<dyn Transcriber>,
        keyword_hints: Vec<String>,
        segmenter: SpeechSegmenter,
    ) -> Result<(Self, mpsc::UnboundedReceiver<String>)> {
        let state = Arc::new(ListenerState::default());
        let stop = Arc::new(AtomicBool::new(false));
        let (chunk_tx, chunk_rx) = mpsc::unbounded_channel();
        let (transcript_tx, transcript_rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = oneshot::channel();

        let capture = {
            let stop = Arc::clone(&stop);
            thread::Builder::new()
                .name("audio-capture".to_string())
                .spawn(move || {
                    capture_loop(device_name.as_deref(), segmenter, &stop, &chunk_tx, ready_tx);
                })?
        };

        ready_rx
            .await
            .map_err(|_| Error::Audio("capture thread exited during startup".to_string()))??;

        let transcription = tokio::spawn(transcribe_loop(
            chunk_rx,
            transcript_tx,
            transcriber,
            keyword_hints,
            Arc::clone(&state),
        ));

        tracing::info!("listener started");

        Ok((
            Self {
                state,
                stop,
                capture: Some(capture),
                transcription: Some(transcription),
            },
            transcript_rx,
        ))
    }

    #[must_use]
    pub fn state(&self) -> Arc<ListenerState> {
        Arc::clone(&self.state)
    }

    /// Stop capturing and transcribing, waiting for the capture thread to
    /// release the device.
    ///
    /// The join runs on the blocking pool so the runtime keeps serving
    /// other tasks while the capture thread finishes its last interval.
    pub async fn shutdown(mut self) {
        self.signal_stop();
        let Some(capture) = self.capture.take() else {
            return;
        };

        match tokio::task::spawn_blocking(move || capture.join()).await {
            Ok(Ok(())) => tracing::info!("listener stopped"),
            Ok(Err(_)) => tracing::warn!("capture thread panicked"),
            Err(e) => tracing::warn!(error = %e, "failed to join capture thread"),
        }
    }

    fn signal_stop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(task) = self.transcription.take() {
            task.abort();
        }
    }
}

impl Drop for Listener {
    // No join here: the capture thread exits on its own within one interval
    fn drop(&mut self) {
        self.signal_stop();
    }
}

fn capture_loop(
    device_name: Option<&str>,
    mut segmenter: SpeechSegmenter,
    stop: &AtomicBool,
    chunks: &mpsc::UnboundedSender<AudioChunk>,
    ready: oneshot::Sender<Result<()>>,
) {
    let mut capture = match AudioCapture::new(device_name).and_then(|mut c| {
        c.start()?;
        Ok(c)
    }) {
        Ok(capture) => capture,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };
    let _ = ready.send(Ok(()));

    while !stop.load(Ordering::Acquire) {
        thread::sleep(CAPTURE_INTERVAL);

        let samples = capture.take_buffer();
        if let Some(utterance) = segmenter.push(&samples) {
            let chunk = AudioChunk::new(utterance, SAMPLE_RATE);
            tracing::debug!(secs = chunk.duration_secs(), "utterance captured");
            if chunks.send(chunk).is_err() {
                break;
            }
        }
    }

    capture.stop();
}

async fn transcribe_loop(
    mut chunks: mpsc::UnboundedReceiver<AudioChunk>,
    transcripts: mpsc::UnboundedSender<String>,
    transcriber: Arc<dyn Transcriber>,
    keyword_hints: Vec<String>,
    state: Arc<ListenerState>,
) {
    while let Some(chunk) = chunks.recv().await {
        let engine = state.engine();
        state.record_chunk(chunk.clone());

        match transcriber.transcribe(&chunk, engine, &keyword_hints).await {
            Ok(text) => {
                let text = text.trim();
                if text.is_empty() {
                    tracing::debug!(%engine, "empty transcript dropped");
                    continue;
                }
                if transcripts.send(text.to_string()).is_err() {
                    break;
                }
            }
            Err(e) => {
                tracing::warn!(%engine, error = %e, "transcription failed, utterance skipped");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc as std_mpsc;
    use std::time::Instant;

    use async_trait::async_trait;

    use super::*;

    struct EchoEngine;

    #[async_trait]
    impl Transcriber for EchoEngine {
        async fn transcribe(
            &self,
            audio: &AudioChunk,
            engine: SttEngine,
            _keyword_hints: &[String],
        ) -> Result<String> {
            match audio.samples.len() {
                0 => Err(Error::Stt("no audio".to_string())),
                1 => Ok("   ".to_string()),
                n => Ok(format!("{engine} {n}")),
            }
        }
    }

    #[test]
    fn test_engine_switch() {
        let state = ListenerState::default();
        assert_eq!(state.engine(), SttEngine::Local);

        state.set_engine(SttEngine::Cloud);
        assert_eq!(state.engine(), SttEngine::Cloud);

        state.set_engine(SttEngine::Local);
        assert_eq!(state.engine(), SttEngine::Local);
    }

    #[tokio::test]
    async fn test_transcripts_keep_order_and_skip_failures() {
        let (chunk_tx, chunk_rx) = mpsc::unbounded_channel();
        let (transcript_tx, mut transcript_rx) = mpsc::unbounded_channel();
        let state = Arc::new(ListenerState::default());

        for len in [2, 0, 1, 3] {
            chunk_tx.send(AudioChunk::new(vec![0.0; len], SAMPLE_RATE)).unwrap();
        }
        drop(chunk_tx);

        transcribe_loop(
            chunk_rx,
            transcript_tx,
            Arc::new(EchoEngine),
            Vec::new(),
            Arc::clone(&state),
        )
        .await;

        assert_eq!(transcript_rx.recv().await.unwrap(), "local 2");
        assert_eq!(transcript_rx.recv().await.unwrap(), "local 3");
        assert!(transcript_rx.recv().await.is_none());
        assert_eq!(state.last_chunk().unwrap().samples.len(), 3);
    }

    fn listener_with(capture: thread::JoinHandle<()>, stop: Arc<AtomicBool>) -> Listener {
        Listener {
            state: Arc::new(ListenerState::default()),
            stop,
            capture: Some(capture),
            transcription: None,
        }
    }

    #[tokio::test]
    async fn test_shutdown_joins_capture_without_stalling_runtime() {
        let stop = Arc::new(AtomicBool::new(false));
        let exited = Arc::new(AtomicBool::new(false));
        let capture = {
            let stop = Arc::clone(&stop);
            let exited = Arc::clone(&exited);
            thread::spawn(move || {
                while !stop.load(Ordering::Acquire) {
                    thread::sleep(Duration::from_millis(1));
                }
                // Finishing the last capture interval
                thread::sleep(Duration::from_millis(50));
                exited.store(true, Ordering::Release);
            })
        };
        let mut listener = listener_with(capture, stop);
        listener.transcription = Some(tokio::spawn(std::future::pending::<()>()));

        let ticks = Arc::new(AtomicUsize::new(0));
        let ticker = {
            let ticks = Arc::clone(&ticks);
            tokio::spawn(async move {
                loop {
                    tokio::time::sleep(Duration::from_millis(1)).await;
                    ticks.fetch_add(1, Ordering::Relaxed);
                }
            })
        };

        listener.shutdown().await;
        ticker.abort();

        assert!(exited.load(Ordering::Acquire));
        // Single-threaded runtime: a blocking join would have starved the ticker
        assert!(ticks.load(Ordering::Relaxed) > 0);
    }

    #[test]
    fn test_drop_signals_without_joining() {
        let stop = Arc::new(AtomicBool::new(false));
        let (release_tx, release_rx) = std_mpsc::channel::<()>();
        let capture = {
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                while !stop.load(Ordering::Acquire) {
                    thread::sleep(Duration::from_millis(1));
                }
                let _ = release_rx.recv_timeout(Duration::from_secs(5));
            })
        };
        let listener = listener_with(capture, Arc::clone(&stop));

        let started = Instant::now();
        drop(listener);

        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(stop.load(Ordering::Acquire));
        release_tx.send(()).unwrap();
    }
}
