//! Shared test utilities

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use avatar_pilot::voice::AudioChunk;
use avatar_pilot::{
    ActionExecutor, Character, CharacterSettings, ConversationService, Error, ExecutorTimings,
    FocusOracle, InputBackend, MotionProfile, Result, SpeechOutput, SttEngine, Transcriber,
    input,
};

/// One injected input event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    Press(char),
    Release(char),
    Move(i32, i32),
}

/// Input backend that records every event
#[derive(Clone, Default)]
pub struct RecordingInput {
    events: Arc<Mutex<Vec<InputEvent>>>,
}

impl RecordingInput {
    pub fn events(&self) -> Vec<InputEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn moves(&self, dx: i32, dy: i32) -> usize {
        self.events()
            .into_iter()
            .filter(|e| *e == InputEvent::Move(dx, dy))
            .count()
    }

    pub fn presses(&self) -> usize {
        self.events()
            .into_iter()
            .filter(|e| matches!(e, InputEvent::Press(_)))
            .count()
    }

    pub fn releases(&self) -> usize {
        self.events()
            .into_iter()
            .filter(|e| matches!(e, InputEvent::Release(_)))
            .count()
    }
}

impl InputBackend for RecordingInput {
    fn press(&mut self, key: char) -> Result<()> {
        self.events.lock().unwrap().push(InputEvent::Press(key));
        Ok(())
    }

    fn release(&mut self, key: char) -> Result<()> {
        self.events.lock().unwrap().push(InputEvent::Release(key));
        Ok(())
    }

    fn move_pointer(&mut self, dx: i32, dy: i32) -> Result<()> {
        self.events.lock().unwrap().push(InputEvent::Move(dx, dy));
        Ok(())
    }
}

/// Focus oracle the test flips by hand
#[derive(Default)]
pub struct SwitchableFocus {
    focused: AtomicBool,
}

impl SwitchableFocus {
    pub fn new(focused: bool) -> Arc<Self> {
        Arc::new(Self {
            focused: AtomicBool::new(focused),
        })
    }

    pub fn set(&self, focused: bool) {
        self.focused.store(focused, Ordering::SeqCst);
    }
}

impl FocusOracle for SwitchableFocus {
    fn is_focused(&self, _window_title: &str) -> bool {
        self.focused.load(Ordering::SeqCst)
    }
}

/// Conversation service that replays scripted replies
#[derive(Default)]
pub struct ScriptedConversation {
    replies: Mutex<VecDeque<Result<String>>>,
    prompts: Mutex<Vec<(String, String)>>,
}

impl ScriptedConversation {
    pub fn new(replies: &[&str]) -> Arc<Self> {
        let conversation = Self::default();
        for reply in replies {
            conversation.push_reply(reply);
        }
        Arc::new(conversation)
    }

    pub fn push_reply(&self, reply: &str) {
        self.replies.lock().unwrap().push_back(Ok(reply.to_string()));
    }

    pub fn push_failure(&self) {
        self.replies
            .lock()
            .unwrap()
            .push_back(Err(Error::Conversation("service unavailable".to_string())));
    }

    /// `(text, conversation_id)` of every prompt, in order
    pub fn prompts(&self) -> Vec<(String, String)> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ConversationService for ScriptedConversation {
    async fn send_prompt(&self, text: &str, conversation_id: &str) -> Result<String> {
        self.prompts
            .lock()
            .unwrap()
            .push((text.to_string(), conversation_id.to_string()));
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok("TYPE_NORMAL ok".to_string()))
    }
}

/// Speech output that records what was said
#[derive(Default)]
pub struct RecordingSpeech {
    spoken: Mutex<Vec<String>>,
}

impl RecordingSpeech {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<String> {
        self.spoken.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl SpeechOutput for RecordingSpeech {
    async fn speak(&self, text: &str) -> Result<()> {
        self.spoken.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

/// Transcriber that answers cloud requests with a fixed text
pub struct FixedTranscriber {
    cloud_text: Option<String>,
    calls: Mutex<Vec<SttEngine>>,
}

impl FixedTranscriber {
    pub fn new(cloud_text: Option<&str>) -> Arc<Self> {
        Arc::new(Self {
            cloud_text: cloud_text.map(String::from),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<SttEngine> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transcriber for FixedTranscriber {
    async fn transcribe(
        &self,
        _audio: &AudioChunk,
        engine: SttEngine,
        _keyword_hints: &[String],
    ) -> Result<String> {
        self.calls.lock().unwrap().push(engine);
        self.cloud_text
            .clone()
            .ok_or_else(|| Error::Stt("engine offline".to_string()))
    }
}

/// Motion small enough that every action completes in a few milliseconds
pub fn fast_motion() -> MotionProfile {
    MotionProfile {
        key_hold: Duration::from_millis(2),
        turn_distance: 10,
        turn_around_distance: 20,
        turn_duration: Duration::from_millis(10),
        head_distance: 5,
        head_duration: Duration::from_millis(5),
        ..MotionProfile::default()
    }
}

pub fn fast_timings() -> ExecutorTimings {
    ExecutorTimings {
        focus_poll: Duration::from_millis(1),
        tick: Duration::from_millis(1),
    }
}

pub fn executor(focus: &Arc<SwitchableFocus>, input: &RecordingInput) -> ActionExecutor {
    executor_with_motion(focus, input, fast_motion())
}

pub fn executor_with_motion(
    focus: &Arc<SwitchableFocus>,
    input: &RecordingInput,
    motion: MotionProfile,
) -> ActionExecutor {
    ActionExecutor::new(
        "VRChat",
        Arc::clone(focus) as Arc<dyn FocusOracle>,
        input::shared(input.clone()),
        motion,
        fast_timings(),
    )
}

/// Fast motion except that keys stay down for `key_hold`
pub fn slow_keys(key_hold: Duration) -> MotionProfile {
    MotionProfile {
        key_hold,
        ..fast_motion()
    }
}

/// A character that never wanders on its own
pub fn character(
    focus: &Arc<SwitchableFocus>,
    input: &RecordingInput,
    speech: &Arc<RecordingSpeech>,
    settings: CharacterSettings,
) -> Character {
    Character::new(
        "Ringo",
        executor(focus, input),
        Arc::clone(speech) as Arc<dyn SpeechOutput>,
        settings,
    )
}

pub fn quiet_settings() -> CharacterSettings {
    CharacterSettings {
        idle_threshold: Duration::from_secs(3600),
        ..CharacterSettings::default()
    }
}

/// Poll `condition` until it holds or `timeout` passes
pub async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}

pub const WAIT: Duration = Duration::from_secs(5);
