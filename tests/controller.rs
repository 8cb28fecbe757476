//! Conversation scenarios driven through the controller

mod common;

use std::sync::Arc;
use std::time::Duration;

use avatar_pilot::character::DEFAULT_FAREWELL;
use avatar_pilot::controller::{DEFAULT_APOLOGY, DEFAULT_ERROR_APOLOGY};
use avatar_pilot::voice::{AudioChunk, ListenerState, SAMPLE_RATE};
use avatar_pilot::{
    CharacterSettings, ConversationService, Controller, ControllerSettings, SpeechOutput,
    SttEngine, Transcriber,
};
use common::{
    FixedTranscriber, RecordingInput, RecordingSpeech, ScriptedConversation, SwitchableFocus,
    WAIT, character, quiet_settings, wait_until,
};
use tokio::sync::mpsc;

struct Harness {
    controller: Controller,
    transcripts: mpsc::UnboundedSender<String>,
    input: RecordingInput,
    speech: Arc<RecordingSpeech>,
    conversation: Arc<ScriptedConversation>,
    transcriber: Arc<FixedTranscriber>,
    listener: Arc<ListenerState>,
}

impl Harness {
    fn new(focused: bool, replies: &[&str]) -> Self {
        Self::build(focused, replies, FixedTranscriber::new(None), quiet_settings())
    }

    fn with_transcriber(
        focused: bool,
        replies: &[&str],
        transcriber: Arc<FixedTranscriber>,
    ) -> Self {
        Self::build(focused, replies, transcriber, quiet_settings())
    }

    fn build(
        focused: bool,
        replies: &[&str],
        transcriber: Arc<FixedTranscriber>,
        settings: CharacterSettings,
    ) -> Self {
        let focus = SwitchableFocus::new(focused);
        let input = RecordingInput::default();
        let speech = RecordingSpeech::new();
        let conversation = ScriptedConversation::new(replies);
        let listener = Arc::new(ListenerState::default());
        let (tx, rx) = mpsc::unbounded_channel();

        let controller = Controller::new(
            character(&focus, &input, &speech, settings),
            Arc::clone(&conversation) as Arc<dyn ConversationService>,
            Arc::clone(&speech) as Arc<dyn SpeechOutput>,
            Arc::clone(&transcriber) as Arc<dyn Transcriber>,
            Arc::clone(&listener),
            rx,
            ControllerSettings::default(),
        );

        Self {
            controller,
            transcripts: tx,
            input,
            speech,
            conversation,
            transcriber,
            listener,
        }
    }

    async fn wait_for_focus(&self) {
        let actions = self.controller.character().actions();
        assert!(wait_until(WAIT, || actions.is_window_focused()).await);
    }

    async fn hear(&mut self, text: &str) {
        self.controller.handle_transcript(text).await;
    }
}

#[tokio::test]
async fn test_wake_word_starts_conversation() {
    let mut h = Harness::new(true, &["TYPE_NORMAL I'm doing great, thanks!"]);
    h.wait_for_focus().await;

    h.hear("ringo how are you").await;

    let character = h.controller.character();
    assert!(character.state().is_conversing());
    let id = character.conversation_id().expect("conversation id").to_string();
    assert_eq!(
        h.conversation.prompts(),
        vec![("ringo how are you".to_string(), id)]
    );
    assert_eq!(h.speech.spoken(), vec!["I'm doing great, thanks!".to_string()]);
    assert_eq!(h.listener.engine(), SttEngine::Cloud);

    // Acknowledging nod
    let input = h.input.clone();
    assert!(wait_until(WAIT, || input.moves(0, 1) == 10).await);
}

#[tokio::test]
async fn test_speech_without_wake_word_is_ignored() {
    let mut h = Harness::new(false, &[]);

    h.hear("what a nice day").await;

    assert!(h.controller.character().state().is_wandering());
    assert!(h.conversation.prompts().is_empty());
    assert!(h.speech.spoken().is_empty());
    assert_eq!(h.listener.engine(), SttEngine::Local);
}

#[tokio::test]
async fn test_wake_word_prompt_is_retranscribed_in_the_cloud() {
    let mut h = Harness::with_transcriber(
        false,
        &["TYPE_NORMAL Hi!"],
        FixedTranscriber::new(Some("  Ringo, how are you?  ")),
    );
    h.listener
        .record_chunk(AudioChunk::new(vec![0.1; 1600], SAMPLE_RATE));

    h.hear("ringo how are you").await;

    assert_eq!(h.transcriber.calls(), vec![SttEngine::Cloud]);
    assert_eq!(h.conversation.prompts()[0].0, "Ringo, how are you?");
}

#[tokio::test]
async fn test_failed_retranscription_keeps_local_text() {
    let mut h = Harness::new(false, &["TYPE_NORMAL Hi!"]);
    h.listener
        .record_chunk(AudioChunk::new(vec![0.1; 1600], SAMPLE_RATE));

    h.hear("ringo hello").await;

    assert_eq!(h.transcriber.calls(), vec![SttEngine::Cloud]);
    assert_eq!(h.conversation.prompts()[0].0, "ringo hello");
}

#[tokio::test]
async fn test_command_while_unfocused_apologizes() {
    let mut h = Harness::new(false, &["TYPE_NORMAL Hey!", "TYPE_CMD_FORWARDmove there"]);

    h.hear("ringo").await;
    h.hear("move forward please").await;

    let character = h.controller.character();
    assert!(character.state().is_conversing());
    assert_eq!(character.actions().pending(), 0);
    assert_eq!(h.speech.last().as_deref(), Some(DEFAULT_APOLOGY));
    assert_eq!(h.input.presses(), 0);
}

#[tokio::test]
async fn test_command_while_focused_performs_action() {
    let mut h = Harness::new(true, &["TYPE_NORMAL Hey!", "TYPE_CMD_TURN Turning left."]);
    h.wait_for_focus().await;

    h.hear("ringo").await;
    h.hear("turn left").await;

    assert!(h.controller.character().state().is_performing_action());
    assert_eq!(h.speech.last().as_deref(), Some("Turning left."));

    let input = h.input.clone();
    assert!(wait_until(WAIT, || input.moves(-1, 0) > 0).await);

    h.hear("stop").await;
    assert!(h.controller.character().state().is_conversing());

    let actions = h.controller.character().actions();
    assert!(wait_until(WAIT, || actions.is_idle() && !actions.is_stop_requested()).await);
}

#[tokio::test]
async fn test_performing_ignores_everything_but_stop() {
    let mut h = Harness::new(true, &["TYPE_NORMAL Hey!", "TYPE_CMD_FORWARD Walking."]);
    h.wait_for_focus().await;

    h.hear("ringo").await;
    h.hear("walk forward").await;
    assert!(h.controller.character().state().is_performing_action());

    h.hear("how are you").await;
    h.hear("goodbye").await;

    assert!(h.controller.character().state().is_performing_action());
    assert_eq!(h.conversation.prompts().len(), 2);

    h.hear("halt").await;
    assert!(h.controller.character().state().is_conversing());
}

#[tokio::test]
async fn test_yes_reply_nods_twice() {
    let mut h = Harness::new(true, &["TYPE_NORMAL Hey!", "TYPE_YES Sure."]);
    h.wait_for_focus().await;

    h.hear("ringo").await;
    let input = h.input.clone();
    assert!(wait_until(WAIT, || input.moves(0, 1) == 10).await);

    h.hear("can you hear me").await;
    assert_eq!(h.speech.last().as_deref(), Some("Sure."));
    assert!(h.controller.character().state().is_conversing());

    // The greeting nod plus two more
    let actions = h.controller.character().actions();
    assert!(wait_until(WAIT, || input.moves(0, 1) == 30 && actions.is_idle()).await);
    assert_eq!(input.moves(0, -1), 30);
    assert_eq!(input.moves(1, 0), 0);
}

#[tokio::test]
async fn test_no_reply_shakes_once() {
    let mut h = Harness::new(true, &["TYPE_NORMAL Hey!", "TYPE_NO Nope."]);
    h.wait_for_focus().await;

    h.hear("ringo").await;
    h.hear("are you a robot").await;
    assert_eq!(h.speech.last().as_deref(), Some("Nope."));

    let input = h.input.clone();
    let actions = h.controller.character().actions();
    assert!(wait_until(WAIT, || input.moves(1, 0) == 10 && actions.is_idle()).await);
    assert_eq!(input.moves(-1, 0), 10);
    assert_eq!(input.moves(0, 1), 10);
}

#[tokio::test]
async fn test_unknown_tag_is_spoken_verbatim() {
    let mut h = Harness::new(
        true,
        &["TYPE_NORMAL Hey!", "TYPE_CONFUSED Sorry?", "TYPE_DANCE hi"],
    );
    h.wait_for_focus().await;

    h.hear("ringo").await;
    h.hear("flim flam").await;
    assert_eq!(h.controller.character().confused_responses(), 1);

    h.hear("dance for me").await;

    let character = h.controller.character();
    assert!(character.state().is_conversing());
    assert_eq!(character.confused_responses(), 0);
    assert_eq!(h.speech.last().as_deref(), Some("TYPE_DANCE hi"));

    // Only the greeting nod, no gesture for the unknown tag
    let input = h.input.clone();
    let actions = character.actions();
    assert!(wait_until(WAIT, || actions.is_idle()).await);
    assert_eq!(input.moves(0, 1), 10);
    assert_eq!(input.moves(1, 0), 0);
}

#[tokio::test]
async fn test_repeated_confusion_ends_conversation() {
    let mut h = Harness::new(
        false,
        &[
            "TYPE_CONFUSED Sorry?",
            "TYPE_CONFUSED Pardon?",
            "TYPE_CONFUSED What was that?",
            "TYPE_CONFUSED I don't follow.",
        ],
    );

    h.hear("ringo blorp").await;
    h.hear("flim flam").await;
    h.hear("zib zab").await;
    assert!(h.controller.character().state().is_conversing());
    assert_eq!(h.controller.character().confused_responses(), 3);

    h.hear("wub wub").await;

    let character = h.controller.character();
    assert!(character.state().is_wandering());
    assert!(character.conversation_id().is_none());
    assert_eq!(
        h.speech.spoken(),
        vec![
            "Sorry?".to_string(),
            "Pardon?".to_string(),
            "What was that?".to_string(),
            "I don't follow.".to_string(),
            DEFAULT_FAREWELL.to_string(),
        ]
    );
    assert_eq!(h.listener.engine(), SttEngine::Local);
}

#[tokio::test]
async fn test_normal_reply_resets_confusion() {
    let mut h = Harness::new(
        false,
        &["TYPE_CONFUSED Sorry?", "TYPE_CONFUSED Pardon?", "TYPE_NORMAL Oh, got it."],
    );

    h.hear("ringo blorp").await;
    h.hear("flim flam").await;
    assert_eq!(h.controller.character().confused_responses(), 2);

    h.hear("I said hello").await;
    assert_eq!(h.controller.character().confused_responses(), 0);
}

#[tokio::test]
async fn test_ending_reply_ends_conversation() {
    let mut h = Harness::new(false, &["TYPE_NORMAL Hi!", "TYPE_ENDING See you later!"]);

    h.hear("ringo").await;
    h.hear("I have to go now").await;

    assert!(h.controller.character().state().is_wandering());
    assert_eq!(
        h.speech.spoken(),
        vec![
            "Hi!".to_string(),
            "See you later!".to_string(),
            DEFAULT_FAREWELL.to_string()
        ]
    );
}

#[tokio::test]
async fn test_goodbye_word_ends_conversation() {
    let mut h = Harness::new(false, &["TYPE_NORMAL Hi!"]);

    h.hear("ringo").await;
    h.hear("okay goodbye ringo").await;

    assert!(h.controller.character().state().is_wandering());
    assert_eq!(h.conversation.prompts().len(), 1);
    assert_eq!(h.speech.last().as_deref(), Some(DEFAULT_FAREWELL));
    assert_eq!(h.listener.engine(), SttEngine::Local);
}

#[tokio::test]
async fn test_service_failure_apologizes_and_keeps_conversing() {
    let mut h = Harness::new(false, &["TYPE_NORMAL Hi!"]);

    h.hear("ringo").await;
    h.conversation.push_failure();
    h.hear("tell me a story").await;

    assert!(h.controller.character().state().is_conversing());
    assert_eq!(h.speech.last().as_deref(), Some(DEFAULT_ERROR_APOLOGY));

    h.hear("are you there").await;
    assert_eq!(h.speech.last().as_deref(), Some("ok"));
}

#[tokio::test]
async fn test_conversation_id_is_stable_within_conversation() {
    let mut h = Harness::new(false, &[]);

    h.hear("ringo hi").await;
    h.hear("how are you").await;
    h.hear("bye bye").await;
    h.hear("ringo again").await;

    let prompts = h.conversation.prompts();
    assert_eq!(prompts.len(), 3);
    assert_eq!(prompts[0].1, prompts[1].1);
    assert_ne!(prompts[1].1, prompts[2].1);
}

#[tokio::test]
async fn test_transcripts_heard_during_reply_are_dropped() {
    let mut h = Harness::new(false, &[]);

    h.transcripts.send("echo of my own voice".to_string()).unwrap();
    h.transcripts.send("more echo".to_string()).unwrap();
    h.hear("ringo hello").await;

    assert!(h.controller.tick().await);
    assert!(h.controller.tick().await);
    assert_eq!(h.conversation.prompts().len(), 1);
}

#[tokio::test]
async fn test_run_processes_transcripts_until_shutdown() {
    let mut h = Harness::new(false, &["TYPE_YES Sure."]);

    h.transcripts.send("ringo can you hear me".to_string()).unwrap();
    tokio::time::timeout(
        WAIT,
        h.controller
            .run(tokio::time::sleep(Duration::from_millis(50))),
    )
    .await
    .expect("control loop should stop on shutdown");

    assert_eq!(h.conversation.prompts().len(), 1);
    assert_eq!(h.speech.spoken(), vec!["Sure.".to_string()]);
    assert!(h.controller.character().actions().is_idle());
}

#[tokio::test]
async fn test_run_stops_when_listener_goes_away() {
    let mut h = Harness::new(false, &[]);
    drop(h.transcripts);

    tokio::time::timeout(WAIT, h.controller.run(std::future::pending::<()>()))
        .await
        .expect("control loop should stop once the channel closes");
}

#[tokio::test]
async fn test_timed_out_conversation_restores_local_engine() {
    let settings = CharacterSettings {
        conversation_timeout: Some(Duration::from_millis(20)),
        ..quiet_settings()
    };
    let mut h = Harness::build(false, &[], FixedTranscriber::new(None), settings);

    h.hear("ringo hi").await;
    assert_eq!(h.listener.engine(), SttEngine::Cloud);

    tokio::time::sleep(Duration::from_millis(40)).await;
    assert!(h.controller.tick().await);

    assert!(h.controller.character().state().is_wandering());
    assert_eq!(h.speech.last().as_deref(), Some(DEFAULT_FAREWELL));
    assert_eq!(h.listener.engine(), SttEngine::Local);
}
