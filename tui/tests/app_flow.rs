//! App Flow Tests
//!
//! Drives [`App`] with synthetic key and mouse-free input against an
//! in-process [`MockApi`], rendering into a ratatui `TestBackend`.
//!
//! The widget's background work runs on real tokio tasks, so each test
//! ticks the app until the display reaches the state it waits for.

use std::sync::Arc;
use std::time::Duration;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use pretty_assertions::assert_eq;
use ratatui::backend::TestBackend;
use ratatui::Terminal;

use chatbot_tui::display::DisplayState;
use chatbot_tui::{App, WidgetClient};
use widget_core::api::mock::{ApiCall, Endpoint, MockApi};
use widget_core::chat::STOPPED_TEXT;
use widget_core::{
    FieldType, FormField, LocalStore, MessagingConfig, Role, SendMode, StarterQuestionConfig,
    TranscriptEntry, View, WidgetConfig, WidgetOptions,
};

// ============================================================================
// Harness
// ============================================================================

async fn app_with(api: Arc<MockApi>) -> App<MockApi> {
    let client = WidgetClient::new(api, LocalStore::in_memory(), WidgetOptions::default());
    let mut app = App::new(client);
    app.start().await;
    app
}

/// Tick until `done` holds for the display state
async fn settle(app: &mut App<MockApi>, done: impl Fn(&DisplayState) -> bool) {
    for _ in 0..400 {
        app.tick().await;
        if done(app.display()) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("display never settled: {:#?}", app.display());
}

async fn press(app: &mut App<MockApi>, code: KeyCode) {
    app.handle_key(KeyEvent::new(code, KeyModifiers::NONE)).await;
}

async fn type_text(app: &mut App<MockApi>, text: &str) {
    for c in text.chars() {
        press(app, KeyCode::Char(c)).await;
    }
}

fn screen(app: &mut App<MockApi>) -> String {
    let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();
    app.render(&mut terminal).unwrap();
    let buffer = terminal.backend().buffer();
    buffer
        .content
        .chunks(usize::from(buffer.area.width))
        .map(|row| row.iter().map(|cell| cell.symbol()).collect::<String>())
        .collect::<Vec<_>>()
        .join("\n")
}

fn email_form() -> WidgetConfig {
    WidgetConfig {
        form_enabled: true,
        fields: vec![FormField::new("email", "Email", FieldType::Email).required()],
        ..Default::default()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_closed_launcher_shows_welcome() {
    let api = Arc::new(MockApi::new());
    api.set_messaging_config(MessagingConfig {
        show_welcome: Some(true),
        welcome_message: Some("Hi there".into()),
        ..Default::default()
    });

    let mut app = app_with(api).await;
    settle(&mut app, |d| d.welcome.is_some()).await;

    assert!(!app.display().panel_open);
    let screen = screen(&mut app);
    assert!(screen.contains("Hi there"), "{screen}");
    assert!(screen.contains("Closed"));
}

#[tokio::test]
async fn test_form_keys_submit_and_advance() {
    let api = Arc::new(MockApi::new());
    api.set_widget_config(email_form());
    let mut app = app_with(api.clone()).await;
    settle(&mut app, |d| d.mounted).await;

    press(&mut app, KeyCode::F(2)).await;
    settle(&mut app, |d| d.view == Some(View::Form)).await;
    assert!(screen(&mut app).contains("Continue"));

    // Empty required field blocks the submission
    press(&mut app, KeyCode::Enter).await;
    settle(&mut app, |d| d.form.invalid.is_some()).await;
    assert_eq!(api.count(Endpoint::SubmitForm), 0);

    type_text(&mut app, "a@b.com").await;
    press(&mut app, KeyCode::Enter).await;
    settle(&mut app, |d| d.view == Some(View::Chat)).await;

    let submitted: Vec<_> = api
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            ApiCall::SubmitForm(values) => Some(values),
            _ => None,
        })
        .collect();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].get("email").map(String::as_str), Some("a@b.com"));
}

#[tokio::test]
async fn test_starter_question_is_sent_once() {
    let api = Arc::new(MockApi::new());
    api.set_starter_questions(StarterQuestionConfig {
        enabled: true,
        questions: vec!["Q1".into(), "Q2".into()],
    });
    let mut app = app_with(api.clone()).await;
    settle(&mut app, |d| d.mounted).await;

    press(&mut app, KeyCode::Enter).await;
    settle(&mut app, |d| d.view == Some(View::StarterQuestions)).await;
    assert!(screen(&mut app).contains("Q2"));

    press(&mut app, KeyCode::Down).await;
    press(&mut app, KeyCode::Enter).await;
    settle(&mut app, |d| d.transcript.len() == 2).await;

    assert_eq!(
        app.display().transcript,
        vec![
            TranscriptEntry::user("Q2"),
            TranscriptEntry::assistant("You said: Q2"),
        ]
    );
    assert_eq!(api.count(Endpoint::Chat), 1);
}

#[tokio::test]
async fn test_chat_send_renders_reply() {
    let api = Arc::new(MockApi::new());
    api.set_chat_reply("Hello from the bot");
    let mut app = app_with(api).await;
    settle(&mut app, |d| d.mounted).await;

    press(&mut app, KeyCode::F(2)).await;
    settle(&mut app, |d| d.view == Some(View::Chat) && d.input_enabled).await;

    type_text(&mut app, "hi").await;
    assert_eq!(app.input(), "hi");
    press(&mut app, KeyCode::Enter).await;
    assert_eq!(app.input(), "");
    settle(&mut app, |d| {
        d.transcript.last().map(|e| e.role) == Some(Role::Assistant)
    })
    .await;

    let screen = screen(&mut app);
    assert!(screen.contains("You: hi"), "{screen}");
    assert!(screen.contains("Hello from the bot"), "{screen}");
}

#[tokio::test]
async fn test_blank_input_is_not_sent() {
    let api = Arc::new(MockApi::new());
    let mut app = app_with(api.clone()).await;
    settle(&mut app, |d| d.mounted).await;

    press(&mut app, KeyCode::F(2)).await;
    settle(&mut app, |d| d.input_enabled).await;

    type_text(&mut app, "   ").await;
    press(&mut app, KeyCode::Enter).await;
    app.tick().await;

    assert_eq!(api.count(Endpoint::Chat), 0);
    assert!(app.display().transcript.is_empty());
}

#[tokio::test]
async fn test_enter_cancels_in_flight_request() {
    let api = Arc::new(MockApi::new());
    api.set_delay(Endpoint::Chat, Duration::from_secs(5));
    let mut app = app_with(api).await;
    settle(&mut app, |d| d.mounted).await;

    press(&mut app, KeyCode::F(2)).await;
    settle(&mut app, |d| d.input_enabled).await;

    type_text(&mut app, "slow").await;
    press(&mut app, KeyCode::Enter).await;
    settle(&mut app, |d| d.send_mode == SendMode::Cancel).await;
    assert!(screen(&mut app).contains("Stop"));

    press(&mut app, KeyCode::Enter).await;
    settle(&mut app, |d| d.send_mode == SendMode::Send).await;

    assert_eq!(
        app.display().transcript.last(),
        Some(&TranscriptEntry::assistant(STOPPED_TEXT))
    );
    assert!(!app.display().typing);
}

#[tokio::test]
async fn test_esc_closes_idle_panel() {
    let api = Arc::new(MockApi::new());
    let mut app = app_with(api).await;
    settle(&mut app, |d| d.mounted).await;

    press(&mut app, KeyCode::F(2)).await;
    settle(&mut app, |d| d.panel_open).await;

    press(&mut app, KeyCode::Esc).await;
    settle(&mut app, |d| !d.panel_open).await;
    assert!(app.is_running());

    // Esc on the closed launcher quits
    press(&mut app, KeyCode::Esc).await;
    assert!(!app.is_running());
}

#[tokio::test]
async fn test_ctrl_c_quits_from_any_view() {
    let api = Arc::new(MockApi::new());
    api.set_widget_config(email_form());
    let mut app = app_with(api).await;
    settle(&mut app, |d| d.mounted).await;

    press(&mut app, KeyCode::F(2)).await;
    settle(&mut app, |d| d.view == Some(View::Form)).await;

    app.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL))
        .await;
    assert!(!app.is_running());
}

#[tokio::test]
async fn test_header_uses_bot_name() {
    let api = Arc::new(MockApi::new());
    api.set_widget_config(WidgetConfig {
        bot_name: Some("Helper".into()),
        subheading: Some("We reply fast".into()),
        primary_color: Some("#ff0000".into()),
        widget_position: Some("left".into()),
        ..Default::default()
    });
    let mut app = app_with(api).await;
    settle(&mut app, |d| d.appearance.title == "Helper").await;

    press(&mut app, KeyCode::F(2)).await;
    settle(&mut app, |d| d.panel_open).await;

    assert!(app.display().appearance.left);
    let screen = screen(&mut app);
    assert!(screen.contains("Helper"), "{screen}");
    assert!(screen.contains("We reply fast"), "{screen}");
}
