//! Interactive terminal front end.
//!
//! Owns the compose buffer and the session manager and maps console
//! commands onto the pipelines. Sends are serialized by construction:
//! the loop awaits each exchange before reading the next line.

use std::io::Write as _;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use chrono::Local;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::error;

use crate::api::{HttpApi, Transcriber};
use crate::audio::AudioCapturer;
use crate::auth::{AuthClient, SessionToken};
use crate::export;
use crate::session::{SendOutcome, SessionManager};
use crate::store::StateStore;
use crate::transcript::{Author, Message};

const RESET: &str = "\x1b[0m";

const LOGIN_PROMPT: &str = "Please login to access the chatbot.";

const HELP: &str = "\
Commands:
  /new          start a new chat
  /history      list saved chats
  /open <n>     load saved chat n
  /record       record 5s of audio into the compose buffer
  /send         send the compose buffer
  /export       export the current chat to PDF
  /dark         toggle dark mode
  /signup       create an account
  /login        log in
  /logout       log out
  /quit         exit
Anything else is sent as a chat message.";

pub(crate) struct App<S: StateStore> {
    session: SessionManager<S>,
    api: HttpApi,
    auth: AuthClient,
    capturer: Box<dyn AudioCapturer>,
    transcriber: Box<dyn Transcriber>,
    token: Option<SessionToken>,
    compose: String,
    capture_duration: Duration,
    export_dir: PathBuf,
}

impl<S: StateStore> App<S> {
    pub(crate) fn new(
        session: SessionManager<S>,
        api: HttpApi,
        auth: AuthClient,
        capturer: Box<dyn AudioCapturer>,
        transcriber: Box<dyn Transcriber>,
        capture_duration: Duration,
    ) -> Self {
        let export_dir = dirs::download_dir()
            .or_else(dirs::document_dir)
            .unwrap_or_else(|| PathBuf::from("."));
        Self {
            session,
            api,
            auth,
            capturer,
            transcriber,
            token: None,
            compose: String::new(),
            capture_duration,
            export_dir,
        }
    }

    pub(crate) async fn run(&mut self) -> Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        println!("Parley - type /help for commands.");
        if self.session.history_len() > 0 {
            println!("{} saved chat(s) restored.", self.session.history_len());
        }

        loop {
            print!("> ");
            std::io::stdout().flush()?;
            let Some(line) = lines.next_line().await? else {
                break;
            };
            let line = line.trim().to_string();

            match line.split_whitespace().next() {
                Some("/quit") | Some("/exit") => break,
                Some("/help") => println!("{HELP}"),
                Some("/new") => {
                    self.session.start_new();
                    println!("Started a new chat.");
                }
                Some("/history") => self.list_history(),
                Some("/open") => self.open_chat(&line),
                Some("/record") => self.record_voice().await,
                Some("/send") => self.send_compose().await,
                Some("/export") => self.export(),
                Some("/dark") => {
                    let dark = self.session.toggle_dark_mode();
                    println!("{} mode enabled.", if dark { "Dark" } else { "Light" });
                }
                Some("/signup") => self.signup(&mut lines).await,
                Some("/login") => self.login(&mut lines).await,
                Some("/logout") => {
                    self.token = None;
                    println!("Logged out.");
                }
                Some(cmd) if cmd.starts_with('/') => {
                    println!("Unknown command {cmd}; try /help.");
                }
                _ => self.send(&line).await,
            }
        }
        Ok(())
    }

    /// Dispatch the compose buffer. The buffer is drained only once the
    /// login precondition holds, so a drafted transcription survives a
    /// logged-out attempt.
    async fn send_compose(&mut self) {
        if self.token.is_none() {
            println!("{LOGIN_PROMPT}");
            return;
        }
        let text = std::mem::take(&mut self.compose);
        self.send(&text).await;
    }

    /// Run the send pipeline for `text` and render what it appended.
    async fn send(&mut self, text: &str) {
        if text.trim().is_empty() {
            return;
        }
        let Some(token) = &self.token else {
            // Precondition, not part of the pipeline: an absent token
            // sends the user to the login flow instead of the backend.
            println!("{LOGIN_PROMPT}");
            return;
        };

        self.render_message(&Message::user(text.trim()));
        let outcome = self.session.send(text, &self.api, token.as_str()).await;
        if outcome != SendOutcome::Ignored {
            if let Some(reply) = self.session.active().last() {
                self.render_message(reply);
            }
        }
    }

    fn list_history(&self) {
        if self.session.history_len() == 0 {
            println!("No saved chats yet.");
            return;
        }
        for (i, chat) in self.session.history().iter().enumerate() {
            let marker = if self.session.selected() == Some(i) {
                "*"
            } else {
                " "
            };
            println!("{marker} Chat {} ({} messages)", i + 1, chat.len());
        }
    }

    fn open_chat(&mut self, line: &str) {
        let Some(n) = line
            .split_whitespace()
            .nth(1)
            .and_then(|s| s.parse::<usize>().ok())
            .filter(|&n| n > 0)
        else {
            println!("Usage: /open <n>");
            return;
        };
        match self.session.load(n - 1) {
            Ok(()) => {
                println!("--- Chat {n} ---");
                for message in self.session.active().iter() {
                    self.render_message(message);
                }
            }
            Err(e) => println!("{e}"),
        }
    }

    /// Record a bounded clip and place its transcription in the
    /// compose buffer. Failures are logged and leave the buffer alone.
    async fn record_voice(&mut self) {
        println!(
            "Recording for {} seconds...",
            self.capture_duration.as_secs()
        );
        let clip = match self.capturer.record(self.capture_duration).await {
            Ok(clip) => clip,
            Err(e) => {
                error!("Error capturing audio: {}", e);
                return;
            }
        };
        match self.transcriber.transcribe(clip).await {
            Ok(text) => {
                println!("Transcribed: {text}");
                println!("Use /send to send it.");
                self.compose = text;
            }
            Err(e) => {
                error!("Transcription error: {}", e);
            }
        }
    }

    fn export(&self) {
        if self.session.active().is_empty() {
            println!("Nothing to export.");
            return;
        }
        match export::export_pdf(&self.export_dir, self.session.active(), Local::now()) {
            Ok(path) => println!("Exported to {}", path.display()),
            Err(e) => error!("PDF export failed: {:#}", e),
        }
    }

    async fn signup(&mut self, lines: &mut Lines<BufReader<Stdin>>) {
        let Some((username, password)) = read_credentials(lines).await else {
            return;
        };
        match self.auth.signup(&username, &password).await {
            Ok(()) => println!("Account created. Use /login to sign in."),
            Err(e) => println!("Signup failed: {e}"),
        }
    }

    async fn login(&mut self, lines: &mut Lines<BufReader<Stdin>>) {
        let Some((username, password)) = read_credentials(lines).await else {
            return;
        };
        match self.auth.login(&username, &password).await {
            Ok(token) => {
                self.token = Some(token);
                println!("Logged in as {username}.");
            }
            Err(e) => println!("Login failed: {e}"),
        }
    }

    fn render_message(&self, message: &Message) {
        let color = match (message.author, self.session.dark_mode()) {
            (Author::User, true) => "\x1b[96m",
            (Author::User, false) => "\x1b[36m",
            (Author::Bot, true) => "\x1b[92m",
            (Author::Bot, false) => "\x1b[32m",
        };
        println!("{color}{}:{RESET} {}", message.author, message.text);
    }
}

async fn read_credentials(lines: &mut Lines<BufReader<Stdin>>) -> Option<(String, String)> {
    let username = read_field(lines, "Username").await?;
    let password = read_field(lines, "Password").await?;
    Some((username, password))
}

async fn read_field(lines: &mut Lines<BufReader<Stdin>>, label: &str) -> Option<String> {
    print!("{label}: ");
    let _ = std::io::stdout().flush();
    let value = lines.next_line().await.ok()??.trim().to_string();
    if value.is_empty() {
        println!("{label} is required.");
        return None;
    }
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiError;
    use crate::audio::{AudioClip, CaptureError};
    use crate::store::MemoryStore;
    use async_trait::async_trait;

    struct StubCapturer;

    #[async_trait]
    impl AudioCapturer for StubCapturer {
        async fn record(&self, _duration: Duration) -> Result<AudioClip, CaptureError> {
            Ok(AudioClip {
                samples: vec![0; 160],
                sample_rate: 16000,
            })
        }
    }

    struct FailingCapturer;

    #[async_trait]
    impl AudioCapturer for FailingCapturer {
        async fn record(&self, _duration: Duration) -> Result<AudioClip, CaptureError> {
            Err(CaptureError::DeviceUnavailable)
        }
    }

    struct ScriptedTranscriber(Box<dyn Fn() -> Result<String, ApiError> + Send + Sync>);

    impl ScriptedTranscriber {
        fn returning(text: &str) -> Self {
            let text = text.to_string();
            Self(Box::new(move || Ok(text.clone())))
        }

        fn failing() -> Self {
            Self(Box::new(|| {
                Err(ApiError::NetworkUnreachable("connection refused".into()))
            }))
        }
    }

    #[async_trait]
    impl Transcriber for ScriptedTranscriber {
        async fn transcribe(&self, _clip: AudioClip) -> Result<String, ApiError> {
            (self.0)()
        }
    }

    fn app_with(transcriber: ScriptedTranscriber) -> App<MemoryStore> {
        App::new(
            SessionManager::restore(MemoryStore::new()),
            HttpApi::new("http://127.0.0.1:1").expect("Failed to create client"),
            AuthClient::new("http://127.0.0.1:1").expect("Failed to create client"),
            Box::new(StubCapturer),
            Box::new(transcriber),
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn test_transcription_replaces_compose_buffer() {
        let mut app = app_with(ScriptedTranscriber::returning("what is rust"));
        app.compose = "old draft".to_string();

        app.record_voice().await;

        assert_eq!(app.compose, "what is rust");
    }

    #[tokio::test]
    async fn test_transcription_failure_leaves_compose_buffer() {
        let mut app = app_with(ScriptedTranscriber::failing());
        app.compose = "old draft".to_string();

        app.record_voice().await;

        assert_eq!(app.compose, "old draft");
    }

    #[tokio::test]
    async fn test_capture_failure_leaves_compose_buffer() {
        let mut app = app_with(ScriptedTranscriber::returning("never reached"));
        app.capturer = Box::new(FailingCapturer);
        app.compose = "old draft".to_string();

        app.record_voice().await;

        assert_eq!(app.compose, "old draft");
    }

    #[tokio::test]
    async fn test_send_while_logged_out_keeps_compose_buffer() {
        let mut app = app_with(ScriptedTranscriber::returning("drafted by voice"));

        app.record_voice().await;
        assert_eq!(app.compose, "drafted by voice");

        app.send_compose().await;

        assert_eq!(app.compose, "drafted by voice");
        assert!(app.session.active().is_empty());
    }
}
