use ratatui::widgets::ListState;
use renta_core::{
    AssistantGateway, Field, FormRecord, FormSession, Message, ProgressSnapshot, RoundTrip,
    SessionError, SessionOptions, SessionStore,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Chat,
    Review,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

/// Status-line message, replaced by the next one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub text: String,
    pub is_error: bool,
}

/// A running round-trip owns the session and hands it back with the result
pub type RoundTripTask = JoinHandle<(FormSession, Result<RoundTrip, SessionError>)>;

/// Everything needed to (re)open the subject's session
#[derive(Clone)]
pub struct SessionFactory {
    pub subject: String,
    pub store: Arc<dyn SessionStore>,
    pub gateway: Arc<dyn AssistantGateway>,
    pub options: SessionOptions,
}

impl SessionFactory {
    pub fn open(&self) -> Result<FormSession, SessionError> {
        FormSession::open(
            self.subject.clone(),
            self.store.clone(),
            self.gateway.clone(),
            self.options.clone(),
        )
    }
}

pub struct App {
    pub should_quit: bool,
    pub screen: Screen,
    pub input_mode: InputMode,

    factory: SessionFactory,
    /// `None` while a round-trip task holds the session
    session: Option<FormSession>,
    pub round_trip_task: Option<RoundTripTask>,
    pub loading: bool,
    pub animation_frame: u8,
    /// User text of the round-trip in flight
    pub in_flight: Option<String>,

    // Last known session state, kept for drawing while the session is away
    pub messages: Vec<Message>,
    pub form: FormRecord,
    pub progress: ProgressSnapshot,
    pub synced: bool,
    pub gateway_name: String,

    // Chat state
    pub chat_input: String,
    pub chat_cursor: usize,
    pub chat_scroll: u16,
    pub chat_height: u16,
    pub chat_width: u16,

    // Review state
    pub review_fields: Vec<Field>,
    pub review_state: ListState,
    pub edit_input: String,
    pub edit_cursor: usize,

    pub notice: Option<Notice>,
    pub show_welcome: bool,
    pub export_path: PathBuf,
}

impl App {
    pub fn new(factory: SessionFactory, export_path: PathBuf) -> Result<Self, SessionError> {
        let session = factory.open()?;
        let show_welcome = match session.onboarding_completed() {
            Ok(done) => !done,
            Err(e) => {
                tracing::warn!("Could not read onboarding flag: {}", e);
                false
            }
        };

        let mut review_state = ListState::default();
        review_state.select(Some(0));

        let mut app = Self {
            should_quit: false,
            screen: Screen::Chat,
            input_mode: InputMode::Editing,
            factory,
            session: None,
            round_trip_task: None,
            loading: false,
            animation_frame: 0,
            in_flight: None,
            messages: Vec::new(),
            form: FormRecord::new(),
            progress: renta_core::snapshot(&FormRecord::new()),
            synced: true,
            gateway_name: String::new(),
            chat_input: String::new(),
            chat_cursor: 0,
            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            review_fields: Field::all().collect(),
            review_state,
            edit_input: String::new(),
            edit_cursor: 0,
            notice: None,
            show_welcome,
            export_path,
        };
        app.restore_session(session);
        app.scroll_chat_to_bottom();
        Ok(app)
    }

    fn restore_session(&mut self, session: FormSession) {
        self.messages = session.visible_messages().cloned().collect();
        self.form = session.form().clone();
        self.progress = session.progress();
        self.synced = session.is_synced();
        self.gateway_name = session.gateway_name();
        self.session = Some(session);
    }

    fn refresh(&mut self) {
        if let Some(session) = self.session.take() {
            self.restore_session(session);
        }
    }

    pub fn info(&mut self, text: impl Into<String>) {
        self.notice = Some(Notice {
            text: text.into(),
            is_error: false,
        });
    }

    pub fn error(&mut self, err: &SessionError) {
        tracing::warn!("{}", err);
        self.notice = Some(Notice {
            text: err.notice().to_string(),
            is_error: true,
        });
    }

    /// The session, unless a round-trip currently owns it
    fn session_mut(&mut self) -> Option<&mut FormSession> {
        if self.session.is_none() {
            self.notice = Some(Notice {
                text: "Espera a que el asistente termine de responder".to_string(),
                is_error: true,
            });
        }
        self.session.as_mut()
    }

    pub fn dismiss_welcome(&mut self) {
        self.show_welcome = false;
        let result = match self.session.as_ref() {
            Some(session) => session.complete_onboarding(),
            None => return,
        };
        if let Err(e) = result {
            self.error(&e);
        }
    }

    // Chat

    /// Start a round-trip with the chat input
    pub fn submit_chat(&mut self) {
        if self.round_trip_task.is_some() {
            return;
        }
        let text = self.chat_input.trim().to_string();
        if text.is_empty() {
            self.error(&SessionError::EmptyMessage);
            return;
        }
        let Some(mut session) = self.session.take() else {
            return;
        };

        self.chat_input.clear();
        self.chat_cursor = 0;
        self.notice = None;
        self.in_flight = Some(text.clone());
        self.loading = true;
        self.round_trip_task = Some(tokio::spawn(async move {
            let result = session.send(&text).await;
            (session, result)
        }));
        self.scroll_chat_to_bottom();
    }

    /// Ask again for a reply to a message that never got one
    pub fn retry_pending(&mut self) {
        if self.round_trip_task.is_some() {
            return;
        }
        let Some(session) = self.session.as_ref() else {
            return;
        };
        if session.transcript().unanswered().is_none() {
            self.error(&SessionError::NothingPending);
            return;
        }
        let Some(mut session) = self.session.take() else {
            return;
        };

        self.notice = None;
        self.loading = true;
        self.round_trip_task = Some(tokio::spawn(async move {
            let result = session.retry().await;
            (session, result)
        }));
        self.scroll_chat_to_bottom();
    }

    /// Collect the round-trip result once the task has finished
    pub async fn poll_round_trip(&mut self) {
        let finished = self
            .round_trip_task
            .as_ref()
            .is_some_and(|task| task.is_finished());
        if !finished {
            return;
        }
        let Some(task) = self.round_trip_task.take() else {
            return;
        };
        self.loading = false;
        self.in_flight = None;

        match task.await {
            Ok((session, result)) => {
                self.restore_session(session);
                self.apply_round_trip(result);
            }
            Err(e) => {
                tracing::error!("Round-trip task failed: {}", e);
                match self.factory.open() {
                    Ok(session) => {
                        self.restore_session(session);
                        self.notice = Some(Notice {
                            text: "No se pudo procesar tu mensaje".to_string(),
                            is_error: true,
                        });
                    }
                    Err(e) => self.error(&e),
                }
            }
        }
        self.scroll_chat_to_bottom();
    }

    fn apply_round_trip(&mut self, result: Result<RoundTrip, SessionError>) {
        match result {
            Ok(round_trip) => {
                if round_trip.changed.is_empty() {
                    self.notice = None;
                } else {
                    let labels: Vec<&str> = round_trip.changed.iter().map(|f| f.label()).collect();
                    self.info(format!("Formulario actualizado: {}", labels.join(", ")));
                }
            }
            Err(err) => {
                if let SessionError::NotSent { text, .. } = &err {
                    if self.chat_input.is_empty() {
                        self.chat_input = text.clone();
                        self.chat_cursor = text.chars().count();
                    }
                }
                self.error(&err);
            }
        }
    }

    /// Retry writes a previous failure left pending
    pub fn sync(&mut self) {
        let Some(session) = self.session_mut() else {
            return;
        };
        let result = session.sync();
        self.refresh();
        match result {
            Ok(()) => self.info("Cambios guardados"),
            Err(e) => self.error(&e),
        }
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.loading {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    /// Scroll chat to bottom so the newest message is visible
    pub fn scroll_chat_to_bottom(&mut self) {
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let mut total_lines: u16 = 0;
        let pending = self.in_flight.iter().map(String::as_str);
        for content in self.messages.iter().map(|m| m.content.as_str()).chain(pending) {
            total_lines += 1; // "Tú:" / "Asistente:"
            for line in content.lines() {
                let char_count = line.chars().count();
                total_lines += ((char_count / wrap_width) + 1) as u16;
            }
            total_lines += 1;
        }
        if self.loading {
            total_lines += 2;
        }

        let visible_height = if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        };

        self.chat_scroll = total_lines.saturating_sub(visible_height);
    }

    pub fn scroll_chat_up(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_sub(1);
    }

    pub fn scroll_chat_down(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_add(1);
    }

    // Review

    pub fn selected_field(&self) -> Option<Field> {
        self.review_state
            .selected()
            .and_then(|i| self.review_fields.get(i).copied())
    }

    pub fn review_nav_down(&mut self) {
        let len = self.review_fields.len();
        if len > 0 {
            let i = self.review_state.selected().unwrap_or(0);
            self.review_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn review_nav_up(&mut self) {
        let i = self.review_state.selected().unwrap_or(0);
        self.review_state.select(Some(i.saturating_sub(1)));
    }

    /// Start editing the selected field, prefilled with its value
    pub fn begin_edit(&mut self) {
        let Some(field) = self.selected_field() else {
            return;
        };
        if self.session_mut().is_none() {
            return;
        }
        self.edit_input = self.form.get(field).unwrap_or_default().to_string();
        self.edit_cursor = self.edit_input.chars().count();
        self.input_mode = InputMode::Editing;
    }

    pub fn cancel_edit(&mut self) {
        self.edit_input.clear();
        self.edit_cursor = 0;
        self.input_mode = InputMode::Normal;
    }

    /// Apply the edit buffer to the selected field
    pub fn commit_edit(&mut self) {
        let Some(field) = self.selected_field() else {
            return;
        };
        let value = self.edit_input.clone();
        let Some(session) = self.session_mut() else {
            return;
        };
        let result = session.edit_field(field, &value);
        self.refresh();
        match result {
            Ok(()) => self.cancel_edit(),
            Err(e) => self.error(&e),
        }
    }

    pub fn save_form(&mut self) {
        let Some(session) = self.session_mut() else {
            return;
        };
        let result = session.save_form();
        self.refresh();
        match result {
            Ok(()) => self.info("Formulario guardado"),
            Err(e) => self.error(&e),
        }
    }

    pub fn export_pdf(&mut self) {
        let path = self.export_path.clone();
        let Some(session) = self.session_mut() else {
            return;
        };
        match session.export_pdf(&path) {
            Ok(()) => {
                tracing::info!("Exported PDF to {:?}", path);
                self.info(format!("PDF guardado en {}", path.display()));
            }
            Err(e) => {
                tracing::warn!("PDF export failed: {:#}", e);
                self.notice = Some(Notice {
                    text: "No se pudo generar el PDF".to_string(),
                    is_error: true,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use renta_core::{MemoryStore, OllamaClient};
    use std::time::Duration;
    use tempfile::TempDir;

    fn factory() -> SessionFactory {
        SessionFactory {
            subject: "local".to_string(),
            store: Arc::new(MemoryStore::new()),
            // Never called by these tests
            gateway: Arc::new(OllamaClient::new(
                "http://127.0.0.1:9",
                "llama3.2:latest",
                Duration::from_secs(1),
            )),
            options: SessionOptions::default(),
        }
    }

    fn app(dir: &TempDir) -> App {
        App::new(factory(), dir.path().join("declaracion.pdf")).unwrap()
    }

    #[test]
    fn test_new_app_shows_seeded_welcome() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir);

        assert_eq!(app.messages.len(), 1);
        assert!(app.show_welcome);
        assert_eq!(app.progress.percent_complete, 0);
    }

    #[test]
    fn test_welcome_is_shown_once() {
        let dir = TempDir::new().unwrap();
        let factory = factory();
        let mut first = App::new(factory.clone(), dir.path().join("a.pdf")).unwrap();
        first.dismiss_welcome();

        let second = App::new(factory, dir.path().join("a.pdf")).unwrap();
        assert!(!second.show_welcome);
    }

    #[test]
    fn test_blank_chat_input_is_not_sent() {
        let dir = TempDir::new().unwrap();
        let mut app = app(&dir);
        app.chat_input = "   ".to_string();

        app.submit_chat();

        assert!(app.round_trip_task.is_none());
        assert!(app.notice.as_ref().is_some_and(|n| n.is_error));
    }

    #[test]
    fn test_review_edit_updates_progress() {
        let dir = TempDir::new().unwrap();
        let mut app = app(&dir);
        app.screen = Screen::Review;
        app.review_state.select(Some(1)); // Nombre

        app.begin_edit();
        app.edit_input = "Lucía".to_string();
        app.commit_edit();

        assert_eq!(app.form.get(Field::FirstName), Some("Lucía"));
        assert_eq!(app.progress.percent_complete, 10);
        assert_eq!(app.input_mode, InputMode::Normal);
        assert!(!app.synced);

        app.save_form();
        assert!(app.synced);
    }

    #[test]
    fn test_invalid_amount_keeps_editing() {
        let dir = TempDir::new().unwrap();
        let mut app = app(&dir);
        let index = app
            .review_fields
            .iter()
            .position(|f| *f == Field::EmploymentIncome)
            .unwrap();
        app.review_state.select(Some(index));

        app.begin_edit();
        app.edit_input = "veinte mil".to_string();
        app.commit_edit();

        assert_eq!(app.input_mode, InputMode::Editing);
        assert!(!app.form.is_set(Field::EmploymentIncome));
        assert!(app.notice.as_ref().is_some_and(|n| n.is_error));
    }

    #[test]
    fn test_export_writes_pdf() {
        let dir = TempDir::new().unwrap();
        let mut app = app(&dir);

        app.export_pdf();

        assert!(dir.path().join("declaracion.pdf").exists());
        assert!(app.notice.as_ref().is_some_and(|n| !n.is_error));
    }
}
