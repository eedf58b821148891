use anyhow::Result;
use ratatui::widgets::ListState;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedSender;

use crate::ai::{ClaudeClient, OllamaClient, OpenAIClient};
use crate::auth::{AuthClient, AuthOutcome, AuthService, Session, SignUpOutcome};
use crate::config::Config;
use crate::insight::{
    ContextData, Insight, InsightKind, InsightService, Parallel, StudyRequest, WordStudy,
};
use crate::provider::Provider;
use crate::sermon::{EditorBuffer, TagSet, VersionList, DEFAULT_TAG_SUGGESTIONS};
use crate::state::FetchState;
use crate::tui::AppEvent;

pub const TRANSLATIONS: &[&str] = &["ESV", "KJV", "NIV", "NASB", "RVR1960"];
pub const LANGUAGES: &[&str] = &["English", "Español"];

/// How long the "Saved" confirmation stays up before reverting.
pub const SAVED_INDICATOR: Duration = Duration::from_secs(2);

const AUTH_FAILURE: &str = "Authentication request failed. Please try again.";
const AUTH_NOT_CONFIGURED: &str =
    "Auth service not configured. Set auth_url and auth_anon_key in the config file.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Study,
    Editor,
    Versions,
    Account,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

/// What j/k and Enter act on within the Study screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StudyFocus {
    Panels,
    References,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountField {
    Email,
    Password,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub screen: Screen,
    pub input_mode: InputMode,

    // Study state
    pub passage_input: String,
    pub passage_cursor: usize,
    pub translation: String,
    pub language: String,
    pub panel: InsightKind,
    pub study_focus: StudyFocus,
    pub panel_scroll: u16,
    pub panel_height: u16,
    pub panel_total_lines: u16,

    // Analysis panel results
    pub commentary: FetchState<String>,
    pub lexicon: FetchState<Vec<WordStudy>>,
    pub context: FetchState<ContextData>,
    pub parallels: FetchState<Vec<Parallel>>,
    pub commentary_refs: Vec<String>,
    pub references_state: ListState,

    // Sermon state
    pub editor: EditorBuffer,
    pub versions: VersionList,
    pub version_state: ListState,
    pub tags: TagSet,
    pub tag_pool: Vec<String>,
    pub tag_state: ListState,
    pub show_tag_panel: bool,
    pub show_tag_input: bool,
    pub tag_input: String,
    pub tag_input_cursor: usize,
    pub show_save_input: bool,
    pub save_input: String,
    pub save_input_cursor: usize,
    pub saved_at: Option<Instant>,

    // Account state
    pub auth: Option<AuthService>,
    pub session: Option<Session>,
    pub account: FetchState<String>,
    pub account_field: AccountField,
    pub account_email: String,
    pub account_password: String,
    pub account_cursor: usize,

    // Animation state
    pub animation_frame: u8,

    // Model picker state
    pub show_model_picker: bool,
    pub available_models: Vec<String>,
    pub model_picker_state: ListState,

    // Provider state
    pub current_provider: Provider,
    pub selected_model: String,
    pub show_provider_picker: bool,
    pub provider_picker_state: ListState,

    // API key input state
    pub show_api_key_input: bool,
    pub api_key_input: String,
    pub api_key_input_cursor: usize,
    pub api_key_target_provider: Option<Provider>,

    // Services
    pub insight: InsightService,
    events: UnboundedSender<AppEvent>,
}

impl App {
    pub fn new(config: Config, events: UnboundedSender<AppEvent>) -> Result<Self> {
        let current_provider = config
            .provider
            .as_deref()
            .and_then(Provider::from_str)
            .unwrap_or_default();

        // API keys: environment first, then config
        let claude_key = std::env::var("ANTHROPIC_API_KEY")
            .ok()
            .or_else(|| config.claude_api_key.clone());
        let claude = claude_key.as_deref().map(ClaudeClient::new);

        let openai_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .or_else(|| config.openai_api_key.clone());
        let openai = openai_key.as_deref().map(OpenAIClient::new);

        let insight =
            InsightService::new(OllamaClient::new("http://localhost:11434"), claude, openai)?;

        let selected_model = config
            .default_model
            .clone()
            .unwrap_or_else(|| "gemma3:latest".to_string());

        let auth = match (&config.auth_url, &config.auth_anon_key) {
            (Some(url), Some(key)) => Some(AuthService::new(AuthClient::new(url, key))),
            _ => None,
        };

        let tag_pool = if config.tag_suggestions.is_empty() {
            DEFAULT_TAG_SUGGESTIONS
                .iter()
                .map(|s| s.to_string())
                .collect()
        } else {
            config.tag_suggestions.clone()
        };

        Ok(Self {
            should_quit: false,
            screen: Screen::Study,
            input_mode: InputMode::Normal,

            passage_input: String::new(),
            passage_cursor: 0,
            translation: config.translation.unwrap_or_else(|| "ESV".to_string()),
            language: config.language.unwrap_or_else(|| "English".to_string()),
            panel: InsightKind::Commentary,
            study_focus: StudyFocus::Panels,
            panel_scroll: 0,
            panel_height: 0,
            panel_total_lines: 0,

            commentary: FetchState::new(),
            lexicon: FetchState::new(),
            context: FetchState::new(),
            parallels: FetchState::new(),
            commentary_refs: Vec::new(),
            references_state: ListState::default(),

            editor: EditorBuffer::new(),
            versions: VersionList::new(),
            version_state: ListState::default(),
            tags: TagSet::new(),
            tag_pool,
            tag_state: ListState::default(),
            show_tag_panel: false,
            show_tag_input: false,
            tag_input: String::new(),
            tag_input_cursor: 0,
            show_save_input: false,
            save_input: String::new(),
            save_input_cursor: 0,
            saved_at: None,

            auth,
            session: None,
            account: FetchState::new(),
            account_field: AccountField::Email,
            account_email: String::new(),
            account_password: String::new(),
            account_cursor: 0,

            animation_frame: 0,

            show_model_picker: false,
            available_models: Vec::new(),
            model_picker_state: ListState::default(),

            current_provider,
            selected_model,
            show_provider_picker: false,
            provider_picker_state: ListState::default(),

            show_api_key_input: false,
            api_key_input: String::new(),
            api_key_input_cursor: 0,
            api_key_target_provider: None,

            insight,
            events,
        })
    }

    // ------------------------------------------------------------------
    // Study panels
    // ------------------------------------------------------------------

    /// Kick off the focused panel's fetch. One async call per trigger; the
    /// token keeps a re-trigger from being overwritten by the older call.
    pub fn request_insight(&mut self, kind: InsightKind) {
        let passage = self.passage_input.trim().to_string();
        if passage.is_empty() {
            return;
        }

        let token = match kind {
            InsightKind::Commentary => {
                self.commentary_refs.clear();
                self.references_state.select(None);
                self.study_focus = StudyFocus::Panels;
                self.commentary.begin()
            }
            InsightKind::Lexicon => self.lexicon.begin(),
            InsightKind::Context => self.context.begin(),
            InsightKind::Parallels => self.parallels.begin(),
        };
        self.panel_scroll = 0;

        let request = StudyRequest {
            passage,
            translation: self.translation.clone(),
            language: self.language.clone(),
        };
        let service = self.insight.clone();
        let provider = self.current_provider;
        let model = self.selected_model.clone();
        let events = self.events.clone();

        tokio::spawn(async move {
            let result = service.fetch(provider, &model, kind, &request).await;
            let _ = events.send(AppEvent::Insight {
                kind,
                token,
                result,
            });
        });
    }

    /// Commit a panel completion, unless a newer request has superseded it.
    pub fn settle_insight(&mut self, kind: InsightKind, token: u64, result: Result<Insight>) {
        let outcome = result.map_err(|e| {
            tracing::error!(kind = kind.title(), "insight request failed: {e:#}");
            kind.failure_message().to_string()
        });

        let committed = match (kind, outcome) {
            (InsightKind::Commentary, Ok(Insight::Commentary(text))) => {
                self.commentary.settle(token, Ok(text))
            }
            (InsightKind::Commentary, Err(msg)) => self.commentary.settle(token, Err(msg)),
            (InsightKind::Lexicon, Ok(Insight::Lexicon(words))) => {
                self.lexicon.settle(token, Ok(words))
            }
            (InsightKind::Lexicon, Err(msg)) => self.lexicon.settle(token, Err(msg)),
            (InsightKind::Context, Ok(Insight::Context(data))) => {
                self.context.settle(token, Ok(data))
            }
            (InsightKind::Context, Err(msg)) => self.context.settle(token, Err(msg)),
            (InsightKind::Parallels, Ok(Insight::Parallels(passages))) => {
                self.parallels.settle(token, Ok(passages))
            }
            (InsightKind::Parallels, Err(msg)) => self.parallels.settle(token, Err(msg)),
            (kind, Ok(_)) => {
                tracing::warn!(kind = kind.title(), "mismatched insight payload");
                false
            }
        };

        if !committed {
            tracing::debug!(kind = kind.title(), token, "dropped stale insight completion");
            return;
        }

        if kind == InsightKind::Commentary {
            let refs = self
                .commentary
                .data()
                .map(|text| self.insight.extract_references(text));
            if let Some(refs) = refs {
                self.commentary_refs = refs;
            }
        }
    }

    pub fn select_panel(&mut self, kind: InsightKind) {
        self.panel = kind;
        self.panel_scroll = 0;
        self.study_focus = StudyFocus::Panels;
    }

    pub fn panel_next(&mut self) {
        let order = InsightKind::all();
        let idx = order.iter().position(|k| *k == self.panel).unwrap_or(0);
        self.panel = order[(idx + 1) % order.len()];
        self.panel_scroll = 0;
        self.study_focus = StudyFocus::Panels;
    }

    pub fn panel_prev(&mut self) {
        let order = InsightKind::all();
        let idx = order.iter().position(|k| *k == self.panel).unwrap_or(0);
        self.panel = order[(idx + order.len() - 1) % order.len()];
        self.panel_scroll = 0;
        self.study_focus = StudyFocus::Panels;
    }

    pub fn panel_scroll_down(&mut self) {
        if self.panel_scroll < self.panel_total_lines.saturating_sub(self.panel_height) {
            self.panel_scroll = self.panel_scroll.saturating_add(1);
        }
    }

    pub fn panel_scroll_up(&mut self) {
        self.panel_scroll = self.panel_scroll.saturating_sub(1);
    }

    pub fn cycle_translation(&mut self) {
        let idx = TRANSLATIONS
            .iter()
            .position(|t| *t == self.translation)
            .unwrap_or(0);
        self.translation = TRANSLATIONS[(idx + 1) % TRANSLATIONS.len()].to_string();
    }

    pub fn cycle_language(&mut self) {
        let idx = LANGUAGES
            .iter()
            .position(|l| *l == self.language)
            .unwrap_or(0);
        self.language = LANGUAGES[(idx + 1) % LANGUAGES.len()].to_string();
    }

    pub fn references_nav_down(&mut self) {
        let len = self.commentary_refs.len();
        if len > 0 {
            let i = self.references_state.selected().unwrap_or(0);
            self.references_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn references_nav_up(&mut self) {
        let i = self.references_state.selected().unwrap_or(0);
        self.references_state.select(Some(i.saturating_sub(1)));
    }

    /// Use the selected reference as the next passage to study.
    pub fn adopt_selected_reference(&mut self) {
        if let Some(i) = self.references_state.selected() {
            if let Some(reference) = self.commentary_refs.get(i) {
                self.passage_input = reference.clone();
                self.passage_cursor = self.passage_input.chars().count();
                self.study_focus = StudyFocus::Panels;
            }
        }
    }

    /// Render the focused panel's data as plain text, for copying or for
    /// appending into the sermon draft.
    pub fn focused_panel_text(&self) -> Option<String> {
        match self.panel {
            InsightKind::Commentary => self.commentary.data().cloned(),
            InsightKind::Lexicon => self.lexicon.data().map(|words| {
                words
                    .iter()
                    .map(|w| {
                        format!(
                            "{} ({} {}, {}): {} — {}",
                            w.word, w.language, w.original, w.transliteration, w.definition,
                            w.significance
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            }),
            InsightKind::Context => self.context.data().map(|c| {
                format!(
                    "Period: {}\nSetting: {}\nAuthor and audience: {}\nCultural notes: {}\nRelevance: {}",
                    c.period, c.setting, c.author_and_audience, c.cultural_notes, c.relevance
                )
            }),
            InsightKind::Parallels => self.parallels.data().map(|passages| {
                passages
                    .iter()
                    .map(|p| format!("{} — {} ({})", p.reference, p.summary, p.connection))
                    .collect::<Vec<_>>()
                    .join("\n")
            }),
        }
    }

    /// Append the focused panel's result into the sermon draft.
    pub fn insert_insight_into_sermon(&mut self) {
        if let Some(text) = self.focused_panel_text() {
            let block = format!("## {} — {}\n{}", self.panel.title(), self.passage_input, text);
            self.editor.append_block(&block);
        }
    }

    // ------------------------------------------------------------------
    // Sermon: save, versions, tags
    // ------------------------------------------------------------------

    /// Hand the buffer content, unmodified, to the version list and show
    /// the timed confirmation.
    pub fn save_sermon(&mut self, change_description: Option<String>) {
        let content = self.editor.content();
        self.versions.record(&content, change_description);
        self.editor.mark_saved();
        self.saved_at = Some(Instant::now());
        if self.version_state.selected().is_none() && !self.versions.is_empty() {
            self.version_state.select(Some(0));
        }
    }

    pub fn saved_indicator_active(&self) -> bool {
        self.saved_at
            .map(|at| at.elapsed() < SAVED_INDICATOR)
            .unwrap_or(false)
    }

    pub fn restore_version(&mut self, index: usize) {
        if let Some(version) = self.versions.get(index) {
            let content = version.content.clone();
            self.editor.set_content(&content);
            self.screen = Screen::Editor;
        }
    }

    pub fn delete_version(&mut self, index: usize) {
        if self.versions.remove(index).is_some() {
            if self.versions.is_empty() {
                self.version_state.select(None);
            } else if index >= self.versions.len() {
                self.version_state.select(Some(self.versions.len() - 1));
            }
        }
    }

    pub fn version_nav_down(&mut self) {
        let len = self.versions.len();
        if len > 0 {
            let i = self.version_state.selected().unwrap_or(0);
            self.version_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn version_nav_up(&mut self) {
        let i = self.version_state.selected().unwrap_or(0);
        self.version_state.select(Some(i.saturating_sub(1)));
    }

    pub fn tag_nav_down(&mut self) {
        let len = self.tags.tags().len();
        if len > 0 {
            let i = self.tag_state.selected().unwrap_or(0);
            self.tag_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn tag_nav_up(&mut self) {
        let i = self.tag_state.selected().unwrap_or(0);
        self.tag_state.select(Some(i.saturating_sub(1)));
    }

    pub fn add_tag_from_input(&mut self) {
        let raw = self.tag_input.clone();
        self.tags.add(&raw);
        self.tag_input.clear();
        self.tag_input_cursor = 0;
        if self.tag_state.selected().is_none() && !self.tags.tags().is_empty() {
            self.tag_state.select(Some(0));
        }
    }

    pub fn add_suggested_tag(&mut self, index: usize) {
        let suggestion = self
            .tags
            .suggestions(&self.tag_pool)
            .get(index)
            .map(|s| s.to_string());
        if let Some(tag) = suggestion {
            self.tags.add(&tag);
            if self.tag_state.selected().is_none() {
                self.tag_state.select(Some(0));
            }
        }
    }

    pub fn remove_selected_tag(&mut self) {
        if let Some(i) = self.tag_state.selected() {
            let tag = self.tags.tags().get(i).cloned();
            if let Some(tag) = tag {
                self.tags.remove(&tag);
                if self.tags.tags().is_empty() {
                    self.tag_state.select(None);
                } else if i >= self.tags.tags().len() {
                    self.tag_state.select(Some(self.tags.tags().len() - 1));
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Account
    // ------------------------------------------------------------------

    fn auth_or_notice(&mut self) -> Option<AuthService> {
        match self.auth.clone() {
            Some(auth) => Some(auth),
            None => {
                let token = self.account.begin();
                self.account
                    .settle(token, Err(AUTH_NOT_CONFIGURED.to_string()));
                None
            }
        }
    }

    pub fn auth_sign_in(&mut self) {
        let Some(auth) = self.auth_or_notice() else {
            return;
        };
        if self.account_email.trim().is_empty() || self.account_password.is_empty() {
            return;
        }
        let token = self.account.begin();
        let email = self.account_email.trim().to_string();
        let password = self.account_password.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = auth
                .sign_in(&email, &password)
                .await
                .map(AuthOutcome::SignedIn);
            let _ = events.send(AppEvent::Auth { token, result });
        });
    }

    pub fn auth_sign_up(&mut self) {
        let Some(auth) = self.auth_or_notice() else {
            return;
        };
        if self.account_email.trim().is_empty() || self.account_password.is_empty() {
            return;
        }
        let token = self.account.begin();
        let email = self.account_email.trim().to_string();
        let password = self.account_password.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = auth
                .sign_up(&email, &password)
                .await
                .map(AuthOutcome::SignedUp);
            let _ = events.send(AppEvent::Auth { token, result });
        });
    }

    pub fn auth_sign_out(&mut self) {
        let Some(auth) = self.auth_or_notice() else {
            return;
        };
        let token = self.account.begin();
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = auth.sign_out().await.map(|_| AuthOutcome::SignedOut);
            let _ = events.send(AppEvent::Auth { token, result });
        });
    }

    /// Renew the session with the stored refresh token.
    pub fn auth_refresh(&mut self) {
        let Some(auth) = self.auth_or_notice() else {
            return;
        };
        let token = self.account.begin();
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = auth.refresh().await.map(AuthOutcome::SignedIn);
            let _ = events.send(AppEvent::Auth { token, result });
        });
    }

    /// Fetch the current user record from the auth service.
    pub fn auth_fetch_user(&mut self) {
        let Some(auth) = self.auth_or_notice() else {
            return;
        };
        let token = self.account.begin();
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = auth.user().await.map(AuthOutcome::UserFetched);
            let _ = events.send(AppEvent::Auth { token, result });
        });
    }

    pub fn auth_request_recovery(&mut self) {
        let Some(auth) = self.auth_or_notice() else {
            return;
        };
        if self.account_email.trim().is_empty() {
            return;
        }
        let token = self.account.begin();
        let email = self.account_email.trim().to_string();
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = auth
                .request_recovery(&email)
                .await
                .map(|_| AuthOutcome::RecoverySent);
            let _ = events.send(AppEvent::Auth { token, result });
        });
    }

    /// New password is taken from the password field while signed in.
    pub fn auth_update_password(&mut self) {
        let Some(auth) = self.auth_or_notice() else {
            return;
        };
        if self.account_password.is_empty() {
            return;
        }
        let token = self.account.begin();
        let password = self.account_password.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = auth
                .update_password(&password)
                .await
                .map(|_| AuthOutcome::PasswordUpdated);
            let _ = events.send(AppEvent::Auth { token, result });
        });
    }

    pub fn active_account_field(&self) -> &str {
        match self.account_field {
            AccountField::Email => &self.account_email,
            AccountField::Password => &self.account_password,
        }
    }

    /// OAuth happens in the browser; surface the authorize URL.
    pub fn auth_oauth(&mut self, provider: &str) {
        let Some(auth) = self.auth_or_notice() else {
            return;
        };
        let url = auth.oauth_url(provider, None);
        let token = self.account.begin();
        self.account
            .settle(token, Ok(format!("Open in your browser: {url}")));
    }

    pub fn settle_auth(&mut self, token: u64, result: Result<AuthOutcome>) {
        let outcome = result.map_err(|e| {
            tracing::error!("auth request failed: {e:#}");
            AUTH_FAILURE.to_string()
        });

        let notice = outcome.map(|outcome| match outcome {
            AuthOutcome::SignedIn(session) => {
                let who = session.user.email.clone().unwrap_or_else(|| session.user.id.clone());
                self.account_password.clear();
                self.account_cursor = 0;
                format!("Signed in as {who}.")
            }
            AuthOutcome::SignedUp(SignUpOutcome::Session(session)) => {
                let who = session.user.email.clone().unwrap_or_else(|| session.user.id.clone());
                self.account_password.clear();
                self.account_cursor = 0;
                format!("Signed in as {who}.")
            }
            AuthOutcome::SignedUp(SignUpOutcome::ConfirmationRequired(_)) => {
                self.account_password.clear();
                self.account_cursor = 0;
                "Check your email to confirm your account.".to_string()
            }
            AuthOutcome::SignedOut => "Signed out.".to_string(),
            AuthOutcome::UserFetched(user) => {
                let who = user.email.unwrap_or(user.id);
                format!("Account: {who}.")
            }
            AuthOutcome::RecoverySent => "Password reset email sent.".to_string(),
            AuthOutcome::PasswordUpdated => "Password updated.".to_string(),
        });

        if !self.account.settle(token, notice) {
            tracing::debug!(token, "dropped stale auth completion");
        }
    }

    // ------------------------------------------------------------------
    // Pickers and ticking
    // ------------------------------------------------------------------

    pub fn model_picker_nav_down(&mut self) {
        let len = self.available_models.len();
        if len > 0 {
            let i = self.model_picker_state.selected().unwrap_or(0);
            self.model_picker_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn model_picker_nav_up(&mut self) {
        let i = self.model_picker_state.selected().unwrap_or(0);
        self.model_picker_state.select(Some(i.saturating_sub(1)));
    }

    pub fn select_model(&mut self) {
        if let Some(i) = self.model_picker_state.selected() {
            if let Some(model) = self.available_models.get(i) {
                self.selected_model = model.clone();
                self.show_model_picker = false;
                let _ = Config::save_default_model(&self.selected_model);
            }
        }
    }

    pub fn provider_picker_nav_down(&mut self) {
        let len = Provider::all().len();
        if len > 0 {
            let i = self.provider_picker_state.selected().unwrap_or(0);
            self.provider_picker_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn provider_picker_nav_up(&mut self) {
        let i = self.provider_picker_state.selected().unwrap_or(0);
        self.provider_picker_state.select(Some(i.saturating_sub(1)));
    }

    pub fn get_models_for_provider(&self, provider: Provider) -> Vec<String> {
        match provider {
            Provider::Ollama => Vec::new(), // fetched async
            Provider::Claude => ClaudeClient::list_models(),
            Provider::OpenAI => OpenAIClient::list_models(),
        }
    }

    /// Returns the source of the API key for a provider: "env", "config",
    /// or None when no key is available.
    pub fn get_key_source(&self, provider: Provider) -> Option<&'static str> {
        match provider {
            Provider::Ollama => Some("local"),
            Provider::Claude => {
                if std::env::var("ANTHROPIC_API_KEY").is_ok() {
                    Some("env")
                } else if self.insight.claude.is_some() {
                    Some("config")
                } else {
                    None
                }
            }
            Provider::OpenAI => {
                if std::env::var("OPENAI_API_KEY").is_ok() {
                    Some("env")
                } else if self.insight.openai.is_some() {
                    Some("config")
                } else {
                    None
                }
            }
        }
    }

    pub fn any_panel_loading(&self) -> bool {
        self.commentary.is_loading()
            || self.lexicon.is_loading()
            || self.context.is_loading()
            || self.parallels.is_loading()
            || self.account.is_loading()
    }

    /// Advance the loading animation and retire the saved indicator.
    pub fn tick(&mut self) {
        if self.any_panel_loading() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
        if let Some(at) = self.saved_at {
            if at.elapsed() >= SAVED_INDICATOR {
                self.saved_at = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn app() -> App {
        let (tx, _rx) = mpsc::unbounded_channel();
        App::new(Config::new(), tx).expect("app")
    }

    #[test]
    fn test_save_relays_buffer_unmodified() {
        let mut app = app();
        app.editor.set_content("Grace and peace.\n\nAmen.");
        app.save_sermon(Some("first pass".to_string()));
        assert_eq!(
            app.versions.get(0).map(|v| v.content.as_str()),
            Some("Grace and peace.\n\nAmen.")
        );
        assert!(app.saved_indicator_active());
        assert!(!app.editor.is_dirty());
    }

    #[test]
    fn test_saved_indicator_reverts_on_tick() {
        let mut app = app();
        app.save_sermon(None);
        app.saved_at = Some(Instant::now() - (SAVED_INDICATOR + Duration::from_millis(10)));
        app.tick();
        assert!(!app.saved_indicator_active());
        assert!(app.saved_at.is_none());
    }

    #[test]
    fn test_commentary_completion_extracts_references() {
        let mut app = app();
        let token = app.commentary.begin();
        app.settle_insight(
            InsightKind::Commentary,
            token,
            Ok(Insight::Commentary("Echoes of John 3:16 run through it.".to_string())),
        );
        assert_eq!(app.commentary_refs, vec!["John 3:16".to_string()]);
    }

    #[test]
    fn test_stale_insight_does_not_clobber_newer() {
        let mut app = app();
        let first = app.commentary.begin();
        let second = app.commentary.begin();
        app.settle_insight(
            InsightKind::Commentary,
            first,
            Ok(Insight::Commentary("old".to_string())),
        );
        assert!(app.commentary.is_loading());
        app.settle_insight(
            InsightKind::Commentary,
            second,
            Ok(Insight::Commentary("new".to_string())),
        );
        assert_eq!(app.commentary.data().map(|s| s.as_str()), Some("new"));
    }

    #[test]
    fn test_failed_insight_shows_fixed_message() {
        let mut app = app();
        let token = app.lexicon.begin();
        app.settle_insight(
            InsightKind::Lexicon,
            token,
            Err(anyhow::anyhow!("connection refused")),
        );
        assert_eq!(
            app.lexicon.error(),
            Some(InsightKind::Lexicon.failure_message())
        );
        assert!(app.lexicon.data().is_none());
    }

    #[test]
    fn test_restore_version_syncs_editor() {
        let mut app = app();
        app.editor.set_content("draft one");
        app.save_sermon(None);
        app.editor.set_content("draft two");
        app.restore_version(0);
        assert_eq!(app.editor.content(), "draft one");
        assert_eq!(app.screen, Screen::Editor);
    }
}
