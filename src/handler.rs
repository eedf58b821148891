use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::ai::{ClaudeClient, OpenAIClient};
use crate::app::{AccountField, App, InputMode, Screen, StudyFocus};
use crate::config::Config;
use crate::insight::InsightKind;
use crate::provider::Provider;
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

/// Single-line input editing shared by every text field. Returns true when
/// the key was consumed; Enter and Esc are left to the caller.
fn handle_text_key(input: &mut String, cursor: &mut usize, key: &KeyEvent) -> bool {
    match key.code {
        KeyCode::Backspace => {
            if *cursor > 0 {
                *cursor -= 1;
                let byte_pos = char_to_byte_index(input, *cursor);
                input.remove(byte_pos);
            }
            true
        }
        KeyCode::Delete => {
            let char_count = input.chars().count();
            if *cursor < char_count {
                let byte_pos = char_to_byte_index(input, *cursor);
                input.remove(byte_pos);
            }
            true
        }
        KeyCode::Left => {
            *cursor = cursor.saturating_sub(1);
            true
        }
        KeyCode::Right => {
            let char_count = input.chars().count();
            *cursor = (*cursor + 1).min(char_count);
            true
        }
        KeyCode::Home => {
            *cursor = 0;
            true
        }
        KeyCode::End => {
            *cursor = input.chars().count();
            true
        }
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(input, *cursor);
            input.insert(byte_pos, c);
            *cursor += 1;
            true
        }
        _ => false,
    }
}

pub async fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key).await?,
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => app.tick(),
        AppEvent::Insight {
            kind,
            token,
            result,
        } => app.settle_insight(kind, token, result),
        AppEvent::Auth { token, result } => app.settle_auth(token, result),
        AppEvent::SessionChanged(session) => app.session = session,
    }
    Ok(())
}

async fn handle_key(app: &mut App, key: KeyEvent) -> Result<()> {
    // Global quit, any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return Ok(());
    }

    // The API key popup captures all input while open
    if app.show_api_key_input {
        handle_api_key_input(app, key);
        return Ok(());
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key).await?,
        InputMode::Editing => handle_editing_mode(app, key),
    }

    Ok(())
}

async fn handle_normal_mode(app: &mut App, key: KeyEvent) -> Result<()> {
    match app.screen {
        Screen::Study => handle_study_normal(app, key).await?,
        Screen::Editor => handle_editor_normal(app, key),
        Screen::Versions => handle_versions_normal(app, key),
        Screen::Account => handle_account_normal(app, key),
    }
    Ok(())
}

async fn handle_study_normal(app: &mut App, key: KeyEvent) -> Result<()> {
    // Pickers take precedence while open
    if app.show_provider_picker {
        handle_provider_picker(app, key).await;
        return Ok(());
    }
    if app.show_model_picker {
        match key.code {
            KeyCode::Esc => app.show_model_picker = false,
            KeyCode::Char('j') | KeyCode::Down => app.model_picker_nav_down(),
            KeyCode::Char('k') | KeyCode::Up => app.model_picker_nav_up(),
            KeyCode::Enter => app.select_model(),
            _ => {}
        }
        return Ok(());
    }

    match key.code {
        KeyCode::Char('q') => app.should_quit = true,

        // Passage entry
        KeyCode::Char('i') | KeyCode::Char('/') => {
            app.input_mode = InputMode::Editing;
            app.passage_cursor = app.passage_input.chars().count();
        }

        // Panel selection
        KeyCode::Tab => app.panel_next(),
        KeyCode::BackTab => app.panel_prev(),
        KeyCode::Char('1') => app.select_panel(InsightKind::Commentary),
        KeyCode::Char('2') => app.select_panel(InsightKind::Lexicon),
        KeyCode::Char('3') => app.select_panel(InsightKind::Context),
        KeyCode::Char('4') => app.select_panel(InsightKind::Parallels),

        // Trigger (and retry, which is the same call again)
        KeyCode::Enter | KeyCode::Char('a') | KeyCode::Char('r') => {
            if app.study_focus == StudyFocus::References {
                app.adopt_selected_reference();
            } else {
                app.request_insight(app.panel);
            }
        }

        // Scroll or reference navigation
        KeyCode::Char('j') | KeyCode::Down => {
            if app.study_focus == StudyFocus::References {
                app.references_nav_down();
            } else {
                app.panel_scroll_down();
            }
        }
        KeyCode::Char('k') | KeyCode::Up => {
            if app.study_focus == StudyFocus::References {
                app.references_nav_up();
            } else {
                app.panel_scroll_up();
            }
        }

        // Toggle focus into the extracted references list
        KeyCode::Char('f') => {
            if !app.commentary_refs.is_empty() {
                app.study_focus = match app.study_focus {
                    StudyFocus::Panels => {
                        if app.references_state.selected().is_none() {
                            app.references_state.select(Some(0));
                        }
                        StudyFocus::References
                    }
                    StudyFocus::References => StudyFocus::Panels,
                };
            }
        }

        // Panel actions
        KeyCode::Char('x') => app.insert_insight_into_sermon(),
        KeyCode::Char('c') => {
            if let Some(text) = app.focused_panel_text() {
                copy_to_clipboard(&text);
            }
        }

        // Study settings
        KeyCode::Char('T') => app.cycle_translation(),
        KeyCode::Char('L') => app.cycle_language(),

        // Provider and model pickers
        KeyCode::Char('P') => {
            let current_idx = Provider::all()
                .iter()
                .position(|p| *p == app.current_provider)
                .unwrap_or(0);
            app.provider_picker_state.select(Some(current_idx));
            app.show_provider_picker = true;
        }
        KeyCode::Char('M') => {
            let models = match app.current_provider {
                Provider::Ollama => app.insight.ollama.list_models().await.unwrap_or_default(),
                Provider::Claude => ClaudeClient::list_models(),
                Provider::OpenAI => OpenAIClient::list_models(),
            };
            app.available_models = models;
            if !app.available_models.is_empty() {
                let current_idx = app
                    .available_models
                    .iter()
                    .position(|m| m == &app.selected_model)
                    .unwrap_or(0);
                app.model_picker_state.select(Some(current_idx));
                app.show_model_picker = true;
            }
        }

        // Screen switching
        KeyCode::Char('e') => app.screen = Screen::Editor,
        KeyCode::Char('v') => app.screen = Screen::Versions,
        KeyCode::Char('A') => app.screen = Screen::Account,

        _ => {}
    }
    Ok(())
}

async fn handle_provider_picker(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.show_provider_picker = false,
        KeyCode::Char('j') | KeyCode::Down => app.provider_picker_nav_down(),
        KeyCode::Char('k') | KeyCode::Up => app.provider_picker_nav_up(),
        KeyCode::Enter => {
            if let Some(i) = app.provider_picker_state.selected() {
                let providers = Provider::all();
                if let Some(&provider) = providers.get(i) {
                    let needs_key = app.get_key_source(provider).is_none();
                    if needs_key {
                        app.api_key_target_provider = Some(provider);
                        app.show_api_key_input = true;
                        app.api_key_input.clear();
                        app.api_key_input_cursor = 0;
                    } else {
                        app.current_provider = provider;
                        let mut config = Config::load().unwrap_or_else(|_| Config::new());
                        config.provider = Some(provider.as_str().to_string());
                        let _ = config.save();
                        match provider {
                            Provider::Ollama => {
                                if let Ok(models) = app.insight.ollama.list_models().await {
                                    if let Some(model) = models.first() {
                                        app.selected_model = model.clone();
                                    }
                                }
                            }
                            _ => {
                                let models = app.get_models_for_provider(provider);
                                if let Some(model) = models.first() {
                                    app.selected_model = model.clone();
                                }
                            }
                        }
                    }
                    app.show_provider_picker = false;
                }
            }
        }
        _ => {}
    }
}

fn handle_api_key_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.show_api_key_input = false;
            app.api_key_input.clear();
            app.api_key_target_provider = None;
        }
        KeyCode::Enter => {
            if !app.api_key_input.is_empty() {
                if let Some(provider) = app.api_key_target_provider {
                    let mut config = Config::load().unwrap_or_else(|_| Config::new());
                    match provider {
                        Provider::Claude => {
                            config.claude_api_key = Some(app.api_key_input.clone());
                            app.insight.claude = Some(ClaudeClient::new(&app.api_key_input));
                        }
                        Provider::OpenAI => {
                            config.openai_api_key = Some(app.api_key_input.clone());
                            app.insight.openai = Some(OpenAIClient::new(&app.api_key_input));
                        }
                        Provider::Ollama => {}
                    }
                    config.provider = Some(provider.as_str().to_string());
                    let _ = config.save();
                    app.current_provider = provider;
                    let models = app.get_models_for_provider(provider);
                    if let Some(model) = models.first() {
                        app.selected_model = model.clone();
                    }
                }
            }
            app.show_api_key_input = false;
            app.api_key_input.clear();
            app.api_key_target_provider = None;
        }
        _ => {
            handle_text_key(&mut app.api_key_input, &mut app.api_key_input_cursor, &key);
        }
    }
}

fn handle_editor_normal(app: &mut App, key: KeyEvent) {
    if app.show_tag_panel {
        match key.code {
            KeyCode::Esc | KeyCode::Char('T') => app.show_tag_panel = false,
            KeyCode::Char('j') | KeyCode::Down => app.tag_nav_down(),
            KeyCode::Char('k') | KeyCode::Up => app.tag_nav_up(),
            KeyCode::Char('d') => app.remove_selected_tag(),
            KeyCode::Char('a') => {
                app.show_tag_input = true;
                app.tag_input.clear();
                app.tag_input_cursor = 0;
                app.input_mode = InputMode::Editing;
            }
            KeyCode::Char(c) if c.is_ascii_digit() && c != '0' => {
                app.add_suggested_tag((c as usize) - ('1' as usize));
            }
            _ => {}
        }
        return;
    }

    match key.code {
        KeyCode::Esc => app.screen = Screen::Study,
        KeyCode::Char('i') => app.input_mode = InputMode::Editing,
        KeyCode::Char('s') => {
            app.show_save_input = true;
            app.save_input.clear();
            app.save_input_cursor = 0;
            app.input_mode = InputMode::Editing;
        }
        KeyCode::Char('T') => {
            app.show_tag_panel = true;
            if app.tag_state.selected().is_none() && !app.tags.tags().is_empty() {
                app.tag_state.select(Some(0));
            }
        }
        KeyCode::Char('v') => app.screen = Screen::Versions,

        // Cursor movement without entering edit mode
        KeyCode::Char('h') | KeyCode::Left => app.editor.move_left(),
        KeyCode::Char('l') | KeyCode::Right => app.editor.move_right(),
        KeyCode::Char('j') | KeyCode::Down => app.editor.move_down(),
        KeyCode::Char('k') | KeyCode::Up => app.editor.move_up(),
        KeyCode::Char('0') | KeyCode::Home => app.editor.move_line_start(),
        KeyCode::Char('$') | KeyCode::End => app.editor.move_line_end(),

        _ => {}
    }
}

fn handle_versions_normal(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.screen = Screen::Editor,
        KeyCode::Char('j') | KeyCode::Down => app.version_nav_down(),
        KeyCode::Char('k') | KeyCode::Up => app.version_nav_up(),
        KeyCode::Enter => {
            if let Some(i) = app.version_state.selected() {
                app.restore_version(i);
            }
        }
        KeyCode::Char('d') => {
            if let Some(i) = app.version_state.selected() {
                app.delete_version(i);
            }
        }
        KeyCode::Char('e') => app.screen = Screen::Editor,
        _ => {}
    }
}

fn handle_account_normal(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.screen = Screen::Study,
        KeyCode::Tab => {
            app.account_field = match app.account_field {
                AccountField::Email => AccountField::Password,
                AccountField::Password => AccountField::Email,
            };
        }
        KeyCode::Char('i') => {
            app.input_mode = InputMode::Editing;
            app.account_cursor = app.active_account_field().chars().count();
        }
        KeyCode::Enter => app.auth_sign_in(),
        KeyCode::Char('u') => app.auth_sign_up(),
        KeyCode::Char('o') => app.auth_oauth("google"),
        KeyCode::Char('x') => app.auth_sign_out(),
        KeyCode::Char('p') => app.auth_request_recovery(),
        KeyCode::Char('U') => app.auth_update_password(),
        KeyCode::Char('g') => app.auth_refresh(),
        KeyCode::Char('w') => app.auth_fetch_user(),
        _ => {}
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    // Popup inputs first
    if app.show_tag_input {
        match key.code {
            KeyCode::Esc => {
                app.show_tag_input = false;
                app.tag_input.clear();
                app.input_mode = InputMode::Normal;
            }
            KeyCode::Enter => {
                app.add_tag_from_input();
                app.show_tag_input = false;
                app.input_mode = InputMode::Normal;
            }
            _ => {
                handle_text_key(&mut app.tag_input, &mut app.tag_input_cursor, &key);
            }
        }
        return;
    }
    if app.show_save_input {
        match key.code {
            KeyCode::Esc => {
                app.show_save_input = false;
                app.save_input.clear();
                app.input_mode = InputMode::Normal;
            }
            KeyCode::Enter => {
                let description = if app.save_input.trim().is_empty() {
                    None
                } else {
                    Some(app.save_input.trim().to_string())
                };
                app.save_sermon(description);
                app.show_save_input = false;
                app.save_input.clear();
                app.input_mode = InputMode::Normal;
            }
            _ => {
                handle_text_key(&mut app.save_input, &mut app.save_input_cursor, &key);
            }
        }
        return;
    }

    match app.screen {
        Screen::Study => handle_passage_editing(app, key),
        Screen::Editor => handle_buffer_editing(app, key),
        Screen::Account => handle_account_editing(app, key),
        Screen::Versions => app.input_mode = InputMode::Normal,
    }
}

fn handle_passage_editing(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.input_mode = InputMode::Normal,
        KeyCode::Enter => {
            app.input_mode = InputMode::Normal;
            app.request_insight(app.panel);
        }
        _ => {
            handle_text_key(&mut app.passage_input, &mut app.passage_cursor, &key);
        }
    }
}

fn handle_buffer_editing(app: &mut App, key: KeyEvent) {
    // Ctrl-S saves without leaving the keyboard flow
    if key.code == KeyCode::Char('s') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.show_save_input = true;
        app.save_input.clear();
        app.save_input_cursor = 0;
        return;
    }

    match key.code {
        KeyCode::Esc => app.input_mode = InputMode::Normal,
        KeyCode::Enter => app.editor.insert_newline(),
        KeyCode::Backspace => app.editor.backspace(),
        KeyCode::Delete => app.editor.delete(),
        KeyCode::Left => app.editor.move_left(),
        KeyCode::Right => app.editor.move_right(),
        KeyCode::Up => app.editor.move_up(),
        KeyCode::Down => app.editor.move_down(),
        KeyCode::Home => app.editor.move_line_start(),
        KeyCode::End => app.editor.move_line_end(),
        KeyCode::Char(c) => app.editor.insert_char(c),
        _ => {}
    }
}

fn handle_account_editing(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.input_mode = InputMode::Normal,
        KeyCode::Enter => {
            app.input_mode = InputMode::Normal;
            app.auth_sign_in();
        }
        KeyCode::Tab => {
            app.account_field = match app.account_field {
                AccountField::Email => AccountField::Password,
                AccountField::Password => AccountField::Email,
            };
            app.account_cursor = app.active_account_field().chars().count();
        }
        _ => {
            let field = app.account_field;
            let (input, cursor) = match field {
                AccountField::Email => (&mut app.account_email, &mut app.account_cursor),
                AccountField::Password => (&mut app.account_password, &mut app.account_cursor),
            };
            handle_text_key(input, cursor, &key);
        }
    }
}

fn copy_to_clipboard(text: &str) {
    use std::io::Write;
    use std::process::{Command, Stdio};

    if let Ok(mut child) = Command::new("pbcopy").stdin(Stdio::piped()).spawn() {
        if let Some(mut stdin) = child.stdin.take() {
            let _ = stdin.write_all(text.as_bytes());
        }
    }
}
