use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
    Frame,
};

use crate::app::{AccountField, App, InputMode, Screen, StudyFocus};
use crate::insight::{ContextData, InsightKind, Parallel, WordStudy};
use crate::provider::Provider;

// Key style: dark background with bright text for visibility on both
// light and dark terminals
fn key_style() -> Style {
    Style::default().bg(Color::DarkGray).fg(Color::White)
}

fn label_style() -> Style {
    Style::default().bg(Color::Black).fg(Color::White)
}

/// Key-cap plus label, the one button primitive used everywhere.
fn key_hint(key: &'static str, label: &'static str) -> [Span<'static>; 2] {
    [
        Span::styled(format!(" {key} "), key_style()),
        Span::styled(format!(" {label} "), label_style()),
    ]
}

fn push_hints(target: &mut Vec<Span<'static>>, hints: &[(&'static str, &'static str)]) {
    for (key, label) in hints {
        target.extend(key_hint(key, label));
    }
}

/// Bordered card with a focus-dependent border colour, the one container
/// primitive used by every panel.
fn card(title: String, focused: bool) -> Block<'static> {
    let border_color = if focused { Color::Cyan } else { Color::DarkGray };
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title)
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let x = area.x + area.width.saturating_sub(width) / 2;
    let y = area.y + area.height.saturating_sub(height) / 2;
    Rect {
        x,
        y,
        width: width.min(area.width),
        height: height.min(area.height),
    }
}

/// Parse a line of text and convert **bold** markdown to styled spans;
/// heading lines are styled whole.
fn parse_markdown_line(text: &str) -> Line<'static> {
    if let Some(heading) = text.strip_prefix('#') {
        let heading = heading.trim_start_matches('#').trim_start();
        return Line::from(Span::styled(
            heading.to_string(),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ));
    }

    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut chars = text.chars().peekable();
    let mut current_text = String::new();

    while let Some(c) = chars.next() {
        if c == '*' && chars.peek() == Some(&'*') {
            chars.next();

            if !current_text.is_empty() {
                spans.push(Span::raw(std::mem::take(&mut current_text)));
            }

            let mut bold_text = String::new();
            let mut found_close = false;

            while let Some(c) = chars.next() {
                if c == '*' && chars.peek() == Some(&'*') {
                    chars.next();
                    found_close = true;
                    break;
                }
                bold_text.push(c);
            }

            if found_close && !bold_text.is_empty() {
                spans.push(Span::styled(
                    bold_text,
                    Style::default().add_modifier(Modifier::BOLD),
                ));
            } else {
                current_text.push_str("**");
                current_text.push_str(&bold_text);
            }
        } else {
            current_text.push(c);
        }
    }

    if !current_text.is_empty() {
        spans.push(Span::raw(current_text));
    }

    if spans.is_empty() {
        Line::default()
    } else {
        Line::from(spans)
    }
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);

    match app.screen {
        Screen::Study => render_study_screen(app, frame, body_area),
        Screen::Editor => render_editor_screen(app, frame, body_area),
        Screen::Versions => render_versions_screen(app, frame, body_area),
        Screen::Account => render_account_screen(app, frame, body_area),
    }

    render_footer(app, frame, footer_area);

    // Popups, in order of priority
    if app.show_api_key_input {
        render_api_key_input(app, frame, area);
    } else if app.show_provider_picker {
        render_provider_picker(app, frame, area);
    } else if app.show_model_picker {
        render_model_picker(app, frame, area);
    } else if app.show_save_input {
        render_save_input(app, frame, area);
    } else if app.show_tag_input {
        render_tag_input(app, frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let account = match &app.session {
        Some(session) => format!(
            " [{}]",
            session.user.email.as_deref().unwrap_or("signed in")
        ),
        None => String::new(),
    };

    let title = Line::from(vec![
        Span::styled(
            " Sermon Studio ",
            Style::default().fg(Color::Cyan).bold(),
        ),
        Span::styled(account, Style::default().fg(Color::DarkGray)),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };

    let mode_text = match app.screen {
        Screen::Study => " STUDY ",
        Screen::Editor => " SERMON ",
        Screen::Versions => " VERSIONS ",
        Screen::Account => " ACCOUNT ",
    };

    let mut hints: Vec<Span> = Vec::new();

    match (app.screen, app.input_mode) {
        (Screen::Study, InputMode::Normal) => {
            push_hints(
                &mut hints,
                &[("i", "passage"), ("Tab", "panel"), ("Enter", "generate")],
            );
            if app.study_focus == StudyFocus::References {
                push_hints(&mut hints, &[("j/k", "refs"), ("Enter", "adopt")]);
            } else {
                push_hints(&mut hints, &[("j/k", "scroll")]);
            }
            if !app.commentary_refs.is_empty() {
                push_hints(&mut hints, &[("f", "refs")]);
            }
            push_hints(
                &mut hints,
                &[
                    ("x", "to sermon"),
                    ("T", "translation"),
                    ("L", "language"),
                    ("P", "provider"),
                    ("M", "model"),
                    ("e", "sermon"),
                    ("v", "versions"),
                    ("A", "account"),
                    ("q", "quit"),
                ],
            );
        }
        (Screen::Study, InputMode::Editing) => {
            push_hints(&mut hints, &[("Enter", "generate"), ("Esc", "done")]);
        }
        (Screen::Editor, InputMode::Normal) => {
            if app.show_tag_panel {
                push_hints(
                    &mut hints,
                    &[
                        ("j/k", "nav"),
                        ("d", "remove"),
                        ("a", "add tag"),
                        ("1-8", "suggestion"),
                        ("T", "close"),
                    ],
                );
            } else {
                push_hints(
                    &mut hints,
                    &[
                        ("i", "write"),
                        ("s", "save"),
                        ("T", "tags"),
                        ("v", "versions"),
                        ("Esc", "study"),
                    ],
                );
            }
        }
        (Screen::Editor, InputMode::Editing) => {
            push_hints(&mut hints, &[("Ctrl-S", "save"), ("Esc", "done")]);
        }
        (Screen::Versions, _) => {
            push_hints(
                &mut hints,
                &[
                    ("j/k", "nav"),
                    ("Enter", "restore"),
                    ("d", "delete"),
                    ("Esc", "sermon"),
                ],
            );
        }
        (Screen::Account, InputMode::Normal) => {
            push_hints(
                &mut hints,
                &[
                    ("Tab", "field"),
                    ("i", "edit"),
                    ("Enter", "sign in"),
                    ("u", "sign up"),
                    ("o", "oauth"),
                    ("p", "reset"),
                ],
            );
            if app.session.is_some() {
                push_hints(
                    &mut hints,
                    &[
                        ("g", "refresh"),
                        ("w", "who am i"),
                        ("U", "new password"),
                        ("x", "sign out"),
                    ],
                );
            }
            push_hints(&mut hints, &[("Esc", "study")]);
        }
        (Screen::Account, InputMode::Editing) => {
            push_hints(
                &mut hints,
                &[("Tab", "field"), ("Enter", "sign in"), ("Esc", "done")],
            );
        }
    }

    // Timed saved confirmation
    if app.screen == Screen::Editor && app.saved_indicator_active() {
        hints.push(Span::styled(
            " Saved ✓ ",
            Style::default().bg(Color::Green).fg(Color::Black).bold(),
        ));
    }

    let mut spans = vec![Span::styled(mode_text, mode_style), Span::raw(" ")];
    spans.extend(hints);

    let footer = Paragraph::new(Line::from(spans));
    frame.render_widget(footer, area);
}

// ----------------------------------------------------------------------
// Study screen
// ----------------------------------------------------------------------

fn render_study_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    let [passage_area, tabs_area, panel_area] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Length(1),
        Constraint::Min(0),
    ])
    .areas(area);

    render_passage_bar(app, frame, passage_area);
    render_panel_tabs(app, frame, tabs_area);

    // Commentary keeps a references strip below the content
    if app.panel == InsightKind::Commentary && !app.commentary_refs.is_empty() {
        let refs_height = (app.commentary_refs.len().min(5) + 2) as u16;
        let [content_area, refs_area] =
            Layout::vertical([Constraint::Min(0), Constraint::Length(refs_height)])
                .areas(panel_area);
        render_focused_panel(app, frame, content_area);
        render_references(app, frame, refs_area);
    } else {
        render_focused_panel(app, frame, panel_area);
    }
}

fn render_passage_bar(app: &App, frame: &mut Frame, area: Rect) {
    let editing = app.screen == Screen::Study && app.input_mode == InputMode::Editing;
    let title = format!(" Passage · {} · {} ", app.translation, app.language);
    let block = card(title, editing);

    let content = if app.passage_input.is_empty() && !editing {
        Text::from(Span::styled(
            "Press i and enter a passage, e.g. Romans 8:28-39",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        Text::from(app.passage_input.as_str())
    };

    let input = Paragraph::new(content).block(block);
    frame.render_widget(input, area);

    if editing {
        let x = area.x + 1 + app.passage_cursor.min(area.width.saturating_sub(2) as usize) as u16;
        frame.set_cursor_position((x, area.y + 1));
    }
}

fn panel_status_glyph(app: &App, kind: InsightKind) -> &'static str {
    let (loading, has_data, has_error) = match kind {
        InsightKind::Commentary => (
            app.commentary.is_loading(),
            app.commentary.data().is_some(),
            app.commentary.error().is_some(),
        ),
        InsightKind::Lexicon => (
            app.lexicon.is_loading(),
            app.lexicon.data().is_some(),
            app.lexicon.error().is_some(),
        ),
        InsightKind::Context => (
            app.context.is_loading(),
            app.context.data().is_some(),
            app.context.error().is_some(),
        ),
        InsightKind::Parallels => (
            app.parallels.is_loading(),
            app.parallels.data().is_some(),
            app.parallels.error().is_some(),
        ),
    };
    if loading {
        "…"
    } else if has_error {
        "!"
    } else if has_data {
        "●"
    } else {
        ""
    }
}

fn render_panel_tabs(app: &App, frame: &mut Frame, area: Rect) {
    let mut spans: Vec<Span> = Vec::new();
    for (i, kind) in InsightKind::all().iter().enumerate() {
        let selected = *kind == app.panel;
        let style = if selected {
            Style::default().bg(Color::Cyan).fg(Color::Black).bold()
        } else {
            Style::default().fg(Color::DarkGray)
        };
        spans.push(Span::styled(
            format!(" {} {}{} ", i + 1, kind.title(), panel_status_glyph(app, *kind)),
            style,
        ));
        spans.push(Span::raw(" "));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

/// The tri-state body shared by all four panels: exactly one of the idle
/// hint, the loading animation, the error, or the data is shown.
fn render_focused_panel(app: &mut App, frame: &mut Frame, area: Rect) {
    let focused = app.study_focus == StudyFocus::Panels;
    let block = card(
        format!(
            " {} · {}: {} ",
            app.panel.title(),
            app.current_provider.display_name(),
            app.selected_model
        ),
        focused,
    );

    let (loading, error, idle) = match app.panel {
        InsightKind::Commentary => (
            app.commentary.is_loading(),
            app.commentary.error(),
            app.commentary.is_idle(),
        ),
        InsightKind::Lexicon => (
            app.lexicon.is_loading(),
            app.lexicon.error(),
            app.lexicon.is_idle(),
        ),
        InsightKind::Context => (
            app.context.is_loading(),
            app.context.error(),
            app.context.is_idle(),
        ),
        InsightKind::Parallels => (
            app.parallels.is_loading(),
            app.parallels.error(),
            app.parallels.is_idle(),
        ),
    };

    let lines: Vec<Line> = if loading {
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        vec![Line::from(Span::styled(
            format!("Working{dots}"),
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::ITALIC),
        ))]
    } else if let Some(message) = error {
        vec![
            Line::from(Span::styled(
                message.to_string(),
                Style::default().fg(Color::Red),
            )),
            Line::default(),
            Line::from(Span::styled(
                "Press r to retry.",
                Style::default().fg(Color::DarkGray),
            )),
        ]
    } else if idle {
        idle_hint(match app.panel {
            InsightKind::Commentary => "Press Enter to generate commentary for the passage.",
            InsightKind::Lexicon => "Press Enter to study the passage's Greek and Hebrew terms.",
            InsightKind::Context => "Press Enter to load the passage's historical context.",
            InsightKind::Parallels => "Press Enter to find parallel passages.",
        })
    } else {
        match app.panel {
            InsightKind::Commentary => app
                .commentary
                .data()
                .map(|text| commentary_lines(text))
                .unwrap_or_default(),
            InsightKind::Lexicon => app
                .lexicon
                .data()
                .map(|words| lexicon_lines(words))
                .unwrap_or_default(),
            InsightKind::Context => app
                .context
                .data()
                .map(|context| context_lines(context))
                .unwrap_or_default(),
            InsightKind::Parallels => app
                .parallels
                .data()
                .map(|passages| parallel_lines(passages))
                .unwrap_or_default(),
        }
    };

    // Record geometry for scroll clamping
    app.panel_total_lines = lines.len() as u16;
    app.panel_height = area.height.saturating_sub(2);

    let panel = Paragraph::new(Text::from(lines))
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.panel_scroll, 0));

    frame.render_widget(panel, area);
}

fn idle_hint(text: &'static str) -> Vec<Line<'static>> {
    vec![Line::from(Span::styled(
        text,
        Style::default().fg(Color::DarkGray),
    ))]
}

fn commentary_lines(text: &str) -> Vec<Line<'static>> {
    text.lines().map(parse_markdown_line).collect()
}

fn lexicon_lines(words: &[WordStudy]) -> Vec<Line<'static>> {
    let mut lines: Vec<Line> = Vec::new();
    for word in words {
        lines.push(Line::from(vec![
            Span::styled(
                word.word.clone(),
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            ),
            Span::raw("  "),
            Span::styled(word.original.clone(), Style::default().fg(Color::Cyan)),
            Span::raw("  "),
            Span::styled(
                format!("({}, {})", word.transliteration, word.language),
                Style::default().fg(Color::DarkGray),
            ),
        ]));
        lines.push(Line::from(word.definition.clone()));
        lines.push(Line::from(Span::styled(
            word.significance.clone(),
            Style::default().fg(Color::DarkGray),
        )));
        lines.push(Line::default());
    }
    lines
}

fn context_lines(context: &ContextData) -> Vec<Line<'static>> {
    let section = |label: &'static str, value: &str| -> Vec<Line<'static>> {
        let mut lines = vec![Line::from(Span::styled(
            label,
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        ))];
        lines.extend(value.lines().map(|l| Line::from(l.to_string())));
        lines.push(Line::default());
        lines
    };

    let mut lines = Vec::new();
    lines.extend(section("Period", &context.period));
    lines.extend(section("Setting", &context.setting));
    lines.extend(section("Author and audience", &context.author_and_audience));
    lines.extend(section("Cultural notes", &context.cultural_notes));
    lines.extend(section("Relevance", &context.relevance));
    lines
}

fn parallel_lines(passages: &[Parallel]) -> Vec<Line<'static>> {
    let mut lines: Vec<Line> = Vec::new();
    for (i, parallel) in passages.iter().enumerate() {
        lines.push(Line::from(vec![
            Span::styled(
                format!("{}. ", i + 1),
                Style::default().fg(Color::DarkGray),
            ),
            Span::styled(
                parallel.reference.clone(),
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            ),
        ]));
        lines.push(Line::from(parallel.summary.clone()));
        lines.push(Line::from(Span::styled(
            parallel.connection.clone(),
            Style::default().fg(Color::DarkGray),
        )));
        lines.push(Line::default());
    }
    lines
}

fn render_references(app: &mut App, frame: &mut Frame, area: Rect) {
    let focused = app.study_focus == StudyFocus::References;
    let border_color = if focused { Color::Cyan } else { Color::Magenta };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" References (f to focus, Enter to adopt) ");

    let items: Vec<ListItem> = app
        .commentary_refs
        .iter()
        .enumerate()
        .map(|(i, reference)| ListItem::new(format!(" {}. {} ", i + 1, reference)))
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::Magenta)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, area, &mut app.references_state);
}

// ----------------------------------------------------------------------
// Editor screen
// ----------------------------------------------------------------------

fn render_editor_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    if app.show_tag_panel {
        let [editor_area, tag_area] =
            Layout::horizontal([Constraint::Min(0), Constraint::Length(32)]).areas(area);
        render_editor_body(app, frame, editor_area);
        render_tag_panel(app, frame, tag_area);
    } else {
        render_editor_body(app, frame, area);
    }
}

fn render_editor_body(app: &App, frame: &mut Frame, area: Rect) {
    let editing = app.input_mode == InputMode::Editing && !app.show_save_input && !app.show_tag_input;
    let dirty_marker = if app.editor.is_dirty() { " *" } else { "" };
    let title = format!(
        " Sermon · {} words{} ",
        app.editor.word_count(),
        dirty_marker
    );
    let block = card(title, editing);

    let inner_height = area.height.saturating_sub(2) as usize;
    let (cursor_row, cursor_col) = app.editor.cursor();
    let scroll = cursor_row.saturating_sub(inner_height.saturating_sub(1));

    let lines: Vec<Line> = app
        .editor
        .lines()
        .iter()
        .map(|l| Line::from(l.clone()))
        .collect();

    let body = Paragraph::new(Text::from(lines))
        .block(block)
        .scroll((scroll as u16, 0));

    frame.render_widget(body, area);

    if editing {
        let x = area.x + 1 + cursor_col.min(area.width.saturating_sub(2) as usize) as u16;
        let y = area.y + 1 + (cursor_row - scroll) as u16;
        frame.set_cursor_position((x, y));
    }
}

fn render_tag_panel(app: &mut App, frame: &mut Frame, area: Rect) {
    let suggestions: Vec<String> = app
        .tags
        .suggestions(&app.tag_pool)
        .iter()
        .map(|s| s.to_string())
        .collect();

    let tag_count = app.tags.tags().len();
    let list_height = (tag_count.max(1) + 2) as u16;
    let [tags_area, suggestions_area] =
        Layout::vertical([Constraint::Length(list_height), Constraint::Min(0)]).areas(area);

    let items: Vec<ListItem> = app
        .tags
        .tags()
        .iter()
        .map(|t| ListItem::new(format!(" #{t} ")))
        .collect();

    let list = List::new(items)
        .block(card(" Tags ".to_string(), true))
        .highlight_style(
            Style::default()
                .bg(Color::Cyan)
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, tags_area, &mut app.tag_state);

    let mut lines = vec![Line::from(Span::styled(
        "Suggestions",
        Style::default().fg(Color::DarkGray),
    ))];
    for (i, suggestion) in suggestions.iter().enumerate().take(8) {
        lines.push(Line::from(vec![
            Span::styled(format!(" {} ", i + 1), key_style()),
            Span::raw(format!(" {suggestion}")),
        ]));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));
    frame.render_widget(Paragraph::new(Text::from(lines)).block(block), suggestions_area);
}

// ----------------------------------------------------------------------
// Versions screen
// ----------------------------------------------------------------------

fn render_versions_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    if app.versions.is_empty() {
        let block = card(" Versions ".to_string(), false);
        let placeholder = Paragraph::new(Span::styled(
            "No versions yet. Save the sermon to create one.",
            Style::default().fg(Color::DarkGray),
        ))
        .block(block);
        frame.render_widget(placeholder, area);
        return;
    }

    let [list_area, preview_area] =
        Layout::horizontal([Constraint::Percentage(40), Constraint::Percentage(60)]).areas(area);

    let items: Vec<ListItem> = app
        .versions
        .versions()
        .iter()
        .enumerate()
        .map(|(i, version)| {
            let label = app.versions.label(i);
            let stamp = version.created_at.format("%Y-%m-%d %H:%M");
            let description = version
                .change_description
                .as_deref()
                .unwrap_or("(no description)");
            ListItem::new(Line::from(vec![
                Span::styled(
                    format!(" {label} "),
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                ),
                Span::styled(format!("{stamp}  "), Style::default().fg(Color::DarkGray)),
                Span::raw(description.to_string()),
            ]))
        })
        .collect();

    let list = List::new(items)
        .block(card(" Versions ".to_string(), true))
        .highlight_style(
            Style::default()
                .bg(Color::Cyan)
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, list_area, &mut app.version_state);

    let preview_text = match app.version_state.selected().and_then(|i| app.versions.get(i)) {
        Some(version) => Text::from(
            version
                .content
                .lines()
                .map(|l| Line::from(l.to_string()))
                .collect::<Vec<_>>(),
        ),
        None => Text::from(Span::styled(
            "Select a version to preview",
            Style::default().fg(Color::DarkGray),
        )),
    };

    let preview = Paragraph::new(preview_text)
        .block(card(" Preview ".to_string(), false))
        .wrap(Wrap { trim: false });

    frame.render_widget(preview, preview_area);
}

// ----------------------------------------------------------------------
// Account screen
// ----------------------------------------------------------------------

fn render_account_screen(app: &App, frame: &mut Frame, area: Rect) {
    let [email_area, password_area, status_area] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Length(3),
        Constraint::Min(0),
    ])
    .areas(area);

    let editing = app.input_mode == InputMode::Editing;

    let email_focused = app.account_field == AccountField::Email;
    let email = Paragraph::new(app.account_email.as_str())
        .block(card(" Email ".to_string(), email_focused));
    frame.render_widget(email, email_area);

    let password_focused = app.account_field == AccountField::Password;
    let masked = "•".repeat(app.account_password.chars().count());
    let password =
        Paragraph::new(masked.as_str()).block(card(" Password ".to_string(), password_focused));
    frame.render_widget(password, password_area);

    if editing {
        let (field_area, len) = if email_focused {
            (email_area, app.account_cursor)
        } else {
            (password_area, app.account_cursor)
        };
        let x = field_area.x + 1 + len.min(field_area.width.saturating_sub(2) as usize) as u16;
        frame.set_cursor_position((x, field_area.y + 1));
    }

    let mut lines: Vec<Line> = Vec::new();

    match &app.session {
        Some(session) => {
            let mut spans = vec![
                Span::styled("Signed in: ", Style::default().fg(Color::DarkGray)),
                Span::styled(
                    session
                        .user
                        .email
                        .clone()
                        .unwrap_or_else(|| session.user.id.clone()),
                    Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
                ),
            ];
            if session.is_expired(chrono::Utc::now()) {
                spans.push(Span::styled(
                    "  (session expired, press g to refresh)",
                    Style::default().fg(Color::Red),
                ));
            }
            lines.push(Line::from(spans));
        }
        None => {
            lines.push(Line::from(Span::styled(
                "Not signed in.",
                Style::default().fg(Color::DarkGray),
            )));
        }
    }
    lines.push(Line::default());

    if app.account.is_loading() {
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        lines.push(Line::from(Span::styled(
            format!("Working{dots}"),
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::ITALIC),
        )));
    } else if let Some(message) = app.account.error() {
        lines.push(Line::from(Span::styled(
            message.to_string(),
            Style::default().fg(Color::Red),
        )));
    } else if let Some(notice) = app.account.data() {
        lines.push(Line::from(Span::styled(
            notice.clone(),
            Style::default().fg(Color::Green),
        )));
    }

    let status = Paragraph::new(Text::from(lines))
        .block(card(" Status ".to_string(), false))
        .wrap(Wrap { trim: true });
    frame.render_widget(status, status_area);
}

// ----------------------------------------------------------------------
// Popups
// ----------------------------------------------------------------------

fn render_provider_picker(app: &mut App, frame: &mut Frame, area: Rect) {
    let popup = centered_rect(46, 9, area);
    frame.render_widget(Clear, popup);

    let items: Vec<ListItem> = Provider::all()
        .iter()
        .map(|provider| {
            let marker = if *provider == app.current_provider {
                "● "
            } else {
                "  "
            };
            let key_source = match app.get_key_source(*provider) {
                Some(source) => format!(" [{source}]"),
                None => " [key needed]".to_string(),
            };
            ListItem::new(Line::from(vec![
                Span::raw(marker),
                Span::raw(provider.display_name()),
                Span::styled(key_source, Style::default().fg(Color::DarkGray)),
            ]))
        })
        .collect();

    let list = List::new(items)
        .block(card(" Provider (Enter to select, Esc to close) ".to_string(), true))
        .highlight_style(
            Style::default()
                .bg(Color::Cyan)
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        );

    frame.render_stateful_widget(list, popup, &mut app.provider_picker_state);
}

fn render_model_picker(app: &mut App, frame: &mut Frame, area: Rect) {
    let height = (app.available_models.len().min(10) + 2) as u16;
    let popup = centered_rect(46, height, area);
    frame.render_widget(Clear, popup);

    let items: Vec<ListItem> = app
        .available_models
        .iter()
        .map(|model| {
            let marker = if *model == app.selected_model {
                "● "
            } else {
                "  "
            };
            ListItem::new(format!("{marker}{model}"))
        })
        .collect();

    let list = List::new(items)
        .block(card(" Model (Enter to select, Esc to close) ".to_string(), true))
        .highlight_style(
            Style::default()
                .bg(Color::Cyan)
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        );

    frame.render_stateful_widget(list, popup, &mut app.model_picker_state);
}

fn input_popup(
    frame: &mut Frame,
    area: Rect,
    title: String,
    value: &str,
    cursor: usize,
) {
    let popup = centered_rect(56, 3, area);
    frame.render_widget(Clear, popup);

    let input = Paragraph::new(value).block(card(title, true));
    frame.render_widget(input, popup);

    let x = popup.x + 1 + cursor.min(popup.width.saturating_sub(2) as usize) as u16;
    frame.set_cursor_position((x, popup.y + 1));
}

fn render_api_key_input(app: &App, frame: &mut Frame, area: Rect) {
    let provider = app
        .api_key_target_provider
        .map(|p| p.display_name())
        .unwrap_or("API");
    // Mask the key itself
    let masked = "•".repeat(app.api_key_input.chars().count());
    input_popup(
        frame,
        area,
        format!(" {provider} API key (Enter to save) "),
        &masked,
        app.api_key_input_cursor,
    );
}

fn render_save_input(app: &App, frame: &mut Frame, area: Rect) {
    input_popup(
        frame,
        area,
        " Change description (optional, Enter to save) ".to_string(),
        &app.save_input,
        app.save_input_cursor,
    );
}

fn render_tag_input(app: &App, frame: &mut Frame, area: Rect) {
    input_popup(
        frame,
        area,
        " New tag (Enter to add) ".to_string(),
        &app.tag_input,
        app.tag_input_cursor,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markdown_bold_is_styled() {
        let line = parse_markdown_line("the **called** ones");
        assert_eq!(line.spans.len(), 3);
        assert_eq!(line.spans[1].content, "called");
        assert!(line.spans[1].style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn test_markdown_unclosed_bold_is_literal() {
        let line = parse_markdown_line("a **dangling marker");
        let text: String = line.spans.iter().map(|s| s.content.clone()).collect();
        assert_eq!(text, "a **dangling marker");
    }

    #[test]
    fn test_markdown_heading_collapses_hashes() {
        let line = parse_markdown_line("## Romans 8");
        assert_eq!(line.spans.len(), 1);
        assert_eq!(line.spans[0].content, "Romans 8");
    }

    #[test]
    fn test_centered_rect_clamps_to_area() {
        let area = Rect::new(0, 0, 20, 10);
        let popup = centered_rect(56, 3, area);
        assert!(popup.width <= area.width);
        assert_eq!(popup.y, 3);
    }
}
