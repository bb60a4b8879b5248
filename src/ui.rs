use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
    Frame,
};
use sme_plug_core::roles::pretty_role;
use sme_plug_core::{AnalysisPayload, BuildStatus, ExpertAnswer, ResponseSlot, RoleRules};

use crate::app::{App, FocusPane, FormField, InputMode, Popup};

/// Parse a line of text and convert **bold** markdown to styled spans
fn parse_markdown_line(text: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut chars = text.chars().peekable();
    let mut current_text = String::new();

    while let Some(c) = chars.next() {
        if c != '*' || chars.peek() != Some(&'*') {
            current_text.push(c);
            continue;
        }
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
            // No closing **, treat as literal
            current_text.push_str("**");
            current_text.push_str(&bold_text);
        }
    }

    if !current_text.is_empty() {
        spans.push(Span::raw(current_text));
    }
    Line::from(spans)
}

/// Color band for a 0-100 hallucination score.
fn score_color(score: f64) -> Color {
    if score >= 60.0 {
        Color::Red
    } else if score >= 30.0 {
        Color::Yellow
    } else {
        Color::Green
    }
}

fn thinking(app: &App, label: &str) -> Text<'static> {
    let dots = ".".repeat(app.animation_frame as usize + 1);
    Text::from(Span::styled(
        format!("{label}{dots}"),
        Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
    ))
}

fn placeholder(text: &str) -> Text<'static> {
    Text::from(Span::styled(
        text.to_string(),
        Style::default().fg(Color::DarkGray),
    ))
}

fn error_text(message: &str) -> Text<'static> {
    Text::from(Span::styled(
        message.to_string(),
        Style::default().fg(Color::Red),
    ))
}

fn pane_block(title: String, focused: bool) -> Block<'static> {
    let color = if focused { Color::Cyan } else { Color::DarkGray };
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(color))
        .title(title)
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    let [header_area, input_area, answers_area, lower_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Length(3),
        Constraint::Min(8),
        Constraint::Length(10),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_input(app, frame, input_area);

    let [expert_area, base_area] =
        Layout::horizontal([Constraint::Percentage(50), Constraint::Percentage(50)])
            .areas(answers_area);
    render_answer(app, frame, expert_area, true);
    render_answer(app, frame, base_area, false);

    let [analysis_area, rules_area] =
        Layout::horizontal([Constraint::Percentage(50), Constraint::Percentage(50)])
            .areas(lower_area);
    render_analysis(app, frame, analysis_area);
    render_guardrails(app, frame, rules_area);

    render_footer(app, frame, footer_area);

    match app.popup {
        Some(Popup::RolePicker) => render_role_picker(app, frame, area),
        Some(Popup::CreateRole) => render_role_form(app, frame, area),
        Some(Popup::History) => render_history(app, frame, area),
        None => {}
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let (status, color) = if app.connectivity.is_online() {
        ("online", Color::Green)
    } else {
        ("offline", Color::Red)
    };
    let provider = app
        .provider
        .map(|p| p.display_name())
        .unwrap_or("backend default");

    let title = Line::from(vec![
        Span::styled(" SME-Plug ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(format!("● {status} "), Style::default().fg(color)),
        Span::raw("│ "),
        Span::styled(pretty_role(&app.selected_role), Style::default().fg(Color::Yellow).bold()),
        Span::raw(" │ "),
        Span::styled(provider, Style::default().fg(Color::Magenta)),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::Black));
    frame.render_widget(header, area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let editing = app.input_mode == InputMode::Editing && app.popup.is_none();
    let border = if editing {
        Color::Yellow
    } else if app.focus == FocusPane::Input {
        Color::Cyan
    } else {
        Color::DarkGray
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border))
        .title(format!(" Ask {} ", pretty_role(&app.selected_role)));

    // Horizontal scroll keeps the cursor visible
    let inner_width = area.width.saturating_sub(2) as usize;
    let scroll_offset = if inner_width > 0 && app.cursor >= inner_width {
        app.cursor - inner_width + 1
    } else {
        0
    };
    let visible: String = app
        .draft()
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible)
        .style(Style::default().fg(Color::Cyan))
        .block(block);
    frame.render_widget(input, area);

    if editing {
        let cursor_x = (app.cursor - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn answer_lines(answer: &ExpertAnswer, expert: bool) -> Text<'static> {
    let mut lines: Vec<Line> = Vec::new();

    if answer.out_of_scope {
        lines.push(Line::from(Span::styled(
            "Outside this role's scope",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )));
        lines.push(Line::default());
    }

    if answer.answer.trim().is_empty() {
        lines.push(Line::from(Span::styled(
            "(empty answer)",
            Style::default().fg(Color::DarkGray),
        )));
    }
    for line in answer.answer.lines() {
        lines.push(parse_markdown_line(line));
    }

    let mut meta = Vec::new();
    if let Some(accuracy) = answer.accuracy {
        meta.push(Span::styled(
            format!("Accuracy {accuracy:.0}%"),
            Style::default().fg(Color::Green),
        ));
    }
    if let Some(model) = &answer.generated_by_model {
        if !meta.is_empty() {
            meta.push(Span::raw("  "));
        }
        meta.push(Span::styled(model.clone(), Style::default().fg(Color::DarkGray)));
    }
    if !meta.is_empty() {
        lines.push(Line::default());
        lines.push(Line::from(meta));
    }

    if expert && !answer.citations.is_empty() {
        lines.push(Line::default());
        lines.push(Line::from(Span::styled("Citations", Style::default().bold())));
        for citation in &answer.citations {
            lines.push(Line::from(Span::styled(
                format!("• {citation}"),
                Style::default().fg(Color::Magenta),
            )));
        }
    }

    if !answer.steps.is_empty() {
        lines.push(Line::default());
        lines.push(Line::from(Span::styled("Reasoning trace", Style::default().bold())));
        for step in &answer.steps {
            let mut spans = vec![
                Span::styled(format!("{} ", step.node), Style::default().fg(Color::Cyan)),
                Span::styled(step.status.clone(), Style::default().fg(Color::DarkGray)),
            ];
            if !step.detail.is_empty() {
                spans.push(Span::raw(format!(" {}", step.detail)));
            }
            lines.push(Line::from(spans));
        }
    }

    Text::from(lines)
}

fn render_answer(app: &App, frame: &mut Frame, area: Rect, expert: bool) {
    let (slot, pane, scroll, title): (&ResponseSlot<ExpertAnswer>, _, _, _) = if expert {
        (
            &app.exchange.expert,
            FocusPane::Expert,
            app.scrolls.expert,
            format!(" {} ", pretty_role(
                app.exchange
                    .query
                    .as_ref()
                    .map(|q| q.expert_role.as_str())
                    .unwrap_or(&app.selected_role),
            )),
        )
    } else {
        (
            &app.exchange.base,
            FocusPane::Base,
            app.scrolls.base,
            " Base Model ".to_string(),
        )
    };

    let text = match slot {
        ResponseSlot::Empty => placeholder(if expert {
            "The expert answer appears here."
        } else {
            "The generic model's answer appears here."
        }),
        ResponseSlot::Loading => thinking(app, "Thinking"),
        ResponseSlot::Error(message) => error_text(message),
        ResponseSlot::Success(answer) => answer_lines(answer, expert),
    };

    let paragraph = Paragraph::new(text)
        .block(pane_block(title, app.focus == pane))
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0));
    frame.render_widget(paragraph, area);
}

fn analysis_lines(payload: &AnalysisPayload) -> Text<'static> {
    let mut lines = Vec::new();
    if let Some(score) = payload.hallucination_score {
        lines.push(Line::from(vec![
            Span::raw("Hallucination score: "),
            Span::styled(
                format!("{score:.0}/100"),
                Style::default().fg(score_color(score)).add_modifier(Modifier::BOLD),
            ),
        ]));
        lines.push(Line::default());
    }
    for line in payload.analysis.lines() {
        lines.push(parse_markdown_line(line));
    }
    Text::from(lines)
}

fn render_analysis(app: &App, frame: &mut Frame, area: Rect) {
    let text = match &app.exchange.analysis {
        ResponseSlot::Empty => placeholder("How far the base model drifted from the expert."),
        ResponseSlot::Loading => thinking(app, "Comparing answers"),
        ResponseSlot::Error(message) => error_text(message),
        ResponseSlot::Success(payload) => analysis_lines(payload),
    };

    let paragraph = Paragraph::new(text)
        .block(pane_block(
            " Hallucination Analysis ".to_string(),
            app.focus == FocusPane::Analysis,
        ))
        .wrap(Wrap { trim: false })
        .scroll((app.scrolls.analysis, 0));
    frame.render_widget(paragraph, area);
}

fn rules_lines(rules: &RoleRules) -> Text<'static> {
    let mut lines = Vec::new();
    if !rules.expert_rules.is_empty() {
        lines.push(Line::from(Span::styled("Guardrails", Style::default().bold())));
        for rule in &rules.expert_rules {
            lines.push(Line::from(format!("• {rule}")));
        }
    }
    if !rules.roadmap.is_empty() {
        if !lines.is_empty() {
            lines.push(Line::default());
        }
        lines.push(Line::from(Span::styled("Roadmap", Style::default().bold())));
        for (i, step) in rules.roadmap.iter().enumerate() {
            lines.push(Line::from(vec![
                Span::styled(format!("{}. {}", i + 1, step.step), Style::default().fg(Color::Yellow)),
                Span::raw(format!(" {}", step.description)),
            ]));
        }
    }
    if lines.is_empty() {
        return placeholder("This role has no guardrails.");
    }
    Text::from(lines)
}

fn render_guardrails(app: &App, frame: &mut Frame, area: Rect) {
    let text = if app.selected_role == sme_plug_core::roles::BASE_ROLE {
        placeholder("The base model runs without guardrails.")
    } else if app.rules.loading {
        thinking(app, "Loading guardrails")
    } else if let Some(rules) = &app.rules.rules {
        rules_lines(rules)
    } else if !app.connectivity.is_online() {
        placeholder("Backend offline; guardrails load when it returns.")
    } else {
        placeholder("No guardrails available.")
    };

    let paragraph = Paragraph::new(text)
        .block(pane_block(
            " Guardrails & Roadmap ".to_string(),
            app.focus == FocusPane::Guardrails,
        ))
        .wrap(Wrap { trim: false })
        .scroll((app.scrolls.guardrails, 0));
    frame.render_widget(paragraph, area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };
    let mode_text = match (app.popup, app.input_mode) {
        (Some(_), _) => " POPUP ",
        (None, InputMode::Normal) => " NORMAL ",
        (None, InputMode::Editing) => " INSERT ",
    };

    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);
    let hint = |key: &'static str, label: &'static str| {
        [
            Span::styled(format!(" {key} "), key_style),
            Span::styled(format!(" {label} "), label_style),
        ]
    };

    let mut spans = vec![Span::styled(mode_text, mode_style)];
    if let Some(notice) = &app.notice {
        spans.push(Span::styled(format!(" {notice} "), Style::default().fg(Color::Yellow)));
    } else {
        let hints: &[(&'static str, &'static str)] = match (app.popup, app.input_mode) {
            (Some(Popup::CreateRole), _) => &[("Tab", "field"), ("Enter", "create"), ("Esc", "close")],
            (Some(_), _) => &[("j/k", "move"), ("Enter", "select"), ("Esc", "close")],
            (None, InputMode::Editing) => &[("Enter", "ask"), ("Esc", "normal"), ("Tab", "panels")],
            (None, InputMode::Normal) => &[
                ("i", "edit"),
                ("Enter", "ask"),
                ("r", "role"),
                ("n", "new"),
                ("c", "create role"),
                ("H", "history"),
                ("Tab", "focus"),
                ("j/k", "scroll"),
                ("q", "quit"),
            ],
        };
        for &(key, label) in hints {
            spans.extend(hint(key, label));
        }
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width.saturating_sub(4));
    let height = height.min(area.height.saturating_sub(4));
    Rect::new(
        area.x + (area.width.saturating_sub(width)) / 2,
        area.y + (area.height.saturating_sub(height)) / 2,
        width,
        height,
    )
}

fn highlight() -> Style {
    Style::default()
        .bg(Color::Blue)
        .fg(Color::White)
        .add_modifier(Modifier::BOLD)
}

fn render_role_picker(app: &mut App, frame: &mut Frame, area: Rect) {
    let options = app.role_options();
    let popup_area = centered(area, 44, options.len() as u16 + 2);
    frame.render_widget(Clear, popup_area);

    let items: Vec<ListItem> = options
        .iter()
        .map(|role| {
            let is_current = *role == app.selected_role;
            let is_custom = app.custom_roles.iter().any(|c| c.role_name == *role);
            let prefix = if is_current { "* " } else { "  " };
            let suffix = if is_custom { " (custom)" } else { "" };
            let style = if is_current {
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            ListItem::new(format!("{prefix}{}{suffix}", pretty_role(role))).style(style)
        })
        .collect();

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan))
                .title(" Select Expert Role "),
        )
        .highlight_style(highlight())
        .highlight_symbol("> ");
    frame.render_stateful_widget(list, popup_area, &mut app.role_picker_state);
}

fn render_history(app: &mut App, frame: &mut Frame, area: Rect) {
    let height = (app.exchange.history.len() as u16 + 2).max(3);
    let popup_area = centered(area, 70, height);
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(format!(" History ({}) ", app.exchange.history.len()));

    if app.exchange.history.is_empty() {
        let empty = Paragraph::new("No past questions in this session.")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(empty, popup_area);
        return;
    }

    let items: Vec<ListItem> = app
        .exchange
        .history
        .entries()
        .iter()
        .map(|entry| {
            // RFC 3339; keep the time of day only
            let time = entry.timestamp.get(11..19).unwrap_or(&entry.timestamp);
            ListItem::new(Line::from(vec![
                Span::styled(format!("{time} "), Style::default().fg(Color::DarkGray)),
                Span::styled(
                    format!("[{}] ", pretty_role(&entry.expert_role)),
                    Style::default().fg(Color::Yellow),
                ),
                Span::raw(entry.question.clone()),
            ]))
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(highlight())
        .highlight_symbol("> ");
    frame.render_stateful_widget(list, popup_area, &mut app.history_state);
}

fn render_role_form(app: &App, frame: &mut Frame, area: Rect) {
    let popup_area = centered(area, 64, 11);
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Create Custom Role ");
    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    let field_line = |label: &str, value: &str, active: bool| {
        let style = if active {
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray)
        };
        Line::from(vec![
            Span::styled(format!("{label:<10}"), style),
            Span::raw(value.to_string()),
            Span::styled(if active { "▏" } else { "" }, style),
        ])
    };

    let status_style = match &app.build_status {
        BuildStatus::Error(_) => Style::default().fg(Color::Red),
        BuildStatus::Success => Style::default().fg(Color::Green),
        _ => Style::default().fg(Color::Yellow),
    };
    let status = if app.build_status.is_busy() {
        let dots = ".".repeat(app.animation_frame as usize + 1);
        format!("{}{dots}", app.build_status.label().trim_end_matches('.'))
    } else {
        app.build_status.label().to_string()
    };

    let lines = vec![
        field_line("Name", &app.form.name, app.form.field == FormField::Name),
        Line::default(),
        field_line("Document", &app.form.file_path, app.form.field == FormField::File),
        Line::from(Span::styled(
            "          optional path to a PDF, TXT or MD file",
            Style::default().fg(Color::DarkGray),
        )),
        Line::default(),
        Line::from(Span::styled(status, status_style)),
    ];

    frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), inner);
}
