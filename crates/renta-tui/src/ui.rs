use crate::app::{App, InputMode, Screen};
use ratatui::{
    layout::{Constraint, Flex, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
    Frame,
};
use renta_core::{Field, ProgressStatus, Role, Section};

/// Parse a line of text and convert **bold** markdown to styled spans
fn parse_markdown_line(text: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find("**") {
        let after = &rest[start + 2..];
        let Some(end) = after.find("**") else {
            break;
        };
        if end == 0 {
            // "****" is literal
            spans.push(Span::raw(rest[..start + 4].to_string()));
            rest = &after[2..];
            continue;
        }
        if start > 0 {
            spans.push(Span::raw(rest[..start].to_string()));
        }
        spans.push(Span::styled(
            after[..end].to_string(),
            Style::default().add_modifier(Modifier::BOLD),
        ));
        rest = &after[end + 2..];
    }

    if !rest.is_empty() {
        spans.push(Span::raw(rest.to_string()));
    }

    if spans.is_empty() {
        Line::default()
    } else {
        Line::from(spans)
    }
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);

    match app.screen {
        Screen::Chat => render_chat_screen(app, frame, body_area),
        Screen::Review => render_review_screen(app, frame, body_area),
    }

    render_footer(app, frame, footer_area);

    if app.show_welcome {
        render_welcome(frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let progress_color = match app.progress.status {
        ProgressStatus::NotStarted => Color::Gray,
        ProgressStatus::InProgress => Color::Yellow,
        ProgressStatus::Completed => Color::Green,
    };
    let sync_indicator = if app.synced { "" } else { " [sin guardar]" };

    let title = Line::from(vec![
        Span::styled(" Declaración de la Renta ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(
            format!(" {} ", app.progress.describe()),
            Style::default().fg(progress_color),
        ),
        Span::styled(sync_indicator, Style::default().fg(Color::Red)),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
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
        Screen::Chat => " CHAT ",
        Screen::Review => " REVISIÓN ",
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let hint = |key: &'static str, label: &'static str| {
        [
            Span::styled(key, key_style),
            Span::styled(label, label_style),
        ]
    };

    let hints: Vec<Span> = match (app.screen, app.input_mode) {
        (Screen::Chat, InputMode::Editing) => [
            hint(" Enter ", " enviar "),
            hint(" Esc ", " normal "),
            hint(" Tab ", " revisar "),
            hint(" ^S ", " guardar "),
        ]
        .concat(),
        (Screen::Chat, InputMode::Normal) => [
            hint(" i ", " escribir "),
            hint(" j/k ", " desplazar "),
            hint(" r ", " reintentar "),
            hint(" s ", " sincronizar "),
            hint(" Tab ", " revisar "),
            hint(" q ", " salir "),
        ]
        .concat(),
        (Screen::Review, InputMode::Normal) => [
            hint(" j/k ", " campo "),
            hint(" Enter ", " editar "),
            hint(" ^S ", " guardar "),
            hint(" p ", " PDF "),
            hint(" Tab ", " chat "),
            hint(" q ", " salir "),
        ]
        .concat(),
        (Screen::Review, InputMode::Editing) => {
            [hint(" Enter ", " aceptar "), hint(" Esc ", " cancelar ")].concat()
        }
    };

    let mut spans = vec![Span::styled(mode_text, mode_style), Span::raw(" ")];
    spans.extend(hints);

    if let Some(notice) = &app.notice {
        let color = if notice.is_error { Color::Red } else { Color::Green };
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            notice.text.clone(),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_chat_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    let [chat_area, input_area] =
        Layout::vertical([Constraint::Min(0), Constraint::Length(3)]).areas(area);

    // Inner size minus borders, for scroll calculations
    app.chat_height = chat_area.height.saturating_sub(2);
    app.chat_width = chat_area.width.saturating_sub(2);

    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(format!(" {} ", app.gateway_name));

    let user_label = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);
    let assistant_label = Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD);

    let mut lines: Vec<Line> = Vec::new();
    for msg in &app.messages {
        match msg.role {
            Role::User => {
                lines.push(Line::from(Span::styled("Tú:", user_label)));
                for line in msg.content.lines() {
                    lines.push(Line::from(line.to_string()));
                }
            }
            Role::Assistant => {
                lines.push(Line::from(Span::styled("Asistente:", assistant_label)));
                for line in msg.content.lines() {
                    lines.push(parse_markdown_line(line));
                }
            }
            Role::System => continue,
        }
        lines.push(Line::default());
    }

    if let Some(text) = &app.in_flight {
        lines.push(Line::from(Span::styled("Tú:", user_label)));
        lines.push(Line::from(text.clone()));
        lines.push(Line::default());
    }

    if app.loading {
        lines.push(Line::from(Span::styled("Asistente:", assistant_label)));
        // Animated ellipsis: cycles through ".", "..", "..."
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        lines.push(Line::from(Span::styled(
            format!("Pensando{}", dots),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }

    let chat = Paragraph::new(Text::from(lines))
        .block(chat_block)
        .wrap(Wrap { trim: true })
        .scroll((app.chat_scroll, 0));
    frame.render_widget(chat, chat_area);

    let editing = app.input_mode == InputMode::Editing;
    let input_border_color = if app.loading {
        Color::DarkGray
    } else if editing {
        Color::Yellow
    } else {
        Color::Gray
    };
    let input_title = if app.loading {
        " Esperando respuesta... "
    } else {
        " Mensaje "
    };
    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(input_border_color))
        .title(input_title);

    render_single_line_input(
        frame,
        input_area,
        input_block,
        &app.chat_input,
        app.chat_cursor,
        editing,
    );
}

fn render_review_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    let editing = app.input_mode == InputMode::Editing;
    let [list_area, edit_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(if editing { 3 } else { 0 }),
    ])
    .areas(area);

    let mut section = None::<Section>;
    let items: Vec<ListItem> = app
        .review_fields
        .iter()
        .map(|field| {
            let mut lines = Vec::new();
            if section != Some(field.section()) {
                section = Some(field.section());
                lines.push(Line::from(Span::styled(
                    field.section().title(),
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                )));
            }
            lines.push(field_line(app, *field));
            ListItem::new(lines)
        })
        .collect();

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan))
                .title(" Formulario "),
        )
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, list_area, &mut app.review_state);

    if editing {
        let label = app.selected_field().map(|f| f.label()).unwrap_or_default();
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow))
            .title(format!(" {} ", label));
        render_single_line_input(
            frame,
            edit_area,
            block,
            &app.edit_input,
            app.edit_cursor,
            true,
        );
    }
}

fn field_line(app: &App, field: Field) -> Line<'static> {
    let value = match app.form.get(field) {
        Some(value) => Span::raw(value.to_string()),
        None => Span::styled("-", Style::default().fg(Color::DarkGray)),
    };
    let mut spans = vec![Span::raw(format!("  {}: ", field.label())), value];
    if app.form.is_manual(field) {
        spans.push(Span::styled(" (editado)", Style::default().fg(Color::DarkGray)));
    }
    Line::from(spans)
}

/// Input box with horizontal scrolling that keeps the cursor visible
fn render_single_line_input(
    frame: &mut Frame,
    area: Rect,
    block: Block,
    input: &str,
    cursor_pos: usize,
    show_cursor: bool,
) {
    // Inner width = total width - 2 (for borders)
    let inner_width = area.width.saturating_sub(2) as usize;

    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let visible_text: String = input.chars().skip(scroll_offset).take(inner_width).collect();

    let paragraph = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(block);
    frame.render_widget(paragraph, area);

    if show_cursor {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_welcome(frame: &mut Frame, area: Rect) {
    let [popup_area] = Layout::horizontal([Constraint::Percentage(60)])
        .flex(Flex::Center)
        .areas(area);
    let [popup_area] = Layout::vertical([Constraint::Length(10)])
        .flex(Flex::Center)
        .areas(popup_area);

    let text = vec![
        Line::from(Span::styled(
            "Bienvenido",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        )),
        Line::default(),
        Line::from("Conversa con el asistente y los datos que menciones se"),
        Line::from("irán anotando en tu declaración. Pulsa Tab para revisar"),
        Line::from("y corregir los campos, y p para exportar el PDF."),
        Line::default(),
        Line::from(Span::styled(
            "Pulsa cualquier tecla para empezar",
            Style::default().fg(Color::DarkGray),
        )),
    ];

    let popup = Paragraph::new(text)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .wrap(Wrap { trim: true });

    frame.render_widget(Clear, popup_area);
    frame.render_widget(popup, popup_area);
}
