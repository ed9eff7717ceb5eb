use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
    Frame,
};
use thiol_core::{Message, NotificationLevel, RatingState, MAX_RATING};

use super::app::{AppMode, ChatApp};

pub fn render(frame: &mut Frame, app: &ChatApp) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Header
            Constraint::Min(1),    // Messages
            Constraint::Length(3), // Input
            Constraint::Length(1), // Status bar
        ])
        .split(frame.area());

    render_header(frame, app, chunks[0]);
    render_messages(frame, app, chunks[1]);
    render_input(frame, app, chunks[2]);
    render_status_bar(frame, app, chunks[3]);

    match app.mode {
        AppMode::SelectSession => render_session_popup(frame, app),
        AppMode::Rate => render_rating_popup(frame),
        AppMode::Chat => {}
    }
}

fn render_header(frame: &mut Frame, app: &ChatApp, area: Rect) {
    let user = app
        .ctx
        .identity()
        .map(|i| i.user_id.as_str())
        .unwrap_or("signed out");
    let session = app.sessions.active_session().unwrap_or("new conversation");

    let title = format!("thl chat - {}  [{}]", session, user);
    let header =
        Paragraph::new(title).style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD));

    frame.render_widget(header, area);
}

fn stars(rating: u8) -> String {
    let filled = usize::from(rating.min(MAX_RATING));
    format!(
        "{}{}",
        "★".repeat(filled),
        "☆".repeat(usize::from(MAX_RATING) - filled)
    )
}

fn message_lines<'a>(app: &ChatApp, msg: &'a Message, lines: &mut Vec<Line<'a>>) {
    let selected = app.selected.as_ref() == Some(&msg.message_id);
    let (role, style) = if msg.is_user {
        ("You", Style::default().fg(Color::Green))
    } else {
        ("Assistant", Style::default().fg(Color::Blue))
    };

    let mut header = vec![Span::styled(
        format!("{}{}:", if selected { "> " } else { "" }, role),
        style.add_modifier(Modifier::BOLD),
    )];
    if msg.accepts_feedback() {
        let rating = match app.rating_of(msg) {
            RatingState::Rated(r) => format!("  {}", stars(r)),
            RatingState::Submitting(r) => format!("  {} (sending)", stars(r)),
            RatingState::Unrated => String::new(),
        };
        header.push(Span::styled(rating, Style::default().fg(Color::Yellow)));
    }
    lines.push(Line::from(header));

    for line in msg.content.lines() {
        lines.push(Line::from(format!("  {}", line)));
    }

    if !msg.sources.is_empty() {
        let dim = Style::default().fg(Color::DarkGray);
        lines.push(Line::from(Span::styled(
            "  Sources:",
            dim.add_modifier(Modifier::ITALIC),
        )));
        for source in &msg.sources {
            lines.push(Line::from(Span::styled(
                format!(
                    "   - {}, Page {}, Paragraph {}",
                    source.document, source.page, source.paragraph
                ),
                Style::default().fg(Color::Magenta),
            )));
            for line in source.text.lines() {
                lines.push(Line::from(Span::styled(format!("     {}", line), dim)));
            }
        }
    }
    if msg.pdf_path.is_some() {
        lines.push(Line::from(Span::styled(
            "  [PDF available: select with Tab, F6 to download]",
            Style::default().fg(Color::DarkGray),
        )));
    }

    lines.push(Line::from("")); // Empty line between messages
}

fn render_messages(frame: &mut Frame, app: &ChatApp, area: Rect) {
    let mut lines: Vec<Line> = Vec::new();

    for msg in app.store.messages() {
        message_lines(app, msg, &mut lines);
    }

    if app.is_loading_history() {
        lines.push(Line::from(Span::styled(
            "Loading conversation...",
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }

    if app.coordinator.is_typing() {
        lines.push(Line::from(Span::styled(
            "Assistant is typing...",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::ITALIC),
        )));
    }

    if let Some(notification) = app.coordinator.notification() {
        let color = match notification.level {
            NotificationLevel::Info => Color::Green,
            NotificationLevel::Error => Color::Red,
        };
        lines.push(Line::from(Span::styled(
            format!(
                "{}: {}  (Esc to dismiss)",
                notification.title, notification.description
            ),
            Style::default().fg(color),
        )));
    }

    let messages_block = Block::default().borders(Borders::ALL).title("Messages");

    // Keep the bottom of the conversation in view
    let visible_height = area.height.saturating_sub(2) as usize;
    let total_lines = lines.len();
    let scroll = if total_lines > visible_height {
        (total_lines - visible_height).saturating_sub(app.messages_scroll as usize)
    } else {
        0
    };

    let paragraph = Paragraph::new(Text::from(lines))
        .block(messages_block)
        .wrap(Wrap { trim: false })
        .scroll((scroll as u16, 0));

    frame.render_widget(paragraph, area);
}

fn render_input(frame: &mut Frame, app: &ChatApp, area: Rect) {
    let input_block = Block::default().borders(Borders::ALL).title("Input");
    let input = app.coordinator.input();
    let enabled = app.coordinator.input_enabled();

    let (display_text, style) = if !enabled {
        (input.to_string(), Style::default().fg(Color::DarkGray))
    } else if input.is_empty() {
        (
            "Type your message here...".to_string(),
            Style::default().fg(Color::DarkGray),
        )
    } else {
        (input.to_string(), Style::default())
    };

    let input_paragraph = Paragraph::new(display_text).style(style).block(input_block);
    frame.render_widget(input_paragraph, area);

    if app.mode == AppMode::Chat && enabled {
        let width = input[..app.cursor_pos.min(input.len())].chars().count() as u16;
        frame.set_cursor_position((area.x + 1 + width, area.y + 1));
    }
}

fn render_status_bar(frame: &mut Frame, app: &ChatApp, area: Rect) {
    let status = match app.mode {
        AppMode::Chat if app.is_pending() => "Waiting for response...  Esc: Quit",
        AppMode::Chat => {
            "Enter: Send  F2: Chats  F4: New  Tab: Select answer  F5: Rate  F6: PDF  Ctrl+↑/↓: Scroll  Esc: Quit"
        }
        AppMode::SelectSession => "↑/↓: Navigate  Enter: Open  Esc: Cancel",
        AppMode::Rate => "1-5: Stars  Esc: Cancel",
    };

    let status_bar = Paragraph::new(status).style(Style::default().fg(Color::DarkGray));

    frame.render_widget(status_bar, area);
}

fn render_session_popup(frame: &mut Frame, app: &ChatApp) {
    let area = centered_rect(50, 50, frame.area());
    frame.render_widget(Clear, area);

    let active = app.sessions.active_session();
    let items: Vec<ListItem> = app
        .sessions
        .sessions()
        .iter()
        .map(|session| {
            let is_active = Some(session.session_id.as_str()) == active;
            let style = if is_active {
                Style::default().fg(Color::Green)
            } else {
                Style::default()
            };
            let marker = if is_active { " ✓" } else { "" };
            ListItem::new(format!(
                "{}  {}{}",
                session.created_at.format("%Y-%m-%d %H:%M"),
                session.session_id,
                marker
            ))
            .style(style)
        })
        .collect();

    let title = if items.is_empty() { "Chats (none yet)" } else { "Chats" };
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(title))
        .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
        .highlight_symbol("> ");

    let mut state = ratatui::widgets::ListState::default();
    state.select(Some(app.popup_selected));

    frame.render_stateful_widget(list, area, &mut state);
}

fn render_rating_popup(frame: &mut Frame) {
    let area = centered_rect(30, 20, frame.area());
    frame.render_widget(Clear, area);

    let lines: Vec<Line> = (1..=MAX_RATING)
        .map(|r| Line::from(format!("{}  {}", r, stars(r))))
        .collect();
    let popup = Paragraph::new(Text::from(lines))
        .block(Block::default().borders(Borders::ALL).title("Rate this answer"));

    frame.render_widget(popup, area);
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stars() {
        assert_eq!(stars(3), "★★★☆☆");
        assert_eq!(stars(5), "★★★★★");
        assert_eq!(stars(9), "★★★★★");
    }
}
