use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use thiol_core::{MAX_RATING, MIN_RATING};

use super::app::{AppMode, ChatApp};

pub fn handle_event(app: &mut ChatApp, event: Event) {
    if let Event::Key(key) = event
        && key.kind != KeyEventKind::Release
    {
        handle_key(app, key);
    }
}

fn handle_key(app: &mut ChatApp, key: KeyEvent) {
    match app.mode {
        AppMode::Chat => handle_chat_key(app, key),
        AppMode::SelectSession => handle_picker_key(app, key),
        AppMode::Rate => handle_rating_key(app, key),
    }
}

fn handle_chat_key(app: &mut ChatApp, key: KeyEvent) {
    match (key.code, key.modifiers) {
        (KeyCode::Esc, _) => {
            if app.coordinator.notification().is_some() {
                app.coordinator.dismiss_notification();
            } else {
                app.should_quit = true;
            }
        }
        (KeyCode::F(2), _) => app.open_session_picker(),
        (KeyCode::F(4), _) => app.new_conversation(),
        (KeyCode::F(5), _) => app.open_rating(),
        (KeyCode::F(6), _) => app.download_pdf(),
        (KeyCode::Tab, _) => app.select_next_answer(),
        (KeyCode::Enter, KeyModifiers::NONE) => app.send_message(),
        (KeyCode::Up, KeyModifiers::CONTROL) => app.scroll_up(),
        (KeyCode::Down, KeyModifiers::CONTROL) => app.scroll_down(),
        (KeyCode::Backspace, _) => app.input_backspace(),
        (KeyCode::Delete, _) => app.input_delete(),
        (KeyCode::Left, _) => app.input_left(),
        (KeyCode::Right, _) => app.input_right(),
        (KeyCode::Home, _) => app.input_home(),
        (KeyCode::End, _) => app.input_end(),
        (KeyCode::Char(c), KeyModifiers::NONE | KeyModifiers::SHIFT) => app.input_char(c),
        _ => {}
    }
}

fn handle_picker_key(app: &mut ChatApp, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.close_popup(),
        KeyCode::Enter => app.popup_select(),
        KeyCode::Up => app.popup_up(),
        KeyCode::Down => app.popup_down(),
        _ => {}
    }
}

fn handle_rating_key(app: &mut ChatApp, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.close_popup(),
        KeyCode::Char(c) => {
            if let Some(stars) = c.to_digit(10).and_then(|d| u8::try_from(d).ok())
                && (MIN_RATING..=MAX_RATING).contains(&stars)
            {
                app.submit_rating(stars);
            }
        }
        _ => {}
    }
}
