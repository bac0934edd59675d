use crate::app::{App, InputMode, Screen};
use crate::tui::AppEvent;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub async fn handle_event(app: &mut App, event: AppEvent) {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => {
            app.tick_animation();
            app.poll_round_trip().await;
        }
    }
}

fn handle_key(app: &mut App, key: KeyEvent) {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    // Global keys that work in any mode
    if ctrl && key.code == KeyCode::Char('c') {
        app.should_quit = true;
        return;
    }
    if app.show_welcome {
        app.dismiss_welcome();
        return;
    }
    if ctrl && key.code == KeyCode::Char('s') {
        app.save_form();
        return;
    }

    match (app.screen, app.input_mode) {
        (Screen::Chat, InputMode::Normal) => handle_chat_normal(app, key),
        (Screen::Chat, InputMode::Editing) => handle_chat_editing(app, key),
        (Screen::Review, InputMode::Normal) => handle_review_normal(app, key),
        (Screen::Review, InputMode::Editing) => handle_review_editing(app, key),
    }
}

fn handle_chat_normal(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Char('i') | KeyCode::Enter => app.input_mode = InputMode::Editing,
        KeyCode::Char('r') => app.retry_pending(),
        KeyCode::Char('s') => app.sync(),
        KeyCode::Char('j') | KeyCode::Down => app.scroll_chat_down(),
        KeyCode::Char('k') | KeyCode::Up => app.scroll_chat_up(),
        KeyCode::Char('G') => app.scroll_chat_to_bottom(),
        KeyCode::Tab => app.screen = Screen::Review,
        _ => {}
    }
}

fn handle_chat_editing(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.input_mode = InputMode::Normal,
        KeyCode::Enter => {
            // Send stays disabled while a round-trip is in flight
            if app.round_trip_task.is_none() {
                app.submit_chat();
            }
        }
        KeyCode::Tab => {
            app.screen = Screen::Review;
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Up => app.scroll_chat_up(),
        KeyCode::Down => app.scroll_chat_down(),
        _ => edit_text(&mut app.chat_input, &mut app.chat_cursor, key),
    }
}

fn handle_review_normal(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Char('j') | KeyCode::Down => app.review_nav_down(),
        KeyCode::Char('k') | KeyCode::Up => app.review_nav_up(),
        KeyCode::Char('e') | KeyCode::Enter => app.begin_edit(),
        KeyCode::Char('p') => app.export_pdf(),
        KeyCode::Char('s') => app.sync(),
        KeyCode::Tab | KeyCode::Esc => {
            app.screen = Screen::Chat;
            app.input_mode = InputMode::Editing;
        }
        _ => {}
    }
}

fn handle_review_editing(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.cancel_edit(),
        KeyCode::Enter => app.commit_edit(),
        _ => edit_text(&mut app.edit_input, &mut app.edit_cursor, key),
    }
}

/// Single-line text editing shared by the chat input and the field editor
fn edit_text(input: &mut String, cursor: &mut usize, key: KeyEvent) {
    match key.code {
        KeyCode::Backspace => {
            if *cursor > 0 {
                *cursor -= 1;
                let byte_pos = char_to_byte_index(input, *cursor);
                input.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            if *cursor < input.chars().count() {
                let byte_pos = char_to_byte_index(input, *cursor);
                input.remove(byte_pos);
            }
        }
        KeyCode::Left => *cursor = cursor.saturating_sub(1),
        KeyCode::Right => *cursor = (*cursor + 1).min(input.chars().count()),
        KeyCode::Home => *cursor = 0,
        KeyCode::End => *cursor = input.chars().count(),
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(input, *cursor);
            input.insert(byte_pos, c);
            *cursor += 1;
        }
        _ => {}
    }
}
