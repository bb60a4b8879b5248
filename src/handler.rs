use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};

use crate::app::{App, FocusPane, InputMode, Popup};
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize => {}
        AppEvent::Tick => app.tick(),
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }
    app.notice = None;

    match app.popup {
        Some(Popup::RolePicker) => handle_role_picker(app, key),
        Some(Popup::History) => handle_history(app, key),
        Some(Popup::CreateRole) => handle_role_form(app, key),
        None => match app.input_mode {
            InputMode::Normal => handle_normal_mode(app, key),
            InputMode::Editing => handle_editing_mode(app, key),
        },
    }
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,

        KeyCode::Char('i') => {
            app.focus = FocusPane::Input;
            app.input_mode = InputMode::Editing;
        }
        KeyCode::Enter => app.submit_query(),
        KeyCode::Char('n') => app.new_session(),

        KeyCode::Char('r') => app.open_role_picker(),
        KeyCode::Char('c') => app.open_role_form(),
        KeyCode::Char('H') => app.open_history(),

        KeyCode::Tab => app.focus = app.focus.next(),
        KeyCode::Char('j') | KeyCode::Down => app.scroll_down(1),
        KeyCode::Char('k') | KeyCode::Up => app.scroll_up(1),
        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => app.scroll_down(10),
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => app.scroll_up(10),
        KeyCode::Char('g') => {
            if let Some(offset) = app.scrolls.get_mut(app.focus) {
                *offset = 0;
            }
        }

        _ => {}
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    let mut draft = app.draft().to_string();
    let mut cursor = app.cursor;

    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
            return;
        }
        KeyCode::Enter => {
            app.submit_query();
            app.input_mode = InputMode::Normal;
            return;
        }
        KeyCode::Tab => {
            app.input_mode = InputMode::Normal;
            app.focus = app.focus.next();
            return;
        }
        KeyCode::Backspace => {
            if cursor > 0 {
                cursor -= 1;
                draft.remove(char_to_byte_index(&draft, cursor));
            }
        }
        KeyCode::Delete => {
            if cursor < draft.chars().count() {
                draft.remove(char_to_byte_index(&draft, cursor));
            }
        }
        KeyCode::Left => cursor = cursor.saturating_sub(1),
        KeyCode::Right => cursor = (cursor + 1).min(draft.chars().count()),
        KeyCode::Home => cursor = 0,
        KeyCode::End => cursor = draft.chars().count(),
        KeyCode::Char(c) => {
            draft.insert(char_to_byte_index(&draft, cursor), c);
            cursor += 1;
        }
        _ => return,
    }

    app.set_draft(draft, cursor);
}

fn handle_role_picker(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc | KeyCode::Char('q') => app.popup = None,
        KeyCode::Char('j') | KeyCode::Down => app.list_down(),
        KeyCode::Char('k') | KeyCode::Up => app.list_up(),
        KeyCode::Enter => app.confirm_role_picker(),
        _ => {}
    }
}

fn handle_history(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('H') => app.popup = None,
        KeyCode::Char('j') | KeyCode::Down => app.list_down(),
        KeyCode::Char('k') | KeyCode::Up => app.list_up(),
        KeyCode::Enter => app.recall_history(),
        _ => {}
    }
}

fn handle_role_form(app: &mut App, key: KeyEvent) {
    match key.code {
        // Closing the form does not cancel a build in progress
        KeyCode::Esc => app.popup = None,
        KeyCode::Tab | KeyCode::Down | KeyCode::Up => app.form.toggle_field(),
        KeyCode::Enter => app.submit_role_form(),
        KeyCode::Backspace => {
            app.form.active_mut().pop();
        }
        KeyCode::Char(c) if !app.build_status.is_busy() => app.form.active_mut().push(c),
        _ => {}
    }
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    match mouse.kind {
        MouseEventKind::ScrollDown => {
            if app.popup.is_some() {
                app.list_down();
            } else {
                app.scroll_down(3);
            }
        }
        MouseEventKind::ScrollUp => {
            if app.popup.is_some() {
                app.list_up();
            } else {
                app.scroll_up(3);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_char_to_byte_index_handles_multibyte() {
        let s = "¿Qué?";
        assert_eq!(char_to_byte_index(s, 0), 0);
        assert_eq!(char_to_byte_index(s, 1), 2);
        assert_eq!(char_to_byte_index(s, 4), 6);
        assert_eq!(char_to_byte_index(s, 10), s.len());
    }
}
