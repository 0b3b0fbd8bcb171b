use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tokio::time::Instant;

use portal_core::TrackSource;

use crate::app::{App, InputMode, Screen};
use crate::tui::AppEvent;

pub async fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key).await,
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => app.tick(),
    }
    Ok(())
}

async fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    if app.show_login {
        handle_login(app, key);
        return;
    }

    match (app.screen, app.input_mode) {
        (Screen::Landing, _) => handle_landing(app, key),
        (Screen::Session, InputMode::Normal) => handle_session_normal(app, key).await,
        (Screen::Session, InputMode::Editing) => handle_chat_editing(app, key),
    }
}

fn handle_landing(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Esc => {
            app.dismiss_toast();
        }
        KeyCode::Enter | KeyCode::Char(' ') => app.open_login(),
        KeyCode::Char('t') => app.toggle_theme(),
        KeyCode::Left | KeyCode::Char('h') => app.landing.prev_stat(Instant::now()),
        KeyCode::Right | KeyCode::Char('l') => app.landing.next_stat(Instant::now()),
        KeyCode::Char(c @ '1'..='4') => {
            let index = c as usize - '1' as usize;
            app.landing.select_stat(index, Instant::now());
        }
        _ => {}
    }
}

fn handle_login(app: &mut App, key: KeyEvent) {
    if key.code == KeyCode::Esc {
        app.close_login();
        return;
    }
    // Fields are frozen while the attempt is pending
    if app.login.loading {
        return;
    }

    match key.code {
        KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => app.login.switch_focus(),
        KeyCode::Char('r') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.login.show_password = !app.login.show_password;
        }
        KeyCode::Enter => app.submit_login(),
        KeyCode::Backspace => {
            app.login.focused_mut().pop();
        }
        KeyCode::Char(c) => {
            app.login.focused_mut().push(c);
            app.login.error = None;
        }
        _ => {}
    }
}

async fn handle_session_normal(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => {
            app.leave().await;
            app.should_quit = true;
        }
        KeyCode::Esc => {
            app.dismiss_toast();
        }
        KeyCode::Char('m') => app.toggle_device(TrackSource::Microphone).await,
        KeyCode::Char('v') => {
            if app.controls.visible().camera {
                app.toggle_device(TrackSource::Camera).await;
            }
        }
        KeyCode::Char('s') => {
            if app.controls.visible().screen_share {
                app.toggle_device(TrackSource::ScreenShare).await;
            }
        }
        KeyCode::Char('c') => app.toggle_chat(),
        KeyCode::Char('i') | KeyCode::Enter => {
            if app.controls.chat_open() {
                app.input_mode = InputMode::Editing;
            }
        }
        KeyCode::Char('t') => app.toggle_theme(),
        KeyCode::Char('x') => app.leave().await,
        _ => {}
    }
}

fn handle_chat_editing(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.input_mode = InputMode::Normal,
        KeyCode::Enter => app.send_chat(),
        KeyCode::Backspace => {
            app.chat_input.pop();
        }
        KeyCode::Char(c) => {
            app.chat_input.push(c);
            app.chat_status = None;
        }
        _ => {}
    }
}
