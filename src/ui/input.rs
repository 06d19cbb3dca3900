//! Input handling for the TUI.
//!
//! Every key maps to one call on [`App`]; the feed itself is only ever
//! changed through the controller's intents.

use crate::app::App;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use super::Action;

/// Main input dispatch function.
pub(super) fn handle_input(app: &mut App, key: KeyEvent) -> Action {
    if key.kind == KeyEventKind::Release {
        return Action::Continue;
    }

    match (key.code, key.modifiers) {
        (KeyCode::Char('c'), KeyModifiers::CONTROL) => return Action::Quit,
        (KeyCode::Char('q'), _) | (KeyCode::Esc, _) => return Action::Quit,

        // Categories
        (KeyCode::Left, _) | (KeyCode::Char('h'), _) | (KeyCode::BackTab, _) => {
            app.prev_category()
        }
        (KeyCode::Right, _) | (KeyCode::Char('l'), _) | (KeyCode::Tab, _) => app.next_category(),
        (KeyCode::Char(c @ '1'..='9'), _) => {
            if let Some(digit) = c.to_digit(10) {
                app.select_category_at(digit as usize - 1);
            }
        }

        // Cursor
        (KeyCode::Down, _) | (KeyCode::Char('j'), _) => app.select_next(1),
        (KeyCode::Up, _) | (KeyCode::Char('k'), _) => app.select_prev(1),
        (KeyCode::PageDown, _) | (KeyCode::Char('d'), KeyModifiers::CONTROL) => app.page_down(),
        (KeyCode::PageUp, _) | (KeyCode::Char('u'), KeyModifiers::CONTROL) => app.page_up(),
        (KeyCode::Home, _) | (KeyCode::Char('g'), _) => app.select_first(),
        (KeyCode::End, _) | (KeyCode::Char('G'), _) => app.select_last(),

        // Feed intents
        (KeyCode::Char('n'), _) | (KeyCode::Char(' '), _) => app.load_more(),
        (KeyCode::Char('r'), _) => app.retry(),
        (KeyCode::Char('+'), _) | (KeyCode::Char('='), _) => app.cycle_page_size(true),
        (KeyCode::Char('-'), _) => app.cycle_page_size(false),
        (KeyCode::Char('o'), _) | (KeyCode::Enter, _) => app.open_selected(),

        _ => {}
    }
    Action::Continue
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::{ControllerSettings, FeedController, FeedEvent, ScrollTrigger};
    use crate::remote::{ChangeCallback, FeedClient, FeedPage, PageQuery, RemoteError, Subscription};
    use async_trait::async_trait;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    struct EmptyClient;

    #[async_trait]
    impl FeedClient for EmptyClient {
        async fn query(&self, query: &PageQuery) -> Result<FeedPage, RemoteError> {
            Ok(FeedPage {
                items: Vec::new(),
                page: query.page,
                per_page: query.page_size,
                total_items: 0,
                total_pages: 0,
            })
        }

        fn subscribe(&self, _on_change: ChangeCallback) -> Result<Subscription, RemoteError> {
            Ok(Subscription::new(|| {}))
        }
    }

    fn test_app() -> (App, mpsc::Receiver<FeedEvent>) {
        let (tx, rx) = mpsc::channel(8);
        let controller = FeedController::new(Arc::new(EmptyClient), ControllerSettings::default(), tx);
        let mut app = App::new(controller, ScrollTrigger::default());
        app.controller.start();
        (app, rx)
    }

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[tokio::test]
    async fn test_quit_keys() {
        let (mut app, _rx) = test_app();
        assert!(matches!(handle_input(&mut app, press(KeyCode::Char('q'))), Action::Quit));
        assert!(matches!(handle_input(&mut app, press(KeyCode::Esc)), Action::Quit));
        assert!(matches!(
            handle_input(&mut app, KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Action::Quit
        ));
    }

    #[tokio::test]
    async fn test_digit_jumps_to_category() {
        let (mut app, _rx) = test_app();
        handle_input(&mut app, press(KeyCode::Char('3')));
        assert_eq!(app.feed().category, "COUPLE");

        // Out of range digits are ignored
        handle_input(&mut app, press(KeyCode::Char('9')));
        assert_eq!(app.feed().category, "COUPLE");
    }

    #[tokio::test]
    async fn test_arrow_keys_cycle_categories() {
        let (mut app, _rx) = test_app();
        handle_input(&mut app, press(KeyCode::Right));
        assert_eq!(app.feed().category, "NỮ");
        handle_input(&mut app, press(KeyCode::Char('h')));
        assert_eq!(app.feed().category, "NAM");
    }

    #[tokio::test]
    async fn test_page_size_keys() {
        let (mut app, _rx) = test_app();
        handle_input(&mut app, press(KeyCode::Char('+')));
        assert_eq!(app.feed().page_size, 20);
        handle_input(&mut app, press(KeyCode::Char('-')));
        assert_eq!(app.feed().page_size, 10);
    }

    #[tokio::test]
    async fn test_empty_feed_navigation_is_harmless() {
        let (mut app, mut rx) = test_app();
        let event = rx.recv().await.unwrap();
        app.handle_feed_event(event);
        assert!(app.feed().is_empty());

        for code in [KeyCode::Down, KeyCode::Up, KeyCode::End, KeyCode::PageDown, KeyCode::Char('o')] {
            assert!(matches!(handle_input(&mut app, press(code)), Action::Continue));
        }
        assert_eq!(app.selected, 0);
    }
}
