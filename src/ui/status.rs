use crate::app::{App, SPINNER_FRAMES};
use crate::feed::Phase;
use ratatui::{
    layout::Rect,
    style::{Color, Style},
    widgets::Paragraph,
    Frame,
};
use std::borrow::Cow;

const SPINNER: [char; SPINNER_FRAMES] = ['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];

const HINTS: &str = "[←/→]category [j/k]move [n]more [r]retry [+/-]page size [o]pen [q]uit";

/// Text for the status bar: transient message first, then loading state,
/// then key hints.
fn status_text(app: &App) -> Cow<'_, str> {
    if let Some((msg, _)) = &app.status_message {
        return Cow::Borrowed(msg.as_ref());
    }
    let feed = app.feed();
    match feed.phase {
        Phase::Loading => Cow::Owned(format!(
            "{} Loading page {}...",
            SPINNER[app.spinner_frame % SPINNER_FRAMES],
            feed.page
        )),
        Phase::Failed => Cow::Borrowed("Loading stopped. [r] retry, or pick another category"),
        Phase::Idle | Phase::Loaded => Cow::Borrowed(HINTS),
    }
}

/// Render the status bar
pub fn render(f: &mut Frame, app: &App, area: Rect) {
    if area.width < 1 || area.height < 1 {
        return;
    }

    let style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let paragraph = Paragraph::new(status_text(app)).style(style);
    f.render_widget(paragraph, area);
}
