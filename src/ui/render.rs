//! Render functions for the TUI.
//!
//! Layout, top to bottom: category tabs, error banner (only after a
//! failure), the prompt list, and the status bar.

use crate::app::App;
use crate::util::single_line;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::Line,
    widgets::{Block, Borders, Paragraph, Tabs, Wrap},
    Frame,
};

use super::{gallery, status};

/// Minimum terminal dimensions required for normal operation.
pub(super) const MIN_WIDTH: u16 = 40;
pub(super) const MIN_HEIGHT: u16 = 10;

/// Main render dispatch function.
pub(super) fn render(f: &mut Frame, app: &mut App) {
    let area = f.area();

    // Guard against zero-width/height to prevent panics
    if area.width < 1 || area.height < 1 {
        return;
    }

    if area.width < MIN_WIDTH || area.height < MIN_HEIGHT {
        let msg = if area.height < 3 || area.width < 20 {
            Paragraph::new("Too small")
        } else {
            Paragraph::new(format!(
                "Terminal too small\n\nMinimum: {}x{}\nCurrent: {}x{}",
                MIN_WIDTH, MIN_HEIGHT, area.width, area.height
            ))
            .alignment(Alignment::Center)
        };
        f.render_widget(msg, area);
        return;
    }

    let banner_height = if app.feed().error.is_some() { 3 } else { 0 };
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(banner_height),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(area);

    render_tabs(f, app, chunks[0]);
    if banner_height > 0 {
        render_error_banner(f, app, chunks[1]);
    }
    gallery::render(f, app, chunks[2]);
    status::render(f, app, chunks[3]);
}

fn render_tabs(f: &mut Frame, app: &App, area: ratatui::layout::Rect) {
    let titles: Vec<Line> = app
        .controller
        .categories()
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let label = single_line(name);
            if i < 9 {
                Line::from(format!("{} {}", i + 1, label))
            } else {
                Line::from(label)
            }
        })
        .collect();

    let tabs = Tabs::new(titles)
        .block(Block::default().borders(Borders::ALL).title(" Prompts "))
        .select(app.category_index())
        .style(Style::default().fg(Color::Gray))
        .highlight_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );
    f.render_widget(tabs, area);
}

fn render_error_banner(f: &mut Frame, app: &App, area: ratatui::layout::Rect) {
    let Some(error) = app.feed().error.as_deref() else {
        return;
    };
    let text = format!("{}  [r] retry", single_line(error));
    let banner = Paragraph::new(text)
        .style(Style::default().fg(Color::White).bg(Color::Red))
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title(" Error "));
    f.render_widget(banner, area);
}
