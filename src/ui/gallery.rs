use crate::app::App;
use crate::remote::FeedItem;
use crate::util::{single_line, truncate_to_width};
use chrono::{DateTime, Utc};
use ratatui::{
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph},
    Frame,
};

/// Rows each record occupies in the list.
const ROWS_PER_ITEM: u16 = 2;

/// Placeholder cards drawn while the first page is loading.
const SKELETON_CARDS: usize = 4;

/// Format a creation time relative to `now`.
pub fn format_relative_time(created: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(created) = created else {
        return String::new();
    };

    let diff = (now - created).num_seconds();
    if diff < 60 {
        return "now".to_string();
    }
    if diff < 3600 {
        return format!("{}m", diff / 60);
    }
    if diff < 86400 {
        return format!("{}h", diff / 3600);
    }
    if diff < 604800 {
        return format!("{}d", diff / 86400);
    }
    created.format("%b %d").to_string()
}

fn card(item: &FeedItem, index: usize, width: usize, now: DateTime<Utc>) -> ListItem<'static> {
    let number = format!("{:>3}. ", index + 1);
    let prompt = single_line(&item.prompt);
    let prompt = if prompt.is_empty() {
        "(no prompt)".to_string()
    } else {
        prompt
    };
    let budget = width.saturating_sub(number.len());
    let first = Line::from(vec![
        Span::styled(number.clone(), Style::default().fg(Color::DarkGray)),
        Span::raw(truncate_to_width(&prompt, budget).into_owned()),
    ]);

    let age = format_relative_time(item.created_at(), now);
    let link = single_line(item.image_url());
    let meta = if age.is_empty() {
        link
    } else {
        format!("{} · {}", age, link)
    };
    let second = Line::from(Span::styled(
        format!(
            "{}{}",
            " ".repeat(number.len()),
            truncate_to_width(&meta, budget)
        ),
        Style::default().fg(Color::DarkGray),
    ));

    ListItem::new(vec![first, second])
}

fn skeleton(width: usize) -> ListItem<'static> {
    let bar = "░".repeat(width.saturating_sub(6).min(60));
    let short = "░".repeat(width.saturating_sub(6).min(24));
    ListItem::new(vec![
        Line::from(format!("     {}", bar)),
        Line::from(format!("     {}", short)),
    ])
    .style(Style::default().fg(Color::DarkGray))
}

fn title(app: &App) -> String {
    let feed = app.feed();
    match (feed.total_items, feed.total_pages) {
        (Some(items), Some(pages)) if pages > 0 => format!(
            " {} · page {}/{} · {} prompts ",
            single_line(&feed.category),
            feed.page,
            pages,
            items
        ),
        _ => format!(" {} ", single_line(&feed.category)),
    }
}

/// Render the prompt list, or the placeholder that stands in for it.
pub fn render(f: &mut Frame, app: &mut App, area: Rect) {
    if area.width < 3 || area.height < 3 {
        return;
    }

    let block = Block::default().borders(Borders::ALL).title(title(app));
    let inner_width = area.width.saturating_sub(2) as usize;
    let inner_height = area.height.saturating_sub(2);
    app.viewport_rows = (inner_height / ROWS_PER_ITEM).max(1) as usize;

    let feed = app.feed();

    if feed.items.is_empty() {
        if feed.loading {
            let mut cards: Vec<ListItem> = (0..SKELETON_CARDS).map(|_| skeleton(inner_width)).collect();
            cards.insert(0, ListItem::new(Line::from("  Loading prompts...")));
            f.render_widget(List::new(cards).block(block), area);
            return;
        }
        let message = if feed.error.is_some() {
            ""
        } else {
            "No prompts found for this category."
        };
        let paragraph = Paragraph::new(message)
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        f.render_widget(paragraph, area);
        return;
    }

    let now = Utc::now();
    let mut cards: Vec<ListItem> = feed
        .items
        .iter()
        .enumerate()
        .map(|(i, item)| card(item, i, inner_width, now))
        .collect();

    if feed.loading {
        cards.push(ListItem::new(Line::from(Span::styled(
            "     Loading more...",
            Style::default().fg(Color::Yellow),
        ))));
    } else if feed.reached_end() {
        cards.push(ListItem::new(Line::from(Span::styled(
            "     You've seen all the prompts.",
            Style::default().fg(Color::DarkGray),
        ))));
    }

    let list = List::new(cards).block(block).highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    );

    app.list_state.select(Some(app.selected));
    f.render_stateful_widget(list, area, &mut app.list_state);
}
