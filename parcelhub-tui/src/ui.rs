use parcelhub_core::{Service, Shop};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Cell, List, ListItem, ListState, Paragraph, Row, Table, Wrap},
};

use crate::app::{App, Screen};

pub(crate) fn draw(frame: &mut Frame<'_>, app: &App) {
    let [header_area, content_area, status_area] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Min(0),
        Constraint::Length(3),
    ])
    .margin(1)
    .areas(frame.area());

    let header = Paragraph::new("parcelhub – drop-off points and services across carriers")
        .block(bordered("Parcelhub"));
    frame.render_widget(header, header_area);

    match app.screen {
        Screen::CarrierSelect => draw_carrier_select(frame, app, content_area),
        Screen::ShopSearch => draw_shop_search(frame, app, content_area),
        Screen::ShopView => draw_shop_view(frame, app, content_area),
    }

    frame.render_widget(status_line(app), status_area);
}

fn bordered<'a, T: Into<Line<'a>>>(title: T) -> Block<'a> {
    Block::default().borders(Borders::ALL).title(title)
}

fn nav_hint(screen: Screen) -> &'static str {
    match screen {
        Screen::CarrierSelect => "↑/↓ move · Enter/Space select carrier · q/Ctrl-C quit",
        Screen::ShopSearch => {
            "Type to edit · Enter search · Tab/→ open shop · Left/Esc back · Ctrl-C quit"
        }
        Screen::ShopView => "Esc/←/b back to results · q/Ctrl-C quit",
    }
}

/// Loading and error state win over the plain key hints.
fn status_line(app: &App) -> Paragraph<'static> {
    let hint = nav_hint(app.screen);
    let (text, style) = match (&app.error_message, app.is_loading) {
        (_, true) => (format!("Searching… · {hint}"), Style::default().fg(Color::Yellow)),
        (Some(message), false) => (format!("{message} · {hint}"), Style::default().fg(Color::Red)),
        (None, false) => (hint.to_owned(), Style::default()),
    };

    Paragraph::new(text)
        .block(bordered("Status"))
        .style(style)
        .wrap(Wrap { trim: true })
}

fn highlight() -> Style {
    Style::default()
        .fg(Color::Yellow)
        .add_modifier(Modifier::BOLD)
}

fn draw_carrier_select(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let entries = std::iter::once(format!("All carriers ({})", app.carriers.len())).chain(
        app.carriers
            .iter()
            .map(|carrier| format!("{} [{}]", carrier.name, carrier.uid)),
    );

    let items = entries
        .enumerate()
        .map(|(idx, label)| {
            let prefix = if idx == app.carrier_list_index {
                "> "
            } else {
                "  "
            };
            ListItem::new(format!("{prefix}{label}"))
        })
        .collect::<Vec<ListItem<'_>>>();

    let list = List::new(items)
        .block(bordered("Select carrier (↑/↓, Enter)"))
        .highlight_style(highlight());

    let mut state = ListState::default();
    state.select(Some(app.carrier_list_index));
    frame.render_stateful_widget(list, area, &mut state);
}

fn draw_shop_search(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let error_rows = u16::try_from(app.carrier_errors.len()).unwrap_or(u16::MAX);
    let errors_height = if error_rows == 0 {
        0
    } else {
        error_rows.saturating_add(2)
    };

    let [input_area, errors_area, results_area] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Length(errors_height),
        Constraint::Min(0),
    ])
    .areas(area);

    let input = Paragraph::new(app.location_input.as_str())
        .block(bordered(format!(
            "Search at {} (`street number, postal city` or `lat,lng`, Enter)",
            app.selection_label()
        )))
        .wrap(Wrap { trim: true });

    frame.render_widget(input, input_area);

    if !app.carrier_errors.is_empty() {
        let lines = app
            .carrier_errors
            .iter()
            .map(|(uid, message)| Line::from(format!("{uid}: {message}")))
            .collect::<Vec<_>>();
        let errors = Paragraph::new(lines)
            .block(bordered("Carriers that did not answer"))
            .style(Style::default().fg(Color::Red))
            .wrap(Wrap { trim: true });
        frame.render_widget(errors, errors_area);
    }

    let items = if app.shop_results.is_empty() {
        vec![ListItem::new(
            "No shops yet. Try an address like `Rue Neuve 12, 1000 Brussels`.",
        )]
    } else {
        app.shop_results.iter().map(shop_item).collect()
    };

    let list = List::new(items)
        .block(bordered("Drop-off points (↑/↓, Tab/→ to open)"))
        .highlight_style(highlight());

    let mut state = ListState::default();
    if !app.shop_results.is_empty() {
        state.select(Some(app.shop_list_index));
    }
    frame.render_stateful_widget(list, results_area, &mut state);
}

fn shop_item(shop: &Shop) -> ListItem<'static> {
    let distance = shop
        .distance_m
        .map(|meters| format!(" · {}", distance_label(meters)))
        .unwrap_or_default();
    ListItem::new(format!(
        "[{}] {} – {}{distance}",
        shop.uid,
        shop.name,
        shop.address.one_line()
    ))
}

fn draw_shop_view(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let Some(shop) = &app.selected_shop else {
        let paragraph = Paragraph::new("No shop selected.")
            .block(bordered("Shop"))
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, area);
        return;
    };

    let [details_area, services_area] =
        Layout::vertical([Constraint::Length(8), Constraint::Min(0)]).areas(area);

    let mut lines = vec![
        Line::from(vec![
            Span::styled("Address: ", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(shop.address.one_line()),
        ]),
        Line::from(format!("Carrier: {} · shop id {}", shop.uid, shop.id)),
    ];
    if let Some(position) = shop.position {
        lines.push(Line::from(format!(
            "Position: {:.5}, {:.5}",
            position.latitude, position.longitude
        )));
    }
    if let Some(meters) = shop.distance_m {
        lines.push(Line::from(format!("Distance: {}", distance_label(meters))));
    }
    if !shop.opening_hours.is_empty() {
        lines.push(Line::from(format!(
            "Opening hours: {}",
            shop.opening_hours.join("; ")
        )));
    }

    let details = Paragraph::new(lines)
        .block(bordered(format!("{} (Esc/←/b to go back)", shop.name)))
        .wrap(Wrap { trim: true });
    frame.render_widget(details, details_area);

    let title = format!("Services of {}", shop.uid);
    if app.shop_services.is_empty() {
        let paragraph = Paragraph::new("This carrier offers no services.")
            .block(bordered(title))
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, services_area);
        return;
    }

    let rows = app.shop_services.iter().map(service_row);

    let column_widths = [
        Constraint::Length(18),
        Constraint::Length(20),
        Constraint::Length(10),
        Constraint::Length(6),
        Constraint::Min(20),
    ];

    let table = Table::new(rows, column_widths)
        .header(
            Row::new(vec!["Id", "Name", "Max", "Shop", "Description"])
                .style(Style::default().add_modifier(Modifier::BOLD)),
        )
        .block(bordered(title))
        .column_spacing(1);

    frame.render_widget(table, services_area);
}

fn service_row(service: &Service) -> Row<'static> {
    let max_weight = service
        .max_weight_grams
        .map_or_else(|| "–".to_owned(), |grams| format!("{:.1} kg", f64::from(grams) / 1000.0));
    let style = if service.requires_shop {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };

    Row::new(vec![
        Cell::from(service.id.to_string()),
        Cell::from(service.name.clone()),
        Cell::from(max_weight),
        Cell::from(if service.requires_shop { "yes" } else { "no" }),
        Cell::from(service.description.clone()),
    ])
    .style(style)
}

fn distance_label(meters: u32) -> String {
    if meters < 1000 {
        format!("{meters} m")
    } else {
        format!("{:.1} km", f64::from(meters) / 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parcelhub_core::{Config, MemoryCache, ParcelHub, PluginRegistry};
    use pretty_assertions::assert_eq;
    use ratatui::{Terminal, backend::TestBackend};

    use super::*;

    fn app() -> App {
        let registry = PluginRegistry::new([parcelhub_carrier_counter::descriptor()])
            .expect("single carrier");
        let hub = ParcelHub::new(
            Arc::new(registry),
            Config::default(),
            Arc::new(MemoryCache::new()),
        );
        App::new(Arc::new(hub))
    }

    fn render(app: &App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 20)).expect("terminal");
        terminal.draw(|frame| draw(frame, app)).expect("draw");
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[test]
    fn carrier_screen_lists_all_entry_and_registered_carriers() {
        let screen = render(&app());

        assert!(screen.contains("All carriers (1)"));
        assert!(screen.contains("Store counter [counter]"));
        assert!(screen.contains(nav_hint(Screen::CarrierSelect)));
    }

    #[test]
    fn status_line_shows_errors_before_hints() {
        let mut app = app();
        app.error_message = Some("boom".to_owned());

        let screen = render(&app);

        assert!(screen.contains("boom · ↑/↓ move"));
    }

    #[test]
    fn distances_switch_to_kilometres() {
        assert_eq!(distance_label(950), "950 m");
        assert_eq!(distance_label(1_340), "1.3 km");
    }
}
