use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::app::{App, Screen};

/// Work the event loop has to do after a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Action {
    None,
    Quit,
    SearchShops,
    OpenCurrentShop,
}

pub(crate) fn handle_key_event(key: KeyEvent, app: &mut App) -> Action {
    if quits(key, app.screen) {
        return Action::Quit;
    }

    match app.screen {
        Screen::CarrierSelect => on_carrier_select(key.code, app),
        Screen::ShopSearch => on_shop_search(key, app),
        Screen::ShopView => on_shop_view(key.code, app),
    }
}

fn quits(key: KeyEvent, screen: Screen) -> bool {
    match key.code {
        KeyCode::Char('c') => key.modifiers.contains(KeyModifiers::CONTROL),
        // `q` is text while a location is typed.
        KeyCode::Char('q') => key.modifiers.is_empty() && screen != Screen::ShopSearch,
        _ => false,
    }
}

/// Cursor after an up/down key in a list of `len` entries.
fn step(index: usize, len: usize, code: KeyCode) -> usize {
    match code {
        KeyCode::Up | KeyCode::Char('k') => index.saturating_sub(1),
        KeyCode::Down | KeyCode::Char('j') => (index + 1).min(len.saturating_sub(1)),
        _ => index,
    }
}

fn on_carrier_select(code: KeyCode, app: &mut App) -> Action {
    match code {
        KeyCode::Enter | KeyCode::Char(' ') => app.select_current_carrier(),
        _ => app.carrier_list_index = step(app.carrier_list_index, app.carrier_entries(), code),
    }
    Action::None
}

fn on_shop_search(key: KeyEvent, app: &mut App) -> Action {
    let plain = !key
        .modifiers
        .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT);
    match key.code {
        KeyCode::Enter => return Action::SearchShops,
        KeyCode::Right | KeyCode::Tab => return Action::OpenCurrentShop,
        code @ (KeyCode::Up | KeyCode::Down) => {
            app.shop_list_index = step(app.shop_list_index, app.shop_results.len(), code);
        }
        KeyCode::Char(ch) if plain => app.location_input.push(ch),
        KeyCode::Backspace => {
            app.location_input.pop();
        }
        KeyCode::Left | KeyCode::Esc => {
            app.clear_results();
            app.error_message = None;
            app.screen = Screen::CarrierSelect;
        }
        _ => {}
    }
    Action::None
}

fn on_shop_view(code: KeyCode, app: &mut App) -> Action {
    if matches!(code, KeyCode::Left | KeyCode::Esc | KeyCode::Char('b')) {
        app.screen = Screen::ShopSearch;
    }
    Action::None
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parcelhub_core::{Config, MemoryCache, ParcelHub, PluginRegistry};
    use pretty_assertions::assert_eq;

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

    fn press(app: &mut App, code: KeyCode) -> Action {
        handle_key_event(KeyEvent::new(code, KeyModifiers::NONE), app)
    }

    #[test]
    fn carrier_cursor_stays_inside_the_list() {
        let mut app = app();

        press(&mut app, KeyCode::Up);
        assert_eq!(app.carrier_list_index, 0);

        for _ in 0..5 {
            press(&mut app, KeyCode::Char('j'));
        }
        assert_eq!(app.carrier_list_index, 1);

        press(&mut app, KeyCode::Enter);
        assert_eq!(app.screen, Screen::ShopSearch);
        assert_eq!(app.selection_label(), "Store counter");
    }

    #[test]
    fn q_is_typed_while_searching_and_quits_elsewhere() {
        let mut app = app();
        press(&mut app, KeyCode::Enter);

        assert_eq!(press(&mut app, KeyCode::Char('q')), Action::None);
        assert_eq!(app.location_input, "q");

        press(&mut app, KeyCode::Esc);
        assert_eq!(app.screen, Screen::CarrierSelect);
        assert_eq!(press(&mut app, KeyCode::Char('q')), Action::Quit);
    }

    #[test]
    fn ctrl_c_quits_from_search() {
        let mut app = app();
        press(&mut app, KeyCode::Enter);

        let action = handle_key_event(
            KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL),
            &mut app,
        );

        assert_eq!(action, Action::Quit);
        assert_eq!(app.location_input, "");
    }

    #[test]
    fn search_keys_map_to_actions() {
        let mut app = app();
        press(&mut app, KeyCode::Enter);
        press(&mut app, KeyCode::Char('x'));
        press(&mut app, KeyCode::Backspace);

        assert_eq!(app.location_input, "");
        assert_eq!(press(&mut app, KeyCode::Enter), Action::SearchShops);
        assert_eq!(press(&mut app, KeyCode::Tab), Action::OpenCurrentShop);
    }
}
