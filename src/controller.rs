use std::time::{Duration, Instant};
use tracing::trace;

use ratatui::crossterm::event::{
    self, Event, KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};

use crate::domain::{AppConfig, CrmError, Message};
use crate::model::Model;
use crate::ui::TableUI;

const SCROLL_STEP: usize = 3;

pub struct Controller {
    event_poll_time: u64,
}

impl Controller {
    pub fn new(cfg: &AppConfig) -> Self {
        Self {
            event_poll_time: cfg.event_poll_time,
        }
    }

    /// Wait for the next terminal event. Timing out yields a `Tick`.
    pub fn handle_event(&self, model: &Model, ui: &TableUI) -> Result<Option<Message>, CrmError> {
        if !event::poll(Duration::from_millis(self.event_poll_time))? {
            return Ok(Some(Message::Tick(Instant::now())));
        }
        let message = match event::read()? {
            Event::Key(key) if key.kind == event::KeyEventKind::Press => self.handle_key(model, key),
            Event::Mouse(mouse) => self.handle_mouse(model, ui, mouse),
            Event::Resize(width, height) => Some(Message::Resize(width as usize, height as usize)),
            _ => None,
        };
        Ok(message)
    }

    fn handle_key(&self, model: &Model, key: KeyEvent) -> Option<Message> {
        let message = if model.is_popup() {
            match key.code {
                KeyCode::Esc | KeyCode::Enter | KeyCode::Char('?') => Some(Message::Exit),
                KeyCode::Char('q') => Some(Message::Quit),
                _ => None,
            }
        } else if model.is_grabbing() {
            match key.code {
                KeyCode::Left | KeyCode::Char('h') => Some(Message::MoveLeft),
                KeyCode::Right | KeyCode::Char('l') => Some(Message::MoveRight),
                KeyCode::Enter | KeyCode::Esc | KeyCode::Char('m') => Some(Message::DragEnd),
                KeyCode::Char('q') => Some(Message::Quit),
                _ => None,
            }
        } else {
            match (key.code, key.modifiers) {
                (KeyCode::Char('q'), _) => Some(Message::Quit),
                (KeyCode::Char('c'), KeyModifiers::CONTROL) => Some(Message::Quit),
                (KeyCode::Esc, _) => Some(Message::Exit),
                (KeyCode::Char('?'), _) => Some(Message::Help),
                (KeyCode::Up | KeyCode::Char('k'), _) => Some(Message::MoveUp),
                (KeyCode::Down | KeyCode::Char('j'), _) => Some(Message::MoveDown),
                (KeyCode::Left | KeyCode::Char('h'), _) => Some(Message::MoveLeft),
                (KeyCode::Right | KeyCode::Char('l'), _) => Some(Message::MoveRight),
                (KeyCode::PageUp, _) => Some(Message::MovePageUp),
                (KeyCode::PageDown, _) => Some(Message::MovePageDown),
                (KeyCode::Home | KeyCode::Char('g'), _) => Some(Message::MoveBeginning),
                (KeyCode::End | KeyCode::Char('G'), _) => Some(Message::MoveEnd),
                (KeyCode::Char('s'), _) => Some(Message::SortBy(model.selected_column())),
                (KeyCode::Char('S'), _) => Some(Message::ClearSort),
                (KeyCode::Char('m'), _) => Some(Message::ToggleGrab),
                (KeyCode::Char('c'), _) => Some(Message::CopyCell),
                (KeyCode::Char('C'), _) => Some(Message::CopyRow),
                _ => None,
            }
        };
        trace!("Mapped: {key:?} => {message:?}");
        message
    }

    fn handle_mouse(&self, model: &Model, ui: &TableUI, mouse: MouseEvent) -> Option<Message> {
        let message = match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => ui
                .header_at(mouse.column, mouse.row)
                .map(Message::DragStart),
            // Once something is dragged only the horizontal position matters
            MouseEventKind::Drag(MouseButton::Left) if model.is_dragging() => {
                ui.header_column_at(mouse.column).map(Message::DragHover)
            }
            MouseEventKind::Up(MouseButton::Left) if model.is_dragging() => Some(Message::DragEnd),
            MouseEventKind::ScrollDown => Some(Message::ScrollDown(SCROLL_STEP)),
            MouseEventKind::ScrollUp => Some(Message::ScrollUp(SCROLL_STEP)),
            _ => None,
        };
        if message.is_some() {
            trace!("Mapped: {mouse:?} => {message:?}");
        }
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::builtin;
    use crate::storage::MemoryStore;
    use ratatui::crossterm::event::KeyEventState;
    use ratatui::{Terminal, backend::TestBackend};

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn mouse(kind: MouseEventKind, column: u16, row: u16) -> MouseEvent {
        MouseEvent {
            kind,
            column,
            row,
            modifiers: KeyModifiers::NONE,
        }
    }

    fn setup() -> (Controller, Model, TableUI) {
        let cfg = AppConfig::default();
        let model = Model::init(&cfg, builtin(), Box::new(MemoryStore::default()), 120, 12);
        let mut ui = TableUI::new();
        let mut terminal = Terminal::new(TestBackend::new(120, 12)).unwrap();
        terminal.draw(|f| ui.draw(&model, f)).unwrap();
        (Controller::new(&cfg), model, ui)
    }

    #[test]
    fn keys_map_to_messages() {
        let (controller, model, _) = setup();
        assert_eq!(controller.handle_key(&model, key(KeyCode::Char('q'))), Some(Message::Quit));
        assert_eq!(controller.handle_key(&model, key(KeyCode::Char('s'))), Some(Message::SortBy(0)));
        assert_eq!(controller.handle_key(&model, key(KeyCode::Char('m'))), Some(Message::ToggleGrab));
        assert_eq!(controller.handle_key(&model, key(KeyCode::End)), Some(Message::MoveEnd));
        assert_eq!(controller.handle_key(&model, key(KeyCode::Char('x'))), None);

        let ctrl_c = KeyEvent {
            code: KeyCode::Char('c'),
            modifiers: KeyModifiers::CONTROL,
            kind: event::KeyEventKind::Press,
            state: KeyEventState::NONE,
        };
        assert_eq!(controller.handle_key(&model, ctrl_c), Some(Message::Quit));
    }

    #[test]
    fn grab_mode_keys_move_and_drop() {
        let (controller, mut model, _) = setup();
        model.update(Some(Message::ToggleGrab)).unwrap();
        assert_eq!(controller.handle_key(&model, key(KeyCode::Right)), Some(Message::MoveRight));
        assert_eq!(controller.handle_key(&model, key(KeyCode::Enter)), Some(Message::DragEnd));
        assert_eq!(controller.handle_key(&model, key(KeyCode::Char('s'))), None);
    }

    #[test]
    fn popup_keys_only_close() {
        let (controller, mut model, _) = setup();
        model.update(Some(Message::Help)).unwrap();
        assert_eq!(controller.handle_key(&model, key(KeyCode::Enter)), Some(Message::Exit));
        assert_eq!(controller.handle_key(&model, key(KeyCode::Down)), None);
    }

    #[test]
    fn mouse_drag_on_headers() {
        let (controller, mut model, ui) = setup();
        let header_row = 4;
        let down = mouse(MouseEventKind::Down(MouseButton::Left), 2, header_row);
        assert_eq!(controller.handle_mouse(&model, &ui, down), Some(Message::DragStart(0)));

        // Off the header row nothing starts
        let body = mouse(MouseEventKind::Down(MouseButton::Left), 2, header_row + 2);
        assert_eq!(controller.handle_mouse(&model, &ui, body), None);

        // Drag and release only count while dragging
        let up = mouse(MouseEventKind::Up(MouseButton::Left), 2, header_row);
        assert_eq!(controller.handle_mouse(&model, &ui, up), None);

        model.update(Some(Message::DragStart(0))).unwrap();
        let drag = mouse(MouseEventKind::Drag(MouseButton::Left), 60, header_row + 3);
        assert_eq!(
            controller.handle_mouse(&model, &ui, drag),
            Some(Message::DragHover(ui.header_column_at(60).unwrap()))
        );
        assert_eq!(controller.handle_mouse(&model, &ui, up), Some(Message::DragEnd));
    }

    #[test]
    fn wheel_scrolls() {
        let (controller, model, ui) = setup();
        let wheel = mouse(MouseEventKind::ScrollDown, 10, 10);
        assert_eq!(
            controller.handle_mouse(&model, &ui, wheel),
            Some(Message::ScrollDown(SCROLL_STEP))
        );
    }
}
