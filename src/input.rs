use std::{io, time::Duration};

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    MoveUp,
    MoveDown,
    ToggleExpand,
    ToggleMerge,
    /// Nothing to change, but the screen should be drawn again.
    Redraw,
    Quit,
}

/// Source of terminal events. `poll` must return immediately.
pub trait EventSource {
    fn poll(&mut self) -> io::Result<Option<Event>>;
}

/// Non-blocking reader over the crossterm event queue.
pub struct CrosstermEvents;

impl EventSource for CrosstermEvents {
    fn poll(&mut self) -> io::Result<Option<Event>> {
        if event::poll(Duration::ZERO)? {
            Ok(Some(event::read()?))
        } else {
            Ok(None)
        }
    }
}

pub struct InputHandler<E> {
    events: E,
}

impl<E: EventSource> InputHandler<E> {
    pub fn new(events: E) -> Self {
        Self { events }
    }

    /// Takes at most one event off the source.
    pub fn poll(&mut self) -> io::Result<Option<Action>> {
        Ok(self.events.poll()?.as_ref().and_then(action_for))
    }
}

pub fn action_for(event: &Event) -> Option<Action> {
    match event {
        Event::Key(key) if key.kind == KeyEventKind::Press => key_action(key),
        Event::Resize(..) => Some(Action::Redraw),
        _ => None,
    }
}

fn key_action(key: &KeyEvent) -> Option<Action> {
    let action = match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Action::Quit,
        KeyCode::Char('q') | KeyCode::Esc => Action::Quit,
        KeyCode::Up | KeyCode::Char('k') => Action::MoveUp,
        KeyCode::Down | KeyCode::Char('j') => Action::MoveDown,
        KeyCode::Char(' ') | KeyCode::Enter => Action::ToggleExpand,
        KeyCode::Char('m') => Action::ToggleMerge,
        KeyCode::Left => Action::Redraw,
        _ => return None,
    };
    Some(action)
}
