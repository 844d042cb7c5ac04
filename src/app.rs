use std::{
    ops::ControlFlow,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

use color_eyre::Result;
use ratatui::{Frame, Terminal, backend::Backend};
use tracing::{debug, info};

use crate::{
    aggregate::{AggregatedRow, MergeKey, build_rows},
    config::Config,
    input::{Action, EventSource, InputHandler},
    rank::rank,
    render,
    snapshot::{ProcessRecord, SnapshotSource},
    view::ViewState,
};

/// Latest snapshot, the rows derived from it, and the view over them.
pub struct App {
    records: Vec<ProcessRecord>,
    rows: Vec<AggregatedRow>,
    view: ViewState,
    merge_key: MergeKey,
}

impl App {
    pub fn new(merge_mode: bool, merge_key: MergeKey) -> Self {
        Self {
            records: Vec::new(),
            rows: Vec::new(),
            view: ViewState::new(merge_mode),
            merge_key,
        }
    }

    pub fn rows(&self) -> &[AggregatedRow] {
        &self.rows
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    // Merge key when merging, pid otherwise.
    fn selected_identity(&self) -> Option<String> {
        self.rows.get(self.view.selected).map(|row| {
            if self.view.merge_mode {
                row.name.clone()
            } else {
                row.pid.clone()
            }
        })
    }

    /// Replaces the snapshot. The selection follows the row it was on, or
    /// returns to the top if that row is gone.
    pub fn update(&mut self, records: Vec<ProcessRecord>) {
        let anchor = self.selected_identity();
        self.records = records;
        self.rebuild();

        if let Some(anchor) = anchor {
            let found = self.rows.iter().position(|row| {
                let id = if self.view.merge_mode { &row.name } else { &row.pid };
                *id == anchor
            });
            match found {
                Some(idx) => self.view.selected = idx,
                None => {
                    self.view.selected = 0;
                    self.view.expanded = false;
                }
            }
        }
        self.view.clamp(&self.rows);
    }

    fn rebuild(&mut self) {
        let mut rows = build_rows(&self.records, self.view.merge_mode, self.merge_key);
        rank(&mut rows);
        self.rows = rows;
    }

    /// Applies one action. Returns false when nothing needs redrawing.
    pub fn apply(&mut self, action: Action) -> bool {
        match action {
            Action::MoveUp => self.view.move_up(),
            Action::MoveDown => self.view.move_down(self.rows.len()),
            Action::ToggleExpand => self.view.toggle_expand(&self.rows),
            Action::ToggleMerge => {
                self.view.toggle_merge();
                info!(merge = self.view.merge_mode, "merge mode toggled");
                // regroup the snapshot already on screen rather than waiting
                // for the next sample
                self.rebuild();
                self.view.clamp(&self.rows);
            }
            Action::Redraw => {}
            Action::Quit => return false,
        }
        true
    }

    pub fn draw(&mut self, f: &mut Frame) {
        render::draw(f, &self.rows, &mut self.view);
    }
}

/// Tick lengths for the two loop domains.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Timing {
    pub sample_ms: u64,
    pub poll_ms: u64,
}

impl From<&Config> for Timing {
    fn from(config: &Config) -> Self {
        Self {
            sample_ms: config.sample_interval_ms,
            poll_ms: config.input_poll_ms,
        }
    }
}

/// Drives sampling and input on one thread. The sample clock advances by
/// `poll_ms` per step, so the sample period is a multiple of the poll tick
/// rather than a wall-clock deadline.
pub struct Controller<S, E> {
    app: App,
    source: S,
    input: InputHandler<E>,
    timing: Timing,
    clock_ms: u64,
    dirty: bool,
    terminated: Arc<AtomicBool>,
}

impl<S: SnapshotSource, E: EventSource> Controller<S, E> {
    pub fn new(app: App, source: S, events: E, timing: Timing) -> Self {
        Self {
            app,
            source,
            input: InputHandler::new(events),
            timing,
            clock_ms: 0,
            dirty: true,
            terminated: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Stops the loop at the next step once `flag` is set.
    pub fn with_termination(mut self, flag: Arc<AtomicBool>) -> Self {
        self.terminated = flag;
        self
    }

    pub fn app(&self) -> &App {
        &self.app
    }

    /// Takes a fresh snapshot and rebuilds the rows. Fails only when the
    /// process table cannot be read at all.
    pub fn sample(&mut self) -> Result<()> {
        let records = self.source.snapshot()?;
        debug!(processes = records.len(), "sampled");
        self.app.update(records);
        self.dirty = true;
        Ok(())
    }

    /// One fast tick: resample if the slow clock is due, handle at most one
    /// input event, and redraw if either changed anything.
    pub fn step<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<ControlFlow<()>>
    where
        B::Error: std::error::Error + Send + Sync + 'static,
    {
        if self.terminated.load(Ordering::SeqCst) {
            return Ok(ControlFlow::Break(()));
        }

        if self.clock_ms >= self.timing.sample_ms {
            self.clock_ms = 0;
            self.sample()?;
        }

        if let Some(action) = self.input.poll()? {
            if action == Action::Quit {
                return Ok(ControlFlow::Break(()));
            }
            self.dirty |= self.app.apply(action);
        }

        if self.dirty {
            terminal.draw(|f| self.app.draw(f))?;
            self.dirty = false;
        }

        self.clock_ms += self.timing.poll_ms;
        Ok(ControlFlow::Continue(()))
    }

    pub fn run<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<()>
    where
        B::Error: std::error::Error + Send + Sync + 'static,
    {
        let tick = Duration::from_millis(self.timing.poll_ms);
        while self.step(terminal)?.is_continue() {
            thread::sleep(tick);
        }
        info!("stopping");
        Ok(())
    }
}
