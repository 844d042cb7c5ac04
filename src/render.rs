use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    widgets::{Cell, Paragraph, Row, Table},
};

use crate::{aggregate::AggregatedRow, snapshot::ProcessRecord, view::ViewState};

const NAME_CHARS: usize = 32;

/// What occupies one data line of the table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Line {
    Row(usize),
    Child { row: usize, child: usize },
}

/// Lays out at most `budget` data lines starting at the scroll offset. An
/// expanded row's children follow it and share the budget; when they do not
/// fit, the child list is cut short.
pub fn visible_lines(rows: &[AggregatedRow], view: &ViewState, budget: usize) -> Vec<Line> {
    let mut lines = Vec::with_capacity(budget.min(rows.len()));
    for (i, row) in rows.iter().enumerate().skip(view.scroll) {
        if lines.len() >= budget {
            break;
        }
        lines.push(Line::Row(i));
        if view.expanded && i == view.selected {
            let room = budget - lines.len();
            lines.extend(
                (0..row.children.len())
                    .take(room)
                    .map(|child| Line::Child { row: i, child }),
            );
        }
    }
    lines
}

pub fn draw(f: &mut Frame, rows: &[AggregatedRow], view: &mut ViewState) {
    let root = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(1)])
        .split(f.area());

    let table_area = root[0];
    let budget = table_area.height.saturating_sub(1) as usize;
    view.align_scroll(budget, rows.len());

    let header = Row::new(["PID", "MEM", "S", "NAME"].into_iter().map(Cell::from)).style(
        Style::default()
            .fg(Color::White)
            .add_modifier(Modifier::BOLD),
    );
    let lines = visible_lines(rows, view, budget)
        .into_iter()
        .map(|line| match line {
            Line::Row(i) => {
                let row = &rows[i];
                let style = if i == view.selected {
                    Style::default().add_modifier(Modifier::REVERSED)
                } else {
                    Style::default()
                };
                Row::new(vec![
                    Cell::from(row.pid.clone()),
                    Cell::from(format!("{:>6}", human_kb(row.mem_kb))),
                    Cell::from(row.state.to_string()),
                    Cell::from(row_label(row, view.expanded && i == view.selected)),
                ])
                .style(style)
            }
            Line::Child { row, child } => {
                let parent = &rows[row];
                let last = child + 1 == parent.children.len();
                child_row(&parent.children[child], last)
            }
        });

    let table = Table::new(
        lines,
        [
            Constraint::Length(8),
            Constraint::Length(6),
            Constraint::Length(1),
            Constraint::Min(10),
        ],
    )
    .header(header);
    f.render_widget(table, table_area);

    let footer_left = format!(
        " ↑↓ select  space expand  m merge: {}  q quit ",
        if view.merge_mode { "on" } else { "off" }
    );
    let current = if rows.is_empty() { 0 } else { view.selected + 1 };
    let footer_right = format!("{current}/{}", rows.len());
    let width = root[1].width as usize;
    let spacer = width.saturating_sub(footer_left.chars().count() + footer_right.len());
    f.render_widget(
        Paragraph::new(format!("{footer_left}{}{footer_right}", " ".repeat(spacer)))
            .style(Style::default().fg(Color::DarkGray)),
        root[1],
    );
}

fn row_label(row: &AggregatedRow, expanded: bool) -> String {
    let name = trim_text(&row.name, NAME_CHARS);
    if row.merged {
        let marker = if expanded { '▾' } else { '▸' };
        format!("{marker} {name} ({})", row.process_count())
    } else {
        format!("  {name}")
    }
}

fn child_row(record: &ProcessRecord, last: bool) -> Row<'static> {
    let branch = if last { '└' } else { '├' };
    Row::new(vec![
        Cell::from(record.pid.clone()),
        Cell::from(format!("{:>6}", human_kb(record.mem_kb))),
        Cell::from(record.state.to_string()),
        Cell::from(format!("  {branch} {}", trim_text(&record.name, NAME_CHARS))),
    ])
    .style(Style::default().fg(Color::Gray))
}

fn trim_text(s: &str, max_chars: usize) -> String {
    let mut chars = s.chars();
    let out: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{out}..")
    } else {
        out
    }
}

fn human_kb(kb: u64) -> String {
    let mib = 1024.0;
    let gib = mib * 1024.0;
    let kf = kb as f64;
    if kf >= gib {
        format!("{:.1}G", kf / gib)
    } else if kf >= mib {
        format!("{:.0}M", kf / mib)
    } else {
        format!("{kb}K")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{MergeKey, aggregate, tests::rec, unmerged};
    use crate::rank::rank;
    use ratatui::{Terminal, backend::TestBackend, buffer::Buffer};

    fn ranked(snapshot: &[ProcessRecord], merge: bool) -> Vec<AggregatedRow> {
        let mut rows = if merge {
            aggregate(snapshot, MergeKey::FullName)
        } else {
            unmerged(snapshot)
        };
        rank(&mut rows);
        rows
    }

    fn line_text(buffer: &Buffer, y: u16) -> String {
        (0..buffer.area.width)
            .map(|x| buffer[(x, y)].symbol())
            .collect::<String>()
            .trim_end()
            .to_string()
    }

    fn reversed_lines(buffer: &Buffer) -> Vec<u16> {
        (0..buffer.area.height)
            .filter(|&y| buffer[(0, y)].modifier.contains(Modifier::REVERSED))
            .collect()
    }

    fn render(rows: &[AggregatedRow], view: &mut ViewState, height: u16) -> Buffer {
        let mut terminal = Terminal::new(TestBackend::new(60, height)).unwrap();
        terminal.draw(|f| draw(f, rows, view)).unwrap();
        terminal.backend().buffer().clone()
    }

    #[test]
    fn children_follow_expanded_row_and_share_budget() {
        let snapshot = [rec("1", "a", 5), rec("2", "a", 5), rec("3", "a", 5), rec("4", "b", 1)];
        let rows = ranked(&snapshot, true);
        let mut view = ViewState::default();
        view.toggle_expand(&rows);

        assert_eq!(
            visible_lines(&rows, &view, 10),
            [
                Line::Row(0),
                Line::Child { row: 0, child: 0 },
                Line::Child { row: 0, child: 1 },
                Line::Child { row: 0, child: 2 },
                Line::Row(1),
            ]
        );
        // children are cut, not the parent
        assert_eq!(
            visible_lines(&rows, &view, 2),
            [Line::Row(0), Line::Child { row: 0, child: 0 }]
        );
    }

    #[test]
    fn never_more_lines_than_budget() {
        let snapshot: Vec<_> = (0..9).map(|i| rec(&i.to_string(), "p", i)).collect();
        let rows = ranked(&snapshot, false);
        let view = ViewState::new(false);
        assert_eq!(visible_lines(&rows, &view, 4).len(), 4);
        assert_eq!(visible_lines(&rows, &view, 20).len(), 9);
        assert!(visible_lines(&rows, &view, 0).is_empty());
        assert!(visible_lines(&[], &view, 4).is_empty());
    }

    #[test]
    fn draws_header_rows_and_one_highlight() {
        let snapshot = [rec("10", "bash", 500), rec("22", "bash", 300), rec("5", "sshd", 1000)];
        let rows = ranked(&snapshot, true);
        let mut view = ViewState::default();
        view.move_down(rows.len());

        // header, two data lines, footer
        let buffer = render(&rows, &mut view, 4);
        assert!(line_text(&buffer, 0).starts_with("PID"));
        assert!(line_text(&buffer, 1).starts_with("5"));
        assert!(line_text(&buffer, 1).contains("sshd"));
        assert!(line_text(&buffer, 2).starts_with("10"));
        assert!(line_text(&buffer, 2).contains("▸ bash (2)"));
        assert!(line_text(&buffer, 3).ends_with("2/2"));
        assert_eq!(reversed_lines(&buffer), [2]);
    }

    #[test]
    fn scrolls_to_keep_selection_on_screen() {
        let snapshot: Vec<_> = (0..5).map(|i| rec(&i.to_string(), &format!("p{i}"), 100 - i)).collect();
        let rows = ranked(&snapshot, false);
        let mut view = ViewState::new(false);
        for _ in 0..3 {
            view.move_down(rows.len());
        }
        // header plus two data lines, then the footer
        let buffer = render(&rows, &mut view, 4);
        assert_eq!(view.scroll, 2);
        assert!(line_text(&buffer, 1).contains("p2"));
        assert!(line_text(&buffer, 2).contains("p3"));
        assert_eq!(reversed_lines(&buffer), [2]);
    }

    #[test]
    fn expanded_children_are_indented() {
        let snapshot = [rec("10", "bash", 500), rec("22", "bash", 300), rec("5", "sshd", 100)];
        let rows = ranked(&snapshot, true);
        let mut view = ViewState::default();
        view.toggle_expand(&rows);

        let buffer = render(&rows, &mut view, 6);
        assert!(line_text(&buffer, 1).contains("▾ bash (2)"));
        assert!(line_text(&buffer, 2).contains("├ bash"));
        assert!(line_text(&buffer, 3).contains("└ bash"));
        assert!(line_text(&buffer, 4).contains("sshd"));
        assert_eq!(reversed_lines(&buffer), [1]);
    }

    #[test]
    fn empty_table_still_draws() {
        let mut view = ViewState::default();
        let buffer = render(&[], &mut view, 5);
        assert!(line_text(&buffer, 0).starts_with("PID"));
        assert_eq!(line_text(&buffer, 1), "");
        assert!(line_text(&buffer, 4).ends_with("0/0"));
        assert!(reversed_lines(&buffer).is_empty());
    }

    #[test]
    fn formatting_helpers() {
        assert_eq!(human_kb(512), "512K");
        assert_eq!(human_kb(2048), "2M");
        assert_eq!(human_kb(3 * 1024 * 1024), "3.0G");
        assert_eq!(trim_text("systemd-journald", 7), "systemd..");
        assert_eq!(trim_text("init", 7), "init");
    }
}
