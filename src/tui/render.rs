//! TUI rendering.
//!
//! One function paints the whole frame from a [`RenderContext`] the runner
//! builds: the bordered 40×25 grid in the machine's palette, and a status
//! row that doubles as the input line while INPUT is waiting.

use ratatui::{
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use crate::screen::{self, Screen, COLS, ROWS};

/// Everything a frame needs; the runner owns the state, rendering stays a
/// pure function of this view.
pub struct RenderContext<'a> {
    /// The interpreter's screen, read under its lock.
    pub screen: &'a Screen,
    /// Status text for the bottom row (runner state or a diagnostic).
    pub status: &'a str,
    /// Current contents of the input line editor.
    pub input_line: &'a str,
}

/// Paint one frame.
pub fn render(frame: &mut Frame, ctx: &RenderContext) {
    let area = frame.area();
    let (border, background, text) = ctx.screen.colors();
    let border_color = palette_color(border);
    let background_color = palette_color(background);
    let text_color = palette_color(text);

    // 40×25 grid plus one cell of border on each side.
    let grid_area = centered(area, COLS as u16 + 2, ROWS as u16 + 2);

    let mut lines = Vec::with_capacity(ROWS);
    for row in 0..ROWS {
        lines.push(grid_line(ctx.screen, row, text_color, background_color));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::new().fg(border_color).bg(border_color));
    let grid = Paragraph::new(Text::from(lines))
        .block(block)
        .style(Style::new().bg(background_color));
    frame.render_widget(grid, grid_area);

    // Status / input row on the line below the grid (or the last row).
    let status_row = if grid_area.bottom() < area.bottom() {
        grid_area.bottom()
    } else {
        area.bottom().saturating_sub(1)
    };
    let status_area = Rect::new(area.x, status_row, area.width, 1);

    if ctx.screen.is_awaiting_input() {
        let prompt = format!("> {}", ctx.input_line);
        let cursor_col = status_area.x + prompt.chars().count() as u16;
        frame.render_widget(
            Paragraph::new(prompt).style(Style::new().fg(Color::White)),
            status_area,
        );
        frame.set_cursor_position((cursor_col.min(area.right().saturating_sub(1)), status_row));
    } else {
        frame.render_widget(
            Paragraph::new(ctx.status).style(Style::new().fg(Color::Gray)),
            status_area,
        );
    }
}

/// One grid row as styled spans, grouping runs of equal attributes.
fn grid_line(screen: &Screen, row: usize, text_color: Color, background_color: Color) -> Line<'static> {
    let normal = Style::new().fg(text_color).bg(background_color);
    let reversed = Style::new().fg(background_color).bg(text_color);

    let mut spans = Vec::new();
    let mut run = String::new();
    let mut run_reverse = false;
    for col in 0..COLS {
        let cell = screen.cell(row, col);
        if cell.reverse != run_reverse && !run.is_empty() {
            spans.push(Span::styled(
                std::mem::take(&mut run),
                if run_reverse { reversed } else { normal },
            ));
        }
        run_reverse = cell.reverse;
        run.push(cell.ch);
    }
    if !run.is_empty() {
        spans.push(Span::styled(run, if run_reverse { reversed } else { normal }));
    }
    Line::from(spans)
}

fn palette_color(index: u8) -> Color {
    let (r, g, b) = screen::PALETTE[(index % 16) as usize];
    Color::Rgb(r, g, b)
}

/// Center a fixed-size box inside `area`, clamping to fit.
fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect::new(
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
        width,
        height,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::{backend::TestBackend, Terminal};

    fn draw(screen: &Screen, status: &str) -> ratatui::buffer::Buffer {
        let backend = TestBackend::new(60, 30);
        let mut terminal = Terminal::new(backend).unwrap();
        terminal
            .draw(|frame| {
                render(
                    frame,
                    &RenderContext {
                        screen,
                        status,
                        input_line: "",
                    },
                )
            })
            .unwrap();
        terminal.backend().buffer().clone()
    }

    fn buffer_text(buffer: &ratatui::buffer::Buffer) -> String {
        let mut out = String::new();
        for y in 0..buffer.area.height {
            for x in 0..buffer.area.width {
                out.push_str(buffer.cell((x, y)).unwrap().symbol());
            }
            out.push('\n');
        }
        out
    }

    #[test]
    fn test_grid_content_reaches_the_frame() {
        let mut screen = Screen::new();
        screen.print("HELLO");
        let buffer = draw(&screen, "RUNNING");
        let text = buffer_text(&buffer);
        assert!(text.contains("HELLO"));
        assert!(text.contains("RUNNING"));
    }

    #[test]
    fn test_centering_clamps_to_small_areas() {
        let area = Rect::new(0, 0, 10, 5);
        let rect = centered(area, 42, 27);
        assert!(rect.width <= 10);
        assert!(rect.height <= 5);
    }
}
