use std::io::{self, Stdout};

use anyhow::Context;
use chip8_vip::state::Framebuffer;
use chip8_vip::{DISPLAY_HEIGHT, DISPLAY_WIDTH};
use crossterm::{
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use log::error;
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    widgets::{Block, Borders, Paragraph},
};

const KEY_MAPPING: &str = "1 2 3 4    →    1 2 3 C\n\
    Q W E R    →    4 5 6 D\n\
    A S D F    →    7 8 9 E\n\
    Z X C V    →    A 0 B F";

/// Renders the framebuffer into the terminal.
///
/// Owns the terminal for as long as it lives: raw mode and the alternate
/// screen are entered on creation and left again on drop, whichever way
/// the run ends.
pub struct Screen {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl Screen {
    pub fn new() -> anyhow::Result<Self> {
        enable_raw_mode().context("failed to enable raw mode")?;
        let mut stdout = io::stdout();
        if let Err(err) = execute!(stdout, EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(err).context("failed to enter alternate screen");
        }

        let backend = CrosstermBackend::new(stdout);
        let mut terminal = match Terminal::new(backend) {
            Ok(terminal) => terminal,
            Err(err) => {
                let _ = execute!(io::stdout(), LeaveAlternateScreen);
                let _ = disable_raw_mode();
                return Err(err).context("failed to set up terminal");
            }
        };
        let _ = terminal.hide_cursor();
        // From here on Drop restores the terminal.
        Ok(Screen { terminal })
    }

    pub fn present(&mut self, display: &Framebuffer, title: &str) -> anyhow::Result<()> {
        self.terminal
            .draw(|frame| draw(frame, display, title))
            .context("failed to draw frame")?;
        Ok(())
    }
}

impl Drop for Screen {
    fn drop(&mut self) {
        let _ = self.terminal.show_cursor();
        if let Err(err) = execute!(io::stdout(), LeaveAlternateScreen) {
            error!("failed to leave alternate screen: {err}");
        }
        if let Err(err) = disable_raw_mode() {
            error!("failed to disable raw mode: {err}");
        }
    }
}

/// One character per pixel; lit pixels are a full block.
pub fn render_rows(display: &Framebuffer) -> String {
    let mut row_string = String::with_capacity(DISPLAY_WIDTH * DISPLAY_HEIGHT + DISPLAY_HEIGHT);
    for row in display.chunks(DISPLAY_WIDTH) {
        row_string.extend(row.iter().map(|pixel| if *pixel { '█' } else { ' ' }));
        row_string.push('\n');
    }
    row_string
}

fn draw(frame: &mut Frame, display: &Framebuffer, title: &str) {
    // Exact size needed for the 64x32 display plus borders
    let game_width = (DISPLAY_WIDTH as u16) + 2;
    let game_height = (DISPLAY_HEIGHT as u16) + 2;

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(game_height),
            Constraint::Length(6),
            Constraint::Min(0),
        ])
        .split(frame.area());

    let game_area = centered(chunks[0], game_width);
    let game_paragraph = Paragraph::new(render_rows(display))
        .block(Block::default().borders(Borders::ALL).title(title))
        .style(Style::default().fg(Color::White).bg(Color::Black));
    frame.render_widget(game_paragraph, game_area);

    let key_paragraph = Paragraph::new(KEY_MAPPING)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).title("Keypad (Esc quits)"))
        .style(Style::default().fg(Color::Yellow));
    frame.render_widget(key_paragraph, chunks[1]);
}

fn centered(area: Rect, width: u16) -> Rect {
    if area.width <= width {
        return area;
    }
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Min(0),
            Constraint::Length(width),
            Constraint::Min(0),
        ])
        .split(area)[1]
}
