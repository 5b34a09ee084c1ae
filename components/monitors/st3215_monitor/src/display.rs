//! The live servo table, drawn with ratatui.

use crate::session::ServoState;
use ratatui::Frame;
use ratatui::layout::{Constraint, Layout};
use ratatui::style::{Color, Style, Stylize};
use ratatui::text::Line;
use ratatui::widgets::{Block, Borders, Paragraph};
use st3215_link::{CalibrationData, Position, RangeTracker, Units};

pub const BAR_WIDTH: usize = 20;

/// Center used for deg/rad display when a servo has no calibration entry.
const DEFAULT_CENTER: f32 = 2048.0;

/// `[#####               ]` over the clamped 0–4095 range.
pub fn progress_bar(position: Position) -> String {
    let filled = ((position.fraction() * BAR_WIDTH as f32) as usize).min(BAR_WIDTH);
    format!("[{}{}]", "#".repeat(filled), " ".repeat(BAR_WIDTH - filled))
}

pub struct View<'a> {
    pub units: Units,
    pub calibration: Option<&'a CalibrationData>,
    pub output: &'a str,
}

impl View<'_> {
    fn value(&self, id: u8, position: Position) -> String {
        match self.units {
            Units::Raw => format!("{:4}", position.clamped()),
            units => {
                let center = self
                    .calibration
                    .and_then(|c| c.center(id))
                    .unwrap_or(DEFAULT_CENTER);
                format!("{:7.1}{}", units.present(position, center), units.suffix())
            }
        }
    }

    pub fn line(&self, servo: &ServoState, tracker: &RangeTracker) -> String {
        if let Some(message) = &servo.error {
            return format!("Servo {}: Error: {message}", servo.id);
        }
        let Some(position) = servo.position else {
            return format!("Servo {}: waiting", servo.id);
        };
        let mut line = format!(
            "Servo {}: {} {}",
            servo.id,
            self.value(servo.id, position),
            progress_bar(position)
        );
        if let Some((min, max)) = tracker.range(servo.id) {
            line.push_str(&format!(" {min:>4}-{max:<4}"));
        }
        line
    }

    /// Servo table on top, key help and the last notice underneath.
    pub fn render(
        &self,
        frame: &mut Frame,
        servos: &[ServoState],
        tracker: &RangeTracker,
        notice: Option<&str>,
    ) {
        let [table_area, help_area] =
            Layout::vertical([Constraint::Min(3), Constraint::Length(2)]).areas(frame.area());

        let rows: Vec<Line> = servos
            .iter()
            .map(|servo| {
                let text = self.line(servo, tracker);
                if servo.error.is_some() {
                    Line::styled(text, Style::new().fg(Color::Red))
                } else {
                    Line::raw(text)
                }
            })
            .collect();
        let table = Paragraph::new(rows).block(
            Block::default()
                .borders(Borders::ALL)
                .title(" ST3215 Servo Positions (0-4095) ".bold()),
        );
        frame.render_widget(table, table_area);

        let help = vec![
            Line::raw(format!(
                "Enter: save ranges to {}   q/Ctrl+C: exit",
                self.output
            )),
            Line::raw(notice.unwrap_or_default().to_string()).green(),
        ];
        frame.render_widget(Paragraph::new(help), help_area);
    }
}
