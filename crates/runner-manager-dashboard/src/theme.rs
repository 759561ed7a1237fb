use ratatui::style::{Color, Modifier, Style};
use runner_manager_core::{Rgb, RunnerStatus};

pub const HEADER_STYLE: Style = Style::new()
    .fg(Color::Rgb(142, 192, 124))
    .add_modifier(Modifier::BOLD);
pub const SELECTED_STYLE: Style = Style::new()
    .bg(Color::Rgb(131, 165, 152))
    .fg(Color::Black)
    .add_modifier(Modifier::BOLD);
pub const WATCHED_STYLE: Style = Style::new()
    .fg(Color::Rgb(250, 189, 47))
    .add_modifier(Modifier::BOLD);
pub const MUTED_STYLE: Style = Style::new().fg(Color::Rgb(146, 131, 116));
pub const BORDER: Color = Color::Rgb(80, 73, 69);

pub mod icons {
    pub const WATCHED: &str = "*";
    pub const CURSOR: &str = ">";
    pub const ONLINE: &str = "o";
    pub const OFFLINE: &str = "x";
}

pub fn status_color(status: RunnerStatus) -> Color {
    match status {
        RunnerStatus::Idle => Color::Gray,
        RunnerStatus::Busy => Color::Rgb(254, 128, 25),
        RunnerStatus::Finished => Color::Rgb(142, 192, 124),
        RunnerStatus::Error => Color::Rgb(251, 73, 52),
        RunnerStatus::Ready => Color::Cyan,
        RunnerStatus::Failed => Color::Magenta,
        RunnerStatus::Unknown => Color::Rgb(146, 131, 116),
    }
}

pub fn status_chip_style(status: RunnerStatus) -> Style {
    Style::new()
        .fg(Color::Black)
        .bg(status_color(status))
        .add_modifier(Modifier::BOLD)
}

pub fn series_color(rgb: Rgb) -> Color {
    let Rgb(r, g, b) = rgb;
    Color::Rgb(r, g, b)
}

pub fn connection_style(connected: bool) -> Style {
    let color = if connected {
        Color::Rgb(142, 192, 124)
    } else {
        Color::Rgb(251, 73, 52)
    };
    Style::new().fg(color).add_modifier(Modifier::BOLD)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses_are_distinct() {
        assert_ne!(
            status_color(RunnerStatus::Finished),
            status_color(RunnerStatus::Error)
        );
        assert_eq!(status_color(RunnerStatus::Idle), Color::Gray);
    }

    #[test]
    fn series_color_maps_rgb() {
        assert_eq!(series_color(Rgb(1, 2, 3)), Color::Rgb(1, 2, 3));
    }
}
