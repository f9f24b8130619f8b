use crate::board::StatusLevel;
use crate::ui::ToastLevel;
use crate::validate::FieldMark;
use ratatui::style::{Color, Modifier, Style};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ThemeMode {
    Light,
    Dark,
}

#[derive(Clone, Debug)]
pub struct Theme {
    #[allow(dead_code)]
    pub mode: ThemeMode,
    pub bg: Color,
    pub fg: Color,
    pub accent: Color,
    pub frame: Color,
    pub selected: Color,
    pub success: Color,
    pub error: Color,
    pub muted: Color,
    pub group: Color,
}

impl Theme {
    pub fn ledger_dark() -> Self {
        Self {
            mode: ThemeMode::Dark,
            bg: Color::Rgb(22, 24, 28),
            fg: Color::Rgb(220, 222, 228),
            accent: Color::Rgb(86, 156, 214),
            frame: Color::Rgb(84, 90, 102),
            selected: Color::Rgb(230, 160, 60),
            success: Color::Rgb(110, 190, 110),
            error: Color::Rgb(224, 92, 92),
            muted: Color::DarkGray,
            group: Color::Rgb(180, 130, 210),
        }
    }

    pub fn ledger_light() -> Self {
        Self {
            mode: ThemeMode::Light,
            bg: Color::Rgb(246, 246, 242),
            fg: Color::Rgb(28, 30, 34),
            accent: Color::Rgb(30, 100, 180),
            frame: Color::Rgb(190, 192, 200),
            selected: Color::Rgb(190, 110, 0),
            success: Color::Rgb(0, 130, 0),
            error: Color::Rgb(190, 20, 20),
            muted: Color::Rgb(120, 120, 130),
            group: Color::Rgb(120, 60, 160),
        }
    }

    /// `MINIBOARD_THEME=light` selects the light palette.
    pub fn from_env() -> Self {
        match std::env::var("MINIBOARD_THEME").ok().as_deref() {
            Some(v) if v.eq_ignore_ascii_case("light") => Self::ledger_light(),
            _ => Self::ledger_dark(),
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::ledger_dark()
    }
}

impl Theme {
    pub fn border(&self, focused: bool) -> Style {
        Style::default().fg(if focused { self.selected } else { self.frame })
    }

    pub fn base_style(&self) -> Style {
        Style::default().bg(self.bg).fg(self.fg)
    }

    pub fn text_active_bold(&self) -> Style {
        Style::default()
            .fg(self.accent)
            .add_modifier(Modifier::BOLD)
    }

    pub fn text_editing_bold(&self) -> Style {
        Style::default()
            .fg(self.selected)
            .add_modifier(Modifier::BOLD)
    }

    pub fn text_muted(&self) -> Style {
        Style::default().fg(self.muted)
    }

    pub fn group_header(&self) -> Style {
        Style::default().fg(self.group).add_modifier(Modifier::BOLD)
    }

    pub fn list_cursor_style(&self) -> Style {
        Style::default()
            .fg(self.bg)
            .bg(self.selected)
            .add_modifier(Modifier::BOLD)
    }

    pub fn mark_style(&self, mark: &FieldMark) -> Style {
        match mark {
            FieldMark::Neutral => Style::default().fg(self.fg),
            FieldMark::Valid => Style::default().fg(self.success),
            FieldMark::Invalid(_) => Style::default().fg(self.error),
        }
    }

    pub fn status_color(&self, level: StatusLevel) -> Color {
        match level {
            StatusLevel::Success => self.success,
            StatusLevel::Error => self.error,
            StatusLevel::Info => self.accent,
        }
    }

    pub fn toast_color(&self, level: ToastLevel) -> Color {
        match level {
            ToastLevel::Success => self.success,
            ToastLevel::Error => self.error,
            ToastLevel::Info => self.accent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marks_map_to_palette_colors() {
        let t = Theme::ledger_dark();
        assert_eq!(t.mark_style(&FieldMark::Valid).fg, Some(t.success));
        assert_eq!(
            t.mark_style(&FieldMark::Invalid("x".into())).fg,
            Some(t.error)
        );
        assert_eq!(t.status_color(StatusLevel::Info), t.accent);
        assert_eq!(Theme::ledger_light().mode, ThemeMode::Light);
    }
}
