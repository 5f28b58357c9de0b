use crate::theme::Base16Palette;
use ratatui::{
    Frame,
    layout::Rect,
    style::Style,
    widgets::{Block, Borders, Clear},
};
use tui_textarea::{Input, Key, TextArea};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    OpenFile,
    CustomFont,
}

impl PromptKind {
    fn title(&self) -> &'static str {
        match self {
            PromptKind::OpenFile => " Open EPUB ",
            PromptKind::CustomFont => " Custom font ",
        }
    }

    fn placeholder(&self) -> &'static str {
        match self {
            PromptKind::OpenFile => "Path to an .epub file",
            PromptKind::CustomFont => "font-family, e.g. \"Iowan Old Style\", serif",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptAction {
    Submit(PromptKind, String),
    Cancel,
}

/// Single-line text input popup.
pub struct TextPrompt {
    kind: PromptKind,
    textarea: TextArea<'static>,
}

impl TextPrompt {
    pub fn new(kind: PromptKind, initial: &str) -> Self {
        let mut textarea = TextArea::default();
        textarea.set_placeholder_text(kind.placeholder());
        textarea.insert_str(initial);
        Self { kind, textarea }
    }

    pub fn kind(&self) -> PromptKind {
        self.kind
    }

    pub fn value(&self) -> String {
        self.textarea.lines().join("")
    }

    pub fn handle_input(&mut self, input: Input) -> Option<PromptAction> {
        match input {
            Input { key: Key::Esc, .. } => Some(PromptAction::Cancel),
            Input {
                key: Key::Enter, ..
            } => Some(PromptAction::Submit(self.kind, self.value().trim().to_string())),
            input => {
                self.textarea.input(input);
                None
            }
        }
    }

    pub fn render(&mut self, f: &mut Frame, area: Rect, palette: &Base16Palette) {
        let width = area.width.saturating_sub(4).clamp(10, 70);
        let popup_area = Rect {
            x: area.x + area.width.saturating_sub(width) / 2,
            y: area.y + area.height.saturating_sub(3) / 2,
            width: width.min(area.width),
            height: 3.min(area.height),
        };
        f.render_widget(Clear, popup_area);

        self.textarea
            .set_style(Style::default().fg(palette.base_05).bg(palette.base_00));
        self.textarea
            .set_cursor_style(Style::default().fg(palette.base_00).bg(palette.base_05));
        self.textarea.set_cursor_line_style(Style::default());
        self.textarea.set_block(
            Block::default()
                .borders(Borders::ALL)
                .title(self.kind.title())
                .style(Style::default().fg(palette.base_04).bg(palette.base_00)),
        );

        f.render_widget(&self.textarea, popup_area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn type_text(prompt: &mut TextPrompt, text: &str) {
        for c in text.chars() {
            assert!(
                prompt
                    .handle_input(Input {
                        key: Key::Char(c),
                        ..Default::default()
                    })
                    .is_none()
            );
        }
    }

    #[test]
    fn test_enter_submits_trimmed_value() {
        let mut prompt = TextPrompt::new(PromptKind::OpenFile, "");
        type_text(&mut prompt, " /tmp/book.epub ");
        let action = prompt.handle_input(Input {
            key: Key::Enter,
            ..Default::default()
        });
        assert_eq!(
            action,
            Some(PromptAction::Submit(
                PromptKind::OpenFile,
                "/tmp/book.epub".to_string()
            ))
        );
    }

    #[test]
    fn test_escape_cancels() {
        let mut prompt = TextPrompt::new(PromptKind::CustomFont, "Georgia");
        assert_eq!(prompt.value(), "Georgia");
        let action = prompt.handle_input(Input {
            key: Key::Esc,
            ..Default::default()
        });
        assert_eq!(action, Some(PromptAction::Cancel));
    }
}
