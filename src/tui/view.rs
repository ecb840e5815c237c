//! Conversation rendering. Everything here is a pure function of the app
//! state; scrolling follows the newest line automatically.

use ratatui::{
    layout::{ Alignment, Constraint, Layout, Rect },
    style::{ Color, Modifier, Style },
    text::{ Line, Span },
    widgets::{ Block, Paragraph },
    Frame,
};
use unicode_width::UnicodeWidthChar;
use super::app::App;
use crate::conversation::ChatState;
use crate::models::chat::Role;

const USER_GLYPH: &str = "●";
const ASSISTANT_GLYPH: &str = "◆";
const STREAMING_GLYPH: &str = "◌";

pub fn render(frame: &mut Frame, app: &App) {
    let [header, body, input] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Min(1),
        Constraint::Length(3),
    ]).areas(frame.area());

    render_header(frame, header, app);
    render_conversation(frame, body, &app.state);
    render_input(frame, input, app);
}

fn render_header(frame: &mut Frame, area: Rect, app: &App) {
    let status = match (app.selected_model(), &app.models.error) {
        (Some(model), _) => Span::styled(
            format!("model: {}  (Tab to switch)", model),
            Style::default().fg(Color::Gray)
        ),
        (None, Some(error)) => Span::styled(format!("no models: {}", error), Style::default().fg(Color::Red)),
        (None, None) => Span::styled("no models available", Style::default().fg(Color::Yellow)),
    };
    let title = Line::from(vec![
        Span::styled("Relay Chat", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw("  "),
        status,
    ]);
    frame.render_widget(Paragraph::new(title).block(Block::bordered()), area);
}

fn render_conversation(frame: &mut Frame, area: Rect, state: &ChatState) {
    let inner_width = area.width.saturating_sub(2) as usize;
    let inner_height = area.height.saturating_sub(2) as usize;
    let lines = conversation_lines(state, inner_width);
    let offset = scroll_offset(lines.len(), inner_height);

    let paragraph = Paragraph::new(lines)
        .block(Block::bordered())
        .scroll((offset, 0));
    frame.render_widget(paragraph, area);
}

fn render_input(frame: &mut Frame, area: Rect, app: &App) {
    let busy = app.state.is_busy();
    let block = Block::bordered().title(if busy { " Sending " } else { " Message " });

    if busy {
        let waiting = Paragraph::new("waiting for response…")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(waiting, area);
        return;
    }

    let inner_width = area.width.saturating_sub(2) as usize;
    let (visible, cursor_col) = input_window(&app.input, inner_width);
    frame.render_widget(Paragraph::new(visible).block(block), area);
    frame.set_cursor_position((area.x + 1 + cursor_col, area.y + 1));
}

/// Tail of `input` that fits in `width` columns with room left for the
/// cursor, and the cursor column within that window.
pub fn input_window(input: &str, width: usize) -> (String, u16) {
    let budget = width.saturating_sub(1);
    let mut start = input.len();
    let mut used = 0;
    for (idx, ch) in input.char_indices().rev() {
        let w = ch.width().unwrap_or(0);
        if used + w > budget {
            break;
        }
        used += w;
        start = idx;
    }
    (input[start..].to_string(), used.min(u16::MAX as usize) as u16)
}

/// Lines for the whole conversation, already wrapped to `width` columns.
/// The accumulator is shown as one extra, in-progress assistant message.
pub fn conversation_lines(state: &ChatState, width: usize) -> Vec<Line<'static>> {
    let wrap_width = (width * 85 / 100).max(10).min(width.max(1));
    let mut lines = Vec::new();

    for message in state.messages() {
        push_message(&mut lines, message.role, &message.content, false, wrap_width);
    }
    if !state.partial().is_empty() {
        push_message(&mut lines, Role::Assistant, state.partial(), true, wrap_width);
    }
    lines
}

fn push_message(
    lines: &mut Vec<Line<'static>>,
    role: Role,
    content: &str,
    streaming: bool,
    wrap_width: usize
) {
    if !lines.is_empty() {
        lines.push(Line::default());
    }

    let (header, color, alignment) = match role {
        Role::User => (format!("You {}", USER_GLYPH), Color::Blue, Alignment::Right),
        _ if streaming => (format!("{} Assistant (typing…)", STREAMING_GLYPH), Color::Yellow, Alignment::Left),
        Role::Assistant => (format!("{} Assistant", ASSISTANT_GLYPH), Color::Green, Alignment::Left),
        Role::System => ("System".to_string(), Color::Magenta, Alignment::Left),
    };
    lines.push(
        Line::from(Span::styled(header, Style::default().fg(color).add_modifier(Modifier::BOLD)))
            .alignment(alignment)
    );
    for row in wrap(content, wrap_width) {
        lines.push(Line::from(row).alignment(alignment));
    }
}

/// Wrap on display width, keeping explicit line breaks.
fn wrap(text: &str, width: usize) -> Vec<String> {
    textwrap::wrap(text, width.max(1))
        .into_iter()
        .map(|row| row.into_owned())
        .collect()
}

pub fn scroll_offset(total_lines: usize, visible: usize) -> u16 {
    total_lines.saturating_sub(visible).min(u16::MAX as usize) as u16
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Action;
    use crate::models::chat::ModelList;
    use ratatui::{ backend::TestBackend, Terminal };

    fn text_of(lines: &[Line<'_>]) -> Vec<String> {
        lines
            .iter()
            .map(|l| l.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect()
    }

    fn message_count(lines: &[Line<'_>], role: Role) -> usize {
        let marker = match role {
            Role::User => USER_GLYPH,
            Role::Assistant => ASSISTANT_GLYPH,
            Role::System => "System",
        };
        lines
            .iter()
            .filter(|line| line.spans.first().is_some_and(|s| s.content.contains(marker)))
            .count()
    }

    const WIDE_REPLY: &str = "日本語のテキストをここに表示します終わり";

    fn test_app(state: ChatState, input: String) -> App {
        App {
            state,
            input,
            models: ModelList { models: vec!["llama3.2".into()], error: None },
            selected: 0,
            should_quit: false,
        }
    }

    fn screen_of(terminal: &Terminal<TestBackend>) -> String {
        terminal.backend().buffer().content.iter().map(|cell| cell.symbol()).collect()
    }

    fn streaming_state() -> ChatState {
        let mut state = ChatState::new();
        state.submit("hi there", None).unwrap();
        state.apply(Action::AppendFragment("Hel".into()));
        state
    }

    #[test]
    fn in_progress_message_only_while_accumulating() {
        let mut state = ChatState::new();
        state.submit("hi there", None).unwrap();
        let text = text_of(&conversation_lines(&state, 80));
        assert!(!text.iter().any(|l| l.contains("typing")));

        state.apply(Action::AppendFragment("Hel".into()));
        let text = text_of(&conversation_lines(&state, 80));
        assert!(text.iter().any(|l| l.contains("typing")));
        assert_eq!(text.last().unwrap(), "Hel");

        state.apply(Action::FinalizeTurn);
        let lines = conversation_lines(&state, 80);
        let text = text_of(&lines);
        assert!(!text.iter().any(|l| l.contains("typing")));
        assert_eq!(message_count(&lines, Role::Assistant), 1);
        assert_eq!(message_count(&lines, Role::User), 1);
    }

    #[test]
    fn user_lines_are_right_aligned() {
        let lines = conversation_lines(&streaming_state(), 80);
        assert_eq!(lines[0].alignment, Some(Alignment::Right));
        assert_eq!(lines[1].alignment, Some(Alignment::Right));
        assert_eq!(lines.last().unwrap().alignment, Some(Alignment::Left));
    }

    #[test]
    fn long_content_wraps() {
        assert_eq!(wrap("hello brave world", 11), vec!["hello brave", "world"]);
        assert_eq!(wrap("abcdefghij", 4), vec!["abcd", "efgh", "ij"]);
        assert_eq!(wrap("a\n\nb", 4), vec!["a", "", "b"]);
    }

    #[test]
    fn wide_characters_wrap_on_display_width() {
        let mut state = ChatState::new();
        state.submit("hi", None).unwrap();
        state.apply(Action::AppendFragment(WIDE_REPLY.into()));
        state.apply(Action::FinalizeTurn);

        let lines = conversation_lines(&state, 28);
        assert!(lines.iter().all(|line| line.width() <= 28));
        let body: String = text_of(&lines[4..]).concat();
        assert_eq!(body, WIDE_REPLY);
    }

    #[test]
    fn wide_reply_is_fully_visible_in_narrow_terminal() {
        let mut state = ChatState::new();
        state.submit("hi", None).unwrap();
        state.apply(Action::AppendFragment(WIDE_REPLY.into()));
        state.apply(Action::FinalizeTurn);
        let app = test_app(state, String::new());

        let mut terminal = Terminal::new(TestBackend::new(30, 20)).unwrap();
        terminal.draw(|frame| render(frame, &app)).unwrap();

        let screen = screen_of(&terminal);
        assert!(screen.contains("日"));
        assert!(screen.contains("終"));
        assert!(screen.contains("り"));
    }

    #[test]
    fn input_window_keeps_the_tail_in_view() {
        assert_eq!(input_window("hello", 10), ("hello".to_string(), 5));
        assert_eq!(input_window("abcdefghijklmnop", 10), ("hijklmnop".to_string(), 9));
        assert_eq!(input_window("日本語テキスト", 8), ("キスト".to_string(), 6));
        assert_eq!(input_window("abc", 0), (String::new(), 0));
    }

    #[test]
    fn typing_past_the_box_scrolls_the_input() {
        let input = format!("{}END", "x".repeat(40));
        let app = test_app(ChatState::new(), input);

        let mut terminal = Terminal::new(TestBackend::new(30, 10)).unwrap();
        terminal.draw(|frame| render(frame, &app)).unwrap();

        assert!(screen_of(&terminal).contains("END"));
        let cursor = terminal.get_cursor_position().unwrap();
        assert_eq!((cursor.x, cursor.y), (28, 8));
    }

    #[test]
    fn scroll_follows_newest_line() {
        assert_eq!(scroll_offset(5, 10), 0);
        assert_eq!(scroll_offset(25, 10), 15);
    }

    #[test]
    fn renders_into_a_terminal_buffer() {
        let app = test_app(streaming_state(), String::new());
        let mut terminal = Terminal::new(TestBackend::new(60, 20)).unwrap();
        terminal.draw(|frame| render(frame, &app)).unwrap();

        let screen = screen_of(&terminal);
        assert!(screen.contains("llama3.2"));
        assert!(screen.contains("typing"));
        assert!(screen.contains("waiting for response"));
    }
}
