use anyhow::Result;
use rand::Rng;
use ratatui::layout::Rect;
use ratatui::widgets::ListState;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::api::ChatClient;

/// Example CSV file the chat service has loaded server-side
pub const HINT_FILE_PATH: &str = "app/services/example.csv";

/// Sample questions shown in the hint panel
pub const HINT_QUESTIONS: [&str; 3] = [
    "What is the total sales amount for each product category?",
    "What is the distribution of sales across different product categories in each region?",
    "How does the sales performance of electronics compare to furniture?",
];

const SESSION_ID_LEN: usize = 8;
const SESSION_ID_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPane {
    Chat,
    Hints,
    Input,
}

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// Assistant content arrives either as a plain string or as a list of
/// typed text fragments, depending on the service backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Fragments(Vec<ContentFragment>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentFragment {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

impl MessageContent {
    /// Flatten the content for display: fragments are joined with a
    /// single space, plain strings pass through unchanged.
    pub fn display_text(&self) -> String {
        match self {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Fragments(fragments) => fragments
                .iter()
                .map(|f| f.text.as_str())
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

/// A chat message in the conversation log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: MessageContent,
}

/// The request currently being answered by the chat service. The user
/// text is held here (not in the log) until the service replies, so a
/// failed request leaves the log untouched.
pub struct InFlight {
    pub text: String,
    pub task: JoinHandle<Result<MessageContent>>,
}

/// Generate the per-launch session token: short, lowercase base-36,
/// best-effort random. The service treats it as an opaque correlation
/// key, not a security boundary.
pub fn new_session_id() -> String {
    let mut rng = rand::thread_rng();
    (0..SESSION_ID_LEN)
        .map(|_| SESSION_ID_CHARSET[rng.gen_range(0..SESSION_ID_CHARSET.len())] as char)
        .collect()
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,
    pub focus: FocusPane,

    // Input state
    pub input: String,
    pub cursor: usize, // cursor position in input, in chars

    // Conversation state
    pub session_id: String,
    pub messages: Vec<ChatMessage>,
    pub in_flight: Option<InFlight>,

    // Chat view state
    pub chat_scroll: u16,
    pub chat_height: u16, // inner height of chat area for scroll calculations
    pub chat_width: u16,  // inner width of chat area for wrap calculations

    // Hint panel state
    pub show_hints: bool,
    pub hint_state: ListState,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Panel areas for mouse hit-testing (updated during render)
    pub chat_area: Option<Rect>,
    pub hints_area: Option<Rect>,

    pub client: ChatClient,
}

impl App {
    pub fn new(client: ChatClient) -> Self {
        let mut hint_state = ListState::default();
        hint_state.select(Some(0));

        Self {
            should_quit: false,
            input_mode: InputMode::Editing,
            focus: FocusPane::Input,

            input: String::new(),
            cursor: 0,

            session_id: new_session_id(),
            messages: Vec::new(),
            in_flight: None,

            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,

            show_hints: true,
            hint_state,

            animation_frame: 0,

            chat_area: None,
            hints_area: None,

            client,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Dispatch the current input to the chat service. Returns whether a
    /// request was actually sent: whitespace-only input is ignored, and
    /// a submit while another request is pending is rejected.
    pub fn submit_message(&mut self) -> bool {
        let text = self.input.trim();
        if text.is_empty() || self.in_flight.is_some() {
            return false;
        }

        let text = text.to_string();
        let client = self.client.clone();
        let session_id = self.session_id.clone();
        let message = text.clone();

        let task = tokio::spawn(async move { client.send(&session_id, &message).await });

        self.in_flight = Some(InFlight { text, task });
        self.scroll_chat_to_bottom();
        true
    }

    /// Join the in-flight request once its task has finished. Called on
    /// every tick so the event loop never blocks on the network.
    pub async fn poll_exchange(&mut self) {
        let finished = self
            .in_flight
            .as_ref()
            .map(|exchange| exchange.task.is_finished())
            .unwrap_or(false);
        if !finished {
            return;
        }

        if let Some(exchange) = self.in_flight.take() {
            let outcome = match exchange.task.await {
                Ok(result) => result,
                Err(err) => Err(anyhow::anyhow!("chat task aborted: {err}")),
            };
            self.finish_exchange(exchange.text, outcome);
        }
    }

    /// Apply the outcome of a completed request. On success the user
    /// entry and the assistant entry land in the log together, in that
    /// order, and the input is cleared. On failure the log and the input
    /// are left untouched and the error goes to the log file only.
    pub fn finish_exchange(&mut self, text: String, outcome: Result<MessageContent>) {
        match outcome {
            Ok(content) => {
                self.messages.push(ChatMessage {
                    role: ChatRole::User,
                    content: MessageContent::Text(text),
                });
                self.messages.push(ChatMessage {
                    role: ChatRole::Assistant,
                    content,
                });
                self.input.clear();
                self.cursor = 0;
            }
            Err(err) => {
                tracing::error!("chat request failed: {err:#}");
            }
        }
        self.scroll_chat_to_bottom();
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.is_loading() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    /// Total rendered height of the chat log, wrapped at the current
    /// chat width, including the loading indicator when one is showing.
    pub fn chat_total_lines(&self) -> u16 {
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let mut total_lines: u16 = 0;

        for msg in &self.messages {
            total_lines += 1; // Role line ("You:" or "Assistant:")
            for line in msg.content.display_text().lines() {
                // Use character count, not byte length, for proper UTF-8 handling
                let char_count = line.chars().count();
                if char_count == 0 {
                    total_lines += 1;
                } else {
                    total_lines += ((char_count / wrap_width) + 1) as u16;
                }
            }
            total_lines += 1; // Blank line after message
        }

        if self.is_loading() {
            total_lines += 2; // "Assistant:" + "Thinking..."
        }

        total_lines
    }

    pub fn scroll_chat_to_bottom(&mut self) {
        let total_lines = self.chat_total_lines();
        let visible_height = if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        };

        if total_lines > visible_height {
            self.chat_scroll = total_lines.saturating_sub(visible_height);
        } else {
            self.chat_scroll = 0;
        }
    }

    pub fn scroll_chat_down(&mut self) {
        let max_scroll = self.chat_total_lines().saturating_sub(self.chat_height);
        if self.chat_scroll < max_scroll {
            self.chat_scroll = self.chat_scroll.saturating_add(1);
        }
    }

    pub fn scroll_chat_up(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_sub(1);
    }

    pub fn scroll_half_page_down(&mut self) {
        let half_page = self.chat_height / 2;
        let max_scroll = self.chat_total_lines().saturating_sub(self.chat_height);
        self.chat_scroll = (self.chat_scroll + half_page).min(max_scroll);
    }

    pub fn scroll_half_page_up(&mut self) {
        let half_page = self.chat_height / 2;
        self.chat_scroll = self.chat_scroll.saturating_sub(half_page);
    }

    // Hint panel
    pub fn toggle_hints(&mut self) {
        self.show_hints = !self.show_hints;
        if self.show_hints && self.hint_state.selected().is_none() {
            self.hint_state.select(Some(0));
        }
        if !self.show_hints && self.focus == FocusPane::Hints {
            self.focus = FocusPane::Chat;
        }
    }

    pub fn hint_count(&self) -> usize {
        HINT_QUESTIONS.len() + 1 // file path entry plus the questions
    }

    pub fn hint_nav_down(&mut self) {
        let len = self.hint_count();
        let i = self.hint_state.selected().unwrap_or(0);
        self.hint_state.select(Some((i + 1).min(len - 1)));
    }

    pub fn hint_nav_up(&mut self) {
        let i = self.hint_state.selected().unwrap_or(0);
        self.hint_state.select(Some(i.saturating_sub(1)));
    }

    /// Text behind the selected hint entry (entry 0 is the file path)
    pub fn selected_hint(&self) -> Option<&'static str> {
        match self.hint_state.selected()? {
            0 => Some(HINT_FILE_PATH),
            i => HINT_QUESTIONS.get(i - 1).copied(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    fn test_app() -> App {
        // Discard port: nothing listens there, so stray tasks fail fast
        App::new(ChatClient::new("http://127.0.0.1:9"))
    }

    #[test]
    fn session_id_is_short_lowercase_base36() {
        let id = new_session_id();
        assert_eq!(id.len(), 8);
        assert!(id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[test]
    fn session_ids_differ_between_launches() {
        assert_ne!(new_session_id(), new_session_id());
    }

    #[test]
    fn empty_input_is_not_submitted() {
        let mut app = test_app();
        assert!(!app.submit_message());

        app.input = "   \t  ".to_string();
        assert!(!app.submit_message());

        assert!(app.messages.is_empty());
        assert!(app.in_flight.is_none());
    }

    #[tokio::test]
    async fn pending_request_rejects_second_submit() {
        let mut app = test_app();
        app.input = "first question".to_string();
        assert!(app.submit_message());
        assert!(app.is_loading());

        app.input = "second question".to_string();
        assert!(!app.submit_message());
        assert!(app.messages.is_empty());
    }

    #[test]
    fn successful_exchange_appends_user_then_assistant() {
        let mut app = test_app();
        app.input = "What is the total sales amount for each product category?".to_string();
        app.cursor = app.input.chars().count();

        let text = app.input.trim().to_string();
        app.finish_exchange(
            text,
            Ok(MessageContent::Text(
                "Furniture: $500; Electronics: $700".to_string(),
            )),
        );

        assert_eq!(app.messages.len(), 2);
        assert_eq!(app.messages[0].role, ChatRole::User);
        assert_eq!(
            app.messages[0].content.display_text(),
            "What is the total sales amount for each product category?"
        );
        assert_eq!(app.messages[1].role, ChatRole::Assistant);
        assert_eq!(
            app.messages[1].content.display_text(),
            "Furniture: $500; Electronics: $700"
        );
        assert!(app.input.is_empty());
        assert_eq!(app.cursor, 0);
    }

    #[test]
    fn failed_exchange_leaves_log_and_input_untouched() {
        let mut app = test_app();
        app.input = "will fail".to_string();

        let text = app.input.trim().to_string();
        app.finish_exchange(text, Err(anyhow!("connection refused")));

        assert!(app.messages.is_empty());
        assert_eq!(app.input, "will fail");
        assert!(!app.is_loading());
    }

    #[test]
    fn fragments_join_with_single_space() {
        let content = MessageContent::Fragments(vec![
            ContentFragment {
                kind: "text".to_string(),
                text: "Furniture: $500;".to_string(),
            },
            ContentFragment {
                kind: "text".to_string(),
                text: "Electronics: $700".to_string(),
            },
        ]);
        assert_eq!(content.display_text(), "Furniture: $500; Electronics: $700");
    }

    #[test]
    fn string_content_renders_verbatim() {
        let content = MessageContent::Text("two  spaces stay".to_string());
        assert_eq!(content.display_text(), "two  spaces stay");
    }

    #[test]
    fn chat_scroll_clamps_at_end() {
        let mut app = test_app();
        app.chat_height = 4;
        app.chat_width = 20;
        for i in 0..5 {
            app.messages.push(ChatMessage {
                role: ChatRole::User,
                content: MessageContent::Text(format!("message {i}")),
            });
        }

        let max_scroll = app.chat_total_lines() - app.chat_height;
        for _ in 0..100 {
            app.scroll_chat_down();
        }
        assert_eq!(app.chat_scroll, max_scroll);

        app.scroll_chat_to_bottom();
        assert_eq!(app.chat_scroll, max_scroll);
    }

    #[test]
    fn hint_selection_maps_to_text() {
        let mut app = test_app();
        assert_eq!(app.selected_hint(), Some(HINT_FILE_PATH));

        app.hint_nav_down();
        assert_eq!(app.selected_hint(), Some(HINT_QUESTIONS[0]));

        for _ in 0..10 {
            app.hint_nav_down();
        }
        assert_eq!(app.selected_hint(), Some(HINT_QUESTIONS[2]));
    }
}
