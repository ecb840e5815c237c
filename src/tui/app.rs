use crossterm::event::{ KeyCode, KeyEvent, KeyModifiers };
use log::info;
use tokio::sync::mpsc::UnboundedSender;
use super::{ view, AppEvent, EventHandler, Tui };
use crate::client::RelayClient;
use crate::conversation::ChatState;
use crate::error::BoxError;
use crate::models::chat::{ ChatRequest, ModelList };

pub struct App {
    pub state: ChatState,
    pub input: String,
    pub models: ModelList,
    pub selected: usize,
    pub should_quit: bool,
}

impl App {
    pub fn new(models: ModelList, preferred: Option<&str>) -> Self {
        let selected = preferred
            .and_then(|name| models.models.iter().position(|m| m == name))
            .unwrap_or(0);
        Self {
            state: ChatState::new(),
            input: String::new(),
            models,
            selected,
            should_quit: false,
        }
    }

    pub fn selected_model(&self) -> Option<&str> {
        self.models.models.get(self.selected).map(String::as_str)
    }

    pub fn cycle_model(&mut self) {
        if !self.models.models.is_empty() {
            self.selected = (self.selected + 1) % self.models.models.len();
        }
    }

    /// Apply a key press. Returns a request when the key submitted a turn.
    pub fn handle_key(&mut self, key: KeyEvent) -> Option<ChatRequest> {
        match key.code {
            KeyCode::Esc => self.should_quit = true,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.should_quit = true;
            }
            KeyCode::Tab if !self.state.is_busy() => self.cycle_model(),
            KeyCode::Enter => return self.submit(),
            KeyCode::Backspace if !self.state.is_busy() => {
                self.input.pop();
            }
            KeyCode::Char(c) if !self.state.is_busy() => self.input.push(c),
            _ => {}
        }
        None
    }

    fn submit(&mut self) -> Option<ChatRequest> {
        let model = self.selected_model().map(str::to_string);
        let request = self.state.submit(&self.input, model.as_deref())?;
        self.input.clear();
        Some(request)
    }
}

pub async fn run(client: RelayClient, preferred_model: Option<String>) -> Result<(), BoxError> {
    let models = client.list_models().await;
    info!("Relay at {} lists {} models", client.base_url(), models.models.len());
    let mut app = App::new(models, preferred_model.as_deref());

    super::install_panic_hook();
    let mut terminal = super::init()?;
    let mut events = EventHandler::new();
    let result = event_loop(&mut terminal, &mut app, &mut events, &client).await;
    super::restore()?;
    result
}

async fn event_loop(
    terminal: &mut Tui,
    app: &mut App,
    events: &mut EventHandler,
    client: &RelayClient
) -> Result<(), BoxError> {
    while !app.should_quit {
        terminal.draw(|frame| view::render(frame, app))?;

        match events.next().await {
            Some(AppEvent::Key(key)) => {
                if let Some(request) = app.handle_key(key) {
                    spawn_turn(client.clone(), request, events.sender());
                }
            }
            Some(AppEvent::Chat(action)) => app.state.apply(action),
            Some(AppEvent::Resize(..)) => {}
            None => break,
        }
    }
    Ok(())
}

fn spawn_turn(client: RelayClient, request: ChatRequest, tx: UnboundedSender<AppEvent>) {
    tokio::spawn(async move {
        client.run_turn(&request, |action| {
            let _ = tx.send(AppEvent::Chat(action));
        }).await;
    });
}
