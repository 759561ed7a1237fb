use crate::transport::{OutboundQueue, SocketEvent};
use chrono::Utc;
use crossterm::event::{KeyCode, KeyEvent};
use runner_manager_core::{Controller, InboundOutcome, Projection, Session, SyncError, TimeWindow};
use tracing::{debug, warn};

pub struct App {
    pub session: Session<OutboundQueue>,
    pub cursor: usize,
    pub window: TimeWindow,
    pub connected: bool,
    pub ever_connected: bool,
    pub status_note: Option<String>,
    pub help_open: bool,
}

impl App {
    pub fn new(queue: OutboundQueue, window: TimeWindow, max_frame_bytes: usize) -> Self {
        Self {
            session: Session::new(queue).with_max_frame_bytes(max_frame_bytes),
            cursor: 0,
            window,
            connected: false,
            ever_connected: false,
            status_note: None,
            help_open: false,
        }
    }

    pub fn apply_socket_event(&mut self, event: SocketEvent) {
        match event {
            SocketEvent::Connected => {
                self.connected = true;
                self.session.channel_opened();
                if self.ever_connected {
                    // the server forgets the subscription with the old socket
                    if let Err(err) = self.session.request_topology() {
                        warn!(event = "reconnect_topology_request_failed", error = %err);
                    }
                    self.status_note = Some("reconnected".to_string());
                } else {
                    self.status_note = None;
                }
                self.ever_connected = true;
            }
            SocketEvent::Disconnected => {
                self.connected = false;
                self.session.channel_closed();
                self.status_note = Some("connection lost; retrying".to_string());
            }
            SocketEvent::Text(text) => match self.session.handle_text(&text) {
                Ok(InboundOutcome::Topology { .. }) => self.clamp_cursor(),
                Ok(InboundOutcome::Metrics { .. }) => {}
                Ok(InboundOutcome::Ignored { event }) => {
                    debug!(event = "app_frame_ignored", tag = %event);
                }
                Err(SyncError::StaleSubscriptionData { .. }) => {}
                Err(err) => {
                    self.status_note = Some(format!("bad frame: {err}"));
                }
            },
        }
    }

    /// Returns true when the operator asked to quit.
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        if matches!(key.code, KeyCode::Char('?') | KeyCode::F(1)) {
            self.help_open = !self.help_open;
            return false;
        }
        if key.code == KeyCode::Esc && self.help_open {
            self.help_open = false;
            return false;
        }
        if self.help_open {
            return false;
        }

        match key.code {
            KeyCode::Char('q') => return true,
            KeyCode::Down | KeyCode::Char('j') => self.move_cursor(1),
            KeyCode::Up | KeyCode::Char('k') => self.move_cursor(-1),
            KeyCode::Enter | KeyCode::Char('p') => self.toggle_plot(),
            KeyCode::Esc | KeyCode::Char('x') => self.close_plot(),
            KeyCode::Char('w') => {
                self.window = self.window.next();
                self.status_note = Some(format!("window: {}", self.window));
            }
            KeyCode::Char('r') => {
                let result = self.session.request_topology();
                self.note_result("refresh", result);
            }
            _ => {}
        }
        false
    }

    pub fn controllers(&self) -> &[Controller] {
        self.session.topology().controllers()
    }

    pub fn highlighted(&self) -> Option<&Controller> {
        self.controllers().get(self.cursor)
    }

    pub fn watched(&self) -> Option<&Controller> {
        self.session.watched_controller()
    }

    pub fn projection(&self) -> Projection {
        self.session.project(self.window.cutoff(Utc::now()))
    }

    fn move_cursor(&mut self, delta: isize) {
        let len = self.controllers().len();
        if len == 0 {
            self.cursor = 0;
            return;
        }
        let next = self.cursor as isize + delta;
        self.cursor = next.clamp(0, len as isize - 1) as usize;
    }

    fn clamp_cursor(&mut self) {
        let len = self.controllers().len();
        self.cursor = self.cursor.min(len.saturating_sub(1));
    }

    fn toggle_plot(&mut self) {
        let Some(ctrl_id) = self.highlighted().map(|ctrl| ctrl.id.clone()) else {
            return;
        };
        let result = self.session.select(&ctrl_id);
        self.note_result("plot", result);
    }

    fn close_plot(&mut self) {
        let Some(ctrl_id) = self.session.subscription().target().map(str::to_string) else {
            return;
        };
        let result = self.session.deselect(&ctrl_id);
        self.note_result("close", result);
    }

    fn note_result(&mut self, action: &str, result: Result<(), SyncError>) {
        match result {
            Ok(()) => {}
            Err(err) => {
                warn!(event = "app_action_failed", action, error = %err);
                self.status_note = Some(format!("{action}: {err}"));
            }
        }
    }
}
