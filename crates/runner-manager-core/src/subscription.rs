use crate::wire::OutboundFrame;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SubscriptionState {
    #[default]
    Idle,
    Watching(String),
}

impl SubscriptionState {
    pub fn target(&self) -> Option<&str> {
        match self {
            SubscriptionState::Idle => None,
            SubscriptionState::Watching(id) => Some(id.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionAction {
    Send(OutboundFrame),
    ClearMetrics,
}

// Teardown always precedes the next subscribe.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionController {
    state: SubscriptionState,
}

impl SubscriptionController {
    pub fn state(&self) -> &SubscriptionState {
        &self.state
    }

    pub fn target(&self) -> Option<&str> {
        self.state.target()
    }

    pub fn is_watching(&self, ctrl_id: &str) -> bool {
        self.target() == Some(ctrl_id)
    }

    /// Picking the current target again toggles off.
    pub fn select(&mut self, ctrl_id: &str) -> Vec<SubscriptionAction> {
        match std::mem::take(&mut self.state) {
            SubscriptionState::Idle => {
                self.state = SubscriptionState::Watching(ctrl_id.to_string());
                vec![subscribe(ctrl_id)]
            }
            SubscriptionState::Watching(current) if current == ctrl_id => teardown(),
            SubscriptionState::Watching(_) => {
                self.state = SubscriptionState::Watching(ctrl_id.to_string());
                let mut actions = teardown();
                actions.push(subscribe(ctrl_id));
                actions
            }
        }
    }

    pub fn deselect(&mut self, ctrl_id: &str) -> Vec<SubscriptionAction> {
        if !self.is_watching(ctrl_id) {
            return Vec::new();
        }
        self.state = SubscriptionState::Idle;
        teardown()
    }
}

fn subscribe(ctrl_id: &str) -> SubscriptionAction {
    SubscriptionAction::Send(OutboundFrame::Subscribe {
        ctrl_id: ctrl_id.to_string(),
    })
}

fn teardown() -> Vec<SubscriptionAction> {
    vec![
        SubscriptionAction::Send(OutboundFrame::Unsubscribe),
        SubscriptionAction::ClearMetrics,
    ]
}
