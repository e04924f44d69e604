//! Research flow state machine.
//!
//! Models the add/edit dialog as explicit states:
//!
//! ```text
//! closed ──open──▶ asking ──submit──▶ loading ──ok──▶ confirming ──save/cancel──▶ closed
//!                    ▲  │                │
//!                    │  └─manual_entry───┼──────────────▶ confirming
//!                    └────── failure ────┘
//! closed ──start_edit──▶ editing ──save/cancel──▶ closed
//! ```
//!
//! Every submit hands out a [`ResearchTicket`]. A completion only applies when
//! its ticket belongs to the current loading state, so results of cancelled or
//! superseded lookups are dropped.

use tracing::{debug, info};

use crate::error::AppError;
use crate::models::{ResearchedData, WineId};

/// Identifies one research submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResearchTicket(u64);

#[derive(Debug, Clone, Default, PartialEq)]
pub enum FlowState {
    #[default]
    Closed,
    /// Waiting for a wine name. `error` holds the message of the last failure.
    Asking { error: Option<String> },
    Loading {
        query: String,
        ticket: ResearchTicket,
    },
    /// A draft is shown for review before it becomes a record.
    Confirming { draft: ResearchedData },
    Editing { id: WineId },
}

impl FlowState {
    pub fn name(&self) -> &'static str {
        match self {
            FlowState::Closed => "closed",
            FlowState::Asking { .. } => "asking",
            FlowState::Loading { .. } => "loading",
            FlowState::Confirming { .. } => "confirming",
            FlowState::Editing { .. } => "editing",
        }
    }
}

/// What a successful `save` asks the caller to persist.
#[derive(Debug, Clone, PartialEq)]
pub enum SaveRequest {
    Create(ResearchedData),
    Update(WineId),
}

#[derive(Debug, Default)]
pub struct ResearchFlow {
    state: FlowState,
    next_ticket: u64,
}

impl ResearchFlow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &FlowState {
        &self.state
    }

    /// Last failure message, shown while asking.
    pub fn error(&self) -> Option<&str> {
        match &self.state {
            FlowState::Asking { error } => error.as_deref(),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.state, FlowState::Loading { .. })
    }

    pub fn open(&mut self) -> Result<(), AppError> {
        match self.state {
            FlowState::Closed => {
                self.state = FlowState::Asking { error: None };
                Ok(())
            }
            _ => Err(self.invalid("open")),
        }
    }

    /// Starts a lookup for `query`. Blank queries keep the flow asking.
    pub fn submit(&mut self, query: &str) -> Result<ResearchTicket, AppError> {
        if !matches!(self.state, FlowState::Asking { .. }) {
            return Err(self.invalid("submit"));
        }
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::Generic("wine name must not be empty".to_string()));
        }

        let ticket = ResearchTicket(self.next_ticket);
        self.next_ticket += 1;
        self.state = FlowState::Loading {
            query: query.to_string(),
            ticket,
        };
        debug!("Research {:?} started for '{}'", ticket, query);
        Ok(ticket)
    }

    /// Applies the outcome of a lookup.
    ///
    /// Returns `false` when the ticket is stale and the outcome was dropped.
    /// Failures move the flow back to asking with a user-facing message.
    pub fn complete(
        &mut self,
        ticket: ResearchTicket,
        outcome: Result<ResearchedData, AppError>,
    ) -> bool {
        match &self.state {
            FlowState::Loading { ticket: current, .. } if *current == ticket => {}
            _ => {
                info!("Ignoring research result for stale {:?}", ticket);
                return false;
            }
        }

        self.state = match outcome {
            Ok(draft) => FlowState::Confirming { draft },
            Err(e) => FlowState::Asking {
                error: Some(e.user_message()),
            },
        };
        true
    }

    /// Skips research and confirms a blank draft named `name`.
    pub fn manual_entry(&mut self, name: &str) -> Result<(), AppError> {
        match self.state {
            FlowState::Asking { .. } => {
                self.state = FlowState::Confirming {
                    draft: ResearchedData::manual(name),
                };
                Ok(())
            }
            _ => Err(self.invalid("enter manually")),
        }
    }

    /// Draft under review, for user amendments before saving.
    pub fn draft_mut(&mut self) -> Option<&mut ResearchedData> {
        match &mut self.state {
            FlowState::Confirming { draft } => Some(draft),
            _ => None,
        }
    }

    pub fn start_edit(&mut self, id: WineId) -> Result<(), AppError> {
        match self.state {
            FlowState::Closed => {
                self.state = FlowState::Editing { id };
                Ok(())
            }
            _ => Err(self.invalid("edit")),
        }
    }

    /// Closes the flow and returns what should be persisted.
    pub fn save(&mut self) -> Result<SaveRequest, AppError> {
        match std::mem::take(&mut self.state) {
            FlowState::Confirming { draft } => Ok(SaveRequest::Create(draft)),
            FlowState::Editing { id } => Ok(SaveRequest::Update(id)),
            other => {
                self.state = other;
                Err(self.invalid("save"))
            }
        }
    }

    /// Closes the flow from any state. Pending lookups become stale.
    pub fn cancel(&mut self) {
        if let FlowState::Loading { ticket, .. } = &self.state {
            info!("Research {:?} cancelled", ticket);
        }
        self.state = FlowState::Closed;
    }

    fn invalid(&self, action: &'static str) -> AppError {
        AppError::InvalidTransition {
            state: self.state.name(),
            action,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(name: &str) -> ResearchedData {
        ResearchedData {
            name: name.to_string(),
            description: "note".to_string(),
            ..ResearchedData::default()
        }
    }

    #[test]
    fn test_happy_path() {
        let mut flow = ResearchFlow::new();
        flow.open().unwrap();
        let ticket = flow.submit("  Cloudy Bay ").unwrap();
        assert!(flow.is_loading());
        assert!(matches!(flow.state(), FlowState::Loading { query, .. } if query == "Cloudy Bay"));

        assert!(flow.complete(ticket, Ok(draft("Cloudy Bay"))));
        assert_eq!(flow.state().name(), "confirming");

        let request = flow.save().unwrap();
        assert_eq!(request, SaveRequest::Create(draft("Cloudy Bay")));
        assert_eq!(flow.state(), &FlowState::Closed);
    }

    #[test]
    fn test_failure_returns_to_asking_with_message() {
        let mut flow = ResearchFlow::new();
        flow.open().unwrap();
        let ticket = flow.submit("???").unwrap();
        assert!(flow.complete(
            ticket,
            Err(AppError::MalformedResponse("nope".to_string()))
        ));
        assert_eq!(flow.state().name(), "asking");
        assert!(flow.error().unwrap().contains("adding it manually"));

        // Retry from asking works.
        let retry = flow.submit("Barolo").unwrap();
        assert_ne!(retry, ticket);
    }

    #[test]
    fn test_cancelled_result_is_dropped() {
        let mut flow = ResearchFlow::new();
        flow.open().unwrap();
        let ticket = flow.submit("Rioja").unwrap();
        flow.cancel();

        assert!(!flow.complete(ticket, Ok(draft("Rioja"))));
        assert_eq!(flow.state(), &FlowState::Closed);
    }

    #[test]
    fn test_superseded_result_is_dropped() {
        let mut flow = ResearchFlow::new();
        flow.open().unwrap();
        let first = flow.submit("First").unwrap();
        flow.cancel();
        flow.open().unwrap();
        let second = flow.submit("Second").unwrap();

        assert!(!flow.complete(first, Ok(draft("First"))));
        assert!(flow.is_loading());
        assert!(flow.complete(second, Ok(draft("Second"))));
        assert_eq!(flow.save().unwrap(), SaveRequest::Create(draft("Second")));
    }

    #[test]
    fn test_manual_entry() {
        let mut flow = ResearchFlow::new();
        flow.open().unwrap();
        flow.manual_entry("House Red").unwrap();
        flow.draft_mut().unwrap().varietal = "Merlot".to_string();

        match flow.save().unwrap() {
            SaveRequest::Create(draft) => {
                assert_eq!(draft.name, "House Red");
                assert_eq!(draft.varietal, "Merlot");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_edit_path() {
        let mut flow = ResearchFlow::new();
        flow.start_edit(WineId::new("w1")).unwrap();
        assert_eq!(flow.save().unwrap(), SaveRequest::Update(WineId::new("w1")));
    }

    #[test]
    fn test_invalid_transitions() {
        let mut flow = ResearchFlow::new();
        assert!(matches!(
            flow.submit("x"),
            Err(AppError::InvalidTransition { state: "closed", action: "submit" })
        ));
        assert!(flow.save().is_err());
        assert_eq!(flow.state(), &FlowState::Closed);

        flow.open().unwrap();
        assert!(flow.open().is_err());
        assert!(flow.start_edit(WineId::new("w")).is_err());
        assert!(flow.submit("   ").is_err());
        assert_eq!(flow.state().name(), "asking");
    }
}
