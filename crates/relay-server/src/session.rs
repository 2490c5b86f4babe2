//! Session state tracking
//!
//! `SessionState` is the only mutable snapshot of a running bridge. It is
//! owned by the controller and changed exclusively through [`SessionState::apply`],
//! one event at a time.

use relay_core::{ChatEvent, Endpoint, EndpointEvent, Position};
use std::time::SystemTime;
use tracing::{debug, warn};

/// Connection status of the session as a whole
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Connectivity {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Most recent chat message seen from either endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct LastChat {
    pub origin: Endpoint,
    pub sender: String,
    pub text: String,
    pub at: SystemTime,
}

/// What applying an event changed, as far as the controller cares
#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    /// State updated (or event ignored); nothing else to do
    Updated,
    /// Both endpoints became ready; the session is now interactive
    Ready,
    /// A chat message to consider for relay
    Chat(ChatEvent),
    /// The given endpoint went away
    Disconnected(Endpoint),
}

/// Live bridge state for one session
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionState {
    connectivity: Connectivity,
    identity: Option<String>,
    position: Position,
    last_chat: Option<LastChat>,
    game_connected: bool,
    chat_connected: bool,
}

impl SessionState {
    /// Fresh state for a session whose adapters are being connected
    pub fn connecting() -> Self {
        Self {
            connectivity: Connectivity::Connecting,
            ..Default::default()
        }
    }

    pub fn connectivity(&self) -> Connectivity {
        self.connectivity
    }

    /// Session identity, only once the session is connected
    pub fn identity(&self) -> Option<&str> {
        match self.connectivity {
            Connectivity::Connected => self.identity.as_deref(),
            _ => None,
        }
    }

    /// Last known position, only once the session is connected
    pub fn position(&self) -> Option<Position> {
        match self.connectivity {
            Connectivity::Connected => Some(self.position),
            _ => None,
        }
    }

    pub fn last_chat(&self) -> Option<&LastChat> {
        self.last_chat.as_ref()
    }

    /// Apply one event received from `origin` at time `at`
    pub fn apply(&mut self, origin: Endpoint, event: EndpointEvent, at: SystemTime) -> Applied {
        match event {
            EndpointEvent::Connected => {
                match origin {
                    Endpoint::Game => self.game_connected = true,
                    Endpoint::Chat => self.chat_connected = true,
                }
                self.check_ready()
            }
            EndpointEvent::IdentityAssigned(id) => {
                if origin != Endpoint::Game {
                    warn!("Ignoring identity from {} endpoint", origin);
                    return Applied::Updated;
                }
                if let Some(existing) = &self.identity {
                    warn!("Identity already assigned ({}), ignoring {}", existing, id);
                    return Applied::Updated;
                }
                self.identity = Some(id);
                self.check_ready()
            }
            EndpointEvent::PositionChanged(position) => {
                if origin != Endpoint::Game || self.identity.is_none() {
                    debug!("Ignoring position update before identity: {}", position);
                } else {
                    self.position = position;
                }
                Applied::Updated
            }
            EndpointEvent::ChatReceived { sender, text } => {
                self.last_chat = Some(LastChat {
                    origin,
                    sender: sender.clone(),
                    text: text.clone(),
                    at,
                });
                Applied::Chat(ChatEvent {
                    origin,
                    sender,
                    raw_text: text,
                })
            }
            EndpointEvent::Error(_) => Applied::Updated,
            EndpointEvent::Disconnected => {
                self.connectivity = Connectivity::Disconnected;
                Applied::Disconnected(origin)
            }
        }
    }

    fn check_ready(&mut self) -> Applied {
        let ready = self.game_connected && self.identity.is_some() && self.chat_connected;
        if ready && self.connectivity == Connectivity::Connecting {
            self.connectivity = Connectivity::Connected;
            Applied::Ready
        } else {
            Applied::Updated
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::time::{Duration, UNIX_EPOCH};

    fn at(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(secs)
    }

    fn ready_state() -> SessionState {
        let mut state = SessionState::connecting();
        state.apply(Endpoint::Game, EndpointEvent::Connected, at(0));
        state.apply(Endpoint::Game, EndpointEvent::IdentityAssigned("42".into()), at(0));
        state.apply(Endpoint::Chat, EndpointEvent::Connected, at(0));
        state
    }

    #[test]
    fn test_ready_requires_identity_and_both_connected() {
        let mut state = SessionState::connecting();
        assert_eq!(
            state.apply(Endpoint::Game, EndpointEvent::Connected, at(0)),
            Applied::Updated
        );
        assert_eq!(
            state.apply(Endpoint::Chat, EndpointEvent::Connected, at(0)),
            Applied::Updated
        );
        assert_eq!(state.connectivity(), Connectivity::Connecting);
        assert_eq!(
            state.apply(Endpoint::Game, EndpointEvent::IdentityAssigned("7".into()), at(0)),
            Applied::Ready
        );
        assert_eq!(state.connectivity(), Connectivity::Connected);
        assert_eq!(state.identity(), Some("7"));
    }

    #[test]
    fn test_offline_values_until_connected() {
        let mut state = SessionState::connecting();
        state.apply(Endpoint::Game, EndpointEvent::Connected, at(0));
        state.apply(Endpoint::Game, EndpointEvent::IdentityAssigned("7".into()), at(0));
        state.apply(
            Endpoint::Game,
            EndpointEvent::PositionChanged(Position::new(1.0, 2.0, 3.0)),
            at(0),
        );
        assert_eq!(state.identity(), None);
        assert_eq!(state.position(), None);
    }

    #[test]
    fn test_identity_set_once() {
        let mut state = ready_state();
        state.apply(Endpoint::Game, EndpointEvent::IdentityAssigned("99".into()), at(1));
        assert_eq!(state.identity(), Some("42"));
    }

    #[test]
    fn test_position_last_write_wins() {
        let mut state = ready_state();
        assert_eq!(state.position(), Some(Position::default()));
        for x in [1.0, 2.0, 3.0] {
            state.apply(
                Endpoint::Game,
                EndpointEvent::PositionChanged(Position::new(x, 64.0, 0.0)),
                at(1),
            );
        }
        assert_eq!(state.position(), Some(Position::new(3.0, 64.0, 0.0)));
    }

    #[test]
    fn test_position_before_identity_ignored() {
        let mut state = SessionState::connecting();
        state.apply(
            Endpoint::Game,
            EndpointEvent::PositionChanged(Position::new(5.0, 5.0, 5.0)),
            at(0),
        );
        state.apply(Endpoint::Game, EndpointEvent::Connected, at(0));
        state.apply(Endpoint::Game, EndpointEvent::IdentityAssigned("1".into()), at(0));
        state.apply(Endpoint::Chat, EndpointEvent::Connected, at(0));
        assert_eq!(state.position(), Some(Position::default()));
    }

    #[test]
    fn test_chat_recorded_and_returned() {
        let mut state = ready_state();
        let applied = state.apply(
            Endpoint::Chat,
            EndpointEvent::ChatReceived {
                sender: "bob".into(),
                text: "hi".into(),
            },
            at(5),
        );
        assert_eq!(
            applied,
            Applied::Chat(ChatEvent {
                origin: Endpoint::Chat,
                sender: "bob".into(),
                raw_text: "hi".into(),
            })
        );
        let last = state.last_chat().unwrap();
        assert_eq!(last.sender, "bob");
        assert_eq!(last.at, at(5));
    }

    #[test]
    fn test_disconnect_goes_offline() {
        let mut state = ready_state();
        assert_eq!(
            state.apply(Endpoint::Chat, EndpointEvent::Disconnected, at(9)),
            Applied::Disconnected(Endpoint::Chat)
        );
        assert_eq!(state.connectivity(), Connectivity::Disconnected);
        assert_eq!(state.position(), None);
        assert_eq!(state.identity(), None);
    }

    fn arb_endpoint() -> impl Strategy<Value = Endpoint> {
        prop_oneof![Just(Endpoint::Game), Just(Endpoint::Chat)]
    }

    fn arb_event() -> impl Strategy<Value = EndpointEvent> {
        prop_oneof![
            Just(EndpointEvent::Connected),
            "[0-9]{1,4}".prop_map(EndpointEvent::IdentityAssigned),
            (-1000.0f64..1000.0, -64.0f64..320.0, -1000.0f64..1000.0)
                .prop_map(|(x, y, z)| EndpointEvent::PositionChanged(Position::new(x, y, z))),
            ("[a-z]{1,8}", "[ -~]{0,32}")
                .prop_map(|(sender, text)| EndpointEvent::ChatReceived { sender, text }),
            "[a-z ]{0,16}".prop_map(EndpointEvent::Error),
            Just(EndpointEvent::Disconnected),
        ]
    }

    proptest! {
        #[test]
        fn prop_replay_yields_identical_state(
            events in prop::collection::vec((arb_endpoint(), arb_event()), 0..48)
        ) {
            let replay = |events: &[(Endpoint, EndpointEvent)]| {
                let mut state = SessionState::connecting();
                for (i, (origin, event)) in events.iter().enumerate() {
                    state.apply(*origin, event.clone(), at(i as u64));
                }
                state
            };
            prop_assert_eq!(replay(&events), replay(&events));
        }
    }
}
