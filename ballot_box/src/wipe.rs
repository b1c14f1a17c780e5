//! The confirmation protocol in front of the erase of all the ballots.
//!
//! Each action is a separate transition. No single action goes from `Idle`
//! to an erase: the "clear votes" request only opens a confirmation, and the
//! erase is requested by the last affirming action. Cancelling is always
//! possible and never has side effects.

use log::{info, warn};

use crate::config::WipePolicy;
use crate::credentials::CredentialStore;
use crate::errors::*;

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum WipeState {
    Idle,
    /// Waiting for affirming click number `step` (starting at 1).
    Confirming { step: u8 },
    PasswordPrompt,
}

/// What the protocol expects next, or `Erase` when the caller must now erase.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum WipeStep {
    AwaitConfirmation { step: u8, of: u8 },
    AwaitSecret,
    Erase,
}

#[derive(Debug, Clone)]
pub struct WipeProtocol {
    policy: WipePolicy,
    state: WipeState,
}

impl WipeProtocol {
    pub fn new(policy: WipePolicy) -> WipeProtocol {
        WipeProtocol {
            policy,
            state: WipeState::Idle,
        }
    }

    pub fn state(&self) -> WipeState {
        self.state
    }

    fn prompt(&self) -> Option<WipeStep> {
        match (self.state, self.policy) {
            (WipeState::Idle, _) => None,
            (WipeState::Confirming { step }, WipePolicy::Clicks { steps }) => {
                Some(WipeStep::AwaitConfirmation { step, of: steps })
            }
            (WipeState::Confirming { step }, WipePolicy::Password) => {
                Some(WipeStep::AwaitConfirmation { step, of: step })
            }
            (WipeState::PasswordPrompt, _) => Some(WipeStep::AwaitSecret),
        }
    }

    /// "Clear all votes". Opens the confirmation; a wipe already in progress
    /// stays where it is.
    pub fn request(&mut self) -> WipeStep {
        if let Some(step) = self.prompt() {
            return step;
        }
        self.state = match self.policy {
            WipePolicy::Clicks { .. } => WipeState::Confirming { step: 1 },
            WipePolicy::Password => WipeState::PasswordPrompt,
        };
        info!("WipeProtocol: wipe requested, awaiting confirmation");
        // The state is no longer idle.
        self.prompt().unwrap_or(WipeStep::AwaitSecret)
    }

    /// "Yes, really". Only meaningful for the click policy.
    pub fn affirm(&mut self) -> Result<WipeStep, SessionError> {
        match (self.state, self.policy) {
            (WipeState::Idle, _) => NoWipeInProgressSnafu {}.fail(),
            (WipeState::PasswordPrompt, _) => WrongWipeStepSnafu {
                expected: "the wipe password",
            }
            .fail(),
            (WipeState::Confirming { step }, WipePolicy::Clicks { steps }) if step < steps => {
                self.state = WipeState::Confirming { step: step + 1 };
                Ok(WipeStep::AwaitConfirmation {
                    step: step + 1,
                    of: steps,
                })
            }
            (WipeState::Confirming { .. }, _) => {
                self.state = WipeState::Idle;
                info!("WipeProtocol: wipe confirmed");
                Ok(WipeStep::Erase)
            }
        }
    }

    /// Submits the wipe secret. A wrong secret returns to `Idle`.
    pub fn submit_secret(
        &mut self,
        credentials: &CredentialStore,
        presented: &str,
    ) -> Result<WipeStep, SessionError> {
        match self.state {
            WipeState::Idle => NoWipeInProgressSnafu {}.fail(),
            WipeState::Confirming { .. } => WrongWipeStepSnafu {
                expected: "a confirmation",
            }
            .fail(),
            WipeState::PasswordPrompt => {
                self.state = WipeState::Idle;
                if credentials.is_wipe_secret(presented) {
                    info!("WipeProtocol: wipe password accepted");
                    Ok(WipeStep::Erase)
                } else {
                    warn!("WipeProtocol: wrong wipe password, back to idle");
                    WrongWipeSecretSnafu {}.fail()
                }
            }
        }
    }

    /// Back to `Idle`, from anywhere, without side effects.
    pub fn cancel(&mut self) {
        if self.state != WipeState::Idle {
            info!("WipeProtocol: wipe cancelled");
        }
        self.state = WipeState::Idle;
    }
}
