//! Step3 identity verification. The third-party widget reports progress as
//! events; the wizard consumes them through the `IdentityEvents` port.
use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{info, instrument, warn};

use super::forms::PersonalDetails;
use super::{BoardingWizard, Step, WizardError};
use crate::api::model::IdentityToken;
use crate::api::BoardingApi;

pub const STATUS_COMPLETED: &str = "completed";
pub const STATUS_REJECTED: &str = "rejected";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum IdentityState {
    #[default]
    NotStarted,
    Pending {
        access_token: String,
    },
    Completed,
    Rejected {
        reason: String,
    },
}

impl IdentityState {
    pub fn is_completed(&self) -> bool {
        matches!(self, IdentityState::Completed)
    }
}

/// Callback payloads from the verification widget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityEvent {
    /// Documents submitted, review in progress.
    Submitted,
    Completed,
    Rejected { reason: String },
}

/// Source of identity widget events. `None` means the source closed.
#[async_trait]
pub trait IdentityEvents: Send {
    async fn next_event(&mut self) -> Option<IdentityEvent>;
}

#[async_trait]
impl IdentityEvents for mpsc::Receiver<IdentityEvent> {
    async fn next_event(&mut self) -> Option<IdentityEvent> {
        self.recv().await
    }
}

/// Identity-critical fields as they were when verification completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentitySnapshot {
    legal_first_name: String,
    legal_last_name: String,
    date_of_birth: String,
    address_country: String,
    address_postcode: String,
    address_line1: String,
    address_line2: String,
    address_town: String,
}

impl IdentitySnapshot {
    pub fn capture(p: &PersonalDetails) -> Self {
        let norm = |s: &str| s.trim().to_string();
        Self {
            legal_first_name: norm(&p.legal_first_name),
            legal_last_name: norm(&p.legal_last_name),
            date_of_birth: norm(&p.date_of_birth),
            address_country: norm(&p.address_country),
            // Only UK addresses submit a postcode.
            address_postcode: if p.is_uk() {
                norm(&p.address_postcode)
            } else {
                String::new()
            },
            address_line1: norm(&p.address_line1),
            address_line2: norm(&p.address_line2),
            address_town: norm(&p.address_town),
        }
    }

    pub fn matches(&self, p: &PersonalDetails) -> bool {
        *self == Self::capture(p)
    }
}

impl<A: BoardingApi> BoardingWizard<A> {
    pub fn identity_state(&self) -> &IdentityState {
        &self.identity
    }

    pub fn identity_snapshot(&self) -> Option<&IdentitySnapshot> {
        self.snapshot.as_ref()
    }

    /// Fetch a widget access token and move to `Pending`.
    #[instrument(skip_all)]
    pub async fn start_identity(&mut self) -> Result<IdentityToken, WizardError> {
        self.require(Step::Step3)?;
        let token = self.api.identity_token(&self.token).await?;
        self.identity = IdentityState::Pending {
            access_token: token.token.clone(),
        };
        info!(user_id=%token.user_id, "identity verification started");
        Ok(token)
    }

    /// Apply one widget event. A completion is reported to the backend,
    /// snapshots the critical fields and advances to step4 after the
    /// configured delay.
    pub async fn handle_identity_event(
        &mut self,
        event: IdentityEvent,
    ) -> Result<Step, WizardError> {
        self.require(Step::Step3)?;
        match event {
            IdentityEvent::Submitted => info!("identity documents submitted"),
            IdentityEvent::Completed => {
                self.api
                    .identity_complete(&self.token, STATUS_COMPLETED)
                    .await?;
                self.identity = IdentityState::Completed;
                self.snapshot = Some(IdentitySnapshot::capture(&self.personal));
                info!("identity verification completed");
                tokio::time::sleep(self.options.identity_advance_delay).await;
                self.step = Step::Step4;
            }
            IdentityEvent::Rejected { reason } => {
                self.api
                    .identity_complete(&self.token, STATUS_REJECTED)
                    .await?;
                warn!(%reason, "identity verification rejected");
                self.identity = IdentityState::Rejected { reason };
                self.snapshot = None;
            }
        }
        Ok(self.step)
    }

    /// Consume events until verification completes or is rejected. Waits
    /// indefinitely unless an identity timeout is configured.
    pub async fn await_identity<E: IdentityEvents + ?Sized>(
        &mut self,
        events: &mut E,
    ) -> Result<Step, WizardError> {
        self.require(Step::Step3)?;
        loop {
            let next = match self.options.identity_timeout {
                Some(limit) => tokio::time::timeout(limit, events.next_event())
                    .await
                    .map_err(|_| WizardError::IdentityTimeout)?,
                None => events.next_event().await,
            };
            let event = next.ok_or(WizardError::IdentityClosed)?;
            self.handle_identity_event(event).await?;
            if matches!(
                self.identity,
                IdentityState::Completed | IdentityState::Rejected { .. }
            ) {
                return Ok(self.step);
            }
        }
    }

    /// After a rejection, start over from the initial sub-state.
    pub fn retry_identity(&mut self) -> Result<(), WizardError> {
        self.require(Step::Step3)?;
        if !matches!(self.identity, IdentityState::Rejected { .. }) {
            return Err(WizardError::WrongStep {
                expected: Step::Step3,
                actual: self.step,
            });
        }
        self.identity = IdentityState::NotStarted;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_compares_trimmed_values_exactly() {
        let mut p = PersonalDetails {
            legal_first_name: "Ada".into(),
            legal_last_name: "Lovelace".into(),
            address_postcode: "SW1A 1AA".into(),
            ..Default::default()
        };
        let snap = IdentitySnapshot::capture(&p);
        p.legal_first_name = " Ada ".into();
        p.address_postcode = " SW1A 1AA ".into();
        assert!(snap.matches(&p));
        // The backend drops verification on any postcode text change.
        p.address_postcode = "sw1a1aa".into();
        assert!(!snap.matches(&p));
        p.address_postcode = "SW1A 1AA".into();
        // Non-critical fields are ignored.
        p.phone_number = "07000000000".into();
        assert!(snap.matches(&p));
        p.legal_last_name = "Byron".into();
        assert!(!snap.matches(&p));
    }

    #[tokio::test]
    async fn channel_receiver_is_an_event_source() {
        let (tx, mut rx) = mpsc::channel(4);
        tx.send(IdentityEvent::Completed).await.unwrap();
        drop(tx);
        assert_eq!(rx.next_event().await, Some(IdentityEvent::Completed));
        assert_eq!(rx.next_event().await, None);
    }
}
