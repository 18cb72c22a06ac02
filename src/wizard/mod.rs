//! Merchant boarding wizard.
//!
//! `BoardingWizard` is a state machine over [`Step`]. Every forward
//! transition first validates the step's form locally, then persists it via
//! [`BoardingApi`]; if either fails the wizard stays where it is. Forms for
//! all steps live in memory for the whole session, so going back never loses
//! input.
use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::api::model::{
    Credentials, InviteInfo, LookupAddress, SaveForLater, SaveForLaterResponse, SavedData,
    VerifyEmailCode,
};
use crate::api::BoardingApi;
use crate::config::Config;
use crate::error::ApiError;
use crate::validate::validate_verification_code;

pub mod bank;
pub mod forms;
pub mod identity;

pub use bank::{BankReturn, BankVerificationOutcome};
pub use forms::{AccountForm, BankDetails, BusinessDetails, FieldError, PersonalDetails, TradingDetails};
pub use identity::{IdentityEvent, IdentityEvents, IdentitySnapshot, IdentityState};

const CODE_SENT_MESSAGE: &str =
    "We've sent a 6-digit verification code to your email. Enter it below. The code expires in 15 minutes.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Step {
    Form,
    Verify,
    Step2,
    Step3,
    Step4,
    Step5,
    Step6,
    Review,
    Done,
}

const ORDER: [Step; 9] = [
    Step::Form,
    Step::Verify,
    Step::Step2,
    Step::Step3,
    Step::Step4,
    Step::Step5,
    Step::Step6,
    Step::Review,
    Step::Done,
];

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Form => "form",
            Step::Verify => "verify",
            Step::Step2 => "step2",
            Step::Step3 => "step3",
            Step::Step4 => "step4",
            Step::Step5 => "step5",
            Step::Step6 => "step6",
            Step::Review => "review",
            Step::Done => "done",
        }
    }

    pub fn parse(s: &str) -> Option<Step> {
        ORDER.iter().copied().find(|step| step.as_str() == s.trim())
    }

    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn previous(&self) -> Option<Step> {
        self.index().checked_sub(1).map(|i| ORDER[i])
    }

    pub fn next(&self) -> Option<Step> {
        ORDER.get(self.index() + 1).copied()
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum WizardError {
    #[error("{message}")]
    Invalid {
        field: &'static str,
        message: String,
    },
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("{0}")]
    Link(String),
    #[error("action belongs to {expected}, wizard is on {actual}")]
    WrongStep { expected: Step, actual: Step },
    #[error("identity verification timed out")]
    IdentityTimeout,
    #[error("identity verification ended before a result was received")]
    IdentityClosed,
}

impl From<FieldError> for WizardError {
    fn from(e: FieldError) -> Self {
        WizardError::Invalid {
            field: e.field,
            message: e.message,
        }
    }
}

impl WizardError {
    fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        WizardError::Invalid {
            field,
            message: message.into(),
        }
    }

    pub fn user_message(&self, api_base: &str) -> String {
        match self {
            WizardError::Api(e) => e.user_message(api_base),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WizardOptions {
    pub identity_advance_delay: Duration,
    pub identity_timeout: Option<Duration>,
}

impl Default for WizardOptions {
    fn default() -> Self {
        Self {
            identity_advance_delay: Duration::from_millis(1500),
            identity_timeout: None,
        }
    }
}

impl WizardOptions {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            identity_advance_delay: cfg.identity_advance_delay(),
            identity_timeout: cfg.identity_timeout(),
        }
    }
}

/// Result of the final review submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewOutcome {
    pub step: Step,
    pub agreement_pdf_path: Option<String>,
    /// E-signature page to open when the backend routes the merchant there.
    pub signing_url: Option<String>,
}

pub struct BoardingWizard<A> {
    api: A,
    token: String,
    options: WizardOptions,
    step: Step,
    invite: Option<InviteInfo>,
    account: AccountForm,
    verification_message: Option<String>,
    personal: PersonalDetails,
    business: BusinessDetails,
    trading: TradingDetails,
    bank: BankDetails,
    verified: BTreeSet<&'static str>,
    identity: IdentityState,
    snapshot: Option<IdentitySnapshot>,
    bank_outcome: Option<BankVerificationOutcome>,
    consent: bool,
}

impl<A> fmt::Debug for BoardingWizard<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoardingWizard")
            .field("step", &self.step)
            .field("identity", &self.identity)
            .field("verified", &self.verified)
            .finish()
    }
}

impl<A: BoardingApi> BoardingWizard<A> {
    /// A wizard for `token` with no saved progress.
    pub fn new(api: A, token: impl Into<String>, options: WizardOptions) -> Self {
        Self {
            api,
            token: token.into(),
            options,
            step: Step::Form,
            invite: None,
            account: AccountForm::default(),
            verification_message: None,
            personal: PersonalDetails::default(),
            business: BusinessDetails::default(),
            trading: TradingDetails::default(),
            bank: BankDetails::default(),
            verified: BTreeSet::new(),
            identity: IdentityState::NotStarted,
            snapshot: None,
            bank_outcome: None,
            consent: false,
        }
    }

    /// Resolve the invite, then restore any saved progress.
    #[instrument(skip_all)]
    pub async fn open(
        api: A,
        token: impl Into<String>,
        options: WizardOptions,
    ) -> Result<Self, WizardError> {
        let mut wizard = Self::new(api, token, options);
        if wizard.token.trim().is_empty() {
            return Err(WizardError::Link("Invalid or expired link".into()));
        }
        let invite = match wizard.api.invite_info(&wizard.token).await {
            Ok(info) => info,
            Err(ApiError::Server(shape)) if (400..500).contains(&shape.status_code) => {
                return Err(WizardError::Link(shape.error));
            }
            Err(e) => return Err(e.into()),
        };
        if !invite.valid {
            return Err(WizardError::Link("This link is no longer valid.".into()));
        }
        info!(partner=%invite.partner.name, "invite resolved");
        wizard.invite = Some(invite);

        let saved = wizard.api.saved_data(&wizard.token).await?;
        wizard.resume(&saved);
        if let Err(err) = wizard.refresh_email_verification().await {
            warn!(error=%err, "email verification status unavailable");
        }
        Ok(wizard)
    }

    /// Skip to step2 when the email was verified outside this session, e.g.
    /// from the link in the verification email. Only applies before step2.
    pub async fn refresh_email_verification(&mut self) -> Result<Step, WizardError> {
        if !matches!(self.step, Step::Form | Step::Verify) {
            return Ok(self.step);
        }
        let status = self.api.verify_status(&self.token).await?;
        if status.verified {
            self.verified.insert("account_email");
            if self.personal.email.trim().is_empty() {
                self.personal.email = self.account.email.trim().to_string();
            }
            self.verification_message = None;
            self.step = Step::Step2;
            info!("email verified elsewhere");
        }
        Ok(self.step)
    }

    /// Sign in with merchant credentials and reopen the wizard for the
    /// invite the account belongs to. Returns the wizard and the access token.
    pub async fn sign_in(
        api: A,
        credentials: &Credentials,
        options: WizardOptions,
    ) -> Result<(Self, String), WizardError> {
        let login = api.login(credentials).await?;
        let invite_token = login
            .invite_token
            .clone()
            .ok_or_else(|| WizardError::Link("No boarding link is linked to this account.".into()))?;
        let wizard = Self::open(api, invite_token, options).await?;
        Ok((wizard, login.access_token))
    }

    /// Prefill every form from saved progress and jump to the saved step.
    pub fn resume(&mut self, saved: &SavedData) -> Step {
        if !saved.has_data {
            return self.step;
        }
        if let Some(email) = &saved.email {
            self.account.email = email.clone();
        }
        self.personal = PersonalDetails::from_saved(saved);
        self.business = BusinessDetails::from_saved(saved);
        self.trading = TradingDetails::from_saved(saved);
        self.bank = BankDetails::from_saved(saved);

        self.verified.clear();
        if saved.email_verified {
            self.verified.insert("account_email");
        }
        self.verified.extend(self.personal.verified_fields());
        self.verified.extend(self.business.verified_fields());
        self.verified.extend(self.trading.verified_fields());
        self.verified.extend(self.bank.verified_fields());

        if saved.sumsub_verification_status.as_deref() == Some(identity::STATUS_COMPLETED) {
            self.identity = IdentityState::Completed;
            self.snapshot = Some(IdentitySnapshot::capture(&self.personal));
        }
        if saved.truelayer_verified.is_some() {
            self.bank_outcome = Some(BankVerificationOutcome {
                verified: saved.truelayer_verified.unwrap_or(false),
                message: saved.truelayer_verification_message.clone(),
                error: None,
                error_detail: None,
            });
        }

        self.step = match saved.current_step.as_deref().and_then(Step::parse) {
            Some(step) => step,
            None if saved.email_verified => Step::Step2,
            None if saved.email.is_some() => Step::Verify,
            None => Step::Form,
        };
        debug!(step=%self.step, verified=self.verified.len(), "progress restored");
        self.step
    }

    fn require(&self, expected: Step) -> Result<(), WizardError> {
        if self.step != expected {
            return Err(WizardError::WrongStep {
                expected,
                actual: self.step,
            });
        }
        Ok(())
    }

    fn mark_verified(&mut self, fields: Vec<&'static str>) {
        self.verified.extend(fields);
    }

    // -- accessors --------------------------------------------------------

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn invite(&self) -> Option<&InviteInfo> {
        self.invite.as_ref()
    }

    pub fn is_verified(&self, field: &str) -> bool {
        self.verified.contains(field)
    }

    pub fn verification_message(&self) -> Option<&str> {
        self.verification_message.as_deref()
    }

    pub fn account(&self) -> &AccountForm {
        &self.account
    }

    pub fn account_mut(&mut self) -> &mut AccountForm {
        &mut self.account
    }

    pub fn personal(&self) -> &PersonalDetails {
        &self.personal
    }

    pub fn personal_mut(&mut self) -> &mut PersonalDetails {
        &mut self.personal
    }

    pub fn business(&self) -> &BusinessDetails {
        &self.business
    }

    pub fn business_mut(&mut self) -> &mut BusinessDetails {
        &mut self.business
    }

    pub fn trading(&self) -> &TradingDetails {
        &self.trading
    }

    pub fn trading_mut(&mut self) -> &mut TradingDetails {
        &mut self.trading
    }

    pub fn bank(&self) -> &BankDetails {
        &self.bank
    }

    pub fn bank_mut(&mut self) -> &mut BankDetails {
        &mut self.bank
    }

    pub fn set_consent(&mut self, agreed: bool) {
        self.consent = agreed;
    }

    /// Fill the personal address from a lookup result.
    pub fn apply_address(&mut self, address: &LookupAddress) {
        self.personal.address_line1 = address.address_line1.clone();
        self.personal.address_line2 = address.address_line2.clone();
        self.personal.address_town = address.town.clone();
        self.personal.address_postcode = address.postcode.clone();
    }

    // -- transitions ------------------------------------------------------

    #[instrument(skip_all)]
    pub async fn submit_account(&mut self) -> Result<Step, WizardError> {
        self.require(Step::Form)?;
        let body = self.account.validate()?;
        let resp = self.api.submit_account(&self.token, &body).await?;
        self.verification_message = Some(CODE_SENT_MESSAGE.to_string());
        if let Some(message) = resp.message {
            debug!(%message, "account created");
        }
        self.step = Step::Verify;
        Ok(self.step)
    }

    pub async fn verify_email_code(&mut self, code: &str) -> Result<Step, WizardError> {
        self.require(Step::Verify)?;
        let code = validate_verification_code(code).map_err(|m| WizardError::invalid("code", m))?;
        let resp = self
            .api
            .verify_email_code(&self.token, &VerifyEmailCode { code })
            .await?;
        if !resp.verified {
            return Err(WizardError::invalid(
                "code",
                resp.message
                    .unwrap_or_else(|| "That code is incorrect or has expired.".into()),
            ));
        }
        self.verified.insert("account_email");
        if self.personal.email.trim().is_empty() {
            self.personal.email = self.account.email.trim().to_string();
        }
        self.verification_message = None;
        self.step = Step::Step2;
        Ok(self.step)
    }

    /// Save personal details. Goes to step4 only while identity
    /// verification is complete and no critical field changed since.
    #[instrument(skip_all)]
    pub async fn submit_personal(&mut self) -> Result<Step, WizardError> {
        self.require(Step::Step2)?;
        let body = self.personal.validate()?;
        self.api.submit_personal(&self.token, &body).await?;
        self.mark_verified(self.personal.verified_fields());

        let still_verified = self.identity.is_completed()
            && self
                .snapshot
                .as_ref()
                .is_some_and(|snap| snap.matches(&self.personal));
        if still_verified {
            self.step = Step::Step4;
        } else {
            if self.snapshot.take().is_some() || self.identity.is_completed() {
                info!("identity details changed, verification required again");
            }
            self.identity = IdentityState::NotStarted;
            self.step = Step::Step3;
        }
        Ok(self.step)
    }

    pub async fn submit_business(&mut self) -> Result<Step, WizardError> {
        self.require(Step::Step4)?;
        let body = self.business.validate()?;
        self.api.submit_business(&self.token, &body).await?;
        self.mark_verified(self.business.verified_fields());
        self.step = Step::Step5;
        Ok(self.step)
    }

    pub async fn submit_trading(&mut self) -> Result<Step, WizardError> {
        self.require(Step::Step5)?;
        let body = self.trading.validate()?;
        self.api.submit_trading(&self.token, &body).await?;
        self.mark_verified(self.trading.verified_fields());
        self.step = Step::Step6;
        Ok(self.step)
    }

    pub async fn submit_bank(&mut self) -> Result<Step, WizardError> {
        self.require(Step::Step6)?;
        let body = self.bank.validate()?;
        self.api.submit_bank(&self.token, &body).await?;
        self.mark_verified(self.bank.verified_fields());
        self.step = Step::Review;
        Ok(self.step)
    }

    #[instrument(skip_all)]
    pub async fn submit_review(&mut self) -> Result<ReviewOutcome, WizardError> {
        self.require(Step::Review)?;
        if !self.consent {
            return Err(WizardError::invalid(
                "consent",
                "Please confirm you agree to the terms before submitting.",
            ));
        }
        let resp = self.api.submit_review(&self.token).await?;
        if !resp.success {
            return Err(WizardError::invalid(
                "review",
                "We could not submit your application. Please try again.",
            ));
        }
        self.step = Step::Done;
        info!(signing = resp.redirect_to_signing, "application submitted");
        Ok(ReviewOutcome {
            step: self.step,
            agreement_pdf_path: resp.agreement_pdf_path,
            signing_url: if resp.redirect_to_signing {
                resp.signing_url
            } else {
                None
            },
        })
    }

    pub async fn download_agreement(&self) -> Result<Vec<u8>, WizardError> {
        self.require(Step::Done)?;
        Ok(self.api.agreement_pdf(&self.token).await?)
    }

    pub async fn download_services_agreement(&self) -> Result<Vec<u8>, WizardError> {
        self.require(Step::Done)?;
        Ok(self.api.services_agreement(&self.token).await?)
    }

    /// Previous step by index. Nothing is validated or discarded.
    pub fn back(&mut self) -> Step {
        if let Some(prev) = self.step.previous() {
            self.step = prev;
        }
        self.step
    }

    /// Persist the current step plus any trading and bank fields entered so
    /// far, and have the backend email a resume link. The step is unchanged.
    pub async fn save_for_later(&self) -> Result<SaveForLaterResponse, WizardError> {
        if self.step < Step::Step2 || self.step == Step::Done {
            return Err(WizardError::WrongStep {
                expected: Step::Step2,
                actual: self.step,
            });
        }
        let mut body = SaveForLater {
            current_step: Some(self.step.as_str().to_string()),
            ..Default::default()
        };
        self.trading.fill_save(&mut body);
        self.bank.fill_save(&mut body);
        Ok(self.api.save_for_later(&self.token, &body).await?)
    }
}
