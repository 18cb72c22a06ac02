//! Optional open-banking check on step6: persist the bank fields, hand the
//! merchant an authorization URL, then read the outcome back from the query
//! string of the return redirect.
use reqwest::Url;
use tracing::{info, instrument, warn};

use super::{BoardingWizard, Step, WizardError};
use crate::api::BoardingApi;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BankVerificationOutcome {
    pub verified: bool,
    pub message: Option<String>,
    pub error: Option<String>,
    pub error_detail: Option<String>,
}

impl BankVerificationOutcome {
    pub fn summary(&self) -> String {
        if self.verified {
            return self
                .message
                .clone()
                .unwrap_or_else(|| "Bank account verified.".into());
        }
        match (&self.error, &self.error_detail, &self.message) {
            (_, Some(detail), _) => format!("Bank verification failed: {}", detail),
            (Some(code), None, _) => format!("Bank verification failed ({}).", code),
            (None, None, Some(message)) => message.clone(),
            (None, None, None) => "We could not verify your bank account.".into(),
        }
    }
}

/// Parameters carried by the return redirect.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BankReturn {
    pub step: Option<String>,
    pub bank_verified: Option<bool>,
    pub bank_verification_message: Option<String>,
    pub error: Option<String>,
    pub error_detail: Option<String>,
}

impl BankReturn {
    /// Accepts a bare query (`step=step6&bank_verified=1`), one with a
    /// leading `?`, or a full URL.
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        let query = match input.split_once('?') {
            Some((_, q)) => q,
            None if input.contains("://") => "",
            None => input,
        };
        let mut out = BankReturn::default();
        let Ok(url) = Url::parse(&format!("http://return.invalid/?{}", query)) else {
            return out;
        };
        for (key, value) in url.query_pairs() {
            let value = value.into_owned();
            match key.as_ref() {
                "step" => out.step = Some(value),
                "bank_verified" => out.bank_verified = Some(value == "1" || value == "true"),
                "bank_verification_message" => out.bank_verification_message = Some(value),
                "error" => out.error = Some(value),
                "error_detail" => out.error_detail = Some(value),
                _ => {}
            }
        }
        out
    }

    pub fn outcome(&self) -> Option<BankVerificationOutcome> {
        if self.bank_verified.is_none() && self.error.is_none() {
            return None;
        }
        Some(BankVerificationOutcome {
            verified: self.bank_verified.unwrap_or(false) && self.error.is_none(),
            message: self.bank_verification_message.clone(),
            error: self.error.clone(),
            error_detail: self.error_detail.clone(),
        })
    }
}

impl<A: BoardingApi> BoardingWizard<A> {
    pub fn bank_outcome(&self) -> Option<&BankVerificationOutcome> {
        self.bank_outcome.as_ref()
    }

    /// Save the current step6 fields and return the URL the merchant must
    /// visit to authorize the bank check.
    #[instrument(skip_all)]
    pub async fn begin_bank_verification(&mut self) -> Result<String, WizardError> {
        self.require(Step::Step6)?;
        let body = self.bank.validate()?;
        self.api.submit_bank(&self.token, &body).await?;
        let auth = self.api.bank_auth_url(&self.token).await?;
        info!("bank verification redirect issued");
        Ok(auth.auth_url)
    }

    /// Restore state from the return redirect's query string.
    pub fn apply_bank_return(&mut self, query: &str) -> Result<Step, WizardError> {
        let ret = BankReturn::parse(query);
        if ret.step.is_none() && ret.error.as_deref() == Some("invalid_link") {
            return Err(WizardError::Link("Invalid or expired link".into()));
        }
        if let Some(step) = ret.step.as_deref().and_then(Step::parse) {
            self.step = step;
        }
        if let Some(outcome) = ret.outcome() {
            if outcome.verified {
                info!("bank account verified");
            } else {
                warn!(error=?outcome.error, "bank verification failed");
            }
            self.bank_outcome = Some(outcome);
        }
        Ok(self.step)
    }
}
