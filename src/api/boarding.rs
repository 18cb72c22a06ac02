use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::instrument;

use super::model::*;
use super::{ApiClient, RequestOptions};
use crate::error::ApiError;

/// Merchant-facing boarding endpoints, keyed by invite token.
#[async_trait]
pub trait BoardingApi: Send + Sync {
    async fn invite_info(&self, token: &str) -> Result<InviteInfo, ApiError>;

    async fn saved_data(&self, token: &str) -> Result<SavedData, ApiError>;

    async fn verify_status(&self, token: &str) -> Result<VerifyStatus, ApiError>;

    async fn submit_account(&self, token: &str, body: &Step1Submit)
        -> Result<Step1Response, ApiError>;

    async fn verify_email_code(
        &self,
        token: &str,
        body: &VerifyEmailCode,
    ) -> Result<VerifyEmailResponse, ApiError>;

    async fn submit_personal(&self, token: &str, body: &Step2Submit) -> Result<Saved, ApiError>;

    async fn submit_business(&self, token: &str, body: &Step4Submit) -> Result<Saved, ApiError>;

    async fn submit_trading(&self, token: &str, body: &Step5Submit) -> Result<Saved, ApiError>;

    async fn submit_bank(&self, token: &str, body: &Step6Submit) -> Result<Saved, ApiError>;

    async fn save_for_later(
        &self,
        token: &str,
        body: &SaveForLater,
    ) -> Result<SaveForLaterResponse, ApiError>;

    async fn identity_token(&self, token: &str) -> Result<IdentityToken, ApiError>;

    async fn identity_complete(
        &self,
        token: &str,
        status: &str,
    ) -> Result<IdentityCompleteResponse, ApiError>;

    async fn address_lookup(&self, postcode: &str) -> Result<Vec<LookupAddress>, ApiError>;

    async fn bank_auth_url(&self, token: &str) -> Result<AuthUrl, ApiError>;

    async fn submit_review(&self, token: &str) -> Result<SubmitReviewResponse, ApiError>;

    async fn agreement_pdf(&self, token: &str) -> Result<Vec<u8>, ApiError>;

    async fn services_agreement(&self, token: &str) -> Result<Vec<u8>, ApiError>;

    async fn login(&self, body: &Credentials) -> Result<BoardingLoginResponse, ApiError>;
}

impl ApiClient {
    async fn save_step<B: Serialize + Sync>(
        &self,
        step: u8,
        token: &str,
        body: &B,
        timeout: Duration,
    ) -> Result<Saved, ApiError> {
        self.post(
            &format!("/boarding/step/{}", step),
            &[("token", token)],
            Some(body),
            &RequestOptions::timeout(timeout),
        )
        .await
    }
}

#[async_trait]
impl BoardingApi for ApiClient {
    #[instrument(skip_all)]
    async fn invite_info(&self, token: &str) -> Result<InviteInfo, ApiError> {
        self.get(
            "/boarding/invite-info",
            &[("token", token)],
            &RequestOptions::default(),
        )
        .await
    }

    #[instrument(skip_all)]
    async fn saved_data(&self, token: &str) -> Result<SavedData, ApiError> {
        self.get(
            "/boarding/saved-data",
            &[("token", token)],
            &RequestOptions::default(),
        )
        .await
    }

    async fn verify_status(&self, token: &str) -> Result<VerifyStatus, ApiError> {
        self.get(
            "/boarding/verify-status",
            &[("token", token)],
            &RequestOptions::default(),
        )
        .await
    }

    #[instrument(skip_all)]
    async fn submit_account(
        &self,
        token: &str,
        body: &Step1Submit,
    ) -> Result<Step1Response, ApiError> {
        self.post(
            "/boarding/step/1",
            &[("token", token)],
            Some(body),
            &RequestOptions::timeout(self.save_timeout()),
        )
        .await
    }

    async fn verify_email_code(
        &self,
        token: &str,
        body: &VerifyEmailCode,
    ) -> Result<VerifyEmailResponse, ApiError> {
        self.post(
            "/boarding/verify-email-code",
            &[("invite_token", token)],
            Some(body),
            &RequestOptions::default(),
        )
        .await
    }

    async fn submit_personal(&self, token: &str, body: &Step2Submit) -> Result<Saved, ApiError> {
        self.save_step(2, token, body, self.save_timeout()).await
    }

    async fn submit_business(&self, token: &str, body: &Step4Submit) -> Result<Saved, ApiError> {
        self.save_step(4, token, body, self.save_timeout()).await
    }

    async fn submit_trading(&self, token: &str, body: &Step5Submit) -> Result<Saved, ApiError> {
        self.save_step(5, token, body, self.save_timeout()).await
    }

    async fn submit_bank(&self, token: &str, body: &Step6Submit) -> Result<Saved, ApiError> {
        self.save_step(6, token, body, self.save_timeout()).await
    }

    async fn save_for_later(
        &self,
        token: &str,
        body: &SaveForLater,
    ) -> Result<SaveForLaterResponse, ApiError> {
        self.post(
            "/boarding/save-for-later",
            &[("token", token)],
            Some(body),
            &RequestOptions::timeout(self.save_timeout()),
        )
        .await
    }

    async fn identity_token(&self, token: &str) -> Result<IdentityToken, ApiError> {
        self.post::<(), _>(
            "/boarding/sumsub/generate-token",
            &[("token", token)],
            None,
            &RequestOptions::default(),
        )
        .await
    }

    async fn identity_complete(
        &self,
        token: &str,
        status: &str,
    ) -> Result<IdentityCompleteResponse, ApiError> {
        self.post::<(), _>(
            "/boarding/sumsub/complete",
            &[("token", token), ("status", status)],
            None,
            &RequestOptions::default(),
        )
        .await
    }

    async fn address_lookup(&self, postcode: &str) -> Result<Vec<LookupAddress>, ApiError> {
        self.get(
            "/boarding/address-lookup",
            &[("postcode", postcode)],
            &RequestOptions::default(),
        )
        .await
    }

    async fn bank_auth_url(&self, token: &str) -> Result<AuthUrl, ApiError> {
        self.get(
            "/boarding/truelayer-auth-url",
            &[("token", token)],
            &RequestOptions::timeout(self.auth_url_timeout()),
        )
        .await
    }

    #[instrument(skip_all)]
    async fn submit_review(&self, token: &str) -> Result<SubmitReviewResponse, ApiError> {
        self.post::<(), _>(
            "/boarding/submit-review",
            &[("token", token)],
            None,
            &RequestOptions::default(),
        )
        .await
    }

    async fn agreement_pdf(&self, token: &str) -> Result<Vec<u8>, ApiError> {
        self.get_bytes(
            "/boarding/agreement-pdf",
            &[("token", token)],
            &RequestOptions::default(),
        )
        .await
    }

    async fn services_agreement(&self, token: &str) -> Result<Vec<u8>, ApiError> {
        self.get_bytes(
            "/boarding/services-agreement",
            &[("token", token)],
            &RequestOptions::default(),
        )
        .await
    }

    async fn login(&self, body: &Credentials) -> Result<BoardingLoginResponse, ApiError> {
        self.post("/boarding/login", &[], Some(body), &RequestOptions::default())
            .await
    }
}
