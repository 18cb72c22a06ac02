use async_trait::async_trait;
use tracing::instrument;

use super::model::*;
use super::{ApiClient, RequestOptions};
use crate::error::ApiError;

/// Partner (ISV) namespace: `/auth/partner/*` and `/partners/*`.
#[async_trait]
pub trait PartnerApi: Send + Sync {
    async fn register(&self, body: &PartnerRegister) -> Result<Partner, ApiError>;

    async fn login(&self, body: &Credentials) -> Result<TokenResponse, ApiError>;

    async fn me(&self, bearer: &str) -> Result<Partner, ApiError>;

    async fn product_catalog(&self, bearer: &str) -> Result<Vec<CatalogProduct>, ApiError>;

    /// Fee schedule assigned to the calling partner, if any.
    async fn fee_schedule(&self, bearer: &str) -> Result<Option<FeeSchedule>, ApiError>;

    async fn list_packages(&self, bearer: &str) -> Result<Vec<ProductPackage>, ApiError>;

    async fn create_package(
        &self,
        bearer: &str,
        body: &PackageInput,
    ) -> Result<ProductPackage, ApiError>;

    async fn update_package(
        &self,
        bearer: &str,
        package_id: &str,
        body: &PackageInput,
    ) -> Result<ProductPackage, ApiError>;

    async fn delete_package(&self, bearer: &str, package_id: &str) -> Result<(), ApiError>;

    async fn create_invite(
        &self,
        bearer: &str,
        body: &InviteRequest,
    ) -> Result<InviteResponse, ApiError>;
}

#[async_trait]
impl PartnerApi for ApiClient {
    async fn register(&self, body: &PartnerRegister) -> Result<Partner, ApiError> {
        self.post(
            "/auth/partner/register",
            &[],
            Some(body),
            &RequestOptions::default(),
        )
        .await
    }

    #[instrument(skip_all)]
    async fn login(&self, body: &Credentials) -> Result<TokenResponse, ApiError> {
        self.post(
            "/auth/partner/login",
            &[],
            Some(body),
            &RequestOptions::default(),
        )
        .await
    }

    async fn me(&self, bearer: &str) -> Result<Partner, ApiError> {
        self.get("/auth/partner/me", &[], &RequestOptions::bearer(bearer))
            .await
    }

    async fn product_catalog(&self, bearer: &str) -> Result<Vec<CatalogProduct>, ApiError> {
        self.get(
            "/partners/product-catalog",
            &[],
            &RequestOptions::bearer(bearer),
        )
        .await
    }

    async fn fee_schedule(&self, bearer: &str) -> Result<Option<FeeSchedule>, ApiError> {
        self.get("/partners/fee-schedule", &[], &RequestOptions::bearer(bearer))
            .await
    }

    async fn list_packages(&self, bearer: &str) -> Result<Vec<ProductPackage>, ApiError> {
        self.get(
            "/partners/product-packages",
            &[],
            &RequestOptions::bearer(bearer),
        )
        .await
    }

    async fn create_package(
        &self,
        bearer: &str,
        body: &PackageInput,
    ) -> Result<ProductPackage, ApiError> {
        self.post(
            "/partners/product-packages",
            &[],
            Some(body),
            &RequestOptions::bearer(bearer),
        )
        .await
    }

    async fn update_package(
        &self,
        bearer: &str,
        package_id: &str,
        body: &PackageInput,
    ) -> Result<ProductPackage, ApiError> {
        self.patch(
            &format!("/partners/product-packages/{}", package_id),
            body,
            &RequestOptions::bearer(bearer),
        )
        .await
    }

    async fn delete_package(&self, bearer: &str, package_id: &str) -> Result<(), ApiError> {
        self.delete(
            &format!("/partners/product-packages/{}", package_id),
            &RequestOptions::bearer(bearer),
        )
        .await
    }

    #[instrument(skip_all)]
    async fn create_invite(
        &self,
        bearer: &str,
        body: &InviteRequest,
    ) -> Result<InviteResponse, ApiError> {
        self.post(
            "/partners/boarding/invite",
            &[],
            Some(body),
            &RequestOptions::bearer(bearer),
        )
        .await
    }
}
