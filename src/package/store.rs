use async_trait::async_trait;

use crate::api::model::{PackageInput, ProductPackage};
use crate::api::{AdminApi, PartnerApi};
use crate::error::ApiError;

/// Where a finished package is written.
#[async_trait]
pub trait PackageStore: Send + Sync {
    async fn create(&self, body: &PackageInput) -> Result<ProductPackage, ApiError>;

    async fn update(&self, package_id: &str, body: &PackageInput)
        -> Result<ProductPackage, ApiError>;
}

/// Packages of one partner, managed by a platform admin.
pub struct AdminPackages<'a, A> {
    pub api: &'a A,
    pub bearer: &'a str,
    pub partner_id: &'a str,
}

#[async_trait]
impl<'a, A: AdminApi> PackageStore for AdminPackages<'a, A> {
    async fn create(&self, body: &PackageInput) -> Result<ProductPackage, ApiError> {
        self.api
            .create_package(self.bearer, self.partner_id, body)
            .await
    }

    async fn update(
        &self,
        package_id: &str,
        body: &PackageInput,
    ) -> Result<ProductPackage, ApiError> {
        self.api
            .update_package(self.bearer, self.partner_id, package_id, body)
            .await
    }
}

/// The calling partner's own packages.
pub struct PartnerPackages<'a, P> {
    pub api: &'a P,
    pub bearer: &'a str,
}

#[async_trait]
impl<'a, P: PartnerApi> PackageStore for PartnerPackages<'a, P> {
    async fn create(&self, body: &PackageInput) -> Result<ProductPackage, ApiError> {
        self.api.create_package(self.bearer, body).await
    }

    async fn update(
        &self,
        package_id: &str,
        body: &PackageInput,
    ) -> Result<ProductPackage, ApiError> {
        self.api.update_package(self.bearer, package_id, body).await
    }
}
