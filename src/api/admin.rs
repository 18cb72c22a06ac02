use async_trait::async_trait;
use serde_json::json;
use tracing::instrument;

use super::model::*;
use super::{ApiClient, RequestOptions};
use crate::error::ApiError;

/// Platform-admin namespace (`/admin/*`). Every call except `login` needs a bearer token.
#[async_trait]
pub trait AdminApi: Send + Sync {
    async fn login(&self, username: &str, password: &str) -> Result<TokenResponse, ApiError>;

    async fn list_admins(&self, bearer: &str) -> Result<Vec<AdminUser>, ApiError>;

    async fn create_admin(&self, bearer: &str, body: &AdminUserInput)
        -> Result<AdminUser, ApiError>;

    async fn change_admin_password(
        &self,
        bearer: &str,
        admin_id: &str,
        new_password: &str,
    ) -> Result<(), ApiError>;

    async fn list_partners(&self, bearer: &str) -> Result<Vec<Partner>, ApiError>;

    async fn get_partner(&self, bearer: &str, partner_id: &str) -> Result<Partner, ApiError>;

    async fn create_partner(&self, bearer: &str, body: &PartnerCreate)
        -> Result<Partner, ApiError>;

    async fn update_partner(
        &self,
        bearer: &str,
        partner_id: &str,
        body: &PartnerUpdate,
    ) -> Result<Partner, ApiError>;

    async fn delete_partner(&self, bearer: &str, partner_id: &str) -> Result<(), ApiError>;

    async fn fee_schedule_schema(&self, bearer: &str) -> Result<FeeScheduleSchema, ApiError>;

    async fn list_fee_schedules(&self, bearer: &str) -> Result<Vec<FeeSchedule>, ApiError>;

    async fn get_fee_schedule(&self, bearer: &str, id: &str) -> Result<FeeSchedule, ApiError>;

    async fn create_fee_schedule(
        &self,
        bearer: &str,
        body: &FeeScheduleInput,
    ) -> Result<FeeSchedule, ApiError>;

    async fn update_fee_schedule(
        &self,
        bearer: &str,
        id: &str,
        body: &FeeScheduleInput,
    ) -> Result<FeeSchedule, ApiError>;

    async fn delete_fee_schedule(&self, bearer: &str, id: &str) -> Result<(), ApiError>;

    async fn product_catalog(&self, bearer: &str) -> Result<Vec<CatalogProduct>, ApiError>;

    async fn list_packages(
        &self,
        bearer: &str,
        partner_id: &str,
    ) -> Result<Vec<ProductPackage>, ApiError>;

    async fn create_package(
        &self,
        bearer: &str,
        partner_id: &str,
        body: &PackageInput,
    ) -> Result<ProductPackage, ApiError>;

    async fn update_package(
        &self,
        bearer: &str,
        partner_id: &str,
        package_id: &str,
        body: &PackageInput,
    ) -> Result<ProductPackage, ApiError>;

    async fn delete_package(
        &self,
        bearer: &str,
        partner_id: &str,
        package_id: &str,
    ) -> Result<(), ApiError>;
}

#[async_trait]
impl AdminApi for ApiClient {
    #[instrument(skip_all)]
    async fn login(&self, username: &str, password: &str) -> Result<TokenResponse, ApiError> {
        let body = AdminUserInput {
            username: username.to_string(),
            password: password.to_string(),
        };
        self.post("/admin/login", &[], Some(&body), &RequestOptions::default())
            .await
    }

    async fn list_admins(&self, bearer: &str) -> Result<Vec<AdminUser>, ApiError> {
        self.get("/admin/users", &[], &RequestOptions::bearer(bearer))
            .await
    }

    async fn create_admin(
        &self,
        bearer: &str,
        body: &AdminUserInput,
    ) -> Result<AdminUser, ApiError> {
        self.post("/admin/users", &[], Some(body), &RequestOptions::bearer(bearer))
            .await
    }

    async fn change_admin_password(
        &self,
        bearer: &str,
        admin_id: &str,
        new_password: &str,
    ) -> Result<(), ApiError> {
        let _: serde_json::Value = self
            .patch(
                &format!("/admin/users/{}/password", admin_id),
                &json!({ "new_password": new_password }),
                &RequestOptions::bearer(bearer),
            )
            .await?;
        Ok(())
    }

    async fn list_partners(&self, bearer: &str) -> Result<Vec<Partner>, ApiError> {
        self.get("/admin/partners", &[], &RequestOptions::bearer(bearer))
            .await
    }

    async fn get_partner(&self, bearer: &str, partner_id: &str) -> Result<Partner, ApiError> {
        self.get(
            &format!("/admin/partners/{}", partner_id),
            &[],
            &RequestOptions::bearer(bearer),
        )
        .await
    }

    async fn create_partner(
        &self,
        bearer: &str,
        body: &PartnerCreate,
    ) -> Result<Partner, ApiError> {
        self.post(
            "/admin/partners",
            &[],
            Some(body),
            &RequestOptions::bearer(bearer),
        )
        .await
    }

    async fn update_partner(
        &self,
        bearer: &str,
        partner_id: &str,
        body: &PartnerUpdate,
    ) -> Result<Partner, ApiError> {
        self.patch(
            &format!("/admin/partners/{}", partner_id),
            body,
            &RequestOptions::bearer(bearer),
        )
        .await
    }

    async fn delete_partner(&self, bearer: &str, partner_id: &str) -> Result<(), ApiError> {
        self.delete(
            &format!("/admin/partners/{}", partner_id),
            &RequestOptions::bearer(bearer),
        )
        .await
    }

    async fn fee_schedule_schema(&self, bearer: &str) -> Result<FeeScheduleSchema, ApiError> {
        let resp: FeeScheduleSchemaResponse = self
            .get(
                "/admin/fee-schedule-schema",
                &[],
                &RequestOptions::bearer(bearer),
            )
            .await?;
        Ok(resp.products)
    }

    async fn list_fee_schedules(&self, bearer: &str) -> Result<Vec<FeeSchedule>, ApiError> {
        self.get("/admin/fee-schedules", &[], &RequestOptions::bearer(bearer))
            .await
    }

    async fn get_fee_schedule(&self, bearer: &str, id: &str) -> Result<FeeSchedule, ApiError> {
        self.get(
            &format!("/admin/fee-schedules/{}", id),
            &[],
            &RequestOptions::bearer(bearer),
        )
        .await
    }

    async fn create_fee_schedule(
        &self,
        bearer: &str,
        body: &FeeScheduleInput,
    ) -> Result<FeeSchedule, ApiError> {
        self.post(
            "/admin/fee-schedules",
            &[],
            Some(body),
            &RequestOptions::bearer(bearer),
        )
        .await
    }

    async fn update_fee_schedule(
        &self,
        bearer: &str,
        id: &str,
        body: &FeeScheduleInput,
    ) -> Result<FeeSchedule, ApiError> {
        self.patch(
            &format!("/admin/fee-schedules/{}", id),
            body,
            &RequestOptions::bearer(bearer),
        )
        .await
    }

    async fn delete_fee_schedule(&self, bearer: &str, id: &str) -> Result<(), ApiError> {
        self.delete(
            &format!("/admin/fee-schedules/{}", id),
            &RequestOptions::bearer(bearer),
        )
        .await
    }

    async fn product_catalog(&self, bearer: &str) -> Result<Vec<CatalogProduct>, ApiError> {
        self.get("/admin/product-catalog", &[], &RequestOptions::bearer(bearer))
            .await
    }

    async fn list_packages(
        &self,
        bearer: &str,
        partner_id: &str,
    ) -> Result<Vec<ProductPackage>, ApiError> {
        self.get(
            &format!("/admin/partners/{}/product-packages", partner_id),
            &[],
            &RequestOptions::bearer(bearer),
        )
        .await
    }

    async fn create_package(
        &self,
        bearer: &str,
        partner_id: &str,
        body: &PackageInput,
    ) -> Result<ProductPackage, ApiError> {
        self.post(
            &format!("/admin/partners/{}/product-packages", partner_id),
            &[],
            Some(body),
            &RequestOptions::bearer(bearer),
        )
        .await
    }

    async fn update_package(
        &self,
        bearer: &str,
        partner_id: &str,
        package_id: &str,
        body: &PackageInput,
    ) -> Result<ProductPackage, ApiError> {
        self.patch(
            &format!(
                "/admin/partners/{}/product-packages/{}",
                partner_id, package_id
            ),
            body,
            &RequestOptions::bearer(bearer),
        )
        .await
    }

    async fn delete_package(
        &self,
        bearer: &str,
        partner_id: &str,
        package_id: &str,
    ) -> Result<(), ApiError> {
        self.delete(
            &format!(
                "/admin/partners/{}/product-packages/{}",
                partner_id, package_id
            ),
            &RequestOptions::bearer(bearer),
        )
        .await
    }
}
