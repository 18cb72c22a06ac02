//! Platform-admin and partner-admin surfaces.
//!
//! Both own a [`Session`]. Any `401` from the backend clears the session
//! (memory and store) and surfaces [`DashboardError::LoggedOut`], the
//! signal to send the user back to the login form. Cached lists are only
//! updated after the server confirms a change.
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::api::model::{
    AdminUser, AdminUserInput, CatalogProduct, Credentials, DeviceDetail, FeeRates, FeeSchedule,
    FeeScheduleInput, FeeScheduleSchema, InviteRequest, InviteResponse, Partner, PartnerCreate,
    PartnerRegister, PartnerUpdate, ProductPackage,
};
use crate::api::{AdminApi, PartnerApi};
use crate::error::ApiError;
use crate::package::{default_rates, AdminPackages, PackageError, PackageWizard, PartnerPackages};
use crate::session::Session;
use crate::validate::{is_valid_email, validate_password};

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("logged out, please log in again")]
    LoggedOut,
    #[error("{0}")]
    Invalid(String),
    #[error(transparent)]
    Api(ApiError),
    #[error(transparent)]
    Package(PackageError),
    #[error(transparent)]
    Session(#[from] anyhow::Error),
}

/// Route an API result through the session: `401` ends it.
async fn guard<T>(session: &mut Session, res: Result<T, ApiError>) -> Result<T, DashboardError> {
    match res {
        Ok(v) => Ok(v),
        Err(ApiError::Unauthorized) => {
            warn!(kind=%session.kind(), "session rejected by server");
            session.invalidate().await?;
            Err(DashboardError::LoggedOut)
        }
        Err(e) => Err(DashboardError::Api(e)),
    }
}

async fn guard_package<T>(
    session: &mut Session,
    res: Result<T, PackageError>,
) -> Result<T, DashboardError> {
    match res {
        Ok(v) => Ok(v),
        Err(PackageError::Api(e)) => guard(session, Err(e)).await,
        Err(e) => Err(DashboardError::Package(e)),
    }
}

fn bearer(session: &Session) -> Result<String, DashboardError> {
    session
        .token()
        .map(str::to_string)
        .ok_or(DashboardError::LoggedOut)
}

fn check_new_password(password: &str, confirm: &str) -> Result<(), DashboardError> {
    match validate_password(password, confirm) {
        Some(message) => Err(DashboardError::Invalid(message)),
        None => Ok(()),
    }
}

fn login_error(e: ApiError, message: &str) -> DashboardError {
    match e {
        ApiError::Unauthorized => DashboardError::Invalid(message.into()),
        other => DashboardError::Api(other),
    }
}

// ---------------------------------------------------------------------------
// Platform admin
// ---------------------------------------------------------------------------

pub struct AdminDashboard<A> {
    api: A,
    session: Session,
    admins: Vec<AdminUser>,
    partners: Vec<Partner>,
    fee_schedules: Vec<FeeSchedule>,
    packages: Vec<ProductPackage>,
}

impl<A: AdminApi> AdminDashboard<A> {
    pub fn new(api: A, session: Session) -> Self {
        Self {
            api,
            session,
            admins: Vec::new(),
            partners: Vec::new(),
            fee_schedules: Vec::new(),
            packages: Vec::new(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn is_logged_in(&self) -> bool {
        self.session.is_active()
    }

    pub fn admins(&self) -> &[AdminUser] {
        &self.admins
    }

    pub fn partners(&self) -> &[Partner] {
        &self.partners
    }

    pub fn fee_schedules(&self) -> &[FeeSchedule] {
        &self.fee_schedules
    }

    /// Packages of the partner last loaded with `load_packages`.
    pub fn packages(&self) -> &[ProductPackage] {
        &self.packages
    }

    #[instrument(skip_all)]
    pub async fn login(&mut self, username: &str, password: &str) -> Result<(), DashboardError> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(DashboardError::Invalid(
                "Enter your username and password.".into(),
            ));
        }
        let token = self
            .api
            .login(username.trim(), password)
            .await
            .map_err(|e| login_error(e, "Invalid username or password."))?;
        self.session.login(token.access_token).await?;
        info!(user = username.trim(), "admin logged in");
        Ok(())
    }

    pub async fn logout(&mut self) -> Result<(), DashboardError> {
        self.session.invalidate().await?;
        self.admins.clear();
        self.partners.clear();
        self.fee_schedules.clear();
        self.packages.clear();
        Ok(())
    }

    // -- admin users ------------------------------------------------------

    pub async fn load_admins(&mut self) -> Result<&[AdminUser], DashboardError> {
        let bearer = bearer(&self.session)?;
        let res = self.api.list_admins(&bearer).await;
        self.admins = guard(&mut self.session, res).await?;
        Ok(&self.admins)
    }

    pub async fn create_admin(
        &mut self,
        username: &str,
        password: &str,
        confirm: &str,
    ) -> Result<AdminUser, DashboardError> {
        if username.trim().is_empty() {
            return Err(DashboardError::Invalid("Enter a username.".into()));
        }
        check_new_password(password, confirm)?;
        let bearer = bearer(&self.session)?;
        let body = AdminUserInput {
            username: username.trim().to_string(),
            password: password.to_string(),
        };
        let res = self.api.create_admin(&bearer, &body).await;
        let user = guard(&mut self.session, res).await?;
        self.admins.push(user.clone());
        Ok(user)
    }

    pub async fn change_admin_password(
        &mut self,
        admin_id: &str,
        password: &str,
        confirm: &str,
    ) -> Result<(), DashboardError> {
        check_new_password(password, confirm)?;
        let bearer = bearer(&self.session)?;
        let res = self
            .api
            .change_admin_password(&bearer, admin_id, password)
            .await;
        guard(&mut self.session, res).await
    }

    // -- partners ---------------------------------------------------------

    pub async fn load_partners(&mut self) -> Result<&[Partner], DashboardError> {
        let bearer = bearer(&self.session)?;
        let res = self.api.list_partners(&bearer).await;
        self.partners = guard(&mut self.session, res).await?;
        Ok(&self.partners)
    }

    pub async fn get_partner(&mut self, partner_id: &str) -> Result<Partner, DashboardError> {
        let bearer = bearer(&self.session)?;
        let res = self.api.get_partner(&bearer, partner_id).await;
        guard(&mut self.session, res).await
    }

    pub async fn create_partner(&mut self, body: PartnerCreate) -> Result<Partner, DashboardError> {
        if body.name.trim().is_empty() {
            return Err(DashboardError::Invalid("Enter the partner name.".into()));
        }
        if !is_valid_email(&body.email) {
            return Err(DashboardError::Invalid(
                "Enter a valid email address.".into(),
            ));
        }
        if body.password.is_empty() {
            return Err(DashboardError::Invalid("Enter a password.".into()));
        }
        let bearer = bearer(&self.session)?;
        let res = self.api.create_partner(&bearer, &body).await;
        let partner = guard(&mut self.session, res).await?;
        self.partners.push(partner.clone());
        Ok(partner)
    }

    pub async fn update_partner(
        &mut self,
        partner_id: &str,
        body: &PartnerUpdate,
    ) -> Result<Partner, DashboardError> {
        if let Some(email) = &body.email {
            if !is_valid_email(email) {
                return Err(DashboardError::Invalid(
                    "Enter a valid email address.".into(),
                ));
            }
        }
        let bearer = bearer(&self.session)?;
        let res = self.api.update_partner(&bearer, partner_id, body).await;
        let partner = guard(&mut self.session, res).await?;
        if let Some(slot) = self.partners.iter_mut().find(|p| p.id == partner.id) {
            *slot = partner.clone();
        }
        Ok(partner)
    }

    pub async fn delete_partner(&mut self, partner_id: &str) -> Result<(), DashboardError> {
        let bearer = bearer(&self.session)?;
        let res = self.api.delete_partner(&bearer, partner_id).await;
        guard(&mut self.session, res).await?;
        self.partners.retain(|p| p.id != partner_id);
        Ok(())
    }

    // -- fee schedules ----------------------------------------------------

    pub async fn fee_schedule_schema(&mut self) -> Result<FeeScheduleSchema, DashboardError> {
        let bearer = bearer(&self.session)?;
        let res = self.api.fee_schedule_schema(&bearer).await;
        guard(&mut self.session, res).await
    }

    pub async fn load_fee_schedules(&mut self) -> Result<&[FeeSchedule], DashboardError> {
        let bearer = bearer(&self.session)?;
        let res = self.api.list_fee_schedules(&bearer).await;
        self.fee_schedules = guard(&mut self.session, res).await?;
        Ok(&self.fee_schedules)
    }

    /// New schedules start from the built-in default rates unless `rates`
    /// is given.
    pub async fn create_fee_schedule(
        &mut self,
        name: &str,
        rates: Option<FeeRates>,
    ) -> Result<FeeSchedule, DashboardError> {
        if name.trim().is_empty() {
            return Err(DashboardError::Invalid(
                "Enter a name for the fee schedule.".into(),
            ));
        }
        let bearer = bearer(&self.session)?;
        let body = FeeScheduleInput {
            name: Some(name.trim().to_string()),
            rates: Some(rates.unwrap_or_else(default_rates)),
        };
        let res = self.api.create_fee_schedule(&bearer, &body).await;
        let schedule = guard(&mut self.session, res).await?;
        self.fee_schedules.push(schedule.clone());
        Ok(schedule)
    }

    pub async fn update_fee_schedule(
        &mut self,
        id: &str,
        body: &FeeScheduleInput,
    ) -> Result<FeeSchedule, DashboardError> {
        let bearer = bearer(&self.session)?;
        let res = self.api.update_fee_schedule(&bearer, id, body).await;
        let schedule = guard(&mut self.session, res).await?;
        if let Some(slot) = self.fee_schedules.iter_mut().find(|s| s.id == schedule.id) {
            *slot = schedule.clone();
        }
        Ok(schedule)
    }

    pub async fn delete_fee_schedule(&mut self, id: &str) -> Result<(), DashboardError> {
        let bearer = bearer(&self.session)?;
        let res = self.api.delete_fee_schedule(&bearer, id).await;
        guard(&mut self.session, res).await?;
        self.fee_schedules.retain(|s| s.id != id);
        Ok(())
    }

    // -- catalog and packages ---------------------------------------------

    pub async fn product_catalog(&mut self) -> Result<Vec<CatalogProduct>, DashboardError> {
        let bearer = bearer(&self.session)?;
        let res = self.api.product_catalog(&bearer).await;
        guard(&mut self.session, res).await
    }

    pub async fn load_packages(
        &mut self,
        partner_id: &str,
    ) -> Result<&[ProductPackage], DashboardError> {
        let bearer = bearer(&self.session)?;
        let res = self.api.list_packages(&bearer, partner_id).await;
        self.packages = guard(&mut self.session, res).await?;
        Ok(&self.packages)
    }

    pub async fn delete_package(
        &mut self,
        partner_id: &str,
        package_id: &str,
    ) -> Result<(), DashboardError> {
        let bearer = bearer(&self.session)?;
        let res = self.api.delete_package(&bearer, partner_id, package_id).await;
        guard(&mut self.session, res).await?;
        self.packages.retain(|p| p.id != package_id);
        Ok(())
    }

    /// Package wizard for `partner_id`, priced against the partner's
    /// assigned fee schedule.
    pub async fn open_package_wizard(
        &mut self,
        partner_id: &str,
        existing: Option<&ProductPackage>,
    ) -> Result<PackageWizard, DashboardError> {
        let catalog = self.product_catalog().await?;
        let partner = self.get_partner(partner_id).await?;
        let rates = match partner.fee_schedule_id.as_deref() {
            Some(schedule_id) => {
                let bearer = bearer(&self.session)?;
                let res = self.api.get_fee_schedule(&bearer, schedule_id).await;
                guard(&mut self.session, res).await?.rates
            }
            None => FeeRates::new(),
        };
        Ok(match existing {
            Some(package) => PackageWizard::edit(catalog, rates, package),
            None => PackageWizard::new(catalog, rates),
        })
    }

    pub async fn save_package(
        &mut self,
        partner_id: &str,
        wizard: &PackageWizard,
    ) -> Result<String, DashboardError> {
        let bearer = bearer(&self.session)?;
        let store = AdminPackages {
            api: &self.api,
            bearer: &bearer,
            partner_id,
        };
        let res = wizard.save(&store).await;
        guard_package(&mut self.session, res).await
    }
}

// ---------------------------------------------------------------------------
// Partner admin
// ---------------------------------------------------------------------------

/// Store details collected per device that needs them at invite time.
#[derive(Debug, Clone, Default)]
pub struct InviteDraft {
    pub email: Option<String>,
    pub merchant_name: Option<String>,
    pub package_uid: Option<String>,
    pub device_details: Vec<DeviceDetail>,
}

pub struct PartnerDashboard<P> {
    api: P,
    session: Session,
    me: Option<Partner>,
    packages: Vec<ProductPackage>,
}

impl<P: PartnerApi> PartnerDashboard<P> {
    pub fn new(api: P, session: Session) -> Self {
        Self {
            api,
            session,
            me: None,
            packages: Vec::new(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn is_logged_in(&self) -> bool {
        self.session.is_active()
    }

    pub fn packages(&self) -> &[ProductPackage] {
        &self.packages
    }

    pub async fn register(
        &mut self,
        name: &str,
        email: &str,
        password: &str,
        confirm: &str,
    ) -> Result<Partner, DashboardError> {
        if name.trim().is_empty() {
            return Err(DashboardError::Invalid("Enter your company name.".into()));
        }
        if !is_valid_email(email) {
            return Err(DashboardError::Invalid(
                "Enter a valid email address.".into(),
            ));
        }
        check_new_password(password, confirm)?;
        let body = PartnerRegister {
            name: name.trim().to_string(),
            email: email.trim().to_string(),
            password: password.to_string(),
        };
        self.api.register(&body).await.map_err(DashboardError::Api)
    }

    #[instrument(skip_all)]
    pub async fn login(&mut self, email: &str, password: &str) -> Result<(), DashboardError> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(DashboardError::Invalid(
                "Enter your email and password.".into(),
            ));
        }
        let body = Credentials {
            email: email.trim().to_string(),
            password: password.to_string(),
        };
        let token = self
            .api
            .login(&body)
            .await
            .map_err(|e| login_error(e, "Invalid email or password."))?;
        self.session.login(token.access_token).await?;
        info!("partner logged in");
        Ok(())
    }

    pub async fn logout(&mut self) -> Result<(), DashboardError> {
        self.session.invalidate().await?;
        self.me = None;
        self.packages.clear();
        Ok(())
    }

    pub async fn me(&mut self) -> Result<Partner, DashboardError> {
        let bearer = bearer(&self.session)?;
        let res = self.api.me(&bearer).await;
        let partner = guard(&mut self.session, res).await?;
        self.me = Some(partner.clone());
        Ok(partner)
    }

    pub async fn product_catalog(&mut self) -> Result<Vec<CatalogProduct>, DashboardError> {
        let bearer = bearer(&self.session)?;
        let res = self.api.product_catalog(&bearer).await;
        guard(&mut self.session, res).await
    }

    pub async fn fee_schedule(&mut self) -> Result<Option<FeeSchedule>, DashboardError> {
        let bearer = bearer(&self.session)?;
        let res = self.api.fee_schedule(&bearer).await;
        guard(&mut self.session, res).await
    }

    pub async fn load_packages(&mut self) -> Result<&[ProductPackage], DashboardError> {
        let bearer = bearer(&self.session)?;
        let res = self.api.list_packages(&bearer).await;
        self.packages = guard(&mut self.session, res).await?;
        Ok(&self.packages)
    }

    pub async fn delete_package(&mut self, package_id: &str) -> Result<(), DashboardError> {
        let bearer = bearer(&self.session)?;
        let res = self.api.delete_package(&bearer, package_id).await;
        guard(&mut self.session, res).await?;
        self.packages.retain(|p| p.id != package_id);
        Ok(())
    }

    pub async fn open_package_wizard(
        &mut self,
        existing: Option<&ProductPackage>,
    ) -> Result<PackageWizard, DashboardError> {
        let catalog = self.product_catalog().await?;
        let rates = self
            .fee_schedule()
            .await?
            .map(|s| s.rates)
            .unwrap_or_default();
        Ok(match existing {
            Some(package) => PackageWizard::edit(catalog, rates, package),
            None => PackageWizard::new(catalog, rates),
        })
    }

    pub async fn save_package(&mut self, wizard: &PackageWizard) -> Result<String, DashboardError> {
        let bearer = bearer(&self.session)?;
        let store = PartnerPackages {
            api: &self.api,
            bearer: &bearer,
        };
        let res = wizard.save(&store).await;
        guard_package(&mut self.session, res).await
    }

    /// Generate a boarding invite. A chosen package must have store details
    /// for every item that requires them.
    #[instrument(skip_all)]
    pub async fn generate_invite(
        &mut self,
        draft: InviteDraft,
    ) -> Result<InviteResponse, DashboardError> {
        let email = draft
            .email
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty());
        if let Some(email) = &email {
            if !is_valid_email(email) {
                return Err(DashboardError::Invalid(
                    "Enter a valid merchant email address.".into(),
                ));
            }
        }
        let package_uid = draft
            .package_uid
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty());

        let mut device_details = Vec::new();
        if let Some(uid) = &package_uid {
            if !self.packages.iter().any(|p| &p.uid == uid) {
                self.load_packages().await?;
            }
            let package = self
                .packages
                .iter()
                .find(|p| &p.uid == uid)
                .ok_or_else(|| DashboardError::Invalid(format!("Unknown package {}.", uid)))?;
            for item in package.items.iter().filter(|i| i.requires_store_epos) {
                let label = item
                    .product_name
                    .clone()
                    .or_else(|| item.product_code.clone())
                    .unwrap_or_else(|| item.catalog_product_id.clone());
                let detail = draft
                    .device_details
                    .iter()
                    .find(|d| d.package_item_id == item.id)
                    .filter(|d| {
                        [&d.store_name, &d.store_address, &d.epos_terminal]
                            .iter()
                            .all(|v| v.as_deref().is_some_and(|s| !s.trim().is_empty()))
                    })
                    .ok_or_else(|| {
                        DashboardError::Invalid(format!(
                            "Enter the store name, store address and EPOS terminal for {}.",
                            label
                        ))
                    })?;
                device_details.push(detail.clone());
            }
        }

        let body = InviteRequest {
            email,
            merchant_name: draft
                .merchant_name
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty()),
            product_package_uid: package_uid,
            device_details: (!device_details.is_empty()).then_some(device_details),
        };
        let bearer = bearer(&self.session)?;
        let res = self.api.create_invite(&bearer, &body).await;
        let invite = guard(&mut self.session, res).await?;
        info!(boarding_event_id=%invite.boarding_event_id, "invite generated");
        Ok(invite)
    }
}
