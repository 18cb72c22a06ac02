use path_boarding::api::model::*;
use path_boarding::api::{AdminApi, PartnerApi};
use path_boarding::dashboard::{AdminDashboard, DashboardError, InviteDraft, PartnerDashboard};
use path_boarding::error::ApiError;
use path_boarding::package::{PackageError, PackageStep};
use path_boarding::session::{Session, SessionKind, SessionStore};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;

async fn open_store() -> SessionStore {
    SessionStore::open("sqlite::memory:").await.unwrap()
}

async fn logged_in(kind: SessionKind, store: &SessionStore) -> Session {
    let mut session = Session::restore(kind, store.clone()).await.unwrap();
    session.login(format!("{}-token", kind)).await.unwrap();
    session
}

fn product(id: &str, code: &str, name: &str, kind: ProductType) -> CatalogProduct {
    CatalogProduct {
        id: id.into(),
        product_type: kind,
        product_code: code.into(),
        name: name.into(),
        config_schema: None,
        requires_store_epos: false,
    }
}

fn catalog() -> Vec<CatalogProduct> {
    vec![
        product("p-pos", "a920", "PAX A920", ProductType::PhysicalPos),
        product("p-link", "payby_link", "Pay by Link", ProductType::Ecomm),
        product("p-debit", "visa_debit", "Visa Debit", ProductType::Acquiring),
        product("p-credit", "visa_credit", "Visa Credit", ProductType::Acquiring),
        product("p-chargeback", "chargeback", "Chargeback fee", ProductType::OtherFee),
    ]
}

fn partner(id: &str, schedule: Option<&str>) -> Partner {
    Partner {
        id: id.into(),
        name: format!("Partner {}", id),
        email: format!("{}@partners.example", id),
        external_id: None,
        logo_url: None,
        fee_schedule_id: schedule.map(str::to_string),
        is_active: true,
        created_at: None,
    }
}

fn schedule() -> FeeSchedule {
    let mut rates = BTreeMap::new();
    rates.insert(
        "visa_debit".to_string(),
        RateRecord {
            min_pct: Some(1.5),
            ..Default::default()
        },
    );
    rates.insert(
        "visa_credit".to_string(),
        RateRecord {
            min_pct: Some(1.2),
            ..Default::default()
        },
    );
    rates.insert(
        "chargeback".to_string(),
        RateRecord {
            min_amount: Some(15.0),
            ..Default::default()
        },
    );
    FeeSchedule {
        id: "fs-1".into(),
        name: "Standard".into(),
        rates,
    }
}

fn package(uid: &str, items: Vec<PackageItem>) -> ProductPackage {
    ProductPackage {
        id: format!("pkg-{}", uid),
        partner_id: Some("partner-1".into()),
        uid: uid.into(),
        name: "Counter bundle".into(),
        description: None,
        items,
        created_at: None,
    }
}

// ---------------------------------------------------------------------------
// Platform admin
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
struct RecordingAdmin {
    failures: Arc<Mutex<VecDeque<ApiError>>>,
    calls: Arc<Mutex<Vec<String>>>,
    bearers: Arc<Mutex<Vec<String>>>,
    created_packages: Arc<Mutex<Vec<(String, PackageInput)>>>,
}

impl RecordingAdmin {
    async fn fail_next(&self, err: ApiError) {
        self.failures.lock().await.push_back(err);
    }

    async fn record(&self, call: &str, bearer: &str) -> Result<(), ApiError> {
        self.calls.lock().await.push(call.to_string());
        self.bearers.lock().await.push(bearer.to_string());
        match self.failures.lock().await.pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn calls(&self) -> Vec<String> {
        self.calls.lock().await.clone()
    }
}

#[async_trait::async_trait]
impl AdminApi for RecordingAdmin {
    async fn login(&self, username: &str, password: &str) -> Result<TokenResponse, ApiError> {
        self.record("login", "").await?;
        if username != "root" || password != "s3cret-pass" {
            return Err(ApiError::Unauthorized);
        }
        Ok(TokenResponse {
            access_token: "admin-jwt".into(),
            token_type: Some("bearer".into()),
        })
    }

    async fn list_admins(&self, bearer: &str) -> Result<Vec<AdminUser>, ApiError> {
        self.record("list_admins", bearer).await?;
        Ok(Vec::new())
    }

    async fn create_admin(
        &self,
        bearer: &str,
        body: &AdminUserInput,
    ) -> Result<AdminUser, ApiError> {
        self.record("create_admin", bearer).await?;
        Ok(AdminUser {
            id: "admin-2".into(),
            username: body.username.clone(),
            created_at: chrono::Utc::now(),
        })
    }

    async fn change_admin_password(
        &self,
        bearer: &str,
        _admin_id: &str,
        _new_password: &str,
    ) -> Result<(), ApiError> {
        self.record("change_admin_password", bearer).await
    }

    async fn list_partners(&self, bearer: &str) -> Result<Vec<Partner>, ApiError> {
        self.record("list_partners", bearer).await?;
        Ok(vec![
            partner("partner-1", Some("fs-1")),
            partner("partner-2", None),
        ])
    }

    async fn get_partner(&self, bearer: &str, partner_id: &str) -> Result<Partner, ApiError> {
        self.record("get_partner", bearer).await?;
        Ok(partner(partner_id, Some("fs-1")))
    }

    async fn create_partner(&self, bearer: &str, body: &PartnerCreate) -> Result<Partner, ApiError> {
        self.record("create_partner", bearer).await?;
        Ok(Partner {
            name: body.name.clone(),
            ..partner("partner-3", body.fee_schedule_id.as_deref())
        })
    }

    async fn update_partner(
        &self,
        bearer: &str,
        partner_id: &str,
        _body: &PartnerUpdate,
    ) -> Result<Partner, ApiError> {
        self.record("update_partner", bearer).await?;
        Ok(partner(partner_id, None))
    }

    async fn delete_partner(&self, bearer: &str, _partner_id: &str) -> Result<(), ApiError> {
        self.record("delete_partner", bearer).await
    }

    async fn fee_schedule_schema(&self, bearer: &str) -> Result<FeeScheduleSchema, ApiError> {
        self.record("fee_schedule_schema", bearer).await?;
        Ok(FeeScheduleSchema::new())
    }

    async fn list_fee_schedules(&self, bearer: &str) -> Result<Vec<FeeSchedule>, ApiError> {
        self.record("list_fee_schedules", bearer).await?;
        Ok(vec![schedule()])
    }

    async fn get_fee_schedule(&self, bearer: &str, _id: &str) -> Result<FeeSchedule, ApiError> {
        self.record("get_fee_schedule", bearer).await?;
        Ok(schedule())
    }

    async fn create_fee_schedule(
        &self,
        bearer: &str,
        body: &FeeScheduleInput,
    ) -> Result<FeeSchedule, ApiError> {
        self.record("create_fee_schedule", bearer).await?;
        Ok(FeeSchedule {
            id: "fs-2".into(),
            name: body.name.clone().unwrap_or_default(),
            rates: body.rates.clone().unwrap_or_default(),
        })
    }

    async fn update_fee_schedule(
        &self,
        bearer: &str,
        _id: &str,
        _body: &FeeScheduleInput,
    ) -> Result<FeeSchedule, ApiError> {
        self.record("update_fee_schedule", bearer).await?;
        Ok(schedule())
    }

    async fn delete_fee_schedule(&self, bearer: &str, _id: &str) -> Result<(), ApiError> {
        self.record("delete_fee_schedule", bearer).await
    }

    async fn product_catalog(&self, bearer: &str) -> Result<Vec<CatalogProduct>, ApiError> {
        self.record("product_catalog", bearer).await?;
        Ok(catalog())
    }

    async fn list_packages(
        &self,
        bearer: &str,
        _partner_id: &str,
    ) -> Result<Vec<ProductPackage>, ApiError> {
        self.record("list_packages", bearer).await?;
        Ok(vec![package("PKG-1", Vec::new()), package("PKG-2", Vec::new())])
    }

    async fn create_package(
        &self,
        bearer: &str,
        partner_id: &str,
        body: &PackageInput,
    ) -> Result<ProductPackage, ApiError> {
        self.record("create_package", bearer).await?;
        self.created_packages
            .lock()
            .await
            .push((partner_id.to_string(), body.clone()));
        Ok(package("PKG-NEW", Vec::new()))
    }

    async fn update_package(
        &self,
        bearer: &str,
        _partner_id: &str,
        _package_id: &str,
        _body: &PackageInput,
    ) -> Result<ProductPackage, ApiError> {
        self.record("update_package", bearer).await?;
        Ok(package("PKG-1", Vec::new()))
    }

    async fn delete_package(
        &self,
        bearer: &str,
        _partner_id: &str,
        _package_id: &str,
    ) -> Result<(), ApiError> {
        self.record("delete_package", bearer).await
    }
}

#[tokio::test]
async fn unauthorized_response_logs_the_admin_out() {
    let store = open_store().await;
    let api = RecordingAdmin::default();
    let mut dash = AdminDashboard::new(api.clone(), logged_in(SessionKind::Admin, &store).await);
    assert!(dash.is_logged_in());

    api.fail_next(ApiError::Unauthorized).await;
    let err = dash.load_partners().await.unwrap_err();
    assert!(matches!(err, DashboardError::LoggedOut));
    assert!(!dash.is_logged_in());
    assert_eq!(store.load(SessionKind::Admin).await.unwrap(), None);

    // Without a token nothing is sent.
    let err = dash.load_partners().await.unwrap_err();
    assert!(matches!(err, DashboardError::LoggedOut));
    assert_eq!(api.calls().await, vec!["list_partners"]);
}

#[tokio::test]
async fn admin_login_persists_the_session() {
    let store = open_store().await;
    let api = RecordingAdmin::default();
    let session = Session::restore(SessionKind::Admin, store.clone())
        .await
        .unwrap();
    let mut dash = AdminDashboard::new(api.clone(), session);

    let err = dash.login("root", "wrong-pass").await.unwrap_err();
    assert!(matches!(err, DashboardError::Invalid(ref m) if m == "Invalid username or password."));
    assert!(!dash.is_logged_in());

    dash.login(" root ", "s3cret-pass").await.unwrap();
    assert_eq!(
        store.load(SessionKind::Admin).await.unwrap().as_deref(),
        Some("admin-jwt")
    );

    dash.load_admins().await.unwrap();
    assert_eq!(api.bearers.lock().await.last().map(String::as_str), Some("admin-jwt"));

    dash.logout().await.unwrap();
    assert_eq!(store.load(SessionKind::Admin).await.unwrap(), None);
}

#[tokio::test]
async fn delete_updates_cached_list_only_after_server_confirms() {
    let store = open_store().await;
    let api = RecordingAdmin::default();
    let mut dash = AdminDashboard::new(api.clone(), logged_in(SessionKind::Admin, &store).await);
    assert_eq!(dash.load_partners().await.unwrap().len(), 2);

    api.fail_next(ApiError::Unreachable("connection refused".into()))
        .await;
    let err = dash.delete_partner("partner-2").await.unwrap_err();
    assert!(matches!(err, DashboardError::Api(ref e) if e.is_transport()));
    assert_eq!(dash.partners().len(), 2);
    assert!(dash.is_logged_in());

    dash.delete_partner("partner-2").await.unwrap();
    let ids: Vec<&str> = dash.partners().iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["partner-1"]);

    dash.load_packages("partner-1").await.unwrap();
    dash.delete_package("partner-1", "pkg-PKG-1").await.unwrap();
    assert_eq!(dash.packages().len(), 1);
    assert_eq!(dash.packages()[0].uid, "PKG-2");
}

#[tokio::test]
async fn new_fee_schedule_starts_from_default_rates() {
    let store = open_store().await;
    let api = RecordingAdmin::default();
    let mut dash = AdminDashboard::new(api, logged_in(SessionKind::Admin, &store).await);

    assert!(matches!(
        dash.create_fee_schedule("  ", None).await,
        Err(DashboardError::Invalid(_))
    ));
    let created = dash.create_fee_schedule("Launch", None).await.unwrap();
    assert_eq!(created.name, "Launch");
    assert_eq!(created.rates, path_boarding::package::default_rates());
    assert_eq!(dash.fee_schedules().len(), 1);
}

#[tokio::test]
async fn package_wizard_enforces_schedule_floors_and_seeds_defaults() {
    let store = open_store().await;
    let api = RecordingAdmin::default();
    let mut dash = AdminDashboard::new(api.clone(), logged_in(SessionKind::Admin, &store).await);

    let mut wizard = dash.open_package_wizard("partner-1", None).await.unwrap();
    assert_eq!(wizard.step(), PackageStep::PhysicalPos);
    assert!(api.calls().await.contains(&"get_fee_schedule".to_string()));

    wizard.enable("p-pos").unwrap();
    assert_eq!(wizard.next().unwrap(), PackageStep::Ecommerce);
    wizard.set_amount("p-link", 0.35).unwrap();

    // Leaving ecommerce seeds every acquiring product at its floor.
    assert_eq!(wizard.next().unwrap(), PackageStep::Acquiring);
    match &wizard.item("p-credit").unwrap().config {
        path_boarding::package::ItemConfig::Acquiring { pct } => assert_eq!(*pct, 1.2),
        other => panic!("unexpected config {:?}", other),
    }
    assert_eq!(wizard.items().len(), 4);
    assert!(wizard.item("p-chargeback").is_none());

    wizard.set_pct("p-debit", 1.0).unwrap();
    match wizard.next().unwrap_err() {
        PackageError::BelowMinimum {
            product, minimum, ..
        } => {
            assert_eq!(product, "Visa Debit");
            assert_eq!(minimum, 1.5);
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(wizard.step(), PackageStep::Acquiring);

    wizard.set_pct("p-debit", 1.6).unwrap();
    assert_eq!(wizard.next().unwrap(), PackageStep::OtherFees);
    let chargeback = wizard.item("p-chargeback").unwrap();
    assert_eq!(chargeback.sort_order, 4);
    assert!(matches!(
        chargeback.config,
        path_boarding::package::ItemConfig::OtherFee { amount } if amount == 15.0
    ));
    assert_eq!(wizard.next().unwrap(), PackageStep::Details);

    let err = dash.save_package("partner-1", &wizard).await.unwrap_err();
    assert!(matches!(err, DashboardError::Package(PackageError::Invalid(_))));

    wizard.set_name("Counter bundle");
    let uid = dash.save_package("partner-1", &wizard).await.unwrap();
    assert_eq!(uid, "PKG-NEW");

    let created = api.created_packages.lock().await.clone();
    assert_eq!(created.len(), 1);
    let (partner_id, body) = &created[0];
    assert_eq!(partner_id, "partner-1");
    assert_eq!(body.name, "Counter bundle");
    assert_eq!(body.items.len(), 5);
}

#[tokio::test]
async fn unauthorized_package_save_logs_out() {
    let store = open_store().await;
    let api = RecordingAdmin::default();
    let mut dash = AdminDashboard::new(api.clone(), logged_in(SessionKind::Admin, &store).await);
    let mut wizard = dash.open_package_wizard("partner-2", None).await.unwrap();
    wizard.set_name("Basic");

    api.fail_next(ApiError::Unauthorized).await;
    let err = dash.save_package("partner-2", &wizard).await.unwrap_err();
    assert!(matches!(err, DashboardError::LoggedOut));
    assert!(!dash.session().is_active());
}

// ---------------------------------------------------------------------------
// Partner admin
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
struct RecordingPartner {
    failures: Arc<Mutex<VecDeque<ApiError>>>,
    calls: Arc<Mutex<Vec<String>>>,
    invites: Arc<Mutex<Vec<InviteRequest>>>,
}

impl RecordingPartner {
    async fn record(&self, call: &str) -> Result<(), ApiError> {
        self.calls.lock().await.push(call.to_string());
        match self.failures.lock().await.pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn epos_package() -> ProductPackage {
    package(
        "PKG-EPOS",
        vec![
            PackageItem {
                id: "item-pos".into(),
                catalog_product_id: "p-pos".into(),
                product_code: Some("a920".into()),
                product_name: Some("PAX A920".into()),
                product_type: Some(ProductType::PhysicalPos),
                config: None,
                sort_order: 0,
                requires_store_epos: true,
            },
            PackageItem {
                id: "item-debit".into(),
                catalog_product_id: "p-debit".into(),
                product_code: Some("visa_debit".into()),
                product_name: Some("Visa Debit".into()),
                product_type: Some(ProductType::Acquiring),
                config: None,
                sort_order: 1,
                requires_store_epos: false,
            },
        ],
    )
}

#[async_trait::async_trait]
impl PartnerApi for RecordingPartner {
    async fn register(&self, body: &PartnerRegister) -> Result<Partner, ApiError> {
        self.record("register").await?;
        Ok(Partner {
            name: body.name.clone(),
            ..partner("partner-9", None)
        })
    }

    async fn login(&self, body: &Credentials) -> Result<TokenResponse, ApiError> {
        self.record("login").await?;
        if body.password != "partner-pass" {
            return Err(ApiError::Unauthorized);
        }
        Ok(TokenResponse {
            access_token: "partner-jwt".into(),
            token_type: None,
        })
    }

    async fn me(&self, _bearer: &str) -> Result<Partner, ApiError> {
        self.record("me").await?;
        Ok(partner("partner-1", Some("fs-1")))
    }

    async fn product_catalog(&self, _bearer: &str) -> Result<Vec<CatalogProduct>, ApiError> {
        self.record("product_catalog").await?;
        Ok(catalog())
    }

    async fn fee_schedule(&self, _bearer: &str) -> Result<Option<FeeSchedule>, ApiError> {
        self.record("fee_schedule").await?;
        Ok(Some(schedule()))
    }

    async fn list_packages(&self, _bearer: &str) -> Result<Vec<ProductPackage>, ApiError> {
        self.record("list_packages").await?;
        Ok(vec![epos_package()])
    }

    async fn create_package(
        &self,
        _bearer: &str,
        _body: &PackageInput,
    ) -> Result<ProductPackage, ApiError> {
        self.record("create_package").await?;
        Ok(package("PKG-P", Vec::new()))
    }

    async fn update_package(
        &self,
        _bearer: &str,
        _package_id: &str,
        _body: &PackageInput,
    ) -> Result<ProductPackage, ApiError> {
        self.record("update_package").await?;
        Ok(package("PKG-P", Vec::new()))
    }

    async fn delete_package(&self, _bearer: &str, _package_id: &str) -> Result<(), ApiError> {
        self.record("delete_package").await
    }

    async fn create_invite(
        &self,
        _bearer: &str,
        body: &InviteRequest,
    ) -> Result<InviteResponse, ApiError> {
        self.record("create_invite").await?;
        self.invites.lock().await.push(body.clone());
        Ok(InviteResponse {
            invite_url: "http://localhost:3000/board/tok-1".into(),
            expires_at: "2026-11-01T00:00:00Z".into(),
            boarding_event_id: "be-9".into(),
            token: "tok-1".into(),
        })
    }
}

#[tokio::test]
async fn invite_requires_store_details_for_epos_devices() {
    let store = open_store().await;
    let api = RecordingPartner::default();
    let mut dash = PartnerDashboard::new(api.clone(), logged_in(SessionKind::Partner, &store).await);

    let draft = InviteDraft {
        email: Some("owner@cornercafe.co.uk".into()),
        merchant_name: Some("Corner Cafe".into()),
        package_uid: Some("PKG-EPOS".into()),
        device_details: vec![DeviceDetail {
            package_item_id: "item-pos".into(),
            store_name: Some("High Street".into()),
            store_address: None,
            epos_terminal: Some("EPOS-1".into()),
        }],
    };
    let err = dash.generate_invite(draft.clone()).await.unwrap_err();
    match err {
        DashboardError::Invalid(message) => assert!(message.contains("PAX A920")),
        other => panic!("unexpected error {:?}", other),
    }
    assert!(!api.calls.lock().await.contains(&"create_invite".to_string()));

    let mut complete = draft;
    complete.device_details[0].store_address = Some("1 High Street, Leeds".into());
    let invite = dash.generate_invite(complete).await.unwrap();
    assert_eq!(invite.token, "tok-1");

    let sent = api.invites.lock().await.clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].product_package_uid.as_deref(), Some("PKG-EPOS"));
    let details = sent[0].device_details.as_ref().unwrap();
    assert_eq!(details.len(), 1);
    assert_eq!(details[0].package_item_id, "item-pos");
}

#[tokio::test]
async fn invite_without_package_skips_device_checks() {
    let store = open_store().await;
    let api = RecordingPartner::default();
    let mut dash = PartnerDashboard::new(api.clone(), logged_in(SessionKind::Partner, &store).await);

    let err = dash
        .generate_invite(InviteDraft {
            email: Some("not-an-email".into()),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, DashboardError::Invalid(_)));

    dash.generate_invite(InviteDraft::default()).await.unwrap();
    let sent = api.invites.lock().await.clone();
    assert_eq!(sent[0], InviteRequest::default());
    assert_eq!(*api.calls.lock().await, vec!["create_invite"]);
}

#[tokio::test]
async fn partner_login_and_unauthorized_session() {
    let store = open_store().await;
    let api = RecordingPartner::default();
    let session = Session::restore(SessionKind::Partner, store.clone())
        .await
        .unwrap();
    let mut dash = PartnerDashboard::new(api.clone(), session);

    let err = dash.login("ops@acme.example", "nope").await.unwrap_err();
    assert!(matches!(err, DashboardError::Invalid(ref m) if m == "Invalid email or password."));

    dash.login("ops@acme.example", "partner-pass").await.unwrap();
    assert_eq!(dash.me().await.unwrap().id, "partner-1");

    api.failures.lock().await.push_back(ApiError::Unauthorized);
    assert!(matches!(
        dash.load_packages().await,
        Err(DashboardError::LoggedOut)
    ));
    assert_eq!(store.load(SessionKind::Partner).await.unwrap(), None);
}

#[tokio::test]
async fn partner_package_wizard_uses_assigned_schedule() {
    let store = open_store().await;
    let api = RecordingPartner::default();
    let mut dash = PartnerDashboard::new(api.clone(), logged_in(SessionKind::Partner, &store).await);

    let mut wizard = dash.open_package_wizard(None).await.unwrap();
    assert_eq!(wizard.minimums().pct("visa_debit"), 1.5);
    wizard.set_pct("p-debit", 1.5).unwrap();
    wizard.set_name("Acquiring only");
    assert_eq!(dash.save_package(&wizard).await.unwrap(), "PKG-P");

    dash.load_packages().await.unwrap();
    dash.delete_package("pkg-PKG-EPOS").await.unwrap();
    assert!(dash.packages().is_empty());
}
