//! Wire types for the boarding backend. Field names match the JSON payloads.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// Boarding
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvitePartner {
    pub name: String,
    #[serde(default)]
    pub logo_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductPackageItemDisplay {
    pub id: String,
    pub product_code: String,
    pub product_name: String,
    pub product_type: ProductType,
    #[serde(default)]
    pub config: Option<Map<String, Value>>,
    #[serde(default)]
    pub store_name: Option<String>,
    #[serde(default)]
    pub store_address: Option<String>,
    #[serde(default)]
    pub epos_terminal: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductPackageDisplay {
    pub id: String,
    pub uid: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub items: Vec<ProductPackageItemDisplay>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InviteInfo {
    pub partner: InvitePartner,
    #[serde(default)]
    pub merchant_name: Option<String>,
    pub boarding_event_id: String,
    pub valid: bool,
    #[serde(default)]
    pub product_package: Option<ProductPackageDisplay>,
}

impl InviteInfo {
    /// Absolute logo URL, resolving server-relative paths against `api_base`.
    pub fn logo_url(&self, api_base: &str) -> Option<String> {
        let logo = self.partner.logo_url.as_deref()?.trim();
        if logo.is_empty() {
            return None;
        }
        if logo.starts_with("http://") || logo.starts_with("https://") {
            return Some(logo.to_string());
        }
        let base = api_base.trim_end_matches('/');
        if logo.starts_with('/') {
            Some(format!("{}{}", base, logo))
        } else {
            Some(format!("{}/{}", base, logo))
        }
    }
}

/// Saved boarding progress as returned by `GET /boarding/saved-data`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SavedData {
    pub has_data: bool,
    pub current_step: Option<String>,
    pub email: Option<String>,
    pub email_verified: bool,
    // personal
    pub legal_first_name: Option<String>,
    pub legal_last_name: Option<String>,
    pub date_of_birth: Option<String>,
    pub address_country: Option<String>,
    pub address_postcode: Option<String>,
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub address_town: Option<String>,
    pub phone_country_code: Option<String>,
    pub phone_number: Option<String>,
    pub sumsub_verification_status: Option<String>,
    // trading
    pub vat_number: Option<String>,
    pub customer_industry: Option<String>,
    pub estimated_monthly_card_volume: Option<String>,
    pub average_transaction_value: Option<String>,
    pub delivery_timeframe: Option<String>,
    pub customer_support_email: Option<String>,
    pub customer_websites: Option<String>,
    pub product_description: Option<String>,
    // bank
    pub bank_account_name: Option<String>,
    pub bank_currency: Option<String>,
    pub bank_country: Option<String>,
    pub bank_sort_code: Option<String>,
    pub bank_account_number: Option<String>,
    pub bank_iban: Option<String>,
    // company
    pub company_name: Option<String>,
    pub company_number: Option<String>,
    pub company_registered_office: Option<String>,
    pub company_incorporated_in: Option<String>,
    pub company_incorporation_date: Option<String>,
    pub company_industry_sic: Option<String>,
    pub is_sole_owner: Option<bool>,
    pub beneficial_owners: Option<Vec<BeneficialOwner>>,
    // open banking
    pub truelayer_verified_at: Option<String>,
    pub truelayer_verified: Option<bool>,
    pub truelayer_account_match: Option<bool>,
    pub truelayer_verification_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifyStatus {
    pub verified: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step1Submit {
    pub email: String,
    pub confirm_email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step1Response {
    pub sent: bool,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifyEmailCode {
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifyEmailResponse {
    pub verified: bool,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step2Submit {
    pub legal_first_name: String,
    pub legal_last_name: String,
    pub date_of_birth: String,
    pub address_country: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address_postcode: Option<String>,
    pub address_line1: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address_line2: Option<String>,
    pub address_town: String,
    pub email: String,
    pub phone_country_code: String,
    pub phone_number: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeneficialOwner {
    pub name: String,
    pub ownership_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step4Submit {
    pub company_name: String,
    pub company_number: String,
    pub company_registered_office: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_incorporated_in: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_incorporation_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_industry_sic: Option<String>,
    pub is_sole_owner: bool,
    pub beneficial_owners: Vec<BeneficialOwner>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step5Submit {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vat_number: Option<String>,
    pub customer_industry: String,
    pub estimated_monthly_card_volume: String,
    pub average_transaction_value: String,
    pub delivery_timeframe: String,
    pub customer_support_email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_websites: Option<String>,
    pub product_description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step6Submit {
    pub bank_account_name: String,
    pub bank_currency: String,
    pub bank_country: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bank_sort_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bank_account_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bank_iban: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Saved {
    #[serde(default = "saved_default")]
    pub saved: bool,
}

fn saved_default() -> bool {
    true
}

/// Progress snapshot sent by "save for later". Only populated fields are sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SaveForLater {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_step: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vat_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_industry: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_monthly_card_volume: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_transaction_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_timeframe: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_support_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_websites: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bank_account_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bank_currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bank_country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bank_sort_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bank_account_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bank_iban: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveForLaterResponse {
    pub sent: bool,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityToken {
    pub token: String,
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityCompleteResponse {
    pub success: bool,
    pub status: String,
    #[serde(default)]
    pub next_step: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupAddress {
    #[serde(rename = "addressLine1")]
    pub address_line1: String,
    #[serde(rename = "addressLine2", default)]
    pub address_line2: String,
    pub town: String,
    pub postcode: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUrl {
    pub auth_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitReviewResponse {
    pub success: bool,
    #[serde(default)]
    pub agreement_pdf_path: Option<String>,
    #[serde(default)]
    pub redirect_to_signing: bool,
    #[serde(default)]
    pub signing_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardingLoginResponse {
    pub access_token: String,
    #[serde(default)]
    pub current_step: Option<String>,
    pub boarding_event_id: String,
    #[serde(default)]
    pub invite_token: Option<String>,
}

// ---------------------------------------------------------------------------
// Catalog, fee schedules, packages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProductType {
    PhysicalPos,
    Ecomm,
    Acquiring,
    OtherFee,
    Other(String),
}

impl ProductType {
    pub fn as_str(&self) -> &str {
        match self {
            ProductType::PhysicalPos => "physical_pos",
            ProductType::Ecomm => "ecomm",
            ProductType::Acquiring => "acquiring",
            ProductType::OtherFee => "other_fee",
            ProductType::Other(s) => s.as_str(),
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "physical_pos" => ProductType::PhysicalPos,
            "ecomm" => ProductType::Ecomm,
            "acquiring" => ProductType::Acquiring,
            "other_fee" => ProductType::OtherFee,
            other => ProductType::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ProductType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ProductType {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ProductType {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        Ok(ProductType::parse(&s))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogProduct {
    pub id: String,
    pub product_type: ProductType,
    pub product_code: String,
    pub name: String,
    #[serde(default)]
    pub config_schema: Option<Map<String, Value>>,
    #[serde(default)]
    pub requires_store_epos: bool,
}

impl CatalogProduct {
    /// Numeric minimum declared in the product's config schema.
    pub fn schema_min(&self, key: &str) -> Option<f64> {
        self.config_schema.as_ref()?.get(key)?.as_f64()
    }
}

/// Per-product floor rates in a fee schedule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RateRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_pct: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_per_month: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_per_device: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_service: Option<f64>,
}

pub type FeeRates = BTreeMap<String, RateRecord>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeSchedule {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub rates: FeeRates,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeeScheduleInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rates: Option<FeeRates>,
}

/// `GET /admin/fee-schedule-schema`: product code -> label and default rates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeScheduleProduct {
    pub label: String,
    #[serde(flatten)]
    pub defaults: RateRecord,
}

pub type FeeScheduleSchema = BTreeMap<String, FeeScheduleProduct>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeScheduleSchemaResponse {
    pub products: FeeScheduleSchema,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageItem {
    pub id: String,
    pub catalog_product_id: String,
    #[serde(default)]
    pub product_code: Option<String>,
    #[serde(default)]
    pub product_name: Option<String>,
    #[serde(default)]
    pub product_type: Option<ProductType>,
    #[serde(default)]
    pub config: Option<Map<String, Value>>,
    #[serde(default)]
    pub sort_order: i64,
    #[serde(default)]
    pub requires_store_epos: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductPackage {
    pub id: String,
    #[serde(default)]
    pub partner_id: Option<String>,
    pub uid: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub items: Vec<PackageItem>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageItemInput {
    pub catalog_product_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<Map<String, Value>>,
    pub sort_order: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageInput {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub items: Vec<PackageItemInput>,
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminUser {
    pub id: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminUserInput {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Partner {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub logo_url: Option<String>,
    #[serde(default)]
    pub fee_schedule_id: Option<String>,
    pub is_active: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartnerRegister {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartnerCreate {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fee_schedule_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartnerUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fee_schedule_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceDetail {
    pub package_item_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub epos_terminal: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InviteRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merchant_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_package_uid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_details: Option<Vec<DeviceDetail>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InviteResponse {
    pub invite_url: String,
    pub expires_at: String,
    pub boarding_event_id: String,
    pub token: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn product_type_round_trips_known_and_unknown() {
        let t: ProductType = serde_json::from_value(json!("acquiring")).unwrap();
        assert_eq!(t, ProductType::Acquiring);
        let t: ProductType = serde_json::from_value(json!("gift_cards")).unwrap();
        assert_eq!(t, ProductType::Other("gift_cards".into()));
        assert_eq!(serde_json::to_value(ProductType::OtherFee).unwrap(), "other_fee");
    }

    #[test]
    fn saved_data_tolerates_missing_fields() {
        let saved: SavedData = serde_json::from_value(json!({
            "has_data": true,
            "current_step": "step5",
            "email": "a@b.com",
            "email_verified": true,
            "legal_first_name": "Ada"
        }))
        .unwrap();
        assert_eq!(saved.current_step.as_deref(), Some("step5"));
        assert!(saved.bank_iban.is_none());
    }

    #[test]
    fn invite_logo_resolves_against_api_base() {
        let info: InviteInfo = serde_json::from_value(json!({
            "partner": { "name": "Acme", "logo_url": "uploads/logo.png" },
            "boarding_event_id": "ev-1",
            "valid": true
        }))
        .unwrap();
        assert_eq!(
            info.logo_url("http://localhost:8000/").as_deref(),
            Some("http://localhost:8000/uploads/logo.png")
        );
    }

    #[test]
    fn fee_schedule_schema_flattens_defaults() {
        let schema = serde_json::from_value::<FeeScheduleSchemaResponse>(json!({
            "products": { "credit": { "label": "Credit", "min_pct": 1.3 } }
        }))
        .unwrap()
        .products;
        assert_eq!(schema["credit"].label, "Credit");
        assert_eq!(schema["credit"].defaults.min_pct, Some(1.3));
    }

    #[test]
    fn save_for_later_omits_empty_fields() {
        let body = SaveForLater {
            current_step: Some("step5".into()),
            vat_number: Some("GB123456789".into()),
            ..Default::default()
        };
        let v = serde_json::to_value(&body).unwrap();
        assert_eq!(v.as_object().unwrap().len(), 2);
    }
}
