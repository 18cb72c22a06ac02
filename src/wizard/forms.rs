//! In-memory form state for each wizard step, with the local validation that
//! gates the step's submit and the wire payload it produces.
use crate::api::model::{
    BeneficialOwner, SaveForLater, SavedData, Step1Submit, Step2Submit, Step4Submit, Step5Submit,
    Step6Submit,
};
use crate::validate::{
    is_valid_email, is_valid_uk_postcode, normalize_iban, normalize_vat, validate_account_number,
    validate_date_of_birth, validate_iban, validate_legal_name, validate_password,
    validate_phone_number, validate_sort_code, validate_vat_number, validate_website,
};

pub const UNITED_KINGDOM: &str = "United Kingdom";
pub const DEFAULT_PHONE_CODE: &str = "+44";
pub const DEFAULT_CURRENCY: &str = "GBP";

/// A field that failed local validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

fn required(field: &'static str, value: &str, message: &str) -> Result<(), FieldError> {
    if value.trim().is_empty() {
        return Err(FieldError::new(field, message));
    }
    Ok(())
}

fn check(field: &'static str, outcome: Option<String>) -> Result<(), FieldError> {
    match outcome {
        Some(message) => Err(FieldError::new(field, message)),
        None => Ok(()),
    }
}

fn optional(value: &str) -> Option<String> {
    let t = value.trim();
    if t.is_empty() {
        None
    } else {
        Some(t.to_string())
    }
}

fn text(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

// ---------------------------------------------------------------------------
// form: account credentials
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccountForm {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

impl AccountForm {
    pub fn validate(&self) -> Result<Step1Submit, FieldError> {
        required("email", &self.email, "Enter your email address")?;
        if !is_valid_email(&self.email) {
            return Err(FieldError::new(
                "email",
                "Enter a valid email address (e.g. name@company.com or name@company.co.uk)",
            ));
        }
        if let Some(message) = validate_password(&self.password, &self.confirm_password) {
            let field = if message == "Passwords do not match" {
                "confirm_password"
            } else {
                "password"
            };
            return Err(FieldError::new(field, message));
        }
        let email = self.email.trim().to_string();
        Ok(Step1Submit {
            confirm_email: email.clone(),
            email,
            password: self.password.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// step2: personal details
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct PersonalDetails {
    pub legal_first_name: String,
    pub legal_last_name: String,
    pub date_of_birth: String,
    pub address_country: String,
    pub address_postcode: String,
    pub address_line1: String,
    pub address_line2: String,
    pub address_town: String,
    pub email: String,
    pub phone_country_code: String,
    pub phone_number: String,
}

impl Default for PersonalDetails {
    fn default() -> Self {
        Self {
            legal_first_name: String::new(),
            legal_last_name: String::new(),
            date_of_birth: String::new(),
            address_country: UNITED_KINGDOM.into(),
            address_postcode: String::new(),
            address_line1: String::new(),
            address_line2: String::new(),
            address_town: String::new(),
            email: String::new(),
            phone_country_code: DEFAULT_PHONE_CODE.into(),
            phone_number: String::new(),
        }
    }
}

impl PersonalDetails {
    pub fn from_saved(saved: &SavedData) -> Self {
        let mut form = Self::default();
        if let Some(v) = &saved.legal_first_name {
            form.legal_first_name = v.clone();
        }
        if let Some(v) = &saved.legal_last_name {
            form.legal_last_name = v.clone();
        }
        if let Some(v) = &saved.date_of_birth {
            form.date_of_birth = v.clone();
        }
        if let Some(v) = saved.address_country.as_ref().filter(|v| !v.is_empty()) {
            form.address_country = v.clone();
        }
        form.address_postcode = text(&saved.address_postcode);
        form.address_line1 = text(&saved.address_line1);
        form.address_line2 = text(&saved.address_line2);
        form.address_town = text(&saved.address_town);
        // The account email doubles as the contact email until the merchant edits it.
        form.email = text(&saved.email);
        if let Some(v) = saved.phone_country_code.as_ref().filter(|v| !v.is_empty()) {
            form.phone_country_code = v.clone();
        }
        form.phone_number = text(&saved.phone_number);
        form
    }

    pub(crate) fn is_uk(&self) -> bool {
        self.address_country.trim() == UNITED_KINGDOM
    }

    pub fn validate(&self) -> Result<Step2Submit, FieldError> {
        check("legal_first_name", validate_legal_name(&self.legal_first_name))?;
        check("legal_last_name", validate_legal_name(&self.legal_last_name))?;
        check("date_of_birth", validate_date_of_birth(&self.date_of_birth))?;
        if self.address_line1.trim().is_empty() {
            return Err(FieldError::new(
                "address_line1",
                "Please enter address line 1 and town.",
            ));
        }
        if self.address_town.trim().is_empty() {
            return Err(FieldError::new(
                "address_town",
                "Please enter address line 1 and town.",
            ));
        }
        if self.is_uk() {
            required(
                "address_postcode",
                &self.address_postcode,
                "Please enter your postcode.",
            )?;
            if !is_valid_uk_postcode(self.address_postcode.trim()) {
                return Err(FieldError::new(
                    "address_postcode",
                    "Please enter a valid UK postcode (e.g. SW1A 1AA).",
                ));
            }
        }
        if !is_valid_email(&self.email) {
            return Err(FieldError::new(
                "email",
                "Please enter a valid email address.",
            ));
        }
        check("phone_number", validate_phone_number(&self.phone_number))?;

        Ok(Step2Submit {
            legal_first_name: self.legal_first_name.trim().to_string(),
            legal_last_name: self.legal_last_name.trim().to_string(),
            date_of_birth: self.date_of_birth.trim().to_string(),
            address_country: self.address_country.trim().to_string(),
            address_postcode: if self.is_uk() {
                Some(self.address_postcode.trim().to_string())
            } else {
                None
            },
            address_line1: self.address_line1.trim().to_string(),
            address_line2: optional(&self.address_line2),
            address_town: self.address_town.trim().to_string(),
            email: self.email.trim().to_string(),
            phone_country_code: self.phone_country_code.clone(),
            phone_number: self.phone_number.trim().to_string(),
        })
    }

    /// Fields whose current value passes its own validator.
    pub fn verified_fields(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if validate_legal_name(&self.legal_first_name).is_none() {
            out.push("legal_first_name");
        }
        if validate_legal_name(&self.legal_last_name).is_none() {
            out.push("legal_last_name");
        }
        if validate_date_of_birth(&self.date_of_birth).is_none() {
            out.push("date_of_birth");
        }
        if is_valid_uk_postcode(self.address_postcode.trim()) {
            out.push("address_postcode");
        }
        if !self.address_line1.trim().is_empty() {
            out.push("address_line1");
        }
        if !self.address_town.trim().is_empty() {
            out.push("address_town");
        }
        if is_valid_email(&self.email) {
            out.push("email");
        }
        if validate_phone_number(&self.phone_number).is_none() {
            out.push("phone_number");
        }
        out
    }
}

// ---------------------------------------------------------------------------
// step4: business details and ownership disclosure
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct BusinessDetails {
    pub company_name: String,
    pub company_number: String,
    pub company_registered_office: String,
    pub company_incorporated_in: String,
    pub company_incorporation_date: String,
    pub company_industry_sic: String,
    pub is_sole_owner: bool,
    pub beneficial_owners: Vec<BeneficialOwner>,
}

impl Default for BusinessDetails {
    fn default() -> Self {
        Self {
            company_name: String::new(),
            company_number: String::new(),
            company_registered_office: String::new(),
            company_incorporated_in: String::new(),
            company_incorporation_date: String::new(),
            company_industry_sic: String::new(),
            is_sole_owner: true,
            beneficial_owners: Vec::new(),
        }
    }
}

impl BusinessDetails {
    pub fn from_saved(saved: &SavedData) -> Self {
        Self {
            company_name: text(&saved.company_name),
            company_number: text(&saved.company_number),
            company_registered_office: text(&saved.company_registered_office),
            company_incorporated_in: text(&saved.company_incorporated_in),
            company_incorporation_date: text(&saved.company_incorporation_date),
            company_industry_sic: text(&saved.company_industry_sic),
            is_sole_owner: saved.is_sole_owner.unwrap_or(true),
            beneficial_owners: saved.beneficial_owners.clone().unwrap_or_default(),
        }
    }

    pub fn validate(&self) -> Result<Step4Submit, FieldError> {
        required(
            "company_name",
            &self.company_name,
            "Please enter your company name.",
        )?;
        required(
            "company_number",
            &self.company_number,
            "Please enter your company registration number.",
        )?;
        required(
            "company_registered_office",
            &self.company_registered_office,
            "Please enter the registered office address.",
        )?;
        let owners = if self.is_sole_owner {
            Vec::new()
        } else {
            self.validated_owners()?
        };
        Ok(Step4Submit {
            company_name: self.company_name.trim().to_string(),
            company_number: self.company_number.trim().to_string(),
            company_registered_office: self.company_registered_office.trim().to_string(),
            company_incorporated_in: optional(&self.company_incorporated_in),
            company_incorporation_date: optional(&self.company_incorporation_date),
            company_industry_sic: optional(&self.company_industry_sic),
            is_sole_owner: self.is_sole_owner,
            beneficial_owners: owners,
        })
    }

    fn validated_owners(&self) -> Result<Vec<BeneficialOwner>, FieldError> {
        if self.beneficial_owners.is_empty() {
            return Err(FieldError::new(
                "beneficial_owners",
                "Add everyone who owns 25% or more of the business.",
            ));
        }
        let mut total = 0.0;
        let mut out = Vec::with_capacity(self.beneficial_owners.len());
        for owner in &self.beneficial_owners {
            let name = owner.name.trim();
            if name.is_empty() {
                return Err(FieldError::new(
                    "beneficial_owners",
                    "Please enter each owner's full name.",
                ));
            }
            if !(owner.ownership_pct > 0.0 && owner.ownership_pct <= 100.0) {
                return Err(FieldError::new(
                    "beneficial_owners",
                    format!("Ownership for {} must be between 0 and 100%.", name),
                ));
            }
            total += owner.ownership_pct;
            out.push(BeneficialOwner {
                name: name.to_string(),
                ownership_pct: owner.ownership_pct,
            });
        }
        if total > 100.0 + f64::EPSILON {
            return Err(FieldError::new(
                "beneficial_owners",
                "Total ownership cannot exceed 100%.",
            ));
        }
        Ok(out)
    }

    pub fn verified_fields(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        for (field, value) in [
            ("company_name", &self.company_name),
            ("company_number", &self.company_number),
            ("company_registered_office", &self.company_registered_office),
        ] {
            if !value.trim().is_empty() {
                out.push(field);
            }
        }
        out
    }
}

// ---------------------------------------------------------------------------
// step5: trading details
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TradingDetails {
    pub vat_number: String,
    pub customer_industry: String,
    pub estimated_monthly_card_volume: String,
    pub average_transaction_value: String,
    pub delivery_timeframe: String,
    pub customer_support_email: String,
    pub customer_websites: String,
    pub product_description: String,
}

impl TradingDetails {
    pub fn from_saved(saved: &SavedData) -> Self {
        Self {
            vat_number: text(&saved.vat_number),
            customer_industry: text(&saved.customer_industry),
            estimated_monthly_card_volume: text(&saved.estimated_monthly_card_volume),
            average_transaction_value: text(&saved.average_transaction_value),
            delivery_timeframe: text(&saved.delivery_timeframe),
            customer_support_email: text(&saved.customer_support_email),
            customer_websites: text(&saved.customer_websites),
            product_description: text(&saved.product_description),
        }
    }

    pub fn validate(&self) -> Result<Step5Submit, FieldError> {
        check("vat_number", validate_vat_number(&self.vat_number))?;
        required(
            "customer_industry",
            &self.customer_industry,
            "Please select your industry.",
        )?;
        required(
            "estimated_monthly_card_volume",
            &self.estimated_monthly_card_volume,
            "Please enter your estimated monthly card volume.",
        )?;
        required(
            "average_transaction_value",
            &self.average_transaction_value,
            "Please enter your average transaction value.",
        )?;
        required(
            "delivery_timeframe",
            &self.delivery_timeframe,
            "Please select a delivery timeframe.",
        )?;
        if !is_valid_email(&self.customer_support_email) {
            return Err(FieldError::new(
                "customer_support_email",
                "Please enter a valid customer support email.",
            ));
        }
        check("customer_websites", validate_website(&self.customer_websites))?;
        required(
            "product_description",
            &self.product_description,
            "Please describe what you sell.",
        )?;
        Ok(Step5Submit {
            vat_number: optional(&self.vat_number).map(|v| normalize_vat(&v)),
            customer_industry: self.customer_industry.trim().to_string(),
            estimated_monthly_card_volume: self.estimated_monthly_card_volume.trim().to_string(),
            average_transaction_value: self.average_transaction_value.trim().to_string(),
            delivery_timeframe: self.delivery_timeframe.trim().to_string(),
            customer_support_email: self.customer_support_email.trim().to_string(),
            customer_websites: optional(&self.customer_websites),
            product_description: self.product_description.trim().to_string(),
        })
    }

    pub fn verified_fields(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if !self.vat_number.trim().is_empty() && validate_vat_number(&self.vat_number).is_none() {
            out.push("vat_number");
        }
        if is_valid_email(&self.customer_support_email) {
            out.push("customer_support_email");
        }
        if !self.customer_websites.trim().is_empty()
            && validate_website(&self.customer_websites).is_none()
        {
            out.push("customer_websites");
        }
        for (field, value) in [
            ("customer_industry", &self.customer_industry),
            (
                "estimated_monthly_card_volume",
                &self.estimated_monthly_card_volume,
            ),
            ("average_transaction_value", &self.average_transaction_value),
            ("delivery_timeframe", &self.delivery_timeframe),
            ("product_description", &self.product_description),
        ] {
            if !value.trim().is_empty() {
                out.push(field);
            }
        }
        out
    }

    /// Copy populated fields into a save-for-later body.
    pub fn fill_save(&self, body: &mut SaveForLater) {
        body.vat_number = optional(&self.vat_number);
        body.customer_industry = optional(&self.customer_industry);
        body.estimated_monthly_card_volume = optional(&self.estimated_monthly_card_volume);
        body.average_transaction_value = optional(&self.average_transaction_value);
        body.delivery_timeframe = optional(&self.delivery_timeframe);
        body.customer_support_email = optional(&self.customer_support_email);
        body.customer_websites = optional(&self.customer_websites);
        body.product_description = optional(&self.product_description);
    }
}

// ---------------------------------------------------------------------------
// step6: bank details
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct BankDetails {
    pub bank_account_name: String,
    pub bank_currency: String,
    pub bank_country: String,
    pub bank_sort_code: String,
    pub bank_account_number: String,
    pub bank_iban: String,
}

impl Default for BankDetails {
    fn default() -> Self {
        Self {
            bank_account_name: String::new(),
            bank_currency: DEFAULT_CURRENCY.into(),
            bank_country: UNITED_KINGDOM.into(),
            bank_sort_code: String::new(),
            bank_account_number: String::new(),
            bank_iban: String::new(),
        }
    }
}

impl BankDetails {
    pub fn from_saved(saved: &SavedData) -> Self {
        let mut form = Self {
            bank_account_name: text(&saved.bank_account_name),
            bank_sort_code: text(&saved.bank_sort_code),
            bank_account_number: text(&saved.bank_account_number),
            bank_iban: text(&saved.bank_iban),
            ..Self::default()
        };
        if let Some(v) = saved.bank_currency.as_ref().filter(|v| !v.is_empty()) {
            form.bank_currency = v.clone();
        }
        if let Some(v) = saved.bank_country.as_ref().filter(|v| !v.is_empty()) {
            form.bank_country = v.clone();
        }
        form
    }

    /// UK sterling accounts are identified by sort code and account number,
    /// everything else by IBAN.
    pub fn uses_uk_account(&self) -> bool {
        self.bank_currency.trim() == DEFAULT_CURRENCY && self.bank_country.trim() == UNITED_KINGDOM
    }

    pub fn validate(&self) -> Result<Step6Submit, FieldError> {
        required(
            "bank_account_name",
            &self.bank_account_name,
            "Please enter the name on the account.",
        )?;
        let (sort_code, account_number, iban) = if self.uses_uk_account() {
            check("bank_sort_code", validate_sort_code(&self.bank_sort_code))?;
            check(
                "bank_account_number",
                validate_account_number(&self.bank_account_number),
            )?;
            (
                Some(digits_only(&self.bank_sort_code)),
                Some(digits_only(&self.bank_account_number)),
                None,
            )
        } else {
            check("bank_iban", validate_iban(&self.bank_iban))?;
            (None, None, Some(normalize_iban(&self.bank_iban)))
        };
        Ok(Step6Submit {
            bank_account_name: self.bank_account_name.trim().to_string(),
            bank_currency: self.bank_currency.trim().to_string(),
            bank_country: self.bank_country.trim().to_string(),
            bank_sort_code: sort_code,
            bank_account_number: account_number,
            bank_iban: iban,
        })
    }

    pub fn verified_fields(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if !self.bank_account_name.trim().is_empty() {
            out.push("bank_account_name");
        }
        if validate_sort_code(&self.bank_sort_code).is_none() {
            out.push("bank_sort_code");
        }
        if validate_account_number(&self.bank_account_number).is_none() {
            out.push("bank_account_number");
        }
        if validate_iban(&self.bank_iban).is_none() {
            out.push("bank_iban");
        }
        out
    }

    pub fn fill_save(&self, body: &mut SaveForLater) {
        body.bank_account_name = optional(&self.bank_account_name);
        body.bank_currency = optional(&self.bank_currency);
        body.bank_country = optional(&self.bank_country);
        body.bank_sort_code = optional(&self.bank_sort_code);
        body.bank_account_number = optional(&self.bank_account_number);
        body.bank_iban = optional(&self.bank_iban);
    }
}

fn digits_only(value: &str) -> String {
    value.chars().filter(|c| c.is_ascii_digit()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn personal() -> PersonalDetails {
        PersonalDetails {
            legal_first_name: "Ada".into(),
            legal_last_name: "Lovelace".into(),
            date_of_birth: "15/06/1990".into(),
            address_postcode: "SW1A 1AA".into(),
            address_line1: "1 Downing Street".into(),
            address_town: "London".into(),
            email: "ada@example.co.uk".into(),
            phone_number: "07943 490 548".into(),
            ..Default::default()
        }
    }

    #[test]
    fn account_form_checks_in_order() {
        let mut form = AccountForm::default();
        assert_eq!(form.validate().unwrap_err().field, "email");
        form.email = "ada@example.com".into();
        form.password = "short".into();
        assert_eq!(form.validate().unwrap_err().field, "password");
        form.password = "longenough".into();
        form.confirm_password = "different".into();
        assert_eq!(form.validate().unwrap_err().field, "confirm_password");
        form.confirm_password = "longenough".into();
        let body = form.validate().unwrap();
        assert_eq!(body.confirm_email, "ada@example.com");
    }

    #[test]
    fn personal_details_requires_postcode_only_in_uk() {
        let mut form = personal();
        form.address_postcode = "12345".into();
        let err = form.validate().unwrap_err();
        assert_eq!(err.field, "address_postcode");

        form.address_country = "France".into();
        let body = form.validate().unwrap();
        assert_eq!(body.address_postcode, None);
        assert_eq!(body.address_line2, None);
    }

    #[test]
    fn personal_details_rejects_bad_phone() {
        let mut form = personal();
        form.phone_number = "0123".into();
        let err = form.validate().unwrap_err();
        assert_eq!(err.field, "phone_number");
        assert!(err.message.starts_with("Enter at least 10 digits"));
    }

    #[test]
    fn business_details_checks_owners_when_not_sole() {
        let mut form = BusinessDetails {
            company_name: "Acme Ltd".into(),
            company_number: "01234567".into(),
            company_registered_office: "1 High Street".into(),
            ..Default::default()
        };
        assert!(form.validate().unwrap().beneficial_owners.is_empty());

        form.is_sole_owner = false;
        assert_eq!(form.validate().unwrap_err().field, "beneficial_owners");

        form.beneficial_owners = vec![
            BeneficialOwner {
                name: "Ada".into(),
                ownership_pct: 60.0,
            },
            BeneficialOwner {
                name: "Bob".into(),
                ownership_pct: 50.0,
            },
        ];
        let err = form.validate().unwrap_err();
        assert_eq!(err.message, "Total ownership cannot exceed 100%.");

        form.beneficial_owners[1].ownership_pct = 40.0;
        assert_eq!(form.validate().unwrap().beneficial_owners.len(), 2);
    }

    #[test]
    fn bank_details_switches_between_uk_and_iban() {
        let mut form = BankDetails {
            bank_account_name: "Acme Ltd".into(),
            bank_sort_code: "33-44-55".into(),
            bank_account_number: "1234 5678".into(),
            ..Default::default()
        };
        let body = form.validate().unwrap();
        assert_eq!(body.bank_sort_code.as_deref(), Some("334455"));
        assert_eq!(body.bank_account_number.as_deref(), Some("12345678"));
        assert_eq!(body.bank_iban, None);

        form.bank_currency = "EUR".into();
        assert_eq!(form.validate().unwrap_err().field, "bank_iban");
        form.bank_iban = "gb82 west 1234 5698 7654 32".into();
        let body = form.validate().unwrap();
        assert_eq!(body.bank_iban.as_deref(), Some("GB82WEST12345698765432"));
        assert_eq!(body.bank_sort_code, None);
    }

    #[test]
    fn trading_details_normalizes_vat() {
        let form = TradingDetails {
            vat_number: "gb 123 456 789".into(),
            customer_industry: "Retail".into(),
            estimated_monthly_card_volume: "10000".into(),
            average_transaction_value: "25".into(),
            delivery_timeframe: "immediate".into(),
            customer_support_email: "help@acme.co.uk".into(),
            customer_websites: "acme.co.uk, https://shop.acme.com".into(),
            product_description: "Coffee".into(),
        };
        let body = form.validate().unwrap();
        assert_eq!(body.vat_number.as_deref(), Some("GB123456789"));
        assert!(form.verified_fields().contains(&"customer_websites"));

        // The submitted value is the one the validator checked.
        let form = TradingDetails {
            vat_number: "\txi 123\u{a0}456 789 ".into(),
            ..form
        };
        let body = form.validate().unwrap();
        assert_eq!(body.vat_number, Some(normalize_vat(&form.vat_number)));
        assert_eq!(body.vat_number.as_deref(), Some("XI123456789"));
    }
}
