//! Product package configuration wizard.
//!
//! Five fixed steps: physical POS, ecommerce, acquiring, other fees, then
//! name and description. Every configured price is held to the effective
//! floor from [`Minimums`]; advancing re-validates all items and stops at
//! the first one below its floor.
use std::fmt;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::api::model::{
    CatalogProduct, FeeRates, PackageInput, PackageItemInput, ProductPackage, ProductType,
};
use crate::error::ApiError;

pub mod fees;
pub mod store;

pub use fees::{default_rates, ItemConfig, Minimums, PosConfig, PosPricing, PosPricingType};
pub use store::{AdminPackages, PackageStore, PartnerPackages};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PackageStep {
    PhysicalPos = 1,
    Ecommerce = 2,
    Acquiring = 3,
    OtherFees = 4,
    Details = 5,
}

impl PackageStep {
    pub fn number(&self) -> u8 {
        *self as u8
    }

    /// Catalog product type configured on this step.
    pub fn product_type(&self) -> Option<ProductType> {
        match self {
            PackageStep::PhysicalPos => Some(ProductType::PhysicalPos),
            PackageStep::Ecommerce => Some(ProductType::Ecomm),
            PackageStep::Acquiring => Some(ProductType::Acquiring),
            PackageStep::OtherFees => Some(ProductType::OtherFee),
            PackageStep::Details => None,
        }
    }

    fn next(&self) -> Option<PackageStep> {
        match self {
            PackageStep::PhysicalPos => Some(PackageStep::Ecommerce),
            PackageStep::Ecommerce => Some(PackageStep::Acquiring),
            PackageStep::Acquiring => Some(PackageStep::OtherFees),
            PackageStep::OtherFees => Some(PackageStep::Details),
            PackageStep::Details => None,
        }
    }

    fn previous(&self) -> Option<PackageStep> {
        match self {
            PackageStep::PhysicalPos => None,
            PackageStep::Ecommerce => Some(PackageStep::PhysicalPos),
            PackageStep::Acquiring => Some(PackageStep::Ecommerce),
            PackageStep::OtherFees => Some(PackageStep::Acquiring),
            PackageStep::Details => Some(PackageStep::OtherFees),
        }
    }
}

impl fmt::Display for PackageStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Step {}", self.number())
    }
}

#[derive(Debug, Error)]
pub enum PackageError {
    #[error("{message}")]
    BelowMinimum {
        product: String,
        minimum: f64,
        message: String,
    },
    #[error("{0}")]
    Invalid(String),
    #[error("unknown catalog product {0}")]
    UnknownProduct(String),
    #[error(transparent)]
    Api(#[from] ApiError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct WizardItem {
    pub catalog_product_id: String,
    pub config: ItemConfig,
    pub sort_order: i64,
}

#[derive(Debug, Clone)]
pub struct PackageWizard {
    catalog: Vec<CatalogProduct>,
    minimums: Minimums,
    step: PackageStep,
    items: Vec<WizardItem>,
    name: String,
    description: String,
    package_id: Option<String>,
}

impl PackageWizard {
    /// A blank package priced against `rates` (the partner's fee schedule,
    /// empty when none is assigned).
    pub fn new(catalog: Vec<CatalogProduct>, rates: FeeRates) -> Self {
        let minimums = Minimums::new(rates, &catalog);
        Self {
            catalog,
            minimums,
            step: PackageStep::PhysicalPos,
            items: Vec::new(),
            name: String::new(),
            description: String::new(),
            package_id: None,
        }
    }

    /// Reopen an existing package. Items whose product is missing from the
    /// catalog or has an unsupported type are dropped.
    pub fn edit(catalog: Vec<CatalogProduct>, rates: FeeRates, package: &ProductPackage) -> Self {
        let mut wizard = Self::new(catalog, rates);
        for item in &package.items {
            let Some(product) = wizard.product(&item.catalog_product_id) else {
                debug!(product=%item.catalog_product_id, "skipping item not in catalog");
                continue;
            };
            if let Some(config) =
                ItemConfig::from_json(product, item.config.as_ref(), &wizard.minimums)
            {
                wizard.items.push(WizardItem {
                    catalog_product_id: item.catalog_product_id.clone(),
                    config,
                    sort_order: item.sort_order,
                });
            }
        }
        wizard.items.sort_by_key(|i| i.sort_order);
        wizard.name = package.name.clone();
        wizard.description = package.description.clone().unwrap_or_default();
        wizard.package_id = Some(package.id.clone());
        wizard
    }

    pub fn step(&self) -> PackageStep {
        self.step
    }

    pub fn items(&self) -> &[WizardItem] {
        &self.items
    }

    pub fn item(&self, product_id: &str) -> Option<&WizardItem> {
        self.items
            .iter()
            .find(|i| i.catalog_product_id == product_id)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn is_editing(&self) -> bool {
        self.package_id.is_some()
    }

    pub fn minimums(&self) -> &Minimums {
        &self.minimums
    }

    /// Catalog products configured on `step`.
    pub fn products(&self, step: PackageStep) -> Vec<&CatalogProduct> {
        match step.product_type() {
            Some(kind) => self
                .catalog
                .iter()
                .filter(|p| p.product_type == kind)
                .collect(),
            None => Vec::new(),
        }
    }

    fn product(&self, id: &str) -> Option<&CatalogProduct> {
        self.catalog.iter().find(|p| p.id == id)
    }

    fn next_sort_order(&self) -> i64 {
        self.items
            .iter()
            .map(|i| i.sort_order + 1)
            .max()
            .unwrap_or(0)
    }

    fn item_mut(&mut self, product_id: &str) -> Option<&mut WizardItem> {
        self.items
            .iter_mut()
            .find(|i| i.catalog_product_id == product_id)
    }

    /// Switch a product on, seeded at its floors. No-op when already on.
    pub fn enable(&mut self, product_id: &str) -> Result<(), PackageError> {
        if self.item(product_id).is_some() {
            return Ok(());
        }
        let product = self
            .product(product_id)
            .ok_or_else(|| PackageError::UnknownProduct(product_id.to_string()))?;
        let config = ItemConfig::seeded(product, &self.minimums).ok_or_else(|| {
            PackageError::Invalid(format!("{} cannot be added to a package.", product.name))
        })?;
        let sort_order = self.next_sort_order();
        self.items.push(WizardItem {
            catalog_product_id: product_id.to_string(),
            config,
            sort_order,
        });
        Ok(())
    }

    pub fn disable(&mut self, product_id: &str) {
        self.items.retain(|i| i.catalog_product_id != product_id);
    }

    /// Choose POS pricing for an enabled POS product. Values are stored as
    /// given; floors are checked on `next` and `save`.
    pub fn set_pos_pricing(
        &mut self,
        product_id: &str,
        pricing: PosPricing,
    ) -> Result<(), PackageError> {
        let item = self.item_mut(product_id).ok_or_else(|| {
            PackageError::Invalid("Enable the device before choosing its pricing.".into())
        })?;
        let ItemConfig::Pos(_) = item.config else {
            return Err(PackageError::Invalid(
                "Only POS devices have device pricing.".into(),
            ));
        };
        item.config = ItemConfig::Pos(match pricing {
            PosPricing::PerMonth { price } => PosConfig {
                pricing_type: PosPricingType::PerMonth,
                price_per_month: Some(price),
                price_per_device: None,
                monthly_service: None,
            },
            PosPricing::PerDeviceService { device, service } => PosConfig {
                pricing_type: PosPricingType::PerDeviceService,
                price_per_month: None,
                price_per_device: Some(device),
                monthly_service: Some(service),
            },
        });
        Ok(())
    }

    /// Set the fixed fee of an ecommerce or other-fee product, adding it to
    /// the package when absent.
    pub fn set_amount(&mut self, product_id: &str, amount: f64) -> Result<(), PackageError> {
        self.set_value(product_id, amount, |config, v| match config {
            ItemConfig::Ecomm { amount } | ItemConfig::OtherFee { amount } => {
                *amount = v;
                true
            }
            _ => false,
        })
    }

    /// Set the percentage rate of an acquiring product, adding it to the
    /// package when absent.
    pub fn set_pct(&mut self, product_id: &str, pct: f64) -> Result<(), PackageError> {
        self.set_value(product_id, pct, |config, v| match config {
            ItemConfig::Acquiring { pct } => {
                *pct = v;
                true
            }
            _ => false,
        })
    }

    fn set_value(
        &mut self,
        product_id: &str,
        value: f64,
        apply: fn(&mut ItemConfig, f64) -> bool,
    ) -> Result<(), PackageError> {
        if !value.is_finite() {
            return Err(PackageError::Invalid("Enter a number.".into()));
        }
        let added = self.item(product_id).is_none();
        self.enable(product_id)?;
        let Some(item) = self.item_mut(product_id) else {
            return Err(PackageError::UnknownProduct(product_id.to_string()));
        };
        if apply(&mut item.config, value) {
            return Ok(());
        }
        if added {
            self.disable(product_id);
        }
        Err(PackageError::Invalid(
            "This product is not priced that way.".into(),
        ))
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    /// Check every configured item against its floor.
    pub fn validate(&self) -> Result<(), PackageError> {
        for item in &self.items {
            let Some(product) = self.product(&item.catalog_product_id) else {
                continue;
            };
            if let Some((minimum, message)) = item.config.below_minimum(product, &self.minimums) {
                return Err(PackageError::BelowMinimum {
                    product: product.name.clone(),
                    minimum,
                    message,
                });
            }
        }
        Ok(())
    }

    /// Validate, seed the following step's defaults and advance.
    pub fn next(&mut self) -> Result<PackageStep, PackageError> {
        let Some(next) = self.step.next() else {
            return Ok(self.step);
        };
        self.validate()?;
        match self.step {
            PackageStep::Ecommerce => self.seed(ProductType::Acquiring),
            PackageStep::Acquiring => self.seed(ProductType::OtherFee),
            _ => {}
        }
        self.step = next;
        Ok(self.step)
    }

    pub fn back(&mut self) -> PackageStep {
        if let Some(prev) = self.step.previous() {
            self.step = prev;
        }
        self.step
    }

    /// Add every product of `kind` not yet in the package at its floor.
    fn seed(&mut self, kind: ProductType) {
        let base = self.items.len() as i64;
        let missing: Vec<WizardItem> = self
            .catalog
            .iter()
            .filter(|p| p.product_type == kind)
            .filter(|p| self.item(&p.id).is_none())
            .filter_map(|p| ItemConfig::seeded(p, &self.minimums).map(|c| (p.id.clone(), c)))
            .enumerate()
            .map(|(i, (id, config))| WizardItem {
                catalog_product_id: id,
                config,
                sort_order: base + i as i64,
            })
            .collect();
        if !missing.is_empty() {
            debug!(kind=%kind, count = missing.len(), "seeded default items");
        }
        self.items.extend(missing);
    }

    pub fn payload(&self) -> PackageInput {
        let description = self.description.trim();
        PackageInput {
            name: self.name.trim().to_string(),
            description: (!description.is_empty()).then(|| description.to_string()),
            items: self
                .items
                .iter()
                .map(|i| PackageItemInput {
                    catalog_product_id: i.catalog_product_id.clone(),
                    config: Some(i.config.to_json()),
                    sort_order: i.sort_order,
                })
                .collect(),
        }
    }

    /// Create or update the package and return its UID.
    #[instrument(skip_all)]
    pub async fn save(&self, store: &dyn PackageStore) -> Result<String, PackageError> {
        if self.name.trim().is_empty() {
            return Err(PackageError::Invalid("Package name is required.".into()));
        }
        self.validate()?;
        let body = self.payload();
        let saved = match &self.package_id {
            Some(id) => store.update(id, &body).await?,
            None => store.create(&body).await?,
        };
        info!(uid=%saved.uid, items = body.items.len(), "package saved");
        Ok(saved.uid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::model::{PackageItem, RateRecord};
    use serde_json::json;

    fn product(id: &str, code: &str, kind: ProductType) -> CatalogProduct {
        CatalogProduct {
            id: id.into(),
            product_type: kind,
            product_code: code.into(),
            name: code.replace('_', " "),
            config_schema: None,
            requires_store_epos: false,
        }
    }

    fn catalog() -> Vec<CatalogProduct> {
        vec![
            product("p1", "pax_a920_pro", ProductType::PhysicalPos),
            product("p2", "softpos", ProductType::PhysicalPos),
            product("e1", "payby_link", ProductType::Ecomm),
            product("a1", "debit", ProductType::Acquiring),
            product("a2", "credit", ProductType::Acquiring),
            product("o1", "auth_fee", ProductType::OtherFee),
        ]
    }

    #[test]
    fn enable_seeds_and_orders_items() {
        let mut w = PackageWizard::new(catalog(), default_rates());
        w.enable("p2").unwrap();
        w.enable("p1").unwrap();
        w.enable("p1").unwrap();
        assert_eq!(w.items().len(), 2);
        assert_eq!(w.item("p1").unwrap().sort_order, 1);
        w.disable("p2");
        assert!(w.item("p2").is_none());
        assert!(matches!(
            w.enable("missing"),
            Err(PackageError::UnknownProduct(_))
        ));
    }

    #[test]
    fn per_device_pricing_below_floor_blocks_next() {
        let mut w = PackageWizard::new(catalog(), FeeRates::new());
        w.enable("p1").unwrap();
        w.set_pos_pricing(
            "p1",
            PosPricing::PerDeviceService {
                device: 200.0,
                service: 5.0,
            },
        )
        .unwrap();
        let err = w.next().unwrap_err();
        match err {
            PackageError::BelowMinimum {
                product, minimum, ..
            } => {
                assert_eq!(product, "pax a920 pro");
                assert_eq!(minimum, 250.0);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(w.step(), PackageStep::PhysicalPos);
    }

    #[test]
    fn set_pct_rejects_wrong_product_type() {
        let mut w = PackageWizard::new(catalog(), FeeRates::new());
        assert!(w.set_pct("e1", 1.0).is_err());
        assert!(w.item("e1").is_none());
        w.set_amount("e1", 0.5).unwrap();
        assert_eq!(
            w.item("e1").unwrap().config,
            ItemConfig::Ecomm { amount: 0.5 }
        );
    }

    #[test]
    fn edit_restores_items_and_description() {
        let package = ProductPackage {
            id: "pkg-1".into(),
            partner_id: Some("partner-1".into()),
            uid: "PKG-ABC".into(),
            name: "Starter".into(),
            description: Some("Card machine".into()),
            items: vec![
                PackageItem {
                    id: "i2".into(),
                    catalog_product_id: "a2".into(),
                    product_code: Some("credit".into()),
                    product_name: None,
                    product_type: Some(ProductType::Acquiring),
                    config: json!({ "pct": 1.4 }).as_object().cloned(),
                    sort_order: 1,
                    requires_store_epos: false,
                },
                PackageItem {
                    id: "i1".into(),
                    catalog_product_id: "p1".into(),
                    product_code: None,
                    product_name: None,
                    product_type: None,
                    config: None,
                    sort_order: 0,
                    requires_store_epos: true,
                },
            ],
            created_at: None,
        };
        let mut rates = FeeRates::new();
        rates.insert(
            "credit".into(),
            RateRecord {
                min_pct: Some(1.3),
                ..Default::default()
            },
        );
        let w = PackageWizard::edit(catalog(), rates, &package);
        assert!(w.is_editing());
        assert_eq!(w.items()[0].catalog_product_id, "p1");
        assert_eq!(w.items()[1].config, ItemConfig::Acquiring { pct: 1.4 });
        assert_eq!(w.payload().description.as_deref(), Some("Card machine"));
    }
}
