//! Fee floors and per-item pricing configs.
//!
//! A floor is looked up in the partner's fee schedule first, then in the
//! catalog product's config schema, then falls back to a fixed default.
use serde_json::{json, Map, Value};
use std::collections::HashMap;

use crate::api::model::{CatalogProduct, FeeRates, ProductType, RateRecord};

pub const SOFTPOS_CODE: &str = "softpos";
pub const PAYBY_LINK_CODE: &str = "payby_link";

const FALLBACK_PER_MONTH: f64 = 20.0;
const FALLBACK_SOFTPOS_PER_MONTH: f64 = 10.0;
const FALLBACK_PER_DEVICE: f64 = 250.0;
const FALLBACK_SERVICE: f64 = 5.0;
const FALLBACK_ECOMM_AMOUNT: f64 = 0.2;

/// Rates a new fee schedule starts from.
pub fn default_rates() -> FeeRates {
    let pos = |per_month: f64, device: Option<f64>, service: Option<f64>| RateRecord {
        min_per_month: Some(per_month),
        min_per_device: device,
        min_service: service,
        ..Default::default()
    };
    let pct = |v: f64| RateRecord {
        min_pct: Some(v),
        ..Default::default()
    };
    let amount = |v: f64| RateRecord {
        min_amount: Some(v),
        ..Default::default()
    };
    [
        ("pax_a920_pro", pos(20.0, Some(250.0), Some(5.0))),
        ("verifone_p400", pos(20.0, Some(250.0), Some(5.0))),
        (SOFTPOS_CODE, pos(10.0, None, None)),
        (PAYBY_LINK_CODE, amount(0.2)),
        ("virtual_terminal", amount(0.2)),
        ("debit", pct(0.8)),
        ("credit", pct(1.3)),
        ("premium", pct(0.5)),
        ("cross_border", pct(0.6)),
        ("cnp", pct(0.4)),
        ("auth_fee", amount(0.01)),
        ("refund_fee", amount(0.05)),
        ("three_d_secure_fee", amount(0.03)),
    ]
    .into_iter()
    .map(|(code, rate)| (code.to_string(), rate))
    .collect()
}

/// Effective floors for every product in a catalog.
#[derive(Debug, Clone, Default)]
pub struct Minimums {
    rates: FeeRates,
    schema: HashMap<String, Map<String, Value>>,
}

impl Minimums {
    pub fn new(rates: FeeRates, catalog: &[CatalogProduct]) -> Self {
        let schema = catalog
            .iter()
            .filter_map(|p| {
                p.config_schema
                    .as_ref()
                    .map(|s| (p.product_code.clone(), s.clone()))
            })
            .collect();
        Self { rates, schema }
    }

    fn lookup(&self, code: &str, key: &str, from_rate: fn(&RateRecord) -> Option<f64>) -> Option<f64> {
        self.rates
            .get(code)
            .and_then(from_rate)
            .or_else(|| self.schema.get(code)?.get(key)?.as_f64())
    }

    pub fn pct(&self, code: &str) -> f64 {
        self.lookup(code, "min_pct", |r| r.min_pct).unwrap_or(0.0)
    }

    pub fn amount(&self, code: &str) -> f64 {
        self.lookup(code, "min_amount", |r| r.min_amount)
            .unwrap_or(0.0)
    }

    /// Ecommerce fees never drop below 20p, even when the floor is unset or zero.
    pub fn ecomm_amount(&self, code: &str) -> f64 {
        let min = self.amount(code);
        if min > 0.0 {
            min
        } else {
            FALLBACK_ECOMM_AMOUNT
        }
    }

    pub fn per_month(&self, code: &str) -> f64 {
        self.lookup(code, "min_per_month", |r| r.min_per_month)
            .unwrap_or(if code == SOFTPOS_CODE {
                FALLBACK_SOFTPOS_PER_MONTH
            } else {
                FALLBACK_PER_MONTH
            })
    }

    pub fn per_device(&self, code: &str) -> f64 {
        self.lookup(code, "min_per_device", |r| r.min_per_device)
            .unwrap_or(FALLBACK_PER_DEVICE)
    }

    pub fn service(&self, code: &str) -> f64 {
        self.lookup(code, "min_service", |r| r.min_service)
            .unwrap_or(FALLBACK_SERVICE)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PosPricingType {
    PerMonth,
    PerDeviceService,
}

impl PosPricingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PosPricingType::PerMonth => "per_month",
            PosPricingType::PerDeviceService => "per_device_service",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "per_month" => Some(PosPricingType::PerMonth),
            "per_device_service" => Some(PosPricingType::PerDeviceService),
            _ => None,
        }
    }
}

/// Pricing choice for a physical POS item.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PosPricing {
    PerMonth { price: f64 },
    PerDeviceService { device: f64, service: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PosConfig {
    pub pricing_type: PosPricingType,
    pub price_per_month: Option<f64>,
    pub price_per_device: Option<f64>,
    pub monthly_service: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ItemConfig {
    Pos(PosConfig),
    Ecomm { amount: f64 },
    Acquiring { pct: f64 },
    OtherFee { amount: f64 },
}

impl ItemConfig {
    /// Config a product starts with when it is switched on.
    pub fn seeded(product: &CatalogProduct, mins: &Minimums) -> Option<Self> {
        let code = product.product_code.as_str();
        let config = match product.product_type {
            ProductType::PhysicalPos => {
                let softpos = code == SOFTPOS_CODE;
                ItemConfig::Pos(PosConfig {
                    pricing_type: PosPricingType::PerMonth,
                    price_per_month: Some(mins.per_month(code)),
                    price_per_device: (!softpos).then(|| mins.per_device(code)),
                    monthly_service: (!softpos).then(|| mins.service(code)),
                })
            }
            ProductType::Ecomm => ItemConfig::Ecomm {
                amount: mins.ecomm_amount(code),
            },
            ProductType::Acquiring => ItemConfig::Acquiring {
                pct: mins.pct(code),
            },
            ProductType::OtherFee => ItemConfig::OtherFee {
                amount: mins.amount(code),
            },
            ProductType::Other(_) => return None,
        };
        Some(config)
    }

    pub fn to_json(&self) -> Map<String, Value> {
        let value = match self {
            ItemConfig::Pos(pos) => {
                let mut m = json!({
                    "enabled": true,
                    "pos_pricing_type": pos.pricing_type.as_str(),
                });
                let fields = [
                    ("pos_price_per_month", pos.price_per_month),
                    ("pos_price_per_device", pos.price_per_device),
                    ("pos_monthly_service", pos.monthly_service),
                ];
                for (key, v) in fields {
                    if let Some(v) = v {
                        m[key] = json!(v);
                    }
                }
                m
            }
            ItemConfig::Ecomm { amount } => json!({ "enabled": true, "amount": amount }),
            ItemConfig::Acquiring { pct } => json!({ "pct": pct }),
            ItemConfig::OtherFee { amount } => json!({ "amount": amount }),
        };
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    /// Read a stored config. Missing numbers fall back to the product's
    /// seeded values.
    pub fn from_json(
        product: &CatalogProduct,
        config: Option<&Map<String, Value>>,
        mins: &Minimums,
    ) -> Option<Self> {
        let seeded = Self::seeded(product, mins)?;
        let Some(cfg) = config else {
            return Some(seeded);
        };
        let num = |key: &str| cfg.get(key).and_then(Value::as_f64);
        let parsed = match seeded {
            ItemConfig::Pos(default) => ItemConfig::Pos(PosConfig {
                pricing_type: cfg
                    .get("pos_pricing_type")
                    .and_then(Value::as_str)
                    .and_then(PosPricingType::parse)
                    .unwrap_or(default.pricing_type),
                price_per_month: num("pos_price_per_month"),
                price_per_device: num("pos_price_per_device"),
                monthly_service: num("pos_monthly_service"),
            }),
            ItemConfig::Ecomm { amount } => ItemConfig::Ecomm {
                amount: num("amount").unwrap_or(amount),
            },
            ItemConfig::Acquiring { pct } => ItemConfig::Acquiring {
                pct: num("pct").unwrap_or(pct),
            },
            ItemConfig::OtherFee { amount } => ItemConfig::OtherFee {
                amount: num("amount").unwrap_or(amount),
            },
        };
        Some(parsed)
    }

    /// First field below its floor, as a message naming the product.
    pub fn below_minimum(&self, product: &CatalogProduct, mins: &Minimums) -> Option<(f64, String)> {
        let code = product.product_code.as_str();
        let name = product.name.as_str();
        match self {
            ItemConfig::Pos(pos) => match pos.pricing_type {
                PosPricingType::PerMonth => {
                    let min = mins.per_month(code);
                    if pos.price_per_month.unwrap_or(min) < min {
                        return Some((
                            min,
                            format!("{}: Price per month must be at least £{}.", name, min),
                        ));
                    }
                }
                PosPricingType::PerDeviceService => {
                    let min_device = mins.per_device(code);
                    let min_service = mins.service(code);
                    if pos.price_per_device.unwrap_or(min_device) < min_device {
                        return Some((
                            min_device,
                            format!("{}: Price per device must be at least £{}.", name, min_device),
                        ));
                    }
                    if pos.monthly_service.unwrap_or(min_service) < min_service {
                        return Some((
                            min_service,
                            format!("{}: Monthly service must be at least £{}.", name, min_service),
                        ));
                    }
                }
            },
            ItemConfig::Ecomm { amount } => {
                let min = mins.ecomm_amount(code);
                if *amount < min {
                    let unit = if code == PAYBY_LINK_CODE { "link" } else { "QR code" };
                    return Some((
                        min,
                        format!("{}: Fee must be at least £{:.2} per {}.", name, min, unit),
                    ));
                }
            }
            ItemConfig::Acquiring { pct } => {
                let min = mins.pct(code);
                if *pct < min {
                    return Some((min, format!("{}: Rate must be at least {}%.", name, min)));
                }
            }
            ItemConfig::OtherFee { amount } => {
                let min = mins.amount(code);
                if *amount < min {
                    return Some((min, format!("{}: Fee must be at least £{:.2}.", name, min)));
                }
            }
        }
        None
    }
}
