use anyhow::{anyhow, bail, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{error, info};

use path_boarding::api::model::{Credentials, DeviceDetail};
use path_boarding::api::{ApiClient, BoardingApi};
use path_boarding::config;
use path_boarding::dashboard::{AdminDashboard, DashboardError, InviteDraft, PartnerDashboard};
use path_boarding::lookup::AddressLookup;
use path_boarding::session::{Session, SessionKind, SessionStore};
use path_boarding::validate;
use path_boarding::wizard::{BoardingWizard, WizardOptions};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print an example config file
    ExampleConfig,
    /// Check a single field value
    Validate { kind: FieldKind, value: String },
    /// Resolve an invite token
    InviteInfo { token: String },
    /// Show where a merchant's boarding stands, by invite token or login
    Resume {
        token: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        password: Option<String>,
    },
    /// Look up addresses for a UK postcode
    AddressLookup { postcode: String },
    /// Platform admin commands
    #[command(subcommand)]
    Admin(AdminCommand),
    /// Partner admin commands
    #[command(subcommand)]
    Partner(PartnerCommand),
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum FieldKind {
    Email,
    Postcode,
    Dob,
    Phone,
    Name,
    Vat,
    Website,
    SortCode,
    AccountNumber,
    Iban,
}

#[derive(Debug, Subcommand)]
enum AdminCommand {
    Login {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },
    Logout,
    Users,
    Partners,
    FeeSchedules,
    Catalog,
    Packages { partner_id: String },
    DeletePartner { partner_id: String },
}

#[derive(Debug, Subcommand)]
enum PartnerCommand {
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    Logout,
    Me,
    Packages,
    /// Generate a boarding invite link
    Invite {
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        merchant_name: Option<String>,
        #[arg(long)]
        package_uid: Option<String>,
        /// `item_id;store name;store address;epos terminal`, once per device
        #[arg(long = "device", value_parser = parse_device)]
        devices: Vec<DeviceDetail>,
    },
}

fn parse_device(raw: &str) -> Result<DeviceDetail, String> {
    let parts: Vec<&str> = raw.split(';').map(str::trim).collect();
    let &[item, name, address, terminal] = parts.as_slice() else {
        return Err("expected item_id;store name;store address;epos terminal".into());
    };
    let some = |s: &str| (!s.is_empty()).then(|| s.to_string());
    Ok(DeviceDetail {
        package_item_id: item.to_string(),
        store_name: some(name),
        store_address: some(address),
        epos_terminal: some(terminal),
    })
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn check_field(kind: FieldKind, value: &str) -> Option<String> {
    let predicate = |ok: bool, message: &str| (!ok).then(|| message.to_string());
    match kind {
        FieldKind::Email => predicate(validate::is_valid_email(value), "Invalid email address."),
        FieldKind::Postcode => predicate(
            validate::is_valid_uk_postcode(value),
            "Invalid UK postcode.",
        ),
        FieldKind::Dob => validate::validate_date_of_birth(value),
        FieldKind::Phone => validate::validate_phone_number(value),
        FieldKind::Name => validate::validate_legal_name(value),
        FieldKind::Vat => validate::validate_vat_number(value),
        FieldKind::Website => validate::validate_website(value),
        FieldKind::SortCode => validate::validate_sort_code(value),
        FieldKind::AccountNumber => validate::validate_account_number(value),
        FieldKind::Iban => validate::validate_iban(value),
    }
}

/// Turn a dashboard error into a CLI error, pointing at login on logout.
fn dashboard_err(e: DashboardError, api_base: &str) -> anyhow::Error {
    match e {
        DashboardError::LoggedOut => anyhow!("not logged in; run the login command first"),
        DashboardError::Api(api) => anyhow!(api.user_message(api_base)),
        other => anyhow!(other),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    match &args.command {
        Command::ExampleConfig => {
            print!("{}", config::example());
            return Ok(());
        }
        Command::Validate { kind, value } => {
            return match check_field(*kind, value) {
                None => {
                    println!("ok");
                    Ok(())
                }
                Some(message) => bail!(message),
            };
        }
        _ => {}
    }

    let cfg = config::load(Some(args.config.as_path()))?;
    cfg.ensure_dirs()?;
    let client = ApiClient::from_config(&cfg)?;
    let api_base = client.base_url().to_string();
    let store = SessionStore::open(&cfg.database_url()).await?;

    let result = run(args.command, &cfg, client, store, &api_base).await;
    if let Err(err) = &result {
        error!(%err, "command failed");
    }
    result
}

async fn run(
    command: Command,
    cfg: &config::Config,
    client: ApiClient,
    store: SessionStore,
    api_base: &str,
) -> Result<()> {
    match command {
        Command::ExampleConfig | Command::Validate { .. } => {}
        Command::InviteInfo { token } => {
            let info = client
                .invite_info(&token)
                .await
                .map_err(|e| anyhow!(e.user_message(api_base)))?;
            print_json(&info)?;
            if let Some(logo) = info.logo_url(api_base) {
                println!("logo: {}", logo);
            }
        }
        Command::Resume {
            token,
            email,
            password,
        } => {
            let options = WizardOptions::from_config(cfg);
            let wizard = match (token, email, password) {
                (Some(token), _, _) => BoardingWizard::open(client, token, options)
                    .await
                    .map_err(|e| anyhow!(e.user_message(api_base)))?,
                (None, Some(email), Some(password)) => {
                    let credentials = Credentials { email, password };
                    let (wizard, access_token) =
                        BoardingWizard::sign_in(client, &credentials, options)
                            .await
                            .map_err(|e| anyhow!(e.user_message(api_base)))?;
                    let mut session = Session::restore(SessionKind::Merchant, store).await?;
                    session.login(access_token).await?;
                    wizard
                }
                _ => bail!("pass an invite token, or --email and --password"),
            };
            if let Some(invite) = wizard.invite() {
                println!("partner: {}", invite.partner.name);
            }
            println!("step: {}", wizard.step());
            println!("identity: {:?}", wizard.identity_state());
            if let Some(outcome) = wizard.bank_outcome() {
                println!("bank: {}", outcome.summary());
            }
        }
        Command::AddressLookup { postcode } => {
            let lookup = AddressLookup::new(client, cfg.lookup_debounce());
            let result = lookup
                .lookup(&postcode)
                .await
                .map_err(|e| anyhow!(e.user_message(api_base)))?;
            if let Some(found) = result {
                if let Some(message) = &found.message {
                    println!("{}", message);
                }
                for a in &found.addresses {
                    println!(
                        "{}, {}, {} {}",
                        a.address_line1, a.address_line2, a.town, a.postcode
                    );
                }
            }
        }
        Command::Admin(cmd) => {
            let session = Session::restore(SessionKind::Admin, store).await?;
            let mut dash = AdminDashboard::new(client, session);
            admin(&mut dash, cmd)
                .await
                .map_err(|e| dashboard_err(e, api_base))?;
        }
        Command::Partner(cmd) => {
            let session = Session::restore(SessionKind::Partner, store).await?;
            let mut dash = PartnerDashboard::new(client, session);
            partner(&mut dash, cmd)
                .await
                .map_err(|e| dashboard_err(e, api_base))?;
        }
    }
    Ok(())
}

async fn admin(
    dash: &mut AdminDashboard<ApiClient>,
    cmd: AdminCommand,
) -> Result<(), DashboardError> {
    match cmd {
        AdminCommand::Login { username, password } => {
            dash.login(&username, &password).await?;
            info!("logged in");
        }
        AdminCommand::Logout => dash.logout().await?,
        AdminCommand::Users => {
            for u in dash.load_admins().await? {
                println!("{}\t{}\t{}", u.id, u.username, u.created_at);
            }
        }
        AdminCommand::Partners => {
            for p in dash.load_partners().await? {
                println!(
                    "{}\t{}\t{}\t{}",
                    p.id,
                    p.name,
                    p.email,
                    if p.is_active { "active" } else { "inactive" }
                );
            }
        }
        AdminCommand::FeeSchedules => {
            for s in dash.load_fee_schedules().await? {
                println!("{}\t{}\t{} rates", s.id, s.name, s.rates.len());
            }
        }
        AdminCommand::Catalog => {
            for p in dash.product_catalog().await? {
                println!("{}\t{}\t{}\t{}", p.id, p.product_type, p.product_code, p.name);
            }
        }
        AdminCommand::Packages { partner_id } => {
            for p in dash.load_packages(&partner_id).await? {
                println!("{}\t{}\t{}\t{} items", p.id, p.uid, p.name, p.items.len());
            }
        }
        AdminCommand::DeletePartner { partner_id } => {
            dash.delete_partner(&partner_id).await?;
            println!("deleted {}", partner_id);
        }
    }
    Ok(())
}

async fn partner(
    dash: &mut PartnerDashboard<ApiClient>,
    cmd: PartnerCommand,
) -> Result<(), DashboardError> {
    match cmd {
        PartnerCommand::Login { email, password } => {
            dash.login(&email, &password).await?;
            info!("logged in");
        }
        PartnerCommand::Logout => dash.logout().await?,
        PartnerCommand::Me => {
            let me = dash.me().await?;
            println!("{}\t{}\t{}", me.id, me.name, me.email);
        }
        PartnerCommand::Packages => {
            for p in dash.load_packages().await? {
                println!("{}\t{}\t{}\t{} items", p.id, p.uid, p.name, p.items.len());
            }
        }
        PartnerCommand::Invite {
            email,
            merchant_name,
            package_uid,
            devices,
        } => {
            let invite = dash
                .generate_invite(InviteDraft {
                    email,
                    merchant_name,
                    package_uid,
                    device_details: devices,
                })
                .await?;
            println!("{}", invite.invite_url);
            println!("expires: {}", invite.expires_at);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_arg_needs_four_parts() {
        let d = parse_device("item-1;Main St;1 Main St, Leeds;EPOS-7").unwrap();
        assert_eq!(d.package_item_id, "item-1");
        assert_eq!(d.epos_terminal.as_deref(), Some("EPOS-7"));
        assert!(parse_device("item-1;Main St").is_err());
    }

    #[test]
    fn field_checks_dispatch() {
        assert_eq!(check_field(FieldKind::SortCode, "33-44-55"), None);
        assert!(check_field(FieldKind::Postcode, "12345").is_some());
    }
}
