//! Back-office CLI
//!
//! Drives the auth core against the on-disk state file, one command per run.
//! The persisted principal and session carry over between invocations.

use anyhow::{Context, Result};
use backoffice_core::common::{AuthError, PrincipalId, ServiceRequestId};
use backoffice_core::config::Config;
use backoffice_core::domains::approvals::{
    ApprovalError, DecisionFilter, ServiceApplication, ServiceKind,
};
use backoffice_core::domains::audit::{AuditAction, AuditQuery};
use backoffice_core::domains::auth::{PermissionGrant, PermissionUpdate, Principal, Profile};
use backoffice_core::domains::currency::Currency;
use backoffice_core::kernel::{BackofficeDeps, BackofficeKernel};
use backoffice_core::server::{Access, Route};
use clap::{Parser, Subcommand, ValueEnum};
use dialoguer::Password;
use rust_decimal::Decimal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "backoffice")]
#[command(about = "AfriPay back-office auth core")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether a phone number already has an account
    VerifyPhone { phone: String },

    /// Send a one-time code to a phone number
    RequestOtp { phone: String },

    /// Log in with phone number and one-time code
    Login { phone: String, otp: String },

    /// Register a new neutral account
    Signup {
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long)]
        username: String,
        #[arg(long)]
        phone: String,
        #[arg(long)]
        email: Option<String>,
    },

    /// Log in as the admin
    AdminLogin {
        identifier: String,
        #[arg(long)]
        password: Option<String>,
    },

    /// Log in as the superAdmin
    SuperadminLogin {
        identifier: String,
        #[arg(long)]
        password: Option<String>,
    },

    /// End the current session
    Logout,

    /// Accept the terms of service
    AcceptTerms,

    /// Show the current principal and session
    Whoami,

    /// Check whether the current principal may enter a route
    Authorize { path: String },

    /// List provisioned users
    Users {
        /// Only users created by the current principal
        #[arg(long)]
        mine: bool,
    },

    /// Provision a new user (admin or superAdmin)
    CreateUser {
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long)]
        username: String,
        #[arg(long)]
        phone: String,
        #[arg(long)]
        email: Option<String>,
    },

    /// Promote a user to admin
    Promote {
        user_id: String,
        #[arg(long)]
        merchants: bool,
        #[arg(long)]
        agents: bool,
    },

    /// Change an admin's acceptance flags
    SetPermissions {
        admin_id: String,
        #[arg(long)]
        merchants: Option<bool>,
        #[arg(long)]
        agents: Option<bool>,
    },

    /// Delete a user
    DeleteUser { user_id: String },

    /// Apply for a merchant or agent account
    Apply {
        kind: ServiceKind,
        #[arg(long)]
        business_name: String,
        #[arg(long)]
        business_type: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        address: Option<String>,
        #[arg(long = "document")]
        documents: Vec<String>,
    },

    /// List service requests (reviewers), or your own with --mine
    Requests {
        #[arg(long, value_enum, default_value_t = StatusArg::All)]
        status: StatusArg,
        #[arg(long)]
        mine: bool,
    },

    /// Approve a pending service request
    Approve { request_id: String },

    /// Reject a pending service request
    Reject {
        request_id: String,
        #[arg(long)]
        reason: String,
    },

    /// Show the audit log, newest first
    Audit {
        #[arg(long, default_value_t = 20)]
        limit: usize,
        #[arg(long)]
        action: Option<String>,
    },

    /// Show notifications, newest first
    Notifications {
        /// Mark everything as read afterwards
        #[arg(long)]
        read: bool,
    },

    /// Convert an amount between currencies
    Convert {
        amount: Decimal,
        from: Currency,
        to: Currency,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum StatusArg {
    All,
    Pending,
    Approved,
    Rejected,
}

impl From<StatusArg> for DecisionFilter {
    fn from(status: StatusArg) -> Self {
        match status {
            StatusArg::All => DecisionFilter::All,
            StatusArg::Pending => DecisionFilter::Pending,
            StatusArg::Approved => DecisionFilter::Approved,
            StatusArg::Rejected => DecisionFilter::Rejected,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,backoffice_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    let cli = Cli::parse();

    let config = Config::from_env().context("Failed to load configuration")?;
    let deps = BackofficeDeps::from_config(&config)
        .await
        .context("Failed to open state store")?;
    let kernel = BackofficeKernel::new(deps);

    kernel
        .identity
        .restore()
        .await
        .context("Failed to restore session")?;

    if let Err(e) = run(&kernel, cli.command).await {
        match e.downcast_ref::<AuthError>() {
            Some(auth) => eprintln!("{}", auth.user_message()),
            None => match e.downcast_ref::<ApprovalError>() {
                Some(ApprovalError::Auth(auth)) => eprintln!("{}", auth.user_message()),
                Some(approval) => eprintln!("{}", approval),
                None => eprintln!("Error: {:#}", e),
            },
        }
        std::process::exit(1);
    }
    Ok(())
}

async fn run(kernel: &BackofficeKernel, command: Commands) -> Result<()> {
    let identity = &kernel.identity;

    match command {
        Commands::VerifyPhone { phone } => {
            let lookup = identity.verify_phone_exists(&phone).await;
            println!("{}", if lookup.exists { "exists" } else { "new" });
        }
        Commands::RequestOtp { phone } => {
            if !identity.request_otp(&phone).await {
                anyhow::bail!("OTP could not be sent");
            }
            println!("OTP sent");
        }
        Commands::Login { phone, otp } => {
            let principal = identity.login(&phone, &otp).await?;
            print_principal(&principal);
        }
        Commands::Signup {
            first_name,
            last_name,
            username,
            phone,
            email,
        } => {
            let principal = identity
                .signup(profile(first_name, last_name, username, phone, email))
                .await?;
            print_principal(&principal);
        }
        Commands::AdminLogin {
            identifier,
            password,
        } => {
            let password = password_or_prompt(password)?;
            let principal = identity.admin_login(&identifier, &password).await?;
            print_principal(&principal);
        }
        Commands::SuperadminLogin {
            identifier,
            password,
        } => {
            let password = password_or_prompt(password)?;
            let principal = identity.super_admin_login(&identifier, &password).await?;
            print_principal(&principal);
        }
        Commands::Logout => {
            identity.logout().await?;
            println!("Logged out");
        }
        Commands::AcceptTerms => match identity.accept_terms().await? {
            Some(principal) => print_principal(&principal),
            None => println!("Nobody is logged in"),
        },
        Commands::Whoami => match identity.current().await? {
            Some(principal) => {
                print_principal(&principal);
                println!("session: {:?}", identity.session_state().await?);
            }
            None => println!("Nobody is logged in"),
        },
        Commands::Authorize { path } => {
            let route = Route::parse(&path).with_context(|| format!("Unknown route: {}", path))?;
            match identity.enter_route(route).await? {
                Access::Allow => println!("allow {}", route),
                Access::RedirectTo(target) => println!("redirect {}", target),
            }
        }
        Commands::Users { mine } => {
            for user in identity.get_users(mine).await? {
                println!(
                    "{}  {:<10} {:<16} {}",
                    user.id,
                    user.role(),
                    user.username,
                    user.display_name()
                );
            }
        }
        Commands::CreateUser {
            first_name,
            last_name,
            username,
            phone,
            email,
        } => {
            let principal = identity
                .create_user(profile(first_name, last_name, username, phone, email))
                .await?;
            print_principal(&principal);
        }
        Commands::Promote {
            user_id,
            merchants,
            agents,
        } => {
            let granted = identity
                .promote_to_admin(
                    parse_principal_id(&user_id)?,
                    PermissionGrant {
                        can_accept_merchants: merchants,
                        can_accept_agents: agents,
                    },
                )
                .await?;
            println!("{}", if granted { "promoted" } else { "not permitted" });
        }
        Commands::SetPermissions {
            admin_id,
            merchants,
            agents,
        } => {
            let updated = identity
                .update_admin_permissions(
                    parse_principal_id(&admin_id)?,
                    PermissionUpdate {
                        can_accept_merchants: merchants,
                        can_accept_agents: agents,
                    },
                )
                .await?;
            println!("{}", if updated { "updated" } else { "not permitted" });
        }
        Commands::DeleteUser { user_id } => {
            let deleted = identity.delete_user(parse_principal_id(&user_id)?).await?;
            println!("{}", if deleted { "deleted" } else { "not permitted" });
        }
        Commands::Apply {
            kind,
            business_name,
            business_type,
            description,
            address,
            documents,
        } => {
            let application = ServiceApplication::builder()
                .kind(kind)
                .business_name(business_name)
                .business_type(business_type)
                .description(description)
                .document_links(documents);
            let application = match address {
                Some(address) => application.business_address(address).build(),
                None => application.build(),
            };
            let request = kernel.approvals.submit(application).await?;
            println!("submitted {}", request.id);
        }
        Commands::Requests { status, mine } => {
            let requests = if mine {
                kernel.approvals.mine().await?
            } else {
                kernel.approvals.list(status.into()).await?
            };
            for request in requests {
                println!(
                    "{}  {:<8} {:<9} {} ({})",
                    request.id,
                    request.kind,
                    request.decision.label(),
                    request.business_name,
                    request.requester_name
                );
            }
        }
        Commands::Approve { request_id } => {
            let request = kernel
                .approvals
                .approve(parse_request_id(&request_id)?)
                .await?;
            println!("approved {}", request.id);
        }
        Commands::Reject { request_id, reason } => {
            let request = kernel
                .approvals
                .reject(parse_request_id(&request_id)?, &reason)
                .await?;
            println!("rejected {}", request.id);
        }
        Commands::Audit { limit, action } => {
            let events = match action {
                Some(name) => {
                    let action = AuditAction::parse(&name)
                        .with_context(|| format!("Unknown audit action: {}", name))?;
                    let mut events = kernel
                        .audit
                        .query(&AuditQuery {
                            action: Some(action),
                            limit: Some(limit),
                            ..AuditQuery::default()
                        })
                        .await?;
                    events.reverse();
                    events
                }
                None => kernel.audit.recent(limit).await?,
            };
            for event in events {
                println!(
                    "#{:<5} {} {:<26} {:<16} {}",
                    event.sequence,
                    event.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    event.action,
                    event.username,
                    event.details
                );
            }
        }
        Commands::Notifications { read } => {
            for notification in kernel.notifications.list().await? {
                println!(
                    "{} [{:?}] {}: {}",
                    if notification.read { " " } else { "*" },
                    notification.kind,
                    notification.title,
                    notification.message
                );
            }
            if read {
                kernel.notifications.mark_all_as_read().await?;
            }
        }
        Commands::Convert { amount, from, to } => {
            let converted = Currency::convert(amount, from, to)
                .with_context(|| format!("{} {} is too large to convert to {}", amount, from, to))?;
            println!("{} = {}", from.format(amount), to.format(converted));
        }
    }
    Ok(())
}

fn profile(
    first_name: String,
    last_name: String,
    username: String,
    phone: String,
    email: Option<String>,
) -> Profile {
    match email {
        Some(email) => Profile::builder()
            .first_name(first_name)
            .last_name(last_name)
            .username(username)
            .phone_number(phone)
            .email(email)
            .build(),
        None => Profile::builder()
            .first_name(first_name)
            .last_name(last_name)
            .username(username)
            .phone_number(phone)
            .build(),
    }
}

fn password_or_prompt(password: Option<String>) -> Result<String> {
    match password {
        Some(password) => Ok(password),
        None => Password::new()
            .with_prompt("Password")
            .interact()
            .context("Failed to read password"),
    }
}

fn parse_principal_id(raw: &str) -> Result<PrincipalId> {
    PrincipalId::parse(raw).with_context(|| format!("Invalid user id: {}", raw))
}

fn parse_request_id(raw: &str) -> Result<ServiceRequestId> {
    ServiceRequestId::parse(raw).with_context(|| format!("Invalid request id: {}", raw))
}

fn print_principal(principal: &Principal) {
    println!(
        "{} ({}) role={} terms={}",
        principal.display_name(),
        principal.username,
        principal.role(),
        principal.accepted_terms
    );
    println!("id: {}", principal.id);
    if let Some(permissions) = principal.admin_permissions() {
        println!(
            "permissions: merchants={} agents={}",
            permissions.can_accept_merchants, permissions.can_accept_agents
        );
    }
}
