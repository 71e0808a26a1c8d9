//! Shopfront CLI - browse, fill the cart and check out from a terminal.
//!
//! # Usage
//!
//! ```bash
//! # Log in (the session persists in SHOPFRONT_SESSION_FILE)
//! shopfront login alice --password hunter2
//!
//! # Browse and fill the cart
//! shopfront products
//! shopfront cart add 12 --quantity 2
//! shopfront cart update 12 0        # removes the line
//!
//! # Check out and pay from the wallet
//! shopfront checkout --name "Alice Liddell" --address "1 Rabbit Hole" --city Oxford --postal-code OX1
//! shopfront orders
//! shopfront pay 34
//!
//! # Staff dashboards
//! shopfront dashboard sales --from 2024-01-01 --to 2024-03-31
//! ```
//!
//! # Environment Variables
//!
//! See `shopfront_client::config` for the full list; `SHOPFRONT_API_URL` is
//! required. `RUST_LOG` overrides the log filter.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rust_decimal::Decimal;
use shopfront_client::api::ProductDraft;
use shopfront_client::{ClientConfig, Shop};
use shopfront_core::CategoryId;

mod commands;

#[derive(Parser)]
#[command(name = "shopfront")]
#[command(author, version, about = "Shopfront storefront client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and remember the session
    Login {
        username: String,

        #[arg(short, long, env = "SHOPFRONT_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account
    Register {
        username: String,

        #[arg(short, long)]
        email: String,

        #[arg(short, long, env = "SHOPFRONT_PASSWORD", hide_env_values = true)]
        password: String,

        #[arg(long, default_value = "")]
        first_name: String,

        #[arg(long, default_value = "")]
        last_name: String,
    },
    /// Forget the session
    Logout,
    /// Show who is logged in
    Whoami,
    /// List products
    Products {
        /// Include inactive and out-of-stock products
        #[arg(long)]
        all: bool,

        /// Show the category tree instead
        #[arg(long)]
        categories: bool,
    },
    /// Manage products (staff)
    Product {
        #[command(subcommand)]
        action: ProductAction,
    },
    /// Show or change the cart
    Cart {
        #[command(subcommand)]
        action: Option<CartAction>,
    },
    /// Place an order for the cart contents
    Checkout {
        #[arg(long)]
        name: String,

        #[arg(long)]
        address: String,

        #[arg(long)]
        city: String,

        #[arg(long)]
        postal_code: String,

        /// Pay immediately from the wallet
        #[arg(long)]
        pay_now: bool,
    },
    /// List orders with their invoices
    Orders,
    /// Pay an invoice from the wallet
    Pay {
        /// Invoice id
        invoice: String,
    },
    /// Staff dashboards
    Dashboard {
        #[command(subcommand)]
        view: DashboardView,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// Show the cart (default)
    Show,
    /// Add a product
    Add {
        product: String,

        #[arg(short, long, default_value_t = 1)]
        quantity: u32,
    },
    /// Set a line's quantity; zero or less removes it
    Update {
        product: String,

        #[arg(allow_hyphen_values = true)]
        quantity: i64,
    },
    /// Remove a product
    Remove { product: String },
}

#[derive(Subcommand)]
enum ProductAction {
    /// Add a product
    Create {
        #[arg(long)]
        name: String,

        #[arg(long, default_value = "")]
        description: String,

        /// Unit price, e.g. `12.50`
        #[arg(long)]
        price: Decimal,

        #[arg(long)]
        stock: Option<u32>,

        /// Category id
        #[arg(long)]
        category: Option<String>,
    },
    /// Change a product's fields; unset flags keep their current value
    Edit {
        product: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        price: Option<Decimal>,

        #[arg(long)]
        stock: Option<u32>,

        #[arg(long)]
        category: Option<String>,
    },
    /// Remove a product
    Delete { product: String },
    /// Set the stock level
    Stock { product: String, stock: u32 },
    /// Show the product in the storefront
    Enable { product: String },
    /// Hide the product from the storefront
    Disable { product: String },
}

#[derive(Subcommand)]
enum DashboardView {
    /// Shipment counts and recent shipments
    Shipments,
    /// Sales analytics
    Sales {
        /// First day, `YYYY-MM-DD`
        #[arg(long)]
        from: Option<String>,

        /// Last day, `YYYY-MM-DD`
        #[arg(long)]
        to: Option<String>,
    },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &ClientConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    Some(guard)
}

/// Errors and warnings become Sentry events; info and debug become
/// breadcrumbs.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = ClientConfig::from_env();
    let sentry_guard = config.as_ref().ok().and_then(init_sentry);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "shopfront_client=info,shopfront_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let result = match config {
        Ok(config) => run(cli, &config).await,
        Err(e) => Err(e.into()),
    };

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        drop(sentry_guard);
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: &ClientConfig) -> Result<(), Box<dyn std::error::Error>> {
    let shop = Shop::from_config(config)?;

    match cli.command {
        Commands::Login { username, password } => {
            commands::auth::login(&shop, &username, &password).await?;
        }
        Commands::Register {
            username,
            email,
            password,
            first_name,
            last_name,
        } => {
            commands::auth::register(&shop, username, email, password, first_name, last_name)
                .await?;
        }
        Commands::Logout => commands::auth::logout(&shop)?,
        Commands::Whoami => commands::auth::whoami(&shop).await?,
        Commands::Products { all, categories } => {
            if categories {
                commands::catalog::categories(&shop).await?;
            } else {
                commands::catalog::products(&shop, all).await?;
            }
        }
        Commands::Product { action } => match action {
            ProductAction::Create {
                name,
                description,
                price,
                stock,
                category,
            } => {
                let mut draft = ProductDraft::new(&name, &description, price);
                draft.stock = stock;
                draft.category = category.map(CategoryId::new);
                commands::catalog::create(&shop, &draft).await?;
            }
            ProductAction::Edit {
                product,
                name,
                description,
                price,
                stock,
                category,
            } => {
                let changes = commands::catalog::ProductChanges {
                    name,
                    description,
                    price,
                    stock,
                    category: category.map(CategoryId::new),
                };
                commands::catalog::edit(&shop, &product, changes).await?;
            }
            ProductAction::Delete { product } => {
                commands::catalog::delete(&shop, &product).await?;
            }
            ProductAction::Stock { product, stock } => {
                commands::catalog::set_stock(&shop, &product, stock).await?;
            }
            ProductAction::Enable { product } => {
                commands::catalog::set_active(&shop, &product, true).await?;
            }
            ProductAction::Disable { product } => {
                commands::catalog::set_active(&shop, &product, false).await?;
            }
        },
        Commands::Cart { action } => match action.unwrap_or(CartAction::Show) {
            CartAction::Show => commands::cart::show(&shop).await?,
            CartAction::Add { product, quantity } => {
                commands::cart::add(&shop, &product, quantity).await?;
            }
            CartAction::Update { product, quantity } => {
                commands::cart::update(&shop, &product, quantity).await?;
            }
            CartAction::Remove { product } => commands::cart::remove(&shop, &product).await?,
        },
        Commands::Checkout {
            name,
            address,
            city,
            postal_code,
            pay_now,
        } => {
            let shipping = shopfront_client::api::ShippingInfo {
                full_name: name,
                address,
                city,
                postal_code,
            };
            commands::cart::checkout(&shop, &shipping, pay_now).await?;
        }
        Commands::Orders => commands::orders::list(&shop).await?,
        Commands::Pay { invoice } => commands::orders::pay(&shop, &invoice).await?,
        Commands::Dashboard { view } => match view {
            DashboardView::Shipments => commands::dashboard::shipments(&shop).await?,
            DashboardView::Sales { from, to } => {
                commands::dashboard::sales(&shop, from, to).await?;
            }
        },
    }
    Ok(())
}
