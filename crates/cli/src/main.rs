//! Fresh Market CLI - browse the catalog, manage the cart and check out.
//!
//! # Usage
//!
//! ```bash
//! # List categories and products
//! fm-cli catalog categories
//! fm-cli catalog products --category fruit
//! fm-cli catalog products --featured
//!
//! # Manage the signed-in user's cart (FRESH_MARKET_USER_ID / FRESH_MARKET_ACCESS_TOKEN)
//! fm-cli cart show
//! fm-cli cart add <product-id>
//! fm-cli cart set <product-id> 3
//! fm-cli cart remove <product-id>
//! fm-cli cart clear
//!
//! # Place an order
//! fm-cli checkout --express
//!
//! # Interactive session, starting as a guest
//! fm-cli shell
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fresh_market_core::{CategoryId, DeliveryMethod, ProductId};
use fresh_market_storefront::config::StorefrontConfig;
use fresh_market_storefront::error::{AppError, capture};
use fresh_market_storefront::state::AppState;

mod commands;

#[derive(Parser)]
#[command(name = "fm-cli")]
#[command(author, version, about = "Fresh Market storefront CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Browse the product catalog
    Catalog {
        #[command(subcommand)]
        action: CatalogAction,
    },
    /// Manage the signed-in user's cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Place an order for the signed-in user's cart
    Checkout {
        /// Use express delivery
        #[arg(long)]
        express: bool,
    },
    /// Start an interactive session as a guest
    Shell,
}

#[derive(Subcommand)]
enum CatalogAction {
    /// List categories
    Categories,
    /// List in-stock products
    Products {
        /// Only products in this category
        #[arg(short, long)]
        category: Option<String>,
        /// Only featured products
        #[arg(long, conflicts_with = "bestsellers")]
        featured: bool,
        /// Only bestsellers
        #[arg(long)]
        bestsellers: bool,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// Print the cart
    Show,
    /// Re-read the cart from the backend
    Sync,
    /// Add one unit of a product
    Add { product_id: String },
    /// Remove a product
    Remove { product_id: String },
    /// Set a product's quantity (0 removes it)
    Set {
        product_id: String,
        #[arg(allow_negative_numbers = true)]
        quantity: i64,
    },
    /// Empty the cart
    Clear,
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &StorefrontConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR => sentry_tracing::EventFilter::Event,
        tracing::Level::WARN | tracing::Level::INFO => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Configuration is needed before Sentry, and Sentry before tracing
    let config = match StorefrontConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing_subscriber::fmt::init();
            tracing::error!("{}", AppError::from(e));
            std::process::exit(1);
        }
    };

    let _sentry_guard = init_sentry(&config);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "fresh_market_storefront=info,fresh_market_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    if let Err(e) = run(cli, config).await {
        if e.is_reportable() {
            capture("Command failed", &e);
        } else {
            tracing::error!("Command failed: {e}");
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: StorefrontConfig) -> Result<(), commands::CommandError> {
    let state = AppState::new(config)?;

    match cli.command {
        Commands::Catalog { action } => match action {
            CatalogAction::Categories => commands::catalog::categories(&state).await?,
            CatalogAction::Products {
                category,
                featured,
                bestsellers,
            } => {
                let filter = commands::catalog::ProductFilter {
                    category: category.map(CategoryId::new),
                    featured,
                    bestsellers,
                };
                commands::catalog::products(&state, &filter).await?;
            }
        },
        Commands::Cart { action } => {
            let cart = commands::cart::signed_in(&state).await?;
            match action {
                CartAction::Show => {}
                CartAction::Sync => cart.sync_cart().await,
                CartAction::Add { product_id } => {
                    commands::cart::add(&state, &cart, &ProductId::new(product_id)).await?;
                }
                CartAction::Remove { product_id } => {
                    cart.remove_from_cart(&ProductId::new(product_id)).await;
                }
                CartAction::Set {
                    product_id,
                    quantity,
                } => cart.update_quantity(&ProductId::new(product_id), quantity).await,
                CartAction::Clear => cart.clear_cart().await,
            }
            commands::output::cart(&cart.state());
        }
        Commands::Checkout { express } => {
            let cart = commands::cart::signed_in(&state).await?;
            let delivery = if express {
                DeliveryMethod::Express
            } else {
                DeliveryMethod::Standard
            };
            commands::checkout::place_order(&state, &cart, delivery).await?;
        }
        Commands::Shell => commands::shell::run(&state).await?,
    }
    Ok(())
}
