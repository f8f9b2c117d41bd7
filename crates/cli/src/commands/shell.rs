//! Interactive storefront session.
//!
//! The session starts as a guest. The guest cart lives in an in-memory
//! session store that outlives page loads, so `navigate` keeps it and
//! `reload` wipes it, like a browser tab would.

#![allow(clippy::print_stdout)]

use std::io::Write;

use secrecy::SecretString;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::UnboundedReceiver;

use fresh_market_core::{CategoryId, DeliveryMethod, NavigationType, ProductId, UserId};
use fresh_market_storefront::backend::RestBackend;
use fresh_market_storefront::cart::CartService;
use fresh_market_storefront::error::AppError;
use fresh_market_storefront::models::Identity;
use fresh_market_storefront::notify::{ChannelNotifier, Toast};
use fresh_market_storefront::session::MemorySessionStore;
use fresh_market_storefront::state::AppState;

use super::catalog::ProductFilter;
use super::{CommandError, not_signed_in, output};

const HELP: &str = "\
Commands:
  categories                 list categories
  products [category]        list products
  featured                   list featured products
  bestsellers                list bestsellers
  add <product>              add one unit
  remove <product>           remove a product
  set <product> <quantity>   set a quantity (0 removes)
  clear                      empty the cart
  show                       print the cart
  sync                       re-read the cart from the backend
  login [user-id token]      sign in (defaults to the configured user)
  logout                     sign out
  navigate                   simulate in-app navigation
  reload                     simulate a hard page reload
  checkout [express]         place an order
  help                       show this help
  quit                       leave the shell";

type ShellCart = CartService<RestBackend, MemorySessionStore, ChannelNotifier>;

/// One page load: a cart engine and its toast feed.
struct Page {
    cart: ShellCart,
    toasts: UnboundedReceiver<Toast>,
}

impl Page {
    /// Start a page load, carrying the signed-in user over.
    async fn open(
        state: &AppState,
        store: &MemorySessionStore,
        navigation: NavigationType,
        identity: Option<Identity>,
    ) -> Self {
        let (notifier, toasts) = ChannelNotifier::new();
        let cart = state.cart_service(store.clone(), notifier);
        cart.mount(navigation).await;
        if identity.is_some() {
            cart.set_identity(identity).await;
        }
        Self { cart, toasts }
    }

    fn flush_toasts(&mut self) {
        while let Ok(toast) = self.toasts.try_recv() {
            output::toast(&toast);
        }
    }
}

/// Run the shell until `quit` or end of input.
pub async fn run(state: &AppState) -> Result<(), CommandError> {
    let store = MemorySessionStore::new();
    let mut page = Page::open(state, &store, NavigationType::Navigate, None).await;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("Fresh Market shell. Type `help` for commands.");
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let words: Vec<&str> = line.split_whitespace().collect();
        let Some((&command, args)) = words.split_first() else {
            continue;
        };

        match command {
            "quit" | "exit" => break,
            "help" => println!("{HELP}"),
            "navigate" | "reload" => {
                let navigation = if command == "reload" {
                    NavigationType::Reload
                } else {
                    NavigationType::Navigate
                };
                let identity = page.cart.identity();
                page = Page::open(state, &store, navigation, identity).await;
                output::cart(&page.cart.state());
            }
            _ => {
                if let Err(e) = execute(state, &page.cart, command, args).await {
                    println!("{e}");
                }
            }
        }
        page.flush_toasts();
    }

    Ok(())
}

async fn execute(
    state: &AppState,
    cart: &ShellCart,
    command: &str,
    args: &[&str],
) -> Result<(), CommandError> {
    match (command, args) {
        ("categories", []) => super::catalog::categories(state).await?,
        ("products", []) => {
            super::catalog::products(state, &ProductFilter::default()).await?;
        }
        ("products", [category]) => {
            let filter = ProductFilter::category(CategoryId::new(*category));
            super::catalog::products(state, &filter).await?;
        }
        ("featured", []) => {
            let filter = ProductFilter {
                featured: true,
                ..ProductFilter::default()
            };
            super::catalog::products(state, &filter).await?;
        }
        ("bestsellers", []) => {
            let filter = ProductFilter {
                bestsellers: true,
                ..ProductFilter::default()
            };
            super::catalog::products(state, &filter).await?;
        }
        ("add", [product]) => {
            super::cart::add(state, cart, &ProductId::new(*product)).await?;
        }
        ("remove", [product]) => cart.remove_from_cart(&ProductId::new(*product)).await,
        ("set", [product, quantity]) => {
            let quantity = quantity.parse::<i64>().map_err(|_| {
                AppError::BadRequest(format!("quantity must be a whole number, got `{quantity}`"))
            })?;
            cart.update_quantity(&ProductId::new(*product), quantity)
                .await;
        }
        ("clear", []) => cart.clear_cart().await,
        ("show" | "cart", []) => output::cart(&cart.state()),
        ("sync", []) => {
            cart.sync_cart().await;
            output::cart(&cart.state());
        }
        ("login", []) => {
            let identity = state
                .config()
                .identity
                .clone()
                .ok_or_else(not_signed_in)?;
            cart.set_identity(Some(identity)).await;
            output::cart(&cart.state());
        }
        ("login", [user_id, token]) => {
            let identity = Identity::new(
                UserId::new(*user_id),
                SecretString::from((*token).to_string()),
            );
            cart.set_identity(Some(identity)).await;
            output::cart(&cart.state());
        }
        ("logout", []) => {
            cart.set_identity(None).await;
            output::cart(&cart.state());
        }
        ("checkout", []) => {
            super::checkout::place_order(state, cart, DeliveryMethod::Standard).await?;
        }
        ("checkout", ["express"]) => {
            super::checkout::place_order(state, cart, DeliveryMethod::Express).await?;
        }
        _ => println!("Unknown command `{command}`. Type `help` for commands."),
    }
    Ok(())
}
