//! Storefront CLI
//!
//! Command-line front end for the storefront API.
//!
//! # Usage
//!
//! ```bash
//! # Sign in and remember the session between invocations
//! STOREFRONT_PASSWORD=... storefront login shopper@example.com --remember
//!
//! # Browse the catalogue
//! storefront products --search teapot --page 2
//!
//! # Work with the cart
//! storefront cart-add 42 --quantity 2
//! storefront cart
//! ```
//!
//! Every command prints the response envelope as JSON and exits non-zero
//! when the call failed.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use storefront_client::{ProductFilter, Storefront};
use storefront_core::PageQuery;
use tracing_subscriber::{EnvFilter, fmt};

mod session;

#[derive(Parser)]
#[command(name = "storefront")]
#[command(about = "Command-line client for the storefront API")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (defaults to config.toml in the platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Keep remembered credentials in the OS keyring instead of a file
    #[arg(long, global = true)]
    keyring: bool,

    /// File for remembered credentials (defaults to the platform data dir)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in (password from STOREFRONT_PASSWORD or stdin)
    Login {
        /// Account email
        email: String,

        /// Remember the session for later invocations
        #[arg(short, long)]
        remember: bool,
    },

    /// Sign out and forget stored credentials
    Logout,

    /// Show the signed-in user's profile
    Whoami,

    /// List products
    Products {
        /// Page number
        #[arg(short, long, default_value_t = 1)]
        page: u32,

        /// Search term
        #[arg(short, long)]
        search: Option<String>,

        /// Category slug
        #[arg(short, long)]
        category: Option<String>,
    },

    /// Show one product
    Product {
        /// Product slug
        slug: String,
    },

    /// List categories
    Categories,

    /// Show the cart
    Cart,

    /// Add a product to the cart
    CartAdd {
        /// Product id
        product_id: u64,

        /// Quantity to add
        #[arg(short, long, default_value_t = 1)]
        quantity: u32,
    },

    /// Show the wishlist
    Wishlist,

    /// List frequently asked questions
    Faq {
        /// FAQ category slug
        #[arg(short, long)]
        category: Option<String>,
    },

    /// List support tickets
    Tickets {
        /// Page number
        #[arg(short, long, default_value_t = 1)]
        page: u32,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = session::load_config(cli.config.as_deref())?;
    let credentials = session::open_credentials(cli.keyring, cli.store.clone())?;
    let shop = session::connect(config, credentials)?;

    let ok = run(&shop, cli.command).await?;
    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(shop: &Storefront, command: Commands) -> Result<bool> {
    let mut out = std::io::stdout().lock();
    match command {
        Commands::Login { email, remember } => {
            let password = session::read_password(
                std::env::var("STOREFRONT_PASSWORD").ok(),
                &mut std::io::stdin().lock(),
            )?;
            session::render(&shop.auth.login(&email, &password, remember).await, &mut out)
        }
        Commands::Logout => session::render(&shop.auth.logout().await, &mut out),
        Commands::Whoami => session::render(&shop.auth.profile().await, &mut out),
        Commands::Products {
            page,
            search,
            category,
        } => {
            let filter = ProductFilter {
                search,
                category,
                ..ProductFilter::default()
            };
            let query = PageQuery {
                page: page.max(1),
                ..PageQuery::default()
            };
            session::render(&shop.products.list(&filter, query).await, &mut out)
        }
        Commands::Product { slug } => session::render(&shop.products.detail(&slug).await, &mut out),
        Commands::Categories => session::render(&shop.categories.list().await, &mut out),
        Commands::Cart => session::render(&shop.cart.get().await, &mut out),
        Commands::CartAdd {
            product_id,
            quantity,
        } => session::render(&shop.cart.add(product_id, quantity).await, &mut out),
        Commands::Wishlist => session::render(&shop.wishlist.get().await, &mut out),
        Commands::Faq { category } => {
            session::render(&shop.faq.list(category.as_deref(), None).await, &mut out)
        }
        Commands::Tickets { page } => {
            let query = PageQuery {
                page: page.max(1),
                ..PageQuery::default()
            };
            session::render(&shop.tickets.list(query).await, &mut out)
        }
    }
}
