//! # Seed Data Generator
//!
//! Populates a fresh database with a demo shop for development.
//!
//! ## Usage
//! ```bash
//! # Seed ./shopdesk_dev.db with 200 products (default)
//! cargo run -p shopdesk-db --bin seed
//!
//! # Custom amount and path
//! cargo run -p shopdesk-db --bin seed -- --count 1000 --db ./data/shopdesk.db
//! ```
//!
//! ## Generated Data
//! - Site admin `admin`, shop admin `demo` and cashier `demo-till`
//! - Products across five categories with stock and reorder levels
//! - Two customers, one with a credit limit
//! - A storefront for `demo` with a handful of web products
//!
//! The user ids are printed at the end; pass one to `issue-token` to get a
//! bearer token for the API.

use std::env;

use shopdesk_core::Actor;
use shopdesk_db::{
    Database, DbConfig, NewCustomer, NewProduct, NewShopProduct, NewUser, StorefrontSetup,
};

/// Product categories for realistic test data
const CATEGORIES: &[(&str, &[&str])] = &[
    ("BEV", &["Cola", "Orange Soda", "Still Water", "Sparkling Water", "Mango Juice", "Iced Tea"]),
    ("SNK", &["Salted Crisps", "Peanuts", "Chocolate Bar", "Biscuits", "Popcorn"]),
    ("DRY", &["Milk", "Yoghurt", "Butter", "Cheddar"]),
    ("GRO", &["Rice", "Maize Flour", "Sugar", "Cooking Oil", "Pasta", "Beans"]),
    ("HOM", &["Soap", "Detergent", "Matches", "Candles"]),
];

/// Pack variants and their price add-on in cents
const SIZES: &[(&str, i64)] = &[("Single", 0), ("Medium", 120), ("Large", 250), ("6-Pack", 480)];

fn user(username: &str, full_name: &str, shop_name: Option<&str>) -> NewUser {
    NewUser {
        username: username.to_string(),
        full_name: full_name.to_string(),
        shop_name: shop_name.map(str::to_string),
        shop_admin_id: None,
    }
}

async fn actor(db: &Database, user_id: &str) -> Result<Actor, Box<dyn std::error::Error>> {
    db.users()
        .actor_for(user_id)
        .await?
        .ok_or_else(|| format!("user {} vanished while seeding", user_id).into())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut count: usize = 200;
    let mut db_path = String::from("./shopdesk_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(200);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("shopdesk Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of products to generate (default: 200)");
                println!("  -d, --db <PATH>    Database file path (default: ./shopdesk_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 shopdesk Seed Data Generator");
    println!("===============================");
    println!("Database: {}", db_path);
    println!("Products: {}", count);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users").fetch_one(db.pool()).await?;
    if existing > 0 {
        println!("⚠ Database already has {} users", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    // Users
    let users = db.users();
    let admin = users.create_site_admin(user("admin", "Site Administrator", None)).await?;
    let admin_actor = actor(&db, &admin.id).await?;
    let shop = users
        .create_shop_admin(&admin_actor, user("demo", "Demo Owner", Some("Demo Corner Store")))
        .await?;
    let shop_actor = actor(&db, &shop.id).await?;
    let till = users.create_cashier(&shop_actor, user("demo-till", "Demo Cashier", None)).await?;
    println!("✓ Created users");

    // Products
    println!();
    println!("Generating products...");
    let start = std::time::Instant::now();
    let mut generated = 0;

    'outer: for (category_idx, (code, names)) in CATEGORIES.iter().enumerate() {
        for (name_idx, name) in names.iter().enumerate() {
            for (size_idx, (size, addon)) in SIZES.iter().enumerate() {
                if generated >= count {
                    break 'outer;
                }
                let seed = category_idx * 1000 + name_idx * 20 + size_idx;
                let product = generate_product(code, name, size, *addon, seed);
                let sku = product.sku.clone();

                if let Err(e) = db.products().create(&shop_actor, product).await {
                    eprintln!("Failed to insert {}: {}", sku, e);
                    continue;
                }
                generated += 1;

                if generated % 50 == 0 {
                    println!("  Generated {} products...", generated);
                }
            }
        }
    }

    let elapsed = start.elapsed();
    println!("✓ Generated {} products in {:?}", generated, elapsed);

    // Customers
    let customers = db.customers();
    customers
        .create(
            &shop_actor,
            NewCustomer {
                name: "Walk-in Regular".to_string(),
                phone: Some("0700 111 222".to_string()),
                ..Default::default()
            },
        )
        .await?;
    customers
        .create(
            &shop_actor,
            NewCustomer {
                name: "Hillside Canteen".to_string(),
                email: Some("orders@hillside.test".to_string()),
                credit_limit_cents: 50_000,
                ..Default::default()
            },
        )
        .await?;
    println!("✓ Created customers");

    // Storefront
    let storefront = db.storefront();
    let profile = storefront
        .setup(
            &shop_actor,
            StorefrontSetup {
                business_name: "Demo Corner Store".to_string(),
                city: Some("Springfield".to_string()),
                ..StorefrontSetup::default()
            },
        )
        .await?;
    for (idx, (name, price)) in [("Enamel Mug", 1_200), ("Tote Bag", 900), ("Gift Hamper", 4_500)]
        .iter()
        .enumerate()
    {
        storefront
            .create_product(
                &shop_actor,
                NewShopProduct {
                    name: name.to_string(),
                    price_cents: *price,
                    original_price_cents: (idx == 0).then_some(1_500),
                    is_featured: idx == 2,
                    is_available: true,
                    stock_quantity: 10 + idx as i64 * 5,
                    ..Default::default()
                },
            )
            .await?;
    }
    println!("✓ Storefront live at /shop/{}", profile.slug);

    println!();
    println!("User ids (for issue-token):");
    println!("  admin      {}", admin.id);
    println!("  demo       {}", shop.id);
    println!("  demo-till  {}", till.id);
    println!();
    println!("✓ Seed complete!");

    Ok(())
}

/// Generates a single product with deterministic pseudo-random values.
fn generate_product(category: &str, name: &str, size: &str, price_addon: i64, seed: usize) -> NewProduct {
    let prefix: String = name.chars().filter(|c| c.is_ascii_alphabetic()).take(3).collect();
    let sku = format!("{}-{}-{:03}", category, prefix.to_uppercase(), seed % 1000);

    // Base price 0.99 - 8.99 plus the size add-on
    let base_price = 99 + ((seed * 37) % 800) as i64;
    let selling_price_cents = base_price + price_addon;

    // Cost is 60-80% of price
    let cost_pct = 60 + (seed % 20) as i64;

    NewProduct {
        tenant_id: None,
        sku,
        barcode: Some(format!("590{:010}", seed)),
        name: format!("{} {}", name, size),
        description: None,
        category: Some(category.to_string()),
        cost_price_cents: selling_price_cents * cost_pct / 100,
        selling_price_cents,
        initial_quantity: (seed % 101) as i64,
        reorder_level: Some(10),
        max_stock: Some(200),
        location: None,
    }
}
