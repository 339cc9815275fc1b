//! Seeds a Duka database with an admin account, the sample catalog and a
//! handful of demo customers.
//!
//! ```bash
//! seed --database-url sqlite://duka.db --admin-email admin@duka.local --customers 5
//! ```

use clap::Parser;
use duka::{
    domain::{CreateProductRequest, CreateUserRequest, Role},
    repository::{
        ProductRepository, SqliteProductRepository,
        SqliteUserRepository, UserRepository,
    },
};
use fake::{
    faker::internet::en::{SafeEmail, Username},
    Fake,
};
use rand::Rng;
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;

#[derive(Parser)]
#[command(name = "seed")]
#[command(author, version, about = "Seed a Duka database with sample data")]
struct Args {
    /// SQLite database URL
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://duka.db")]
    database_url: String,

    /// Admin account email
    #[arg(long, env = "DUKA_ADMIN_EMAIL", default_value = "admin@duka.local")]
    admin_email: String,

    /// Admin account username
    #[arg(long, default_value = "admin")]
    admin_username: String,

    /// Admin account password
    #[arg(long, env = "DUKA_ADMIN_PASSWORD", default_value = "admin123")]
    admin_password: String,

    /// Number of demo customers to create
    #[arg(long, default_value_t = 5)]
    customers: usize,

    /// Skip the sample catalog
    #[arg(long)]
    no_products: bool,
}

/// (name, description, price, category, quantity, image)
const SAMPLE_PRODUCTS: &[(&str, &str, i64, &str, i64, &str)] = &[
    ("Pump", "High-efficiency pump", 150, "Pumps", 100, "/Productimg/pump.png"),
    ("Pipe", "Durable PVC pipe", 50, "Pipes", 200, "/Productimg/pipe.jpg"),
    ("Frit Blender", "Industrial frit blender", 300, "Blenders", 50, "/Productimg/fritblender.jpg"),
    ("Light", "LED light bulb", 10, "Lighting", 500, "/Productimg/light.jpg"),
    ("Mixer", "High-speed mixer", 120, "Kitchen", 75, "/Productimg/mixer.jpg"),
    ("Refrigerator", "Energy-efficient refrigerator", 800, "Appliances", 30, "/Productimg/refrigerator.jpg"),
    ("Washing Machine", "Front-load washing machine", 600, "Appliances", 25, "/Productimg/washingmachine.jpg"),
    ("Air Conditioner", "Split AC unit", 400, "Cooling", 20, "/Productimg/ac.jpg"),
    ("Heater", "Electric heater", 100, "Heating", 40, "/Productimg/heater.jpg"),
    ("Fan", "Ceiling fan", 75, "Cooling", 60, "/Productimg/fan.jpg"),
    ("Toaster", "2-slice toaster", 30, "Kitchen", 80, "/Productimg/toaster.jpg"),
    ("Blender", "Smoothie blender", 50, "Kitchen", 90, "/Productimg/blender.jpg"),
    ("Coffee Maker", "Automatic coffee maker", 70, "Kitchen", 55, "/Productimg/coffeemaker.jpg"),
    ("Vacuum Cleaner", "Cordless vacuum cleaner", 150, "Cleaning", 35, "/Productimg/vacuum.jpg"),
    ("Iron", "Steam iron", 40, "Cleaning", 45, "/Productimg/iron.jpg"),
    ("Pressure Cooker", "Stainless steel pressure cooker", 60, "Kitchen", 50, "/Productimg/pressurecooker.jpg"),
    ("Rice Cooker", "Electric rice cooker", 40, "Kitchen", 70, "/Productimg/ricecooker.jpg"),
    ("Dishwasher", "Energy-efficient dishwasher", 700, "Appliances", 15, "/Productimg/dishwasher.jpg"),
    ("Oven", "Convection oven", 300, "Kitchen", 20, "/Productimg/oven.jpg"),
    ("Grill", "Electric grill", 100, "Kitchen", 30, "/Productimg/grill.jpg"),
    ("Food Processor", "Multi-functional food processor", 150, "Kitchen", 25, "/Productimg/foodprocessor.jpg"),
    ("Bar", "High-quality bar", 20, "Bars", 20, "/Productimg/bar.jpg"),
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    println!("🌱 Starting database seeding...");

    // Initialize database connection
    let options = SqliteConnectOptions::from_str(&args.database_url)?
        .create_if_missing(true)
        .foreign_keys(true);
    let db_pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    // Run migrations first
    println!("📋 Running migrations...");
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await?;

    let user_repo = SqliteUserRepository::new(db_pool.clone());
    let product_repo = SqliteProductRepository::new(db_pool.clone());

    // Admin account
    println!("👤 Creating admin...");
    let admin_email = args.admin_email.trim().to_lowercase();
    match user_repo.find_by_email(&admin_email).await? {
        Some(existing) if existing.role == Role::Admin => {
            println!("  ⏭️  Admin {} already exists", admin_email);
        }
        Some(existing) => {
            user_repo.update_role(existing.id, Role::Admin).await?;
            println!("  ⬆️  Promoted {} to admin", admin_email);
        }
        None => {
            user_repo.create(CreateUserRequest {
                username: args.admin_username.clone(),
                email: admin_email.clone(),
                password: args.admin_password.clone(),
                phone_number: None,
                role: Role::Admin,
            }).await?;
            println!("  ✅ Created admin user ({})", admin_email);
        }
    }

    // Catalog
    if args.no_products {
        println!("⏭️  Skipping sample catalog");
    } else if !product_repo.list().await?.is_empty() {
        println!("⏭️  Catalog already has products; skipping");
    } else {
        println!("📦 Creating products...");
        for (name, description, price, category, quantity, image_url) in SAMPLE_PRODUCTS {
            product_repo.create(CreateProductRequest {
                name: name.to_string(),
                price: Decimal::from(*price),
                description: Some(description.to_string()),
                category: Some(category.to_string()),
                image_url: Some(image_url.to_string()),
                quantity: Some(*quantity),
                total_stock: Some(*quantity),
            }).await?;
        }
        println!("  ✅ Created {} products", SAMPLE_PRODUCTS.len());
    }

    // Demo customers
    println!("👥 Creating {} demo customers...", args.customers);
    let mut created = 0;
    for _ in 0..args.customers {
        let username: String = Username().fake();
        let email: String = SafeEmail().fake();
        let phone = format!("07{:08}", rand::thread_rng().gen_range(0..100_000_000u32));

        let result = user_repo.create(CreateUserRequest {
            username,
            email: email.to_lowercase(),
            password: "password123".to_string(),
            phone_number: Some(format!("254{}", &phone[1..])),
            role: Role::Customer,
        }).await;

        match result {
            Ok(user) => {
                created += 1;
                println!("  ✅ {} <{}>", user.username, user.email);
            }
            // Faker collisions on username/email
            Err(e) if e.is_unique_violation() => continue,
            Err(e) => return Err(e.into()),
        }
    }
    println!("  ✅ Created {} customers (password: password123)", created);

    println!("🎉 Seeding complete!");
    Ok(())
}
