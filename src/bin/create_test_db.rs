use std::error::Error;
use std::path::Path;
use std::process::exit;

use clap::Parser;
use rusqlite::Connection;
use time::{Duration, OffsetDateTime};

use finance_tracker::{
    BudgetData, NewUser, PasswordHash, TransactionData, TransactionType, ValidatedPassword,
    create_budget, create_transaction, create_user, initialize_db, seed_default_categories,
};

/// A utility for creating a test database for the finance tracker server.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to save the SQLite database to.
    #[arg(long, short)]
    output_path: String,

    /// The email of the demo user.
    #[arg(long, default_value = "demo@example.com")]
    email: String,

    /// The password of the demo user.
    #[arg(long, default_value = "Password123")]
    password: String,
}

/// Create and populate a database for manual testing.
fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let output_path = Path::new(&args.output_path);

    match output_path.extension() {
        None => {
            eprintln!("Output path must include a file extension (e.g., 'my_database.db').");
            exit(1);
        }
        Some(extension) if extension.is_empty() => {
            eprintln!("Output path must include a file extension (e.g., 'my_database.db').");
            exit(1);
        }
        _ => {}
    }

    if output_path.is_file() {
        eprintln!("File already exists at {output_path:#?}!");
        exit(1);
    }

    println!("Creating database at {output_path:#?}");
    let conn = Connection::open(output_path)?;

    initialize_db(&conn)?;

    println!("Creating test user...");

    let password_hash = PasswordHash::new(
        ValidatedPassword::new(&args.password)?,
        PasswordHash::DEFAULT_COST,
    )?;
    let user = create_user(
        NewUser {
            email: args.email.clone(),
            password_hash,
            first_name: "Demo".to_owned(),
            last_name: "User".to_owned(),
        },
        &conn,
    )?;
    let categories = seed_default_categories(user.id, &conn)?;
    let category_id = |name: &str| {
        categories
            .iter()
            .find(|category| category.name == name)
            .map(|category| category.id)
            .ok_or_else(|| format!("missing default category {name}"))
    };

    println!("Creating budgets...");

    let today = OffsetDateTime::now_utc().date();
    for (name, amount) in [
        ("Food & Dining", 600.0),
        ("Transportation", 200.0),
        ("Entertainment", 150.0),
        ("Bills & Utilities", 1800.0),
    ] {
        create_budget(
            user.id,
            &BudgetData {
                amount,
                category_id: category_id(name)?,
                month: u8::from(today.month()),
                year: today.year(),
            },
            &conn,
        )?;
    }

    println!("Creating transactions...");

    let expenses = [
        ("Food & Dining", "Groceries", 84.2),
        ("Food & Dining", "Pizza night", 32.5),
        ("Transportation", "Fuel", 71.0),
        ("Entertainment", "Cinema tickets", 28.0),
        ("Bills & Utilities", "Rent", 1650.0),
        ("Bills & Utilities", "Power bill", 112.35),
        ("Shopping", "Running shoes", 149.99),
        ("Healthcare", "Pharmacy", 18.6),
    ];
    let mut transaction_count = 0;

    // Six months of history, one salary and a round of expenses per month.
    for months_back in 0..6 {
        let month_day = today - Duration::days(30 * months_back);

        create_transaction(
            user.id,
            &TransactionData {
                amount: 5200.0,
                description: "Salary".to_owned(),
                date: month_day,
                transaction_type: TransactionType::Income,
                category_id: category_id("Salary")?,
            },
            &conn,
        )?;
        transaction_count += 1;

        for (offset, (name, description, amount)) in expenses.iter().enumerate() {
            let date = month_day - Duration::days(offset as i64 * 3);

            create_transaction(
                user.id,
                &TransactionData {
                    amount: *amount,
                    description: (*description).to_owned(),
                    date,
                    transaction_type: TransactionType::Expense,
                    category_id: category_id(name)?,
                },
                &conn,
            )?;
            transaction_count += 1;
        }
    }

    println!(
        "Success! Log in as {} with the password {} ({transaction_count} transactions).",
        user.email, args.password
    );

    Ok(())
}
