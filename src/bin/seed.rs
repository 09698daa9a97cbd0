use clap::{Parser, Subcommand};
use chrono::{Duration, Utc};
use fake::{
    faker::{
        address::en::{CityName, CountryName, PostCode, StreetName},
        company::en::CompanyName,
        internet::en::{SafeEmail, Username},
        lorem::en::Sentence,
        name::en::{FirstName, LastName},
        phone_number::en::PhoneNumber,
    },
    Fake,
};
use rand::{seq::SliceRandom, Rng};
use sqlx::sqlite::SqlitePoolOptions;

use refund_desk::{
    config::Settings,
    domain::{CreateUserRequest, NewRefundRequest, RefundInput, RefundStatus},
    repository::{
        RefundRepository, SqliteRefundRepository, SqliteUserRepository, UserRepository,
    },
    service::UserService,
};

/// IBANs with valid checksums, so seeded records look verified.
const SAMPLE_IBANS: &[&str] = &[
    "DE89370400440532013000",
    "GB29NWBK60161331926819",
    "FR1420041010050500013M02606",
    "NL91ABNA0417164300",
    "ES9121000418450200051332",
    "IT60X0542811101000000123456",
    "BE68539007547034",
    "AT611904300234573201",
];

const ACCOUNT_TYPES: &[&str] = &["Checking", "Savings", "Business"];

#[derive(Parser)]
#[command(name = "seed", about = "Seed the refund desk database")]
struct Cli {
    /// Overrides `database.url` from the configuration.
    #[arg(long)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a staff account, or promote an existing user to staff.
    CreateStaff {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        email: Option<String>,
    },
    /// Generate customers with fake refund requests.
    FakeData {
        #[arg(long, default_value_t = 5)]
        users: usize,
        #[arg(long, default_value_t = 3)]
        refunds_per_user: usize,
        /// Password given to every generated user.
        #[arg(long, default_value = "password123")]
        password: String,
    },
}

fn truncated(value: String, max: usize) -> String {
    value.chars().take(max).collect()
}

fn fake_refund() -> (RefundInput, RefundStatus) {
    let mut rng = rand::thread_rng();
    let first_name: String = FirstName().fake();
    let last_name: String = LastName().fake();
    let street: String = StreetName().fake();

    let input = RefundInput {
        order_number: format!("ORD-{:06}", rng.gen_range(1..1_000_000)),
        order_date: Utc::now().date_naive() - Duration::days(rng.gen_range(1..90)),
        email: SafeEmail().fake(),
        phone_number: truncated(PhoneNumber().fake(), 20),
        country: truncated(CountryName().fake(), 50),
        address: format!("{} {}", rng.gen_range(1..200), street),
        postal_code: truncated(PostCode().fake(), 20),
        city: truncated(CityName().fake(), 50),
        products: Sentence(2..5).fake(),
        reason: Sentence(5..12).fake(),
        bank_name: truncated(CompanyName().fake(), 200),
        account_type: ACCOUNT_TYPES.choose(&mut rng).unwrap_or(&"Checking").to_string(),
        iban: SAMPLE_IBANS.choose(&mut rng).unwrap_or(&SAMPLE_IBANS[0]).to_string(),
        first_name,
        last_name,
    };
    let status = *RefundStatus::ALL.choose(&mut rng).unwrap_or(&RefundStatus::Pending);

    (input, status)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let settings = Settings::new().unwrap_or_default();
    let database_url = cli.database_url.unwrap_or(settings.database.url);

    let db_pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;

    println!("Running migrations...");
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await?;

    let user_repo = std::sync::Arc::new(SqliteUserRepository::new(db_pool.clone()));
    let refund_repo = SqliteRefundRepository::new(db_pool.clone());

    match cli.command {
        Command::CreateStaff { username, password, email } => {
            let user = UserService::new(user_repo)
                .ensure_staff(&username, email, &password)
                .await?;
            println!("Staff user ready: {} ({})", user.username, user.id);
        }
        Command::FakeData { users, refunds_per_user, password } => {
            let mut created = 0;
            for _ in 0..users {
                let username: String = Username().fake();
                let suffix: u32 = rand::thread_rng().gen_range(10..100);
                let user = user_repo
                    .create(CreateUserRequest {
                        username: format!("{}{}", username, suffix),
                        email: Some(SafeEmail().fake()),
                        password: password.clone(),
                        is_staff: false,
                    })
                    .await?;

                for _ in 0..refunds_per_user {
                    let (input, status) = fake_refund();
                    let refund = refund_repo
                        .create(NewRefundRequest {
                            user_id: user.id,
                            input: input.clone(),
                            iban_verified: true,
                        })
                        .await?;
                    if status != RefundStatus::Pending {
                        refund_repo
                            .update_if_status(refund.id, &input, true, status, RefundStatus::Pending)
                            .await?;
                    }
                    created += 1;
                }
                println!("Created user {}", user.username);
            }
            println!("Created {} users with {} refund requests", users, created);
        }
    }

    Ok(())
}
