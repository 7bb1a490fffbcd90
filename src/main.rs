use anyhow::{bail, Context, Result};
use atm_bank::config::{DEFAULT_DATA_PATH, ENV_BACKEND, ENV_DATA, ENV_OPERATOR};
use atm_bank::{AccountKey, AtmSession, Backend, BankConfig, BankError, BankStore, Card, Operator, Tier};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "atm-bank", version)]
#[command(about = "Card + PIN bank store with an ATM session", long_about = None)]
struct Cli {
    /// Data file (CSV, or SQLite for .db/.sqlite/.sqlite3)
    #[arg(long, global = true, env = ENV_DATA, default_value = DEFAULT_DATA_PATH)]
    data: PathBuf,

    /// Storage backend (default: inferred from the data file extension)
    #[arg(long, global = true, env = ENV_BACKEND, value_enum)]
    backend: Option<Backend>,

    /// Operator role: banker or atm
    #[arg(long, global = true, env = ENV_OPERATOR, default_value = "banker")]
    operator: Operator,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account slot and bind its first card
    CreateAccount {
        #[arg(long)]
        id: String,
        #[arg(long = "type")]
        account_type: String,
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        balance: i64,
        #[arg(long, default_value = "Standard")]
        tier: Tier,
        #[arg(long)]
        card: String,
        #[arg(long)]
        pin: String,
    },
    /// Bind another card to an existing account slot
    AddCard {
        #[arg(long)]
        id: String,
        #[arg(long = "type")]
        account_type: String,
        #[arg(long)]
        card: String,
        #[arg(long)]
        pin: String,
    },
    /// List the accounts a card + PIN unlocks
    Verify {
        #[arg(long)]
        card: String,
        #[arg(long)]
        pin: String,
    },
    /// List every account
    Accounts {
        #[arg(long)]
        json: bool,
    },
    /// Run one ATM session: insert card, pick an account, transact, eject
    Atm {
        #[arg(long)]
        card: String,
        #[arg(long)]
        pin: String,
        /// Account to select (default: first account bound to the card)
        #[arg(long, requires = "account_type")]
        account_id: Option<String>,
        #[arg(long, requires = "account_id")]
        account_type: Option<String>,
        #[arg(long)]
        deposit: Option<i64>,
        #[arg(long)]
        withdraw: Option<i64>,
    },
    /// Create the demo accounts (existing ones are kept)
    Seed,
}

fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let mut config = BankConfig::new(cli.data).with_operator(cli.operator);
    if let Some(backend) = cli.backend {
        config = config.with_backend(backend);
    }

    let mut bank = config
        .open_bank()
        .with_context(|| format!("Failed to open bank data at {}", config.data_path.display()))?;

    match cli.command {
        Commands::CreateAccount { id, account_type, balance, tier, card, pin } => {
            bank.create_account(&id, &account_type, balance, tier, &card, &pin)
                .context("Failed to create account")?;
            println!("✓ Created {}/{} ({}, balance {})", id, account_type, tier, balance);
        }
        Commands::AddCard { id, account_type, card, pin } => {
            bank.add_card_to_account(&id, &account_type, &card, &pin)
                .context("Failed to link card")?;
            println!("✓ Linked card {} to {}/{}", atm_bank::mask_card_number(&card), id, account_type);
        }
        Commands::Verify { card, pin } => {
            let found = bank.verify_card_pin(&card, &pin);
            if found.is_empty() {
                println!("No accounts accessible with this card + PIN");
            }
            for key in found {
                println!("{}", key);
            }
        }
        Commands::Accounts { json } => print_accounts(&bank, json)?,
        Commands::Atm { card, pin, account_id, account_type, deposit, withdraw } => {
            let selection = account_id.zip(account_type).map(|(id, ty)| AccountKey::new(id, ty));
            run_atm(&bank, Card::new(card, pin), selection, deposit, withdraw)?;
        }
        Commands::Seed => seed(&mut bank)?,
    }

    Ok(())
}

/// Initializes the tracing subscriber (logs go to stderr).
///
/// `RUST_LOG` overrides the default `info,atm_bank=debug`.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,atm_bank=debug"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_accounts(bank: &BankStore, json: bool) -> Result<()> {
    let accounts = bank.accounts();
    if json {
        println!("{}", serde_json::to_string_pretty(&accounts)?);
        return Ok(());
    }

    println!("{:<20} {:<12} {:>12} {:<10} {:>10} {:>6}", "ACCOUNT", "TYPE", "BALANCE", "TIER", "OVERDRAFT", "CARDS");
    for a in &accounts {
        println!(
            "{:<20} {:<12} {:>12} {:<10} {:>10} {:>6}",
            a.key.account_id, a.key.account_type, a.balance, a.tier.as_str(), a.overdraft_limit, a.card_count
        );
    }
    println!("{} account(s)", accounts.len());
    Ok(())
}

fn run_atm(
    bank: &BankStore,
    card: Card,
    selection: Option<AccountKey>,
    deposit: Option<i64>,
    withdraw: Option<i64>,
) -> Result<()> {
    let mut atm = AtmSession::new(bank);

    if !atm.insert_card(card) {
        atm.end_session();
        bail!("Failed to authenticate");
    }

    let key = match selection.or_else(|| atm.accessible_accounts().into_iter().next()) {
        Some(key) => key,
        None => {
            atm.end_session();
            bail!("No accounts are linked to this card");
        }
    };

    // Transact, then always eject and flush whatever succeeded
    let outcome = transact(&mut atm, &key, deposit, withdraw);
    atm.end_session();
    bank.save_all().context("Failed to save balances")?;
    outcome
}

fn transact(
    atm: &mut AtmSession<'_>,
    key: &AccountKey,
    deposit: Option<i64>,
    withdraw: Option<i64>,
) -> Result<()> {
    atm.choose_account(key)
        .with_context(|| format!("Cannot select account {}", key))?;
    println!("Account {} balance: {}", key, atm.current_balance()?);

    if let Some(amount) = deposit {
        let balance = atm.make_deposit(amount).context("Deposit failed")?;
        println!("Deposited {}. New balance: {}", amount, balance);
    }
    if let Some(amount) = withdraw {
        let balance = atm.make_withdrawal(amount).context("Withdrawal failed")?;
        println!("Withdrew {}. Remaining balance: {}", amount, balance);
    }
    Ok(())
}

fn seed(bank: &mut BankStore) -> Result<()> {
    let accounts = [
        ("customer-100", "Checking", 1500, Tier::Gold, "1111-2222-3333-4444", "1234"),
        ("customer-100", "Saving", 3000, Tier::Gold, "5555-6666-7777-8888", "4321"),
    ];
    for (id, account_type, balance, tier, card, pin) in accounts {
        match bank.create_account(id, account_type, balance, tier, card, pin) {
            Ok(()) => println!("✓ Created {}/{}", id, account_type),
            Err(BankError::DuplicateAccount(key)) => println!("Note: {} already exists", key),
            Err(e) => return Err(e).context("Failed to seed account"),
        }
    }

    let extra_cards = [
        ("customer-100", "Checking", "9999-0000-1111-2222", "1234"),
        ("customer-100", "Saving", "8888-7777-6666-5555", "4321"),
    ];
    for (id, account_type, card, pin) in extra_cards {
        bank.add_card_to_account(id, account_type, card, pin)
            .context("Failed to link card")?;
    }

    println!("✓ Seeded {} account(s)", bank.len());
    Ok(())
}
