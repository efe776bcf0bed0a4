//! Tripledger - a daily trip profit tracker for independent vehicle
//! operators.
//!
//! This binary provides a plain interactive front-end over the core
//! library: passwordless/OTP authentication against the hosted identity
//! provider, then daily entry recording and vehicle setup against the
//! local stores.

use std::io::{self, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::Local;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tripledger_core::api::IdentityClient;
use tripledger_core::auth::{
    AuthContext, AuthFlow, AuthMode, AuthPhase, CredentialStore, OtpPurpose, VerifyFlow,
};
use tripledger_core::calc::daily_breakdown;
use tripledger_core::config::Config;
use tripledger_core::models::DailyEntry;
use tripledger_core::store::{EntryStore, VehicleStore};
use tripledger_core::utils::format_currency;

// ============================================================================
// Constants
// ============================================================================

/// How long to wait for the auth context to reflect a fresh session after
/// a successful sign-in or verification.
const SESSION_SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g. RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

fn prompt(label: &str) -> Result<String> {
    print!("{label}");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();
    init_tracing();
    info!("tripledger starting");

    let mut config = Config::load()?;
    let auth_url = config
        .auth_url
        .clone()
        .context("Auth endpoint not configured. Set TRIPLEDGER_AUTH_URL or edit the config file.")?;
    let auth_key = config
        .auth_key
        .clone()
        .context("Auth key not configured. Set TRIPLEDGER_AUTH_KEY or edit the config file.")?;
    let data_dir = config.data_dir()?;

    let client = Arc::new(IdentityClient::new(&auth_url, &auth_key, data_dir.clone())?);
    let ctx = AuthContext::init(Arc::clone(&client));

    // Wait out the session bootstrap before reading `user`
    let mut rx = ctx.watch();
    while rx.borrow().loading {
        rx.changed().await?;
    }

    if !ctx.is_authenticated() {
        run_auth(&client, &ctx, &mut config).await?;
    }

    let Some(user) = ctx.user() else {
        println!("Not signed in. Bye.");
        return Ok(());
    };
    println!(
        "\nSigned in as {}",
        user.full_name.as_deref().unwrap_or(&user.email)
    );

    run_dashboard(&ctx, &data_dir).await?;

    info!("tripledger shutting down");
    Ok(())
}

/// Wait briefly for the change listener to reflect a new session.
async fn session_settled(ctx: &AuthContext<IdentityClient>) -> bool {
    let deadline = Instant::now() + SESSION_SETTLE_TIMEOUT;
    let mut rx = ctx.watch();
    loop {
        if ctx.is_authenticated() {
            return true;
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return false;
        }
        match tokio::time::timeout(remaining, rx.changed()).await {
            Ok(Ok(())) => {}
            // Timed out or the listener went away
            Ok(Err(_)) | Err(_) => return ctx.is_authenticated(),
        }
    }
}

/// Advance the flow's per-second cooldown timer by however much wall time
/// passed while the user sat at a prompt.
fn catch_up_ticks(flow: &mut AuthFlow<IdentityClient>, last_tick: &mut Instant) {
    let elapsed = last_tick.elapsed().as_secs();
    for _ in 0..elapsed {
        flow.tick();
    }
    if elapsed > 0 {
        *last_tick = Instant::now();
    }
}

fn show_notices(flow: &AuthFlow<IdentityClient>) {
    if let Some(info) = flow.info() {
        println!("  {info}");
    }
    if let Some(error) = flow.error() {
        println!("  !! {error}");
    }
}

async fn run_auth(
    client: &Arc<IdentityClient>,
    ctx: &AuthContext<IdentityClient>,
    config: &mut Config,
) -> Result<()> {
    let mut flow = AuthFlow::new(Arc::clone(client));
    let mut email = config.last_email.clone().unwrap_or_default();
    let mut last_tick = Instant::now();

    loop {
        if ctx.is_authenticated() {
            return Ok(());
        }
        catch_up_ticks(&mut flow, &mut last_tick);

        match flow.phase() {
            AuthPhase::Idle => {
                let title = match flow.mode() {
                    AuthMode::SignIn => "Sign in",
                    AuthMode::SignUp => "Create account",
                };
                println!("\n== {title} ==");
                show_notices(&flow);

                let suffix = if email.is_empty() {
                    String::new()
                } else {
                    format!(" [{email}]")
                };
                let input = prompt(&format!(
                    "Email{suffix} (or 'switch' mode, 'otp' sign-in, 'quit'): "
                ))?;
                match input.as_str() {
                    "quit" => return Ok(()),
                    "switch" => {
                        flow.switch_mode();
                        continue;
                    }
                    "otp" => {
                        if email.is_empty() {
                            email = prompt("Email: ")?;
                        }
                        flow.resend(&email).await;
                        last_tick = Instant::now();
                        continue;
                    }
                    "" => {}
                    other => email = other.to_string(),
                }

                match flow.mode() {
                    AuthMode::SignIn => {
                        let password = saved_or_prompted_password(&email)?;
                        flow.submit(&email, &password).await;
                        if session_settled(ctx).await {
                            remember_login(config, &email, &password);
                        }
                    }
                    AuthMode::SignUp => {
                        let full_name = prompt("Full name: ")?;
                        let password = rpassword::prompt_password("Password: ")?;
                        flow.sign_up(&full_name, &email, &password).await;
                    }
                }
                last_tick = Instant::now();
            }

            AuthPhase::AwaitingOtp { cooldown } => {
                println!("\n== Confirm your email ==");
                show_notices(&flow);
                if cooldown > 0 {
                    println!("  (resend available in {cooldown}s)");
                }

                let choice =
                    prompt("[c]ode entry, [r]esend, [s]ession check, [b]ack, [q]uit: ")?;
                catch_up_ticks(&mut flow, &mut last_tick);
                match choice.as_str() {
                    "c" => {
                        let purpose = match flow.mode() {
                            AuthMode::SignUp => OtpPurpose::Signup,
                            AuthMode::SignIn => OtpPurpose::Login,
                        };
                        if verify_code(client, ctx, &email, purpose).await? {
                            return Ok(());
                        }
                    }
                    "r" => {
                        flow.resend(&email).await;
                        last_tick = Instant::now();
                    }
                    "s" => {
                        if flow.check_session().await {
                            println!("  {}", flow.info().unwrap_or_default());
                            session_settled(ctx).await;
                            return Ok(());
                        }
                    }
                    "b" => flow.reset(),
                    "q" => return Ok(()),
                    _ => {}
                }
            }

            // The prompt loop never observes an in-flight phase; both are
            // awaited to completion above.
            AuthPhase::Submitting | AuthPhase::CheckingSession { .. } => {
                flow.reset();
            }
        }
    }
}

fn saved_or_prompted_password(email: &str) -> Result<String> {
    if CredentialStore::has_credentials(email) {
        let use_saved = prompt("Use saved password? [Y/n]: ")?;
        if use_saved.is_empty() || use_saved.eq_ignore_ascii_case("y") {
            match CredentialStore::get_password(email) {
                Ok(password) => return Ok(password),
                Err(e) => warn!(error = %e, "Failed to read saved password"),
            }
        }
    }
    Ok(rpassword::prompt_password("Password: ")?)
}

fn remember_login(config: &mut Config, email: &str, password: &str) {
    if let Err(e) = CredentialStore::store(email, password) {
        warn!(error = %e, "Failed to store credentials");
    }
    config.last_email = Some(email.to_string());
    if let Err(e) = config.save() {
        warn!(error = %e, "Failed to save config");
    }
}

async fn verify_code(
    client: &Arc<IdentityClient>,
    ctx: &AuthContext<IdentityClient>,
    email: &str,
    purpose: OtpPurpose,
) -> Result<bool> {
    let mut verify = VerifyFlow::new(Arc::clone(client), email, purpose);
    loop {
        let code = prompt("6-digit code (blank to cancel): ")?;
        if code.is_empty() {
            return Ok(false);
        }
        verify.input.clear();
        for (i, c) in code.chars().take(6).enumerate() {
            verify.input.set_digit(i, c);
        }
        if verify.submit().await {
            // The change listener reflects the session; we only wait.
            session_settled(ctx).await;
            return Ok(true);
        }
        if let Some(error) = verify.error() {
            println!("  !! {error}");
        }
    }
}

// ============================================================================
// Dashboard
// ============================================================================

async fn run_dashboard(ctx: &AuthContext<IdentityClient>, data_dir: &std::path::Path) -> Result<()> {
    let entries = EntryStore::new(data_dir.to_path_buf())?;
    let vehicle = VehicleStore::new(data_dir.to_path_buf())?;

    loop {
        let choice = prompt(
            "\n[1] record day  [2] entries  [3] vehicle setup  [4] sign out  [q] quit: ",
        )?;
        match choice.as_str() {
            "1" => record_day(&entries, &vehicle)?,
            "2" => list_entries(&entries)?,
            "3" => vehicle_setup(&vehicle)?,
            "4" => {
                ctx.sign_out().await?;
                println!("Signed out.");
                return Ok(());
            }
            "q" => return Ok(()),
            _ => {}
        }
    }
}

/// Parse a strictly positive number, rejecting zero and garbage.
fn parse_positive(input: &str) -> Option<f64> {
    match input.trim().parse::<f64>() {
        Ok(v) if v > 0.0 && v.is_finite() => Some(v),
        _ => None,
    }
}

/// Optional whole-rupee amount; blank, zero or unparseable means none.
fn parse_extra_expenses(input: &str) -> Option<i64> {
    parse_positive(input).map(|v| v.round() as i64)
}

fn record_day(entries: &EntryStore, vehicle: &VehicleStore) -> Result<()> {
    let Some(kms) = parse_positive(&prompt("Kms driven today: ")?) else {
        println!("  !! Please enter kilometers traveled (number > 0)");
        return Ok(());
    };
    let extra_expenses = parse_extra_expenses(&prompt("Other expenses (optional): ")?);
    let notes = prompt("Notes (optional): ")?;
    let notes = if notes.is_empty() { None } else { Some(notes) };

    let settings = vehicle.load()?;
    let breakdown = daily_breakdown(kms, &settings);
    let date = Local::now().format("%d %b %Y").to_string();
    let entry = DailyEntry::from_breakdown(date, breakdown, extra_expenses, notes);

    println!("  income: {}", format_currency(entry.income));
    println!("  fuel:   {}", format_currency(entry.fuel_cost));
    println!(
        "  fixed:  {}",
        format_currency(entry.fixed_expenses_per_day)
    );
    if let Some(extra) = entry.extra_expenses {
        println!("  extra:  {}", format_currency(extra));
    }
    println!("  profit: {}", format_currency(entry.profit));

    entries.save_entry(entry)?;
    println!("  saved.");
    Ok(())
}

fn list_entries(entries: &EntryStore) -> Result<()> {
    let all = entries.all_entries()?;
    if all.is_empty() {
        println!("  no entries yet");
        return Ok(());
    }
    for entry in all {
        println!(
            "  {}  {:>4} km  income {}  profit {}",
            entry.date,
            entry.kms,
            format_currency(entry.income),
            format_currency(entry.profit)
        );
    }
    Ok(())
}

/// Whether a new value may replace a vehicle setting. Mileage and the
/// per-km rate divide or scale the daily figures, so zero is rejected
/// there; the monthly cost fields may legitimately be zero.
fn valid_setting(value: f64, must_be_positive: bool) -> bool {
    if !value.is_finite() {
        return false;
    }
    if must_be_positive {
        value > 0.0
    } else {
        value >= 0.0
    }
}

fn vehicle_setup(vehicle: &VehicleStore) -> Result<()> {
    let mut settings = vehicle.load()?;
    println!("Blank keeps the current value.");

    let fields: [(&str, &mut f64, bool); 6] = [
        ("Mileage (km/l)", &mut settings.mileage_kmpl, true),
        ("Rate per km", &mut settings.rate_per_km, true),
        ("Fuel price per litre", &mut settings.fuel_price, true),
        ("Monthly EMI", &mut settings.emi, false),
        ("Monthly driver salary", &mut settings.driver_salary, false),
        ("Monthly maintenance", &mut settings.maintenance, false),
    ];
    for (label, value, must_be_positive) in fields {
        let input = prompt(&format!("{label} [{value}]: "))?;
        if input.is_empty() {
            continue;
        }
        match input.parse::<f64>() {
            Ok(parsed) if valid_setting(parsed, must_be_positive) => *value = parsed,
            _ => println!(
                "  !! keeping {value}; value must be {}",
                if must_be_positive { "> 0" } else { ">= 0" }
            ),
        }
    }

    let settings = settings;
    vehicle.save(&settings)?;
    println!("  saved.");
    Ok(())
}
