// fooddash command-line shell.
// Drives the dashboard flows (auth, menu, routing) from the terminal.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::debug;

use fooddash::api::FoodsResponse;
use fooddash::config::Config;
use fooddash::forms::{LoginForm, OtpForm, RegisterForm};
use fooddash::hooks::{Hooks, keys};
use fooddash::routes::{Page, Resolution, resolve_with};
use fooddash::{Result, logging};

#[derive(Parser, Debug)]
#[command(name = "fooddash", version, about = "Food ordering dashboard client", long_about = None)]
struct Cli {
    /// API base URL, e.g. <http://localhost:3000/api>
    #[arg(long, global = true, env = "FOODDASH_API_URL")]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Sign in and store the returned token
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "FOODDASH_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "FOODDASH_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Confirm the one-time password sent after registration
    VerifyOtp {
        #[arg(long)]
        email: String,
        #[arg(long)]
        otp: String,
    },
    /// List the menu
    Foods,
    /// Forget the stored token and cached data
    Logout,
    /// Show what navigating to a path renders
    Route { path: String },
    /// Show configuration and sign-in state
    Status,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::from_env()?;
    if let Some(url) = cli.api_url.as_deref() {
        config = config.with_api_base_url(url)?;
    }
    logging::init(&config.log_filter, config.log_format)?;
    debug!(api = %config.api_base_url, storage = %config.storage_path.display(), "configuration loaded");

    let hooks = Hooks::from_config(&config)?;

    match cli.command {
        Commands::Login { email, password } => {
            let request = LoginForm { email, password }.validate()?;
            let response = hooks.login(&request).await?;
            println!("{}", response.message.as_deref().unwrap_or("Signed in"));
        }
        Commands::Register {
            name,
            email,
            password,
        } => {
            let request = RegisterForm {
                name,
                email,
                password,
            }
            .validate()?;
            let response = hooks.register(&request).await?;
            let fallback = if response.token.is_some() {
                "Account created"
            } else {
                "Account created, check your email for the verification code"
            };
            println!("{}", response.message.as_deref().unwrap_or(fallback));
        }
        Commands::VerifyOtp { email, otp } => {
            let request = OtpForm { email, otp }.validate()?;
            let response = hooks.verify_otp(&request).await?;
            println!("{}", response.message.as_deref().unwrap_or("Account verified"));
        }
        Commands::Foods => {
            let foods = hooks.use_foods().data().await?;
            print_foods(&foods);
        }
        Commands::Logout => {
            hooks.logout()?;
            println!("Signed out");
        }
        Commands::Route { path } => match resolve_with(&path, hooks.credentials()) {
            Resolution::Redirect(target) => println!("{path} -> redirect {target}"),
            Resolution::Render(page) => {
                println!("{path} -> {}", page.title());
                load_page(&hooks, page).await?;
            }
        },
        Commands::Status => {
            println!("API:       {}", config.api_base_url);
            println!("Storage:   {}", config.storage_path.display());
            let state = if hooks.is_authenticated() {
                "signed in"
            } else {
                "signed out"
            };
            println!("Session:   {state}");
        }
    }

    Ok(())
}

/// Run the queries a rendered page reads.
async fn load_page(hooks: &Hooks, page: Page) -> Result<()> {
    for key in page.queries() {
        if key == keys::foods() {
            let foods = hooks.use_foods().data().await?;
            print_foods(&foods);
        } else {
            debug!(%key, "no loader for query");
        }
    }
    Ok(())
}

fn print_foods(response: &FoodsResponse) {
    if response.foods.is_empty() {
        println!("No foods on the menu");
        return;
    }
    for food in &response.foods {
        println!("{:<24} {:<14} {:>8.2}", food.name, food.category, food.price);
    }
}
