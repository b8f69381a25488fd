pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "attendance-admin")]
#[command(about = "Operator tooling for the school attendance API")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Hash a password with bcrypt for seeding the users table")]
    HashPassword {
        #[arg(help = "Plain-text password (at least 6 characters)")]
        password: String,
        #[arg(long, help = "bcrypt cost (defaults to BCRYPT_COST or the environment preset)")]
        cost: Option<u32>,
    },

    #[command(about = "Mint a signed session token for an identity")]
    Token(commands::auth::TokenArgs),

    #[command(about = "Check a running server's /api/health endpoint")]
    Ping {
        #[arg(long, default_value = "http://localhost:3000", help = "Server base URL")]
        url: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command {
        Commands::HashPassword { password, cost } => commands::auth::hash_password(password, cost, output_format).await,
        Commands::Token(args) => commands::auth::token(args, output_format),
        Commands::Ping { url } => commands::server::ping(&url, output_format).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_token_command() {
        let cli = Cli::parse_from([
            "attendance-admin",
            "--json",
            "token",
            "--user-id",
            "3",
            "--role-id",
            "4",
            "--role-name",
            "AdminInstitucion",
            "--institution-id",
            "7",
        ]);
        assert_eq!(OutputFormat::from_cli(&cli), OutputFormat::Json);
        match cli.command {
            Commands::Token(args) => {
                assert_eq!(args.role_name, "AdminInstitucion");
                assert_eq!(args.institution_id, Some(7));
                assert!(!args.ministry);
            }
            _ => panic!("expected token command"),
        }
    }

    #[test]
    fn ping_defaults_to_localhost() {
        let cli = Cli::parse_from(["attendance-admin", "ping"]);
        match cli.command {
            Commands::Ping { url } => assert_eq!(url, "http://localhost:3000"),
            _ => panic!("expected ping command"),
        }
    }
}
