use anyhow::{bail, Context};
use clap::Args;
use serde_json::json;

use crate::auth::{password, Identity, TokenKeys};
use crate::cli::{utils::output_success, OutputFormat};
use crate::config::AppConfig;
use crate::validate;

#[derive(Debug, Args)]
pub struct TokenArgs {
    #[arg(long)]
    pub user_id: i64,
    #[arg(long)]
    pub role_id: i64,
    #[arg(long, help = "Role name, e.g. AdminInstitucion")]
    pub role_name: String,
    #[arg(long)]
    pub institution_id: Option<i64>,
    #[arg(long)]
    pub district_id: Option<i64>,
    #[arg(long, help = "Mark the identity as a ministry user")]
    pub ministry: bool,
    #[arg(long, help = "Signing secret (defaults to JWT_SECRET)")]
    pub secret: Option<String>,
    #[arg(long, help = "Lifetime in hours (defaults to JWT_EXPIRY_HOURS)")]
    pub expiry_hours: Option<u64>,
}

pub async fn hash_password(plain: String, cost: Option<u32>, output_format: OutputFormat) -> anyhow::Result<()> {
    if validate::check_password(&plain).is_err() {
        bail!("password must be at least {} characters", validate::MIN_PASSWORD_LEN);
    }
    let cost = cost.unwrap_or_else(|| AppConfig::from_env().security.bcrypt_cost);
    let hash = password::hash(plain, cost).await.context("hashing password")?;
    output_success(output_format, "Password hashed", Some(json!({ "hash": hash, "cost": cost })))
}

pub fn token(args: TokenArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let config = AppConfig::from_env();
    let secret = args.secret.unwrap_or(config.security.jwt_secret);
    let expiry_hours = args.expiry_hours.unwrap_or(config.security.jwt_expiry_hours);
    let keys = TokenKeys::new(&secret, expiry_hours).context("building signing keys")?;

    let identity = Identity {
        user_id: args.user_id,
        role_id: args.role_id,
        role_name: args.role_name,
        institution_id: args.institution_id,
        district_id: args.district_id,
        is_ministry_user: args.ministry,
    };
    let token = keys.issue(identity).context("signing token")?;
    output_success(
        output_format,
        "Token issued",
        Some(json!({ "token": token, "expiresInHours": expiry_hours })),
    )
}
