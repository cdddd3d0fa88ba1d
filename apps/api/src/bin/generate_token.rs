//! Operator helper that mints a bearer token for manual API access.
//!
//! Usage: generate_token --user <id> --tenant <uuid> [--roles user,auditor]
//! [--exp <hours>]

#![forbid(unsafe_code)]

use std::env;
use std::process::ExitCode;

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use uuid::Uuid;

use auditvault_core::AuthClaims;

struct Args {
    user_id: String,
    tenant_id: Uuid,
    roles: Vec<String>,
    expiration_hours: i64,
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let args = match parse_args() {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{message}");
            eprintln!(
                "usage: generate_token --user <id> --tenant <uuid> [--roles a,b] [--exp <hours>]"
            );
            return ExitCode::FAILURE;
        }
    };

    let secret =
        env::var("JWT_SECRET_KEY").unwrap_or_else(|_| "your-default-secret-key".to_owned());

    let now = Utc::now();
    let claims = AuthClaims {
        user_id: args.user_id,
        tenant_id: args.tenant_id,
        roles: args.roles,
        exp: (now + Duration::hours(args.expiration_hours)).timestamp(),
        iat: now.timestamp(),
    };

    match encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    ) {
        Ok(token) => {
            println!("Generated JWT Token:\n{token}");
            ExitCode::SUCCESS
        }
        Err(error) => {
            eprintln!("error signing token: {error}");
            ExitCode::FAILURE
        }
    }
}

fn parse_args() -> Result<Args, String> {
    let mut user_id = None;
    let mut tenant_id = None;
    let mut roles = Vec::new();
    let mut expiration_hours = 24;

    let mut arguments = env::args().skip(1);
    while let Some(flag) = arguments.next() {
        let mut value_for = |name: &str| {
            arguments
                .next()
                .ok_or_else(|| format!("{name} requires a value"))
        };

        match flag.as_str() {
            "--user" => user_id = Some(value_for("--user")?),
            "--tenant" => {
                let value = value_for("--tenant")?;
                tenant_id = Some(
                    Uuid::parse_str(&value).map_err(|error| format!("invalid tenant id: {error}"))?,
                );
            }
            "--roles" => {
                roles = value_for("--roles")?
                    .split(',')
                    .map(str::trim)
                    .filter(|role| !role.is_empty())
                    .map(str::to_owned)
                    .collect();
            }
            "--exp" => {
                expiration_hours = value_for("--exp")?
                    .parse::<i64>()
                    .map_err(|error| format!("invalid expiration: {error}"))?;
            }
            other => return Err(format!("unknown flag: {other}")),
        }
    }

    Ok(Args {
        user_id: user_id.ok_or("user id is required")?,
        tenant_id: tenant_id.ok_or("tenant id is required")?,
        roles,
        expiration_hours,
    })
}
