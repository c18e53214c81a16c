use std::time::{SystemTime, UNIX_EPOCH};

use clap::Parser;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use uuid::Uuid;

/// Mint an HS256 bearer token accepted by access-gate.
///
/// Claims: sub (account id), iat, exp. Sign with the same secret the server
/// reads from JWT_SECRET.
#[derive(Parser, Debug)]
#[command(name = "token-gen", version, about)]
struct Args {
    /// Shared HS256 secret (JWT_SECRET)
    #[arg(long, env = "JWT_SECRET")]
    secret: String,

    /// Account id for the `sub` claim. Default: random UUID v4.
    #[arg(long)]
    sub: Option<Uuid>,

    /// Lifetime in seconds
    #[arg(long, default_value_t = 3600)]
    ttl: i64,

    /// Issue a token that expired `ttl` seconds ago
    #[arg(long, default_value_t = false)]
    expired: bool,

    /// Override iat (unix seconds). Default: now.
    #[arg(long)]
    iat: Option<i64>,

    /// Print only the token (no extra lines)
    #[arg(long, default_value_t = false)]
    quiet: bool,
}

fn now_unix() -> Result<i64, Box<dyn std::error::Error>> {
    let secs = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
    Ok(i64::try_from(secs)?)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    if args.ttl <= 0 {
        return Err("--ttl must be positive".into());
    }

    let sub = args.sub.unwrap_or_else(Uuid::new_v4);
    let iat = match args.iat {
        Some(iat) => iat,
        None => now_unix()?,
    };
    let (iat, exp) = if args.expired {
        (iat - 2 * args.ttl, iat - args.ttl)
    } else {
        (iat, iat + args.ttl)
    };

    let claims = serde_json::json!({
        "sub": sub.to_string(),
        "iat": iat,
        "exp": exp,
    });

    let token = jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(args.secret.as_bytes()),
    )?;

    if args.quiet {
        println!("{token}");
        return Ok(());
    }

    println!("Authorization: Bearer {token}");
    println!();
    println!("sub: {sub}");
    println!("iat: {iat}");
    println!("exp: {exp}");

    Ok(())
}
