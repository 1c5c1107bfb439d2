//! Print a bcrypt hash for `ADMIN_PASSWORD`.
//!
//! Usage:
//!   cargo run --bin hash_password -- <password>

use std::env;
use std::process::ExitCode;

fn main() -> ExitCode {
    let Some(password) = env::args().nth(1) else {
        eprintln!("Usage: hash_password <password>");
        return ExitCode::from(2);
    };

    match bcrypt::hash(&password, bcrypt::DEFAULT_COST) {
        Ok(hash) => {
            println!("{}", hash);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Failed to hash password: {}", e);
            ExitCode::FAILURE
        }
    }
}
