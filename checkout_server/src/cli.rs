use std::{env, env::VarError};

/// There's no real CLI for the server, so just do quick 'n dirty
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        // We don't expect any CLI args, so always print the help
        display_readme();
        display_envs();
    }
    has_cli_args
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_envs() {
    // Be explicit about which envars to print, so as to avoid accidentally exposing secrets
    const DISPLAY_ENVS: [&str; 21] = [
        "RUST_LOG",
        "CKO_HOST",
        "CKO_PORT",
        "CKO_DATABASE_URL",
        "CKO_MAX_LINE_QUANTITY",
        "CKO_FLW_BASE_URL",
        "CKO_FLW_REDIRECT_URL",
        "CKO_FLW_TITLE",
        "CKO_HTTP_TIMEOUT_SECS",
        "CKO_VERIFY_CACHE_TTL_SECS",
        "CKO_CURRENCY",
        "CKO_ALLOWED_REGIONS",
        "CKO_FREE_SHIPPING_THRESHOLD",
        "CKO_HIGH_FEE_ZONES",
        "CKO_HIGH_FEE",
        "CKO_DEFAULT_FEE",
        "CKO_TAX_RATE_BPS",
        "CKO_MAX_PAYMENT_RETRIES",
        "CKO_PENDING_PAYMENT_TIMEOUT_MINS",
        "CKO_WEBHOOK_DEDUP_TTL_SECS",
        "CKO_SWEEP_INTERVAL_SECS",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}
