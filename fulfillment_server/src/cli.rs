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
    const DISPLAY_ENVS: [&str; 14] = [
        "RUST_LOG",
        "DGF_MARKETPLACE_URL",
        "DGF_ADMIN_CHAT_ID",
        "DGF_CATEGORY",
        "DGF_LOTS_FILE",
        "DGF_MARKUP_PERCENT",
        "DGF_MISTAG_HEURISTIC",
        "DGF_SETTLEMENT_CURRENCY",
        "DGF_SYNC_INTERVAL_SECS",
        "DGF_SYNC_CONCURRENCY",
        "DGF_POLL_INTERVAL_SECS",
        "DGF_BALANCE_THRESHOLD",
        "DGF_ORDER_LOG",
        "DGF_VENDOR_URLS",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<30} {val:<15}");
    })
}
