//! Error display for the CLI.

use colored::Colorize;
use evalwatch_reconcile::QueryError;

/// Print an error in a user-friendly format.
pub fn print_error(err: &anyhow::Error) {
    eprintln!("{} {:#}", "Error:".red().bold(), err);

    if let Some(hint) = hint(err) {
        eprintln!("\n{}", hint.yellow());
    }
}

/// A hint for the query failure at the root of `err`, if any.
pub fn hint(err: &anyhow::Error) -> Option<&'static str> {
    let query = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<QueryError>())?;

    match query {
        QueryError::Transport(_) => {
            Some("Hint: Check that Nomad and Consul are reachable (NOMAD_ADDR, CONSUL_HTTP_ADDR).")
        }
        QueryError::Status { status: 401 | 403, .. } => {
            Some("Hint: Check the ACL tokens (NOMAD_TOKEN, CONSUL_HTTP_TOKEN).")
        }
        QueryError::NotFound(_) => Some("Hint: Check the evaluation ID and the Nomad namespace."),
        _ => None,
    }
}
