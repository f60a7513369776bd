use agora::session::Session;

/// Create this device's identity.
///
/// Fetches the proof-of-work challenge, solves it (low difficulty by
/// design, but unbounded if the server misbehaves), and persists the
/// issued identity. Refuses to touch an existing identity without
/// `--replace`.
pub async fn execute(
    session: &Session,
    alias: Option<String>,
    replace: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("Requesting identity challenge...");
    let identity = session.enroll(alias, replace).await?;

    println!("Identity created.");
    println!("  self id: {}", identity.self_id);
    if let Some(alias) = &identity.alias {
        println!("  alias:   {alias}");
    }
    println!("The signing key is stored locally and is never shown or sent again.");
    Ok(())
}
