use agora::session::Session;

/// Check Exchange liveness and local state.
pub async fn execute(session: &Session) -> Result<(), Box<dyn std::error::Error>> {
    let reachable = session.health().await.unwrap_or(false);
    println!(
        "Exchange:  {} ({})",
        session.config().exchange.base_url,
        if reachable { "reachable" } else { "unreachable" }
    );

    match session.identity()? {
        Some(identity) => {
            println!(
                "Identity:  {}{}",
                identity.self_id,
                identity
                    .alias
                    .as_deref()
                    .map(|a| format!(" ({a})"))
                    .unwrap_or_default()
            );
        }
        None => println!("Identity:  none (run `agora enroll`)"),
    }

    println!("Stamps:    {} pooled", session.stamp_reserve()?);
    Ok(())
}
