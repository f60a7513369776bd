use agora::session::Session;

/// Create a local draft poll.
pub async fn execute(
    session: &Session,
    title: String,
    options: Vec<String>,
    description: Option<String>,
    poll_type: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let draft = session.create_draft(title, description, options, poll_type)?;
    println!("Draft created: {}", draft.local_id);
    println!("It stays on this device until you run `agora assert {}`.", draft.local_id);
    Ok(())
}
