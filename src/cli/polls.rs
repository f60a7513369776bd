use agora::exchange::PollStatus;
use agora::polls::Poll;
use agora::session::Session;

/// List drafts and remote polls.
pub async fn execute(session: &Session) -> Result<(), Box<dyn std::error::Error>> {
    let polls = session.polls().await?;
    if polls.is_empty() {
        println!("No polls.");
        return Ok(());
    }

    for poll in polls {
        match poll {
            Poll::Draft(draft) => {
                println!("[draft]  {}  {}", draft.local_id, draft.title);
                println!("         options: {}", draft.options.join(", "));
            }
            Poll::Remote(remote) => {
                let status = match remote.status {
                    PollStatus::Open => "open",
                    PollStatus::Closed => "closed",
                };
                println!("[{status}]   {}  {}", remote.id, remote.title);
                let labels: Vec<&str> =
                    remote.options.iter().map(|o| o.label.as_str()).collect();
                println!("         options: {}", labels.join(", "));
            }
        }
    }
    Ok(())
}
