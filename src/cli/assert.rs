use agora::session::Session;
use agora::sync::VoteCarry;

/// Promote a draft to a live poll on the Exchange.
pub async fn execute(
    session: &Session,
    poll_id: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let outcome = session.assert_draft(&poll_id).await?;

    println!("Poll is live: {} ({})", outcome.poll.id, outcome.poll.title);
    match outcome.vote_carry {
        VoteCarry::NotNeeded => {}
        VoteCarry::Carried => println!("Your local vote was carried forward."),
        VoteCarry::Failed(reason) => {
            // Partial success: the poll exists, the vote does not.
            println!("Warning: the poll is live but your local vote was NOT carried: {reason}");
            println!("Vote again on the live poll: agora vote {} <choice>", outcome.poll.id);
        }
    }
    println!("The local draft has been removed; the Exchange now owns this poll.");
    Ok(())
}
