use agora::session::Session;
use agora::vote::VoteOutcome;

/// Cast a vote on a draft or remote poll.
pub async fn execute(
    session: &Session,
    poll_id: String,
    choice: String,
) -> Result<(), Box<dyn std::error::Error>> {
    match session.cast_vote(&poll_id, &choice).await? {
        VoteOutcome::Local(results) => {
            println!("Vote recorded locally.");
            println!("  total votes: {}", results.total_votes);
            for (label, count) in &results.counts {
                println!("  {label}: {count}");
            }
        }
        VoteOutcome::Remote { results, revote } => {
            if revote {
                println!("Revote accepted (voter token).");
            } else {
                println!("Vote accepted (stamp spent, voter token stored for revotes).");
            }
            if let Some(summary) = results {
                for (option, weight) in &summary.totals {
                    println!("  {option}: {weight}");
                }
            }
        }
    }
    Ok(())
}
