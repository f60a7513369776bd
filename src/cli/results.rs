use agora::session::{ResultsView, Session};

/// Show current results for a poll.
pub async fn execute(
    session: &Session,
    poll_id: String,
) -> Result<(), Box<dyn std::error::Error>> {
    match session.results(&poll_id).await? {
        ResultsView::Local(results) => {
            println!("Local draft results ({} votes):", results.total_votes);
            for (label, count) in &results.counts {
                println!("  {label}: {count}");
            }
        }
        ResultsView::Remote(Some(summary)) => {
            for (option, weight) in &summary.totals {
                println!("  {option}: {weight}");
            }
            // "Unknown" and "zero" are different things; only print what
            // the server actually reported.
            if let Some(people) = summary.people_voted {
                println!("  people voted: {people}");
            }
            if let Some(votes) = summary.total_votes {
                println!("  total votes: {votes}");
            }
            println!("  represented weight: {}", summary.represented_weight);
            if let Some(validated) = summary.validated {
                println!("  validated: {validated}");
            }
        }
        ResultsView::Remote(None) => {
            println!("No live results available for this poll right now.");
        }
    }
    Ok(())
}
