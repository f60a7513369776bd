use futures::StreamExt;

use agora::exchange::PollEvent;
use agora::session::Session;

/// Follow a remote poll's live stream until it closes.
///
/// The stream is not auto-reconnected; when the server or the transport
/// drops it, this command returns and can simply be run again.
pub async fn execute(
    session: &Session,
    poll_id: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let Some(mut stream) = session.watch(&poll_id).await? else {
        println!("The Exchange offers no live stream for this poll.");
        return Ok(());
    };

    println!("Watching {poll_id} (ctrl-c to stop)...");
    while let Some(event) = stream.next().await {
        match event {
            Ok(PollEvent::Snapshot(poll)) => {
                println!("poll: {} [{:?}]", poll.title, poll.status);
            }
            Ok(PollEvent::Results(summary)) => {
                let line: Vec<String> = summary
                    .totals
                    .iter()
                    .map(|(option, weight)| format!("{option}={weight}"))
                    .collect();
                println!("results: {}", line.join(" "));
            }
            Err(err) => {
                println!("stream closed: {err}");
                break;
            }
        }
    }
    println!("Stream ended.");
    Ok(())
}
