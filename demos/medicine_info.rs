use coldstart_http::{
    gateway_reply, health_gateway_reply, BackendClient, FetchStatus, RequestConfig, RequestState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let name = std::env::args().nth(1).unwrap_or_else(|| "Aspirin".to_owned());
    let backend = BackendClient::from_env()?;

    let health = backend.health().await;
    println!("health: {:?} after {} attempt(s)", health.status, health.attempts);
    let (status, body) = health_gateway_reply(&health);
    println!("health route would answer {status}: {body}");

    let result = backend.medicine_info(&name).await?;
    match result.status {
        FetchStatus::Success => println!("{:#?}", result.data),
        FetchStatus::Timeout => println!("backend is still waking up: {:?}", result.error),
        FetchStatus::Unreachable => println!("backend unreachable: {:?}", result.error),
    }
    let (status, body) = gateway_reply(&result);
    println!("gateway would answer {status}: {body}");

    let controller = backend.client().controller();
    let mut states = controller.subscribe();
    let watcher = tokio::spawn(async move {
        while states.changed().await.is_ok() {
            let state: RequestState = *states.borrow_and_update();
            println!("state -> {}", state.as_str());
        }
    });

    let request = RequestConfig::json(&serde_json::json!({ "name": name }))?;
    let outcome = controller
        .execute(&backend.client().url("/medicine/info"), &request)
        .await;
    println!(
        "controller finished in {} ms with {:?}",
        outcome.total_time_ms(),
        controller.state()
    );

    drop(controller);
    watcher.await?;
    Ok(())
}
