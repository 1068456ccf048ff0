use regionfeed_core::{
    ChangeNotifier, FetchError, Regions, RegionsError,
    notify::SlackWebhookNotifier,
};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_partial_json, method, path},
};

fn notifier(server: &MockServer) -> SlackWebhookNotifier {
    SlackWebhookNotifier::new(
        reqwest::Client::new(),
        format!("{}/hook", server.uri()),
    )
    .with_error_channel(Some("region-errors".into()))
    .with_changes_channel(Some("#region-changes".into()))
}

#[tokio::test]
async fn error_event_posts_danger_attachment() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .and(body_partial_json(serde_json::json!({
            "channel": "#region-errors",
            "attachments": [{
                "color": "danger",
                "title": "🚨 Provider Regions Fetch Failed",
                "text": "Failed to fetch regions for provider: *OVH*"
            }]
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    notifier(&server)
        .notify_error("OVH", &RegionsError::Fetch(FetchError::other("timeout")))
        .await
        .unwrap();
}

#[tokio::test]
async fn change_event_posts_counts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(serde_json::json!({
            "channel": "#region-changes",
            "attachments": [{
                "color": "warning",
                "text": "Regions have changed for provider: *Wasabi*"
            }]
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let previous = Regions::default().with_storage("us-east-1", "N. Virginia");
    let current = previous.clone().with_storage("ap-northeast-1", "Tokyo");

    notifier(&server)
        .notify_changed("Wasabi", &previous, &current)
        .await
        .unwrap();
}

#[tokio::test]
async fn rejected_webhook_is_a_notification_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = notifier(&server)
        .notify_changed("Wasabi", &Regions::default(), &Regions::default())
        .await
        .unwrap_err();

    assert_eq!(
        err,
        RegionsError::Notification(
            "slack notification failed with status: 404".into()
        )
    );
}

#[tokio::test]
async fn plain_text_message_uses_given_channel() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(serde_json::json!({
            "text": "regionfeed test message",
            "channel": "#ops"
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    notifier(&server)
        .send_text("regionfeed test message", Some("ops"))
        .await
        .unwrap();
}
